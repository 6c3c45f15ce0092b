use super::state::{Action, EquivalenceKey, Move, ParserState};
use super::{ParseError, ParseOutcome, ParseResult, ParseStatus, Parser};
use crate::category::BuildContext;
use crate::grammar::Grammar;
use crate::scorer::{CcgFeatures, FeatureExtractor, FeatureSet};
use crate::sentence::Sentence;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tracing::{debug, info, instrument, trace, warn};

/// Where a chart is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartPhase {
    Init,
    Stepping,
    Done(ParseStatus),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A previewed successor waiting in the step queue.
struct Candidate {
    priority: Score,
    seq: u64,
    step: Move,
    source: usize,
    state: ParserState,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Highest priority first, then earliest generated.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Beam search over one sentence.
pub struct Chart<'a> {
    parser: &'a Parser<'a>,
    sentence: &'a Sentence,
    features: CcgFeatures<'a>,
    ctx: BuildContext,
    phase: ChartPhase,
    beam: Vec<ParserState>,
    retained: BTreeMap<(Reverse<Score>, u64), ParserState>,
    history: HashSet<EquivalenceKey>,
    gold: Option<Vec<Move>>,
    retries: usize,
    iterations: usize,
    seq: u64,
}

impl<'a> Chart<'a> {
    pub fn new(parser: &'a Parser<'a>, sentence: &'a Sentence) -> Self {
        Self {
            parser,
            sentence,
            features: CcgFeatures::with_window(sentence, parser.config().feature_window),
            ctx: BuildContext::with_arity_cap(parser.config().max_secondary_functor_arity),
            phase: ChartPhase::Init,
            beam: Vec::new(),
            retained: BTreeMap::new(),
            history: HashSet::new(),
            gold: None,
            retries: 0,
            iterations: 0,
            seq: 0,
        }
    }

    /// Tracks whether states stay on the given reference move sequence.
    pub fn with_gold(mut self, gold: Vec<Move>) -> Self {
        self.gold = Some(gold);
        self
    }

    pub fn phase(&self) -> ChartPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, ChartPhase::Done(_))
    }

    /// States in the current beam, best first.
    pub fn beam(&self) -> &[ParserState] {
        &self.beam
    }

    pub fn best(&self) -> Option<&ParserState> {
        self.beam.first()
    }

    /// Step calls made so far, retries included.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn evaluate(&self, state: &ParserState) -> f64 {
        self.parser.weights().score(&self.features.features(state))
    }

    fn shift_actions(&self, state: &ParserState) -> ParseResult<Vec<Action>> {
        let Some(token) = self.sentence.token(state.read_pos()) else {
            return Ok(Vec::new());
        };
        let candidates = self.parser.lexicon().candidates(&token.word, &token.pos);
        if candidates.is_empty() {
            warn!(word = %token.word, pos = %token.pos, position = state.read_pos(), "unknown lexical item");
            return Err(state.unknown_item(self.sentence));
        }
        Ok(candidates
            .into_iter()
            .map(|markup| Action::Shift(markup.to_string()))
            .collect())
    }

    fn reduce_actions(&mut self, state: &ParserState) -> Vec<Action> {
        let stack = state.stack();
        let (Some(right), Some(left)) = (stack.top(0), stack.top(1)) else {
            return Vec::new();
        };
        let rules = self
            .parser
            .grammar()
            .lookup_binary(&left.category().to_string(), &right.category().to_string());
        if !rules.is_empty() {
            return rules.iter().cloned().map(Action::Reduce).collect();
        }
        Grammar::try_all_rules(left.category(), right.category(), &mut self.ctx)
            .into_iter()
            .map(Action::Reduce)
            .collect()
    }

    fn on_gold(&self, parent: &ParserState, step: &Move) -> bool {
        parent.on_gold_path()
            && self
                .gold
                .as_ref()
                .and_then(|gold| gold.get(parent.steps()))
                .is_some_and(|gold_step| gold_step == step)
    }

    fn expand(&mut self, source: usize, state: &ParserState, queue: &mut BinaryHeap<Candidate>) -> ParseResult<()> {
        let grammar = self.parser.grammar();
        let mut actions = self.shift_actions(state)?;
        actions.extend(self.reduce_actions(state));
        for action in actions {
            let Some(preview) = state.apply(&action, self.sentence, &mut self.ctx)? else {
                continue;
            };
            let score = self.evaluate(&preview);
            let top = preview
                .stack()
                .top(0)
                .map(|node| node.category().to_string())
                .unwrap_or_default();
            for rule in grammar.lookup_unary(&top) {
                let unary = Action::Unary(rule.clone());
                let Some(chained) = preview.apply(&unary, self.sentence, &mut self.ctx)? else {
                    continue;
                };
                let chained_score = self.evaluate(&chained);
                let seq = self.next_seq();
                queue.push(Candidate {
                    priority: Score(state.score() + score + chained_score),
                    seq,
                    step: Move::chained(action.clone(), rule.clone()),
                    source,
                    state: chained,
                });
            }
            let seq = self.next_seq();
            queue.push(Candidate {
                priority: Score(state.score() + score),
                seq,
                step: Move::new(action),
                source,
                state: preview,
            });
        }
        Ok(())
    }

    fn retain(&mut self, state: ParserState) {
        let seq = self.next_seq();
        self.retained.insert((Reverse(Score(state.score())), seq), state);
        while self.retained.len() > self.parser.config().retained_capacity {
            self.retained.pop_last();
        }
    }

    /// Rebuilds the beam from retained states after a dead end. `false` when
    /// nothing could be recovered.
    fn resume_from_retained(&mut self) -> bool {
        let parser = self.parser;
        let config = parser.config();
        self.retries += 1;
        if !config.approximate_pruning || self.retries > config.max_retries || self.retained.is_empty() {
            return false;
        }
        debug!(retry = self.retries, retained = self.retained.len(), "resuming from retained states");
        let mut accepted = HashSet::new();
        while self.beam.len() < config.beam_size {
            let Some((_, state)) = self.retained.pop_first() else {
                break;
            };
            let key = state.equivalence_key();
            if accepted.insert(key.clone()) {
                self.history.insert(key);
                self.beam.push(state);
            }
        }
        !self.beam.is_empty()
    }

    fn finish(&mut self, status: ParseStatus) -> ChartPhase {
        if status != ParseStatus::Success {
            info!(status = %status, words = self.sentence.len(), iterations = self.iterations, "parse did not succeed");
        }
        self.phase = ChartPhase::Done(status);
        self.phase
    }

    /// Advances every state in the beam by one move.
    #[instrument(level = "debug", skip(self), fields(iteration = self.iterations))]
    pub fn step(&mut self) -> ParseResult<ChartPhase> {
        match self.phase {
            ChartPhase::Done(_) => return Ok(self.phase),
            ChartPhase::Init => {
                let initial = ParserState::new();
                self.history.insert(initial.equivalence_key());
                self.beam.push(initial);
                self.phase = ChartPhase::Stepping;
            }
            ChartPhase::Stepping => {}
        }
        self.iterations += 1;

        let previous = std::mem::take(&mut self.beam);
        let mut queue = BinaryHeap::new();
        for (source, state) in previous.iter().enumerate() {
            self.expand(source, state, &mut queue)?;
        }
        trace!(candidates = queue.len(), "moves previewed");

        if queue.is_empty() {
            if !self.resume_from_retained() {
                return Ok(self.finish(ParseStatus::Failure));
            }
        } else {
            self.select(&previous, queue);
        }

        let Some(best) = self.beam.first() else {
            return Ok(self.finish(ParseStatus::Failure));
        };
        if best.is_final(self.sentence.len()) {
            return Ok(self.finish(ParseStatus::Success));
        }
        let steps = best.steps();
        if self.parser.config().early_update
            && self.gold.is_some()
            && self.beam.iter().all(|state| !state.on_gold_path())
        {
            debug!(steps, "gold derivation fell out of the beam");
            return Ok(self.finish(ParseStatus::EarlyUpdate));
        }
        Ok(self.phase)
    }

    fn select(&mut self, previous: &[ParserState], mut queue: BinaryHeap<Candidate>) {
        let parser = self.parser;
        let config = parser.config();
        let mut accepted = HashSet::new();
        let mut shifts = 0;
        while let Some(candidate) = queue.pop() {
            let is_shift = candidate.step.action.is_shift();
            if is_shift && shifts >= config.max_shifts_per_step {
                continue;
            }
            let parent = &previous[candidate.source];
            let on_gold = self.on_gold(parent, &candidate.step);
            let state = candidate.state.commit(candidate.step, candidate.priority.0, on_gold);
            if !config.approximate_pruning {
                if is_shift {
                    shifts += 1;
                }
                self.beam.push(state);
                if self.beam.len() >= config.beam_size {
                    break;
                }
                continue;
            }
            let key = state.equivalence_key();
            if self.beam.len() >= config.beam_size || accepted.contains(&key) {
                if !self.history.contains(&key) {
                    self.retain(state);
                }
                continue;
            }
            if is_shift {
                shifts += 1;
            }
            accepted.insert(key.clone());
            self.history.insert(key);
            self.beam.push(state);
        }
    }

    /// Steps until the chart is done or `cancel` is raised.
    pub fn run(&mut self, cancel: Option<&AtomicBool>) -> ParseResult<ParseOutcome> {
        while !self.is_done() {
            if cancel.is_some_and(|flag| flag.load(AtomicOrdering::Relaxed)) {
                self.finish(ParseStatus::Cancelled);
                break;
            }
            self.step()?;
        }
        Ok(self.outcome())
    }

    pub fn outcome(&self) -> ParseOutcome {
        let status = match self.phase {
            ChartPhase::Done(status) => status,
            _ => ParseStatus::Failure,
        };
        match self.best() {
            Some(best) => ParseOutcome::from_state(status, best),
            None => ParseOutcome::empty(status),
        }
    }

    fn collect_features(&mut self, from: &ParserState, actions: &[Action]) -> ParseResult<Option<FeatureSet>> {
        let mut state = from.clone();
        let mut features = FeatureSet::new();
        for action in actions {
            let Some(next) = state.apply(action, self.sentence, &mut self.ctx)? else {
                return Ok(None);
            };
            features.accumulate(&self.features.features(&next));
            state = next;
        }
        Ok(Some(features))
    }

    /// Perceptron update for the best state: gold features minus predicted
    /// features from the first point where the two action sequences differ.
    /// `None` when the best state is still on the gold path.
    pub fn update_delta(&mut self) -> ParseResult<Option<FeatureSet>> {
        let Some(gold) = self.gold.as_ref() else {
            return Err(ParseError::NoGoldDerivation);
        };
        let Some(best) = self.beam.first() else {
            return Ok(None);
        };
        if best.on_gold_path() {
            return Ok(None);
        }
        let predicted = best.actions();
        let reference: Vec<Action> = gold.iter().flat_map(Move::actions).collect();
        let end = predicted.len().min(reference.len());

        let mut shared = ParserState::new();
        let mut diverged = 0;
        while diverged < end && predicted[diverged] == reference[diverged] {
            shared = shared
                .apply(&reference[diverged], self.sentence, &mut self.ctx)?
                .ok_or(ParseError::NoGoldDerivation)?;
            diverged += 1;
        }

        let wrong = self
            .collect_features(&shared, &predicted[diverged..])?
            .unwrap_or_default();
        let mut delta = self
            .collect_features(&shared, &reference[diverged..end])?
            .ok_or(ParseError::NoGoldDerivation)?;
        delta.subtract(&wrong);
        debug!(diverged, predicted = predicted.len(), gold = reference.len(), "perceptron update");
        Ok(Some(delta))
    }
}
