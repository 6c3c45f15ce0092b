//! # Shift-Reduce Parser
//!
//! Incremental beam-search parsing over a token sequence. A configuration
//! ([`ParserState`]) holds a persistent stack of partial derivations and the
//! read position. Each step previews every legal move of every state in
//! the beam, scores the resulting configurations with the perceptron
//! weights and keeps the best ones:
//!
//! - `SHIFT` pushes the next word with one of its lexical categories,
//! - `REDUCE` combines the top two stack items with a binary rule,
//! - either may be followed by one unary rewrite of the node it produced.
//!
//! A sentence of `n` words is thus parsed in exactly `2n - 1` moves.
//!
//! States that fall off the beam, or that look equivalent to an accepted
//! state, are retained and used to restart the search when a step yields
//! no successor at all.
//!
//! ## Training
//!
//! With a reference move sequence attached, every state records whether
//! it is still on the reference path. With early update enabled the parse
//! halts as soon as no state is, and [`Chart::update_delta`] yields the
//! perceptron correction.

mod beam;
mod oracle;
mod state;

pub use beam::{Chart, ChartPhase};
pub use oracle::{action_sequence, gold_moves, gold_parse};
pub use state::{bare_markup, Action, EquivalenceKey, Move, NodeStack, ParserState, StackIter};

use crate::config::ParserConfig;
use crate::derivation::{DerivationError, DerivationNode, SlotCell};
use crate::grammar::{Grammar, GrammarError, LexicalResources};
use crate::scorer::WeightTable;
use crate::sentence::Sentence;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unknown lexical item '{word}' ({pos}) at position {position}")]
    UnknownLexicalItem { word: String, pos: String, position: usize },
    #[error("No gold derivation")]
    NoGoldDerivation,
    #[error("Derivation error: {0}")]
    Derivation(#[from] DerivationError),
    #[error("Grammar error: {0}")]
    Grammar(#[from] GrammarError),
}

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ParseStatus {
    Success,
    Failure,
    /// Halted once the reference derivation left the beam.
    EarlyUpdate,
    Cancelled,
}

/// Result of a parse: the best configuration's stack, bottom first, with
/// per-word dependency slots over the words read.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub status: ParseStatus,
    pub stack: Vec<Arc<DerivationNode>>,
    pub dependencies: Vec<Vec<SlotCell>>,
    /// Transitions applied to reach the configuration.
    pub steps: usize,
}

impl ParseOutcome {
    pub(crate) fn from_state(status: ParseStatus, state: &ParserState) -> Self {
        let stack = state.stack().to_vec();
        let dependencies = stack
            .iter()
            .flat_map(|node| node.dependencies().iter().cloned())
            .collect();
        Self {
            status,
            stack,
            dependencies,
            steps: state.steps(),
        }
    }

    pub(crate) fn empty(status: ParseStatus) -> Self {
        Self {
            status,
            stack: Vec::new(),
            dependencies: Vec::new(),
            steps: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ParseStatus::Success
    }

    /// The single derivation of a successful parse.
    pub fn tree(&self) -> Option<&DerivationNode> {
        match (self.status, self.stack.as_slice()) {
            (ParseStatus::Success, [root]) => Some(root),
            _ => None,
        }
    }
}

/// Read-only parsing resources plus settings. Sentences can be parsed
/// concurrently from one parser; each parse owns its chart.
#[derive(Debug, Clone)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    lexicon: &'g LexicalResources,
    weights: &'g WeightTable,
    config: ParserConfig,
}

impl<'g> Parser<'g> {
    pub fn new(
        grammar: &'g Grammar,
        lexicon: &'g LexicalResources,
        weights: &'g WeightTable,
        config: ParserConfig,
    ) -> Self {
        Self {
            grammar,
            lexicon,
            weights,
            config,
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn lexicon(&self) -> &'g LexicalResources {
        self.lexicon
    }

    pub fn weights(&self) -> &'g WeightTable {
        self.weights
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    #[instrument(level = "debug", skip(self, sentence), fields(words = sentence.len()))]
    pub fn parse(&self, sentence: &Sentence) -> ParseResult<ParseOutcome> {
        Chart::new(self, sentence).run(None)
    }

    /// Like [`Parser::parse`], stopping between steps once `cancel` is set.
    pub fn parse_with_cancel(&self, sentence: &Sentence, cancel: &AtomicBool) -> ParseResult<ParseOutcome> {
        Chart::new(self, sentence).run(Some(cancel))
    }
}

/// Online perceptron training with early update.
#[derive(Debug)]
pub struct Trainer<'g> {
    grammar: &'g Grammar,
    lexicon: &'g LexicalResources,
    config: ParserConfig,
    weights: WeightTable,
    updates: usize,
}

impl<'g> Trainer<'g> {
    pub fn new(grammar: &'g Grammar, lexicon: &'g LexicalResources, config: ParserConfig, weights: WeightTable) -> Self {
        Self {
            grammar,
            lexicon,
            config: ParserConfig {
                early_update: true,
                ..config
            },
            weights,
            updates: 0,
        }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn into_weights(self) -> WeightTable {
        self.weights
    }

    /// Updates applied so far.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Parses the words of `reference` and corrects the weights if the best
    /// configuration left the reference path. Returns whether an update was
    /// applied.
    pub fn train(&mut self, reference: &DerivationNode) -> ParseResult<bool> {
        let sentence = Sentence::from_derivation(reference);
        let gold = gold_moves(reference)?;
        let delta = {
            let parser = Parser::new(self.grammar, self.lexicon, &self.weights, self.config.clone());
            let mut chart = Chart::new(&parser, &sentence).with_gold(gold);
            chart.run(None)?;
            chart.update_delta()?
        };
        match delta {
            Some(delta) => {
                self.weights.plus(&delta);
                self.updates += 1;
                debug!(updates = self.updates, "weights updated");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::BuildContext;
    use crate::derivation::parse_tree;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    const DET: &str = "1 (NP[nb]{Y}/N{Y}<1>){_}";
    const NOUN: &str = "0 N{_}";

    fn lexicon() -> LexicalResources {
        let mut lexicon = LexicalResources::new();
        lexicon.add_entry("the", "DT", DET);
        lexicon.add_entry("cat", "N", NOUN);
        lexicon
    }

    #[test]
    fn test_the_cat() {
        let grammar = Grammar::new();
        let lexicon = lexicon();
        let weights = WeightTable::new();
        let parser = Parser::new(&grammar, &lexicon, &weights, ParserConfig::default());
        let sentence = Sentence::from_pairs(&[("the", "DT"), ("cat", "N")]);
        let outcome = parser.parse(&sentence).unwrap();
        assert_eq!(outcome.status, ParseStatus::Success);
        assert_eq!(outcome.steps, 3);
        let tree = outcome.tree().unwrap();
        assert_eq!(tree.category().to_string(), "NP[nb]");
        assert_eq!(outcome.dependencies[0][0], Some(BTreeSet::from([1])));
    }

    #[test]
    fn test_unknown_word_aborts() {
        let grammar = Grammar::new();
        let lexicon = lexicon();
        let weights = WeightTable::new();
        let parser = Parser::new(&grammar, &lexicon, &weights, ParserConfig::default());
        let sentence = Sentence::from_pairs(&[("the", "DT"), ("dog", "VB")]);
        match parser.parse(&sentence) {
            Err(ParseError::UnknownLexicalItem { word, position, .. }) => {
                assert_eq!(word, "dog");
                assert_eq!(position, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_before_first_step() {
        let grammar = Grammar::new();
        let lexicon = lexicon();
        let weights = WeightTable::new();
        let parser = Parser::new(&grammar, &lexicon, &weights, ParserConfig::default());
        let sentence = Sentence::from_pairs(&[("the", "DT"), ("cat", "N")]);
        let outcome = parser.parse_with_cancel(&sentence, &AtomicBool::new(true)).unwrap();
        assert_eq!(outcome.status, ParseStatus::Cancelled);
        assert!(outcome.stack.is_empty());
    }

    #[test]
    fn test_trainer_prefers_reference_category() {
        let mut ctx = BuildContext::new();
        let reference = parse_tree(
            "(<T NP[nb] 0 2> (<L NP[nb]/N DT DT the NP[nb]_1/N_1>) (<L N NN NN cat N>) )",
            None,
            &mut ctx,
        )
        .unwrap();
        let grammar = Grammar::new();
        let mut lexicon = LexicalResources::new();
        lexicon.add_entry("the", "DT", "0 NP{_}");
        lexicon.add_entry("the", "DT", "0 NP{_}");
        lexicon.add_entry("the", "DT", DET);
        lexicon.add_entry("cat", "NN", NOUN);
        let config = ParserConfig {
            beam_size: 1,
            ..ParserConfig::default()
        };
        let mut trainer = Trainer::new(&grammar, &lexicon, config.clone(), WeightTable::new());
        assert!(trainer.train(&reference).unwrap());
        assert_eq!(trainer.updates(), 1);

        let weights = trainer.into_weights();
        let parser = Parser::new(&grammar, &lexicon, &weights, config);
        let outcome = parser.parse(&Sentence::from_derivation(&reference)).unwrap();
        assert!(outcome.is_success());
        assert!(outcome.tree().unwrap().same_structure(&reference));
    }
}
