use super::{ParseError, ParseResult};
use crate::category::BuildContext;
use crate::derivation::DerivationNode;
use crate::grammar::{BinaryRule, UnaryRule};
use crate::sentence::Sentence;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

lazy_static! {
    static ref SLOT_INDEX: Regex = Regex::new(r"_[0-9]+").unwrap();
    static ref CLASS_LETTER: Regex = Regex::new(r"\{[_*A-Z]+\}").unwrap();
    static ref SLOT_TAG: Regex = Regex::new(r"<[0-9]+>").unwrap();
}

/// Markup with coindex decoration removed.
pub fn bare_markup(markup: &str) -> String {
    let text = SLOT_INDEX.replace_all(markup.trim(), "");
    let text = CLASS_LETTER.replace_all(&text, "");
    SLOT_TAG.replace_all(&text, "").into_owned()
}

/// One transition.
#[derive(Debug, Clone)]
pub enum Action {
    /// Pushes the next word with the given markedup lexical category.
    Shift(String),
    Reduce(BinaryRule),
    Unary(UnaryRule),
}

impl Action {
    pub fn is_shift(&self) -> bool {
        matches!(self, Action::Shift(_))
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Action::Shift(a), Action::Shift(b)) => bare_markup(a) == bare_markup(b),
            (Action::Reduce(a), Action::Reduce(b)) => {
                a.left() == b.left()
                    && a.right() == b.right()
                    && a.result() == b.result()
                    && a.head_child() == b.head_child()
            }
            (Action::Unary(a), Action::Unary(b)) => a.child() == b.child() && a.result() == b.result(),
            _ => false,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Shift(markup) => write!(f, "SHIFT {markup}"),
            Action::Reduce(rule) => write!(f, "REDUCE {rule}"),
            Action::Unary(rule) => write!(f, "UNARY {rule}"),
        }
    }
}

/// A shift or binary reduce, optionally followed by a unary rewrite of the
/// node it produced. Scored and committed as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    pub action: Action,
    pub unary: Option<UnaryRule>,
}

impl Move {
    pub fn new(action: Action) -> Self {
        Self { action, unary: None }
    }

    pub fn chained(action: Action, unary: UnaryRule) -> Self {
        Self {
            action,
            unary: Some(unary),
        }
    }

    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        std::iter::once(self.action.clone()).chain(self.unary.iter().cloned().map(Action::Unary))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        if let Some(unary) = &self.unary {
            write!(f, " + UNARY {unary}")?;
        }
        Ok(())
    }
}

/// Persistent stack of derivation nodes; pushing shares the old stack.
#[derive(Debug, Clone, Default)]
pub struct NodeStack {
    head: Option<Arc<StackCell>>,
    depth: usize,
}

#[derive(Debug)]
struct StackCell {
    node: Arc<DerivationNode>,
    below: NodeStack,
}

impl NodeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, node: Arc<DerivationNode>) -> Self {
        Self {
            head: Some(Arc::new(StackCell {
                node,
                below: self.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    /// Top node and the stack under it.
    pub fn pop(&self) -> Option<(&Arc<DerivationNode>, &NodeStack)> {
        self.head.as_deref().map(|cell| (&cell.node, &cell.below))
    }

    /// `k`-th node from the top.
    pub fn top(&self, k: usize) -> Option<&Arc<DerivationNode>> {
        self.iter().nth(k)
    }

    pub fn len(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    /// Top first.
    pub fn iter(&self) -> StackIter<'_> {
        StackIter { next: self.head.as_deref() }
    }

    /// Bottom first.
    pub fn to_vec(&self) -> Vec<Arc<DerivationNode>> {
        let mut nodes: Vec<_> = self.iter().cloned().collect();
        nodes.reverse();
        nodes
    }
}

pub struct StackIter<'a> {
    next: Option<&'a StackCell>,
}

impl<'a> Iterator for StackIter<'a> {
    type Item = &'a Arc<DerivationNode>;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.next?;
        self.next = cell.below.head.as_deref();
        Some(&cell.node)
    }
}

#[derive(Debug)]
struct Trail {
    step: Move,
    previous: Option<Arc<Trail>>,
}

/// Configuration of the transition system. Cloning is O(1).
#[derive(Debug, Clone)]
pub struct ParserState {
    stack: NodeStack,
    read_pos: usize,
    steps: usize,
    on_gold_path: bool,
    score: f64,
    trail: Option<Arc<Trail>>,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            stack: NodeStack::new(),
            read_pos: 0,
            steps: 0,
            on_gold_path: true,
            score: 0.0,
            trail: None,
        }
    }
}

/// Approximate identity of a state: depth bucket, end of the top span and
/// the categories of the top items.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EquivalenceKey {
    depth: usize,
    top_end: usize,
    categories: Vec<String>,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(&self) -> &NodeStack {
        &self.stack
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Moves committed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn on_gold_path(&self) -> bool {
        self.on_gold_path
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn is_final(&self, length: usize) -> bool {
        self.read_pos == length && self.stack.len() == 1
    }

    /// Committed moves, oldest first.
    pub fn moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(self.steps);
        let mut cursor = self.trail.as_deref();
        while let Some(trail) = cursor {
            moves.push(trail.step.clone());
            cursor = trail.previous.as_deref();
        }
        moves.reverse();
        moves
    }

    pub fn actions(&self) -> Vec<Action> {
        self.moves().iter().flat_map(Move::actions).collect()
    }

    /// Applies one action without recording it. `Ok(None)` when the action
    /// is not applicable to this configuration.
    pub fn apply(&self, action: &Action, sentence: &Sentence, ctx: &mut BuildContext) -> ParseResult<Option<Self>> {
        let (node, rest) = match action {
            Action::Shift(markup) => {
                let Some(token) = sentence.token(self.read_pos) else {
                    return Ok(None);
                };
                let node = DerivationNode::from_markedup(&token.word, &token.pos, markup, self.read_pos, ctx)?
                    .with_extra(token.extra.clone());
                return Ok(Some(Self {
                    stack: self.stack.push(Arc::new(node)),
                    read_pos: self.read_pos + 1,
                    ..self.clone()
                }));
            }
            Action::Reduce(rule) => {
                let Some((right, rest)) = self.stack.pop() else {
                    return Ok(None);
                };
                let Some((left, rest)) = rest.pop() else {
                    return Ok(None);
                };
                match DerivationNode::combine(rule, left, right, ctx)? {
                    Some(node) => (node, rest),
                    None => return Ok(None),
                }
            }
            Action::Unary(rule) => {
                let Some((child, rest)) = self.stack.pop() else {
                    return Ok(None);
                };
                match DerivationNode::unary(rule, child, ctx) {
                    Some(node) => (node, rest),
                    None => return Ok(None),
                }
            }
        };
        Ok(Some(Self {
            stack: rest.push(Arc::new(node)),
            ..self.clone()
        }))
    }

    /// Applies a whole move.
    pub fn apply_move(&self, step: &Move, sentence: &Sentence, ctx: &mut BuildContext) -> ParseResult<Option<Self>> {
        let Some(state) = self.apply(&step.action, sentence, ctx)? else {
            return Ok(None);
        };
        match &step.unary {
            Some(unary) => state.apply(&Action::Unary(unary.clone()), sentence, ctx),
            None => Ok(Some(state)),
        }
    }

    /// Records `step` as the move that produced this configuration.
    pub(crate) fn commit(mut self, step: Move, score: f64, on_gold_path: bool) -> Self {
        self.trail = Some(Arc::new(Trail {
            step,
            previous: self.trail.take(),
        }));
        self.steps += 1;
        self.score = score;
        self.on_gold_path = on_gold_path;
        self
    }

    pub fn equivalence_key(&self) -> EquivalenceKey {
        let depth = self.stack.len().min(3);
        EquivalenceKey {
            depth,
            top_end: self.stack.top(0).map(|node| node.end()).unwrap_or_default(),
            categories: self
                .stack
                .iter()
                .take(depth)
                .map(|node| node.category().to_string())
                .collect(),
        }
    }

    pub(crate) fn unknown_item(&self, sentence: &Sentence) -> ParseError {
        ParseError::UnknownLexicalItem {
            word: sentence.word(self.read_pos as isize).to_string(),
            pos: sentence.pos(self.read_pos as isize).to_string(),
            position: self.read_pos,
        }
    }
}
