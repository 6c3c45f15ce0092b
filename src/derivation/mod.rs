//! # Derivation Trees
//!
//! A derivation is a binary-branching tree of [`DerivationNode`]s. Leaves
//! carry a word and its lexical category; internal nodes carry the category
//! produced by a unary or binary rule and the index of their head child.
//!
//! ## Dependency slots
//!
//! Every node owns a slot matrix covering its span: row `i` belongs to the
//! word at `start + i`, column `k` to the `k`-th argument slot of that
//! word's lexical category. A cell is `None` until the slot's coindex class
//! acquires a head word. Unfilled slots are tracked per coindex class of the
//! node's category, so that combining two nodes only has to follow the
//! child-to-parent class links produced while wiring the result.
//!
//! Children are shared through [`Arc`]; building a parent never touches its
//! children.

mod reader;

pub use reader::{parse_tree, read_treebank, TreebankEntry};

use crate::category::{BuildContext, Category, CategoryError, ClassId, LexicalCategory};
use crate::grammar::{BinaryRule, Reduction, UnaryRule};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DerivationError {
    #[error("Malformed derivation: {reason}")]
    MalformedTree { reason: String },
    #[error("Nodes are not adjacent: left ends at {left_end}, right starts at {right_start}")]
    NotAdjacent { left_end: usize, right_start: usize },
    #[error("Rule failed: {0}")]
    RuleFailed(String),
    #[error("Category error: {0}")]
    Category(#[from] CategoryError),
}

impl DerivationError {
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedTree {
            reason: reason.into(),
        }
    }
}

pub type DerivationResult<T> = Result<T, DerivationError>;

/// Filler word indices of one argument slot, `None` while unresolved.
pub type SlotCell = Option<BTreeSet<usize>>;
pub type SlotMatrix = Vec<Vec<SlotCell>>;
/// `(word index, slot index)` pairs waiting on a coindex class.
pub type UnfilledSlots = BTreeMap<ClassId, BTreeSet<(usize, usize)>>;

#[derive(Debug, Clone)]
pub struct Terminal {
    pub word: String,
    pub pos: String,
    pub orig_pos: String,
    /// Lexical annotation as written: predicate-argument or markedup text.
    pub annotation: String,
    pub extra: Option<String>,
    index: usize,
    lexical: LexicalCategory,
    slots: SlotMatrix,
    unfilled: UnfilledSlots,
}

impl Terminal {
    fn build(
        word: &str,
        pos: &str,
        orig_pos: &str,
        annotation: &str,
        mut lexical: LexicalCategory,
        index: usize,
        ctx: &mut BuildContext,
    ) -> Self {
        lexical.category.fill_blank_classes(ctx.arena_mut());
        if let Some(class) = lexical.category.class() {
            ctx.arena_mut().add_head(class, index);
        }
        let mut unfilled = UnfilledSlots::new();
        for (slot, position) in lexical.slots.iter().enumerate() {
            let Some(position) = position else {
                continue;
            };
            if let Some(class) = lexical.category.node_at(*position).and_then(Category::class) {
                unfilled.entry(class).or_default().insert((index, slot));
            }
        }
        Self {
            word: word.to_string(),
            pos: pos.to_string(),
            orig_pos: orig_pos.to_string(),
            annotation: annotation.to_string(),
            extra: None,
            index,
            slots: vec![vec![None; lexical.slots.len()]],
            lexical,
            unfilled,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn category(&self) -> &Category {
        &self.lexical.category
    }

    pub fn lexical(&self) -> &LexicalCategory {
        &self.lexical
    }

    pub fn slot_count(&self) -> usize {
        self.lexical.slots.len()
    }

    pub fn is_punctuation(&self) -> bool {
        self.lexical.category.is_punctuation()
    }

    pub fn to_markedup(&self) -> Result<String, CategoryError> {
        self.lexical.to_markedup()
    }

    /// Annotation field of the tree text; markups are written in
    /// predicate-argument form so the field stays a single token.
    pub fn pred_arg_text(&self) -> String {
        if self.annotation.split_whitespace().count() == 1 {
            self.annotation.clone()
        } else {
            self.lexical.category.to_pred_arg()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Internal {
    pub extra: Option<String>,
    category: Category,
    head_child: usize,
    children: Vec<Arc<DerivationNode>>,
    start: usize,
    end: usize,
    slots: SlotMatrix,
    unfilled: UnfilledSlots,
    newly_filled: BTreeMap<(usize, usize), BTreeSet<usize>>,
}

#[derive(Debug, Clone)]
pub enum DerivationNode {
    Terminal(Terminal),
    Internal(Internal),
}

fn concat_slots(children: &[Arc<DerivationNode>]) -> SlotMatrix {
    children
        .iter()
        .flat_map(|child| child.slots().iter().cloned())
        .collect()
}

impl DerivationNode {
    /// Terminal from a markedup lexical category, headed by `index`.
    pub fn from_markedup(
        word: &str,
        pos: &str,
        markup: &str,
        index: usize,
        ctx: &mut BuildContext,
    ) -> DerivationResult<Self> {
        let lexical = ctx.parse_markedup(markup)?;
        Ok(DerivationNode::Terminal(Terminal::build(
            word, pos, pos, markup, lexical, index, ctx,
        )))
    }

    /// Terminal from a predicate-argument category, headed by `index`.
    pub fn from_pred_arg(
        word: &str,
        pos: &str,
        orig_pos: &str,
        pred_arg: &str,
        index: usize,
        ctx: &mut BuildContext,
    ) -> DerivationResult<Self> {
        let lexical = ctx.parse_pred_arg(pred_arg)?;
        Ok(DerivationNode::Terminal(Terminal::build(
            word, pos, orig_pos, pred_arg, lexical, index, ctx,
        )))
    }

    pub fn with_extra(mut self, extra: Option<String>) -> Self {
        match &mut self {
            DerivationNode::Terminal(terminal) => terminal.extra = extra,
            DerivationNode::Internal(internal) => internal.extra = extra,
        }
        self
    }

    /// Applies a binary rule to two adjacent nodes. `Ok(None)` when the rule
    /// does not license the combination.
    pub fn combine(
        rule: &BinaryRule,
        left: &Arc<DerivationNode>,
        right: &Arc<DerivationNode>,
        ctx: &mut BuildContext,
    ) -> DerivationResult<Option<Self>> {
        if left.end() + 1 != right.start() {
            return Err(DerivationError::NotAdjacent {
                left_end: left.end(),
                right_start: right.start(),
            });
        }
        let Some(reduction) = rule.perform(left.category(), right.category(), ctx) else {
            return Ok(None);
        };
        let children = vec![left.clone(), right.clone()];
        Ok(Some(Self::wire(reduction, rule.head_child(), children, true, ctx)))
    }

    /// Applies a unary rule. Unary rules carry slots forward without filling
    /// any.
    pub fn unary(rule: &UnaryRule, child: &Arc<DerivationNode>, ctx: &mut BuildContext) -> Option<Self> {
        let reduction = rule.perform(child.category(), ctx)?;
        Some(Self::wire(reduction, 0, vec![child.clone()], false, ctx))
    }

    fn wire(
        reduction: Reduction,
        head_child: usize,
        children: Vec<Arc<DerivationNode>>,
        fill: bool,
        ctx: &BuildContext,
    ) -> Self {
        let start = children.first().map(|c| c.start()).unwrap_or_default();
        let end = children.last().map(|c| c.end()).unwrap_or_default();
        let mut slots = concat_slots(&children);
        let mut unfilled = UnfilledSlots::new();
        let mut newly_filled = BTreeMap::new();
        let arena = ctx.arena();
        for (child_class, parent_class) in reduction.links {
            let Some(waiting) = children
                .iter()
                .find_map(|child| child.unfilled().get(&child_class))
            else {
                continue;
            };
            let heads = arena.heads(parent_class);
            if fill && !heads.is_empty() {
                if arena.heads(child_class).is_empty() {
                    for &(word, slot) in waiting {
                        newly_filled.insert((word, slot), heads.clone());
                        slots[word - start][slot] = Some(heads.clone());
                    }
                }
            } else {
                unfilled
                    .entry(parent_class)
                    .or_insert_with(BTreeSet::new)
                    .extend(waiting.iter().copied());
            }
        }
        DerivationNode::Internal(Internal {
            extra: None,
            category: reduction.category,
            head_child,
            children,
            start,
            end,
            slots,
            unfilled,
            newly_filled,
        })
    }

    /// Internal node taken as given, as read from a treebank; no slot is
    /// filled.
    pub fn from_parts(
        category: Category,
        head_child: usize,
        children: Vec<Arc<DerivationNode>>,
    ) -> DerivationResult<Self> {
        if children.is_empty() || children.len() > 2 {
            return Err(DerivationError::malformed(format!(
                "{} children under {category}",
                children.len()
            )));
        }
        if head_child >= children.len() {
            return Err(DerivationError::malformed(format!(
                "head child {head_child} out of {} children",
                children.len()
            )));
        }
        if let [left, right] = children.as_slice() {
            if left.end() + 1 != right.start() {
                return Err(DerivationError::NotAdjacent {
                    left_end: left.end(),
                    right_start: right.start(),
                });
            }
        }
        let start = children[0].start();
        let end = children[children.len() - 1].end();
        Ok(DerivationNode::Internal(Internal {
            extra: None,
            slots: concat_slots(&children),
            category,
            head_child,
            children,
            start,
            end,
            unfilled: UnfilledSlots::new(),
            newly_filled: BTreeMap::new(),
        }))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DerivationNode::Terminal(_))
    }

    pub fn category(&self) -> &Category {
        match self {
            DerivationNode::Terminal(terminal) => terminal.category(),
            DerivationNode::Internal(internal) => &internal.category,
        }
    }

    pub fn start(&self) -> usize {
        match self {
            DerivationNode::Terminal(terminal) => terminal.index,
            DerivationNode::Internal(internal) => internal.start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            DerivationNode::Terminal(terminal) => terminal.index,
            DerivationNode::Internal(internal) => internal.end,
        }
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start(), self.end())
    }

    pub fn len(&self) -> usize {
        self.end() - self.start() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn children(&self) -> &[Arc<DerivationNode>] {
        match self {
            DerivationNode::Terminal(_) => &[],
            DerivationNode::Internal(internal) => &internal.children,
        }
    }

    pub fn head_child(&self) -> usize {
        match self {
            DerivationNode::Terminal(_) => 0,
            DerivationNode::Internal(internal) => internal.head_child,
        }
    }

    pub fn extra(&self) -> Option<&str> {
        match self {
            DerivationNode::Terminal(terminal) => terminal.extra.as_deref(),
            DerivationNode::Internal(internal) => internal.extra.as_deref(),
        }
    }

    pub fn slots(&self) -> &SlotMatrix {
        match self {
            DerivationNode::Terminal(terminal) => &terminal.slots,
            DerivationNode::Internal(internal) => &internal.slots,
        }
    }

    /// Per-word argument slots over the span: `dependencies()[i][k]` holds
    /// the fillers of slot `k` of word `start + i`.
    pub fn dependencies(&self) -> &[Vec<SlotCell>] {
        self.slots()
    }

    pub fn unfilled(&self) -> &UnfilledSlots {
        match self {
            DerivationNode::Terminal(terminal) => &terminal.unfilled,
            DerivationNode::Internal(internal) => &internal.unfilled,
        }
    }

    /// Slots filled when this node was built.
    pub fn newly_filled(&self) -> Option<&BTreeMap<(usize, usize), BTreeSet<usize>>> {
        match self {
            DerivationNode::Terminal(_) => None,
            DerivationNode::Internal(internal) => Some(&internal.newly_filled),
        }
    }

    /// Words that had a slot filled by this node and now have every slot
    /// filled.
    pub fn collect_new_inactive(&self) -> BTreeSet<usize> {
        let Some(newly_filled) = self.newly_filled() else {
            return BTreeSet::new();
        };
        let start = self.start();
        let slots = self.slots();
        newly_filled
            .keys()
            .map(|(word, _)| *word)
            .filter(|word| slots[word - start].iter().all(Option::is_some))
            .collect()
    }

    /// Terminal reached by following head children.
    pub fn head_terminal(&self) -> &Terminal {
        match self {
            DerivationNode::Terminal(terminal) => terminal,
            DerivationNode::Internal(internal) => internal.children[internal.head_child].head_terminal(),
        }
    }

    /// Terminal covering word `index`.
    ///
    /// # Panics
    ///
    /// If `index` lies outside this node's span.
    pub fn terminal_at(&self, index: usize) -> &Terminal {
        assert!(
            self.start() <= index && index <= self.end(),
            "word {index} outside span {:?}",
            self.span()
        );
        match self {
            DerivationNode::Terminal(terminal) => terminal,
            DerivationNode::Internal(internal) => {
                let left = &internal.children[0];
                if index > left.end() {
                    internal.children[1].terminal_at(index)
                } else {
                    left.terminal_at(index)
                }
            }
        }
    }

    pub fn leftmost_terminal(&self) -> &Terminal {
        self.terminal_at(self.start())
    }

    pub fn rightmost_terminal(&self) -> &Terminal {
        self.terminal_at(self.end())
    }

    pub fn terminals(&self) -> Vec<&Terminal> {
        let mut out = Vec::with_capacity(self.len());
        self.collect_terminals(&mut out);
        out
    }

    fn collect_terminals<'a>(&'a self, out: &mut Vec<&'a Terminal>) {
        match self {
            DerivationNode::Terminal(terminal) => out.push(terminal),
            DerivationNode::Internal(internal) => {
                for child in &internal.children {
                    child.collect_terminals(out);
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Same categories, head children and words, ignoring coindexation.
    pub fn same_structure(&self, other: &DerivationNode) -> bool {
        match (self, other) {
            (DerivationNode::Terminal(a), DerivationNode::Terminal(b)) => {
                a.word == b.word && a.index == b.index && a.category() == b.category()
            }
            (DerivationNode::Internal(a), DerivationNode::Internal(b)) => {
                a.category == b.category
                    && a.head_child == b.head_child
                    && a.children.len() == b.children.len()
                    && a.children
                        .iter()
                        .zip(&b.children)
                        .all(|(x, y)| x.same_structure(y))
            }
            _ => false,
        }
    }

    /// Tree layout with the second child of a binary node on its own line.
    pub fn to_indented_string(&self) -> String {
        let mut out = String::new();
        self.write_indented(0, &mut out);
        out
    }

    fn write_indented(&self, depth: usize, out: &mut String) {
        match self {
            DerivationNode::Terminal(terminal) => {
                out.push_str(&format!("({} {})", terminal.category(), terminal.word));
            }
            DerivationNode::Internal(internal) => {
                let label = internal.category.to_string();
                let inner = depth + label.len() + 2;
                out.push('(');
                out.push_str(&label);
                out.push(' ');
                internal.children[0].write_indented(inner, out);
                if let Some(second) = internal.children.get(1) {
                    out.push('\n');
                    out.push_str(&" ".repeat(inner));
                    second.write_indented(inner, out);
                }
                out.push(')');
            }
        }
    }
}

impl fmt::Display for DerivationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationNode::Terminal(terminal) => {
                write!(
                    f,
                    "(<L {} {} {} {} {}",
                    terminal.category(),
                    terminal.pos,
                    terminal.orig_pos,
                    terminal.word,
                    terminal.pred_arg_text()
                )?;
                if let Some(extra) = &terminal.extra {
                    write!(f, " {extra}")?;
                }
                write!(f, ">)")
            }
            DerivationNode::Internal(internal) => {
                write!(
                    f,
                    "(<T {} {} {}",
                    internal.category,
                    internal.head_child,
                    internal.children.len()
                )?;
                if let Some(extra) = &internal.extra {
                    write!(f, " {extra}")?;
                }
                write!(f, "> ")?;
                for child in &internal.children {
                    write!(f, "{child} ")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn leaf(word: &str, markup: &str, index: usize, ctx: &mut BuildContext) -> Arc<DerivationNode> {
        Arc::new(DerivationNode::from_markedup(word, "X", markup, index, ctx).unwrap())
    }

    #[test]
    fn test_terminal_slots_start_unfilled() {
        let mut ctx = BuildContext::new();
        let node = leaf("saw", "2 ((S[dcl]{_}\\NP{Y}<1>){_}/NP{Z}<2>){_}", 3, &mut ctx);
        assert_eq!(node.span(), (3, 3));
        assert_eq!(node.slots(), &vec![vec![None, None]]);
        assert_eq!(node.unfilled().values().flatten().count(), 2);
        assert_eq!(ctx.heads(node.category()), BTreeSet::from([3]));
        assert!(node.collect_new_inactive().is_empty());
    }

    #[test]
    fn test_forward_application_fills_argument_slot() {
        let mut ctx = BuildContext::new();
        let the = leaf("the", "1 (NP[nb]{Y}/N{Y}<1>){_}", 0, &mut ctx);
        let cat = leaf("cat", "0 N{_}", 1, &mut ctx);
        let rule = BinaryRule::new("NP[nb]/N", "N", "NP[nb]", 0).unwrap();
        let node = DerivationNode::combine(&rule, &the, &cat, &mut ctx).unwrap().unwrap();
        assert_eq!(node.span(), (0, 1));
        assert_eq!(node.category().to_string(), "NP[nb]");
        assert_eq!(node.dependencies()[0][0], Some(BTreeSet::from([1])));
        assert_eq!(node.collect_new_inactive(), BTreeSet::from([0]));
        assert_eq!(ctx.heads(node.category()), BTreeSet::from([1]));
    }

    #[test]
    fn test_verb_object_then_subject() {
        let mut ctx = BuildContext::new();
        let john = leaf("John", "0 NP{_}", 0, &mut ctx);
        let saw = leaf("saw", "2 ((S[dcl]{_}\\NP{Y}<1>){_}/NP{Z}<2>){_}", 1, &mut ctx);
        let mary = leaf("Mary", "0 NP{_}", 2, &mut ctx);
        let object = BinaryRule::new("(S[dcl]\\NP)/NP", "NP", "S[dcl]\\NP", 0).unwrap();
        let vp = Arc::new(DerivationNode::combine(&object, &saw, &mary, &mut ctx).unwrap().unwrap());
        assert_eq!(vp.dependencies()[0], vec![None, Some(BTreeSet::from([2]))]);
        assert!(vp.collect_new_inactive().is_empty());
        let subject = BinaryRule::new("NP", "S[dcl]\\NP", "S[dcl]", 1).unwrap();
        let s = DerivationNode::combine(&subject, &john, &vp, &mut ctx).unwrap().unwrap();
        assert_eq!(
            s.dependencies()[1],
            vec![Some(BTreeSet::from([0])), Some(BTreeSet::from([2]))]
        );
        assert_eq!(s.collect_new_inactive(), BTreeSet::from([1]));
        assert_eq!(s.head_terminal().word, "saw");
        assert_eq!(ctx.heads(s.category()), BTreeSet::from([1]));
    }

    #[test]
    fn test_combine_rejects_gaps() {
        let mut ctx = BuildContext::new();
        let a = leaf("a", "0 N{_}", 0, &mut ctx);
        let b = leaf("b", "0 N{_}", 2, &mut ctx);
        let rule = BinaryRule::new("N", "N", "N", 1).unwrap();
        assert_eq!(
            DerivationNode::combine(&rule, &a, &b, &mut ctx).unwrap_err(),
            DerivationError::NotAdjacent {
                left_end: 0,
                right_start: 2
            }
        );
    }

    #[test]
    fn test_failed_rule_yields_none() {
        let mut ctx = BuildContext::new();
        let a = leaf("a", "0 NP{_}", 0, &mut ctx);
        let b = leaf("b", "0 PP{_}", 1, &mut ctx);
        let rule = BinaryRule::new("S/NP", "NP", "S", 0).unwrap();
        assert!(DerivationNode::combine(&rule, &a, &b, &mut ctx).unwrap().is_none());
    }

    #[test]
    fn test_unary_carries_slots_forward() {
        let mut ctx = BuildContext::new();
        let cat = leaf("cat", "0 N{_}", 0, &mut ctx);
        let rule = UnaryRule::new("N", "NP").unwrap();
        let node = DerivationNode::unary(&rule, &cat, &mut ctx).unwrap();
        assert_eq!(node.category().to_string(), "NP");
        assert_eq!(node.children().len(), 1);
        assert_eq!(ctx.heads(node.category()), BTreeSet::from([0]));
        assert_eq!(node.newly_filled().map(BTreeMap::len), Some(0));
    }

    #[test]
    fn test_terminal_navigation() {
        let mut ctx = BuildContext::new();
        let the = leaf("the", "1 (NP[nb]{Y}/N{Y}<1>){_}", 0, &mut ctx);
        let cat = leaf("cat", "0 N{_}", 1, &mut ctx);
        let rule = BinaryRule::new("NP[nb]/N", "N", "NP[nb]", 0).unwrap();
        let node = DerivationNode::combine(&rule, &the, &cat, &mut ctx).unwrap().unwrap();
        assert_eq!(node.leftmost_terminal().word, "the");
        assert_eq!(node.rightmost_terminal().word, "cat");
        assert_eq!(node.terminal_at(1).word, "cat");
        let words: Vec<&str> = node.terminals().iter().map(|t| t.word.as_str()).collect();
        assert_eq!(words, vec!["the", "cat"]);
        assert_eq!(node.node_count(), 3);
    }

    #[test]
    #[should_panic]
    fn test_terminal_outside_span_panics() {
        let mut ctx = BuildContext::new();
        let cat = leaf("cat", "0 N{_}", 1, &mut ctx);
        cat.terminal_at(0);
    }

    #[test]
    fn test_tree_text() {
        let mut ctx = BuildContext::new();
        let the = leaf("the", "1 (NP[nb]{Y}/N{Y}<1>){_}", 0, &mut ctx);
        let cat = leaf("cat", "0 N{_}", 1, &mut ctx);
        let rule = BinaryRule::new("NP[nb]/N", "N", "NP[nb]", 0).unwrap();
        let node = DerivationNode::combine(&rule, &the, &cat, &mut ctx)
            .unwrap()
            .unwrap()
            .with_extra(Some("src=1".to_string()));
        assert_eq!(
            node.to_string(),
            "(<T NP[nb] 0 2 src=1> (<L NP[nb]/N X X the NP[nb]_1/N_1>) (<L N X X cat N>) )"
        );
        assert_eq!(
            node.to_indented_string(),
            "(NP[nb] (NP[nb]/N the)\n        (N cat))"
        );
    }
}
