//! # CCG Categories
//!
//! A [`Category`] is either an atomic symbol with an optional feature
//! (`NP`, `S[dcl]`) or a functor `X/Y`, `X\Y` taking an argument `Y` and
//! yielding a result `X`. Every occurrence may carry a coindex class id
//! (see [`coindex`]) linking it to the semantic head it shares with other
//! occurrences.
//!
//! ## Sharing
//!
//! Sub-categories are held behind [`Arc`], so results built by combinators
//! share unchanged subtrees with their inputs. Mutation is only performed on
//! freshly built categories through copy-on-write (`Arc::make_mut`); a
//! category reachable from a derivation node is never modified.
//!
//! ## Notations
//!
//! Three textual notations are read and written:
//!
//! - plain: `(S[dcl]\NP)/NP`, optionally suffixed by `[conj]`
//! - predicate-argument: `(S[dcl]\NP_1)/NP_2`, with `_k` coindex suffixes
//! - marked-up: `2 ((S[dcl]{_}\NP{Y}<1>){_}/NP{Z}<2>){_}`, with class
//!   letters, long-range markers `*` and argument slot numbers `<k>`
//!
//! ## Pre-order positions
//!
//! Argument slots of a lexical category are addressed by the pre-order
//! position of the slot's node: the node itself, then its result subtree,
//! then its argument subtree.

mod coindex;
mod error;
mod notation;
mod unify;

pub use coindex::{ClassId, CoindexArena};
pub use error::{CategoryError, CategoryResult};
pub use unify::{unifiable, unify, Wiring};

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use strum::{EnumIter, IntoEnumIterator};

lazy_static! {
    static ref PUNCTUATION: Regex = Regex::new(r"^[.,:;'`?!()]+$").unwrap();
}

const CLASS_LETTERS: [char; 26] = [
    '_', 'Y', 'Z', 'W', 'V', 'U', 'T', 'S', 'R', 'Q', 'P', 'O', 'N', 'M', 'L', 'K', 'J', 'I', 'H',
    'G', 'F', 'E', 'D', 'C', 'B', 'A',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, EnumIter)]
pub enum Direction {
    #[strum(serialize = "/")]
    Forward,
    #[strum(serialize = "\\")]
    Backward,
}

impl Direction {
    pub fn from_slash(slash: char) -> Option<Self> {
        Self::iter().find(|dir| dir.slash() == slash)
    }

    pub fn slash(self) -> char {
        match self {
            Direction::Forward => '/',
            Direction::Backward => '\\',
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Atomic {
        symbol: String,
        feature: Option<String>,
    },
    Complex {
        dir: Direction,
        result: Arc<Category>,
        argument: Arc<Category>,
    },
}

/// A CCG category occurrence.
///
/// Equality is structural over symbols, features, slashes and the conjunct
/// flag; coindex classes and long-range markers are ignored.
#[derive(Debug, Clone)]
pub struct Category {
    shape: Shape,
    conj: bool,
    class: Option<ClassId>,
    long_range: bool,
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.conj == other.conj && self.shape == other.shape
    }
}

impl Eq for Category {}

impl Category {
    pub fn atomic<S: Into<String>>(symbol: S, feature: Option<String>) -> Self {
        Self {
            shape: Shape::Atomic {
                symbol: symbol.into(),
                feature,
            },
            conj: false,
            class: None,
            long_range: false,
        }
    }

    pub fn functor(result: Category, dir: Direction, argument: Category) -> Self {
        Self {
            shape: Shape::Complex {
                dir,
                result: Arc::new(result),
                argument: Arc::new(argument),
            },
            conj: false,
            class: None,
            long_range: false,
        }
    }

    /// Parses plain notation; the result carries no coindex classes.
    pub fn from_plain(text: &str) -> CategoryResult<Self> {
        notation::parse_plain(text)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Length of the result spine: 0 for atoms, `1 + result.depth()` otherwise.
    pub fn depth(&self) -> usize {
        match &self.shape {
            Shape::Atomic { .. } => 0,
            Shape::Complex { result, .. } => 1 + result.depth(),
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self.shape, Shape::Atomic { .. })
    }

    pub fn direction(&self) -> Option<Direction> {
        match &self.shape {
            Shape::Complex { dir, .. } => Some(*dir),
            Shape::Atomic { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&Category> {
        match &self.shape {
            Shape::Complex { result, .. } => Some(result),
            Shape::Atomic { .. } => None,
        }
    }

    pub fn argument(&self) -> Option<&Category> {
        match &self.shape {
            Shape::Complex { argument, .. } => Some(argument),
            Shape::Atomic { .. } => None,
        }
    }

    /// Direction, result and argument of a functor.
    pub fn parts(&self) -> Option<(Direction, &Category, &Category)> {
        match &self.shape {
            Shape::Complex {
                dir,
                result,
                argument,
            } => Some((*dir, result, argument)),
            Shape::Atomic { .. } => None,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match &self.shape {
            Shape::Atomic { symbol, .. } => Some(symbol),
            Shape::Complex { .. } => None,
        }
    }

    pub fn feature(&self) -> Option<&str> {
        match &self.shape {
            Shape::Atomic { feature, .. } => feature.as_deref(),
            Shape::Complex { .. } => None,
        }
    }

    pub fn is_conj(&self) -> bool {
        self.conj
    }

    pub fn class(&self) -> Option<ClassId> {
        self.class
    }

    pub fn is_long_range(&self) -> bool {
        self.long_range
    }

    /// True for the atomic `conj` category.
    pub fn is_conjunction_word(&self) -> bool {
        self.symbol() == Some("conj")
    }

    pub fn is_punctuation(&self) -> bool {
        match self.symbol() {
            Some("LRB" | "RRB" | "LQU" | "RQU") => true,
            Some(symbol) => PUNCTUATION.is_match(symbol),
            None => false,
        }
    }

    pub fn node_count(&self) -> usize {
        match &self.shape {
            Shape::Atomic { .. } => 1,
            Shape::Complex {
                result, argument, ..
            } => 1 + result.node_count() + argument.node_count(),
        }
    }

    /// Node at a pre-order position.
    pub fn node_at(&self, position: usize) -> Option<&Category> {
        if position == 0 {
            return Some(self);
        }
        match &self.shape {
            Shape::Atomic { .. } => None,
            Shape::Complex {
                result, argument, ..
            } => {
                let offset = result.node_count();
                if position <= offset {
                    result.node_at(position - 1)
                } else {
                    argument.node_at(position - 1 - offset)
                }
            }
        }
    }

    /// Pre-order positions of the arguments along the result spine,
    /// innermost first.
    pub fn spine_argument_positions(&self) -> Vec<usize> {
        let mut positions = Vec::with_capacity(self.depth());
        let mut base = 0;
        let mut next = self;
        while let Some((_, result, _)) = next.parts() {
            positions.push(base + 1 + result.node_count());
            base += 1;
            next = result;
        }
        positions.reverse();
        positions
    }

    /// Copy with every atomic feature removed.
    pub fn without_features(&self) -> Category {
        let shape = match &self.shape {
            Shape::Atomic { symbol, .. } => Shape::Atomic {
                symbol: symbol.clone(),
                feature: None,
            },
            Shape::Complex {
                dir,
                result,
                argument,
            } => Shape::Complex {
                dir: *dir,
                result: Arc::new(result.without_features()),
                argument: Arc::new(argument.without_features()),
            },
        };
        Category {
            shape,
            conj: self.conj,
            class: None,
            long_range: false,
        }
    }

    /// Copy without classes, long-range markers or conjunct flags.
    pub fn unwired(&self) -> Category {
        let shape = match &self.shape {
            Shape::Atomic { .. } => self.shape.clone(),
            Shape::Complex {
                dir,
                result,
                argument,
            } => Shape::Complex {
                dir: *dir,
                result: Arc::new(result.unwired()),
                argument: Arc::new(argument.unwired()),
            },
        };
        Category {
            shape,
            conj: false,
            class: None,
            long_range: false,
        }
    }

    /// Feature-free copy with `NP` folded into `N`.
    pub fn simplified(&self) -> Category {
        let shape = match &self.shape {
            Shape::Atomic { symbol, .. } => Shape::Atomic {
                symbol: if symbol == "NP" { "N".to_string() } else { symbol.clone() },
                feature: None,
            },
            Shape::Complex {
                dir,
                result,
                argument,
            } => Shape::Complex {
                dir: *dir,
                result: Arc::new(result.simplified()),
                argument: Arc::new(argument.simplified()),
            },
        };
        Category {
            shape,
            conj: false,
            class: None,
            long_range: false,
        }
    }

    /// Renders predicate-argument notation. Classes are numbered in
    /// pre-order of first occurrence, the top class being `0` and left
    /// implicit.
    pub fn to_pred_arg(&self) -> String {
        let mut numbering = HashMap::new();
        if let Some(class) = self.class {
            numbering.insert(class, 0);
        }
        self.number_classes(&mut numbering);
        let mut out = String::new();
        self.write_pred_arg(&numbering, true, &mut out);
        out
    }

    fn number_classes(&self, numbering: &mut HashMap<ClassId, usize>) {
        if let Some(class) = self.class {
            let next = numbering.len();
            numbering.entry(class).or_insert(next);
        }
        if let Some((_, result, argument)) = self.parts() {
            result.number_classes(numbering);
            argument.number_classes(numbering);
        }
    }

    fn write_pred_arg(&self, numbering: &HashMap<ClassId, usize>, top: bool, out: &mut String) {
        let index = self.class.and_then(|c| numbering.get(&c)).copied();
        match &self.shape {
            Shape::Atomic { symbol, feature } => {
                out.push_str(symbol);
                if let Some(feature) = feature {
                    out.push_str(&format!("[{feature}]"));
                }
            }
            Shape::Complex {
                dir,
                result,
                argument,
            } => {
                if !top {
                    out.push('(');
                }
                result.write_pred_arg(numbering, false, out);
                out.push(dir.slash());
                argument.write_pred_arg(numbering, false, out);
                if !top {
                    out.push(')');
                }
            }
        }
        if !top {
            if let Some(index) = index.filter(|i| *i != 0) {
                out.push_str(&format!("_{index}"));
            }
        }
        if self.conj {
            out.push_str("[conj]");
        }
    }

    /// Renders marked-up notation for a lexical category whose argument
    /// slots sit at the given pre-order positions. An unplaced slot counts
    /// toward the total but marks nothing.
    pub fn to_markedup(&self, slots: &[Option<usize>]) -> CategoryResult<String> {
        let mut letters = HashMap::new();
        if let Some(class) = self.class {
            letters.insert(class, CLASS_LETTERS[0]);
        }
        let mut body = String::new();
        let mut position = 0;
        self.write_markedup(slots, &mut letters, &mut position, true, &mut body)?;
        Ok(format!("{} {}", slots.len(), body))
    }

    fn write_markedup(
        &self,
        slots: &[Option<usize>],
        letters: &mut HashMap<ClassId, char>,
        position: &mut usize,
        top: bool,
        out: &mut String,
    ) -> CategoryResult<()> {
        let own = *position;
        *position += 1;
        let letter = match self.class {
            Some(class) => match letters.get(&class) {
                Some(letter) => *letter,
                None => {
                    let letter = *CLASS_LETTERS
                        .get(letters.len())
                        .ok_or_else(|| CategoryError::TooManyClasses(self.to_string()))?;
                    letters.insert(class, letter);
                    letter
                }
            },
            None => CLASS_LETTERS[0],
        };
        match &self.shape {
            Shape::Atomic { symbol, feature } => {
                out.push_str(symbol);
                if let Some(feature) = feature {
                    out.push_str(&format!("[{feature}]"));
                }
            }
            Shape::Complex {
                dir,
                result,
                argument,
            } => {
                out.push('(');
                result.write_markedup(slots, letters, position, false, out)?;
                out.push(dir.slash());
                argument.write_markedup(slots, letters, position, false, out)?;
                out.push(')');
            }
        }
        out.push('{');
        out.push(letter);
        if self.long_range {
            out.push('*');
        }
        out.push('}');
        if !top {
            if let Some(slot) = slots.iter().position(|p| *p == Some(own)) {
                out.push_str(&format!("<{}>", slot + 1));
            }
        }
        Ok(())
    }

    /// Class ids of all nodes, in pre-order.
    pub fn classes(&self) -> Vec<Option<ClassId>> {
        let mut out = Vec::with_capacity(self.node_count());
        self.collect_classes(&mut out);
        out
    }

    fn collect_classes(&self, out: &mut Vec<Option<ClassId>>) {
        out.push(self.class);
        if let Some((_, result, argument)) = self.parts() {
            result.collect_classes(out);
            argument.collect_classes(out);
        }
    }

    /// Head indices of this occurrence's class in `arena`.
    pub fn heads<'a>(&self, arena: &'a CoindexArena) -> Option<&'a BTreeSet<usize>> {
        self.class.map(|class| arena.heads(class))
    }

    pub(crate) fn parts_mut(&mut self) -> Option<(&mut Category, &mut Category)> {
        match &mut self.shape {
            Shape::Complex {
                result, argument, ..
            } => Some((Arc::make_mut(result), Arc::make_mut(argument))),
            Shape::Atomic { .. } => None,
        }
    }

    pub(crate) fn result_mut(&mut self) -> Option<&mut Category> {
        self.parts_mut().map(|(result, _)| result)
    }

    pub(crate) fn argument_mut(&mut self) -> Option<&mut Category> {
        self.parts_mut().map(|(_, argument)| argument)
    }

    pub(crate) fn set_class(&mut self, class: Option<ClassId>) {
        self.class = class;
    }

    pub(crate) fn set_conj(&mut self, conj: bool) {
        self.conj = conj;
    }

    pub(crate) fn set_long_range(&mut self, long_range: bool) {
        self.long_range = long_range;
    }

    pub(crate) fn set_feature(&mut self, value: Option<String>) {
        if let Shape::Atomic { feature, .. } = &mut self.shape {
            *feature = value;
        }
    }

    /// Gives every node without a class a fresh one.
    pub(crate) fn fill_blank_classes(&mut self, arena: &mut CoindexArena) {
        if self.class.is_none() {
            self.class = Some(arena.fresh());
        }
        if let Some((result, argument)) = self.parts_mut() {
            result.fill_blank_classes(arena);
            argument.fill_blank_classes(arena);
        }
    }

    /// Replaces every class id by its current representative.
    pub(crate) fn normalize_classes(&mut self, arena: &mut CoindexArena) {
        if let Some(class) = self.class {
            self.class = Some(arena.find(class));
        }
        if let Some((result, argument)) = self.parts_mut() {
            result.normalize_classes(arena);
            argument.normalize_classes(arena);
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Shape::Atomic { symbol, feature } => {
                write!(f, "{symbol}")?;
                if let Some(feature) = feature {
                    write!(f, "[{feature}]")?;
                }
            }
            Shape::Complex {
                dir,
                result,
                argument,
            } => {
                write_operand(f, result)?;
                write!(f, "{dir}")?;
                write_operand(f, argument)?;
            }
        }
        if self.conj {
            write!(f, "[conj]")?;
        }
        Ok(())
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Category) -> fmt::Result {
    if operand.is_atomic() {
        write!(f, "{operand}")
    } else {
        write!(f, "({operand})")
    }
}

impl FromStr for Category {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_plain(s)
    }
}

/// A lexical category together with the pre-order positions of its
/// argument slots. A slot declared but never marked has no position and is
/// never filled.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalCategory {
    pub category: Category,
    pub slots: Vec<Option<usize>>,
}

impl LexicalCategory {
    pub fn slot_category(&self, slot: usize) -> Option<&Category> {
        self.slots
            .get(slot)
            .copied()
            .flatten()
            .and_then(|position| self.category.node_at(position))
    }

    pub fn to_markedup(&self) -> CategoryResult<String> {
        self.category.to_markedup(&self.slots)
    }
}

/// Owns the coindex arena of one parse, or of one batch of standalone
/// category operations.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    arena: CoindexArena,
    arity_cap: Option<usize>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the extra arity generalized composition may introduce. A cap
    /// of zero is read as no bound.
    pub fn with_arity_cap(arity_cap: Option<usize>) -> Self {
        Self {
            arena: CoindexArena::new(),
            arity_cap: arity_cap.filter(|cap| *cap > 0),
        }
    }

    pub fn arity_cap(&self) -> Option<usize> {
        self.arity_cap
    }

    pub fn arena(&self) -> &CoindexArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut CoindexArena {
        &mut self.arena
    }

    pub fn wiring(&mut self) -> Wiring<'_> {
        Wiring::new(&mut self.arena, self.arity_cap)
    }

    pub fn parse_pred_arg(&mut self, text: &str) -> CategoryResult<LexicalCategory> {
        notation::parse_pred_arg(text, &mut self.arena)
    }

    pub fn parse_markedup(&mut self, text: &str) -> CategoryResult<LexicalCategory> {
        notation::parse_markedup(text, &mut self.arena)
    }

    /// Rewires `category` after the pattern written in predicate-argument
    /// notation: nodes sharing an index in the pattern share a class.
    pub fn coindex_from_pattern(&mut self, pattern: &str, category: &mut Category) -> CategoryResult<()> {
        notation::apply_pattern(pattern, category, &mut self.arena)
    }

    pub fn heads(&self, category: &Category) -> BTreeSet<usize> {
        category
            .heads(&self.arena)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_rendering_brackets_complex_operands() {
        let cat = Category::from_plain("(S[dcl]\\NP)/(S[b]\\NP)").unwrap();
        assert_eq!(cat.to_string(), "(S[dcl]\\NP)/(S[b]\\NP)");
        assert_eq!(cat.depth(), 2);
        assert_eq!(cat.direction(), Some(Direction::Forward));
    }

    #[test]
    fn test_redundant_outer_brackets_are_dropped() {
        let cat = Category::from_plain("((NP\\NP))").unwrap();
        assert_eq!(cat.to_string(), "NP\\NP");
    }

    #[test]
    fn test_conj_suffix_applies_to_whole_category() {
        let cat = Category::from_plain("S[dcl]\\NP[conj]").unwrap();
        assert!(cat.is_conj());
        assert_eq!(cat.argument().unwrap().feature(), None);
        assert_eq!(cat.to_string(), "S[dcl]\\NP[conj]");
    }

    #[test]
    fn test_punctuation_and_conjunction_words() {
        for text in [",", ".", ":", "LRB", "RQU", ";"] {
            assert!(Category::from_plain(text).unwrap().is_punctuation(), "{text}");
        }
        assert!(!Category::from_plain("NP").unwrap().is_punctuation());
        assert!(Category::from_plain("conj").unwrap().is_conjunction_word());
    }

    #[test]
    fn test_spine_argument_positions() {
        let cat = Category::from_plain("((S\\NP)/NP)/PP").unwrap();
        let positions = cat.spine_argument_positions();
        assert_eq!(positions.len(), 3);
        let args: Vec<String> = positions
            .iter()
            .map(|p| cat.node_at(*p).unwrap().to_string())
            .collect();
        assert_eq!(args, vec!["NP", "NP", "PP"]);
    }

    #[test]
    fn test_without_features_and_simplified() {
        let cat = Category::from_plain("(S[dcl]\\NP[nb])[conj]").unwrap();
        assert_eq!(cat.without_features().to_string(), "S\\NP[conj]");
        assert_eq!(cat.unwired().to_string(), "S[dcl]\\NP[nb]");
        assert_eq!(cat.simplified().to_string(), "S\\N");
    }

    #[test]
    fn test_markedup_round_trip() {
        let mut ctx = BuildContext::new();
        let text = "2 ((S[dcl]{_}\\NP{Y}<1>){_}/NP{Z}<2>){_}";
        let lexical = ctx.parse_markedup(text).unwrap();
        assert_eq!(lexical.to_markedup().unwrap(), text);
        assert_eq!(lexical.slot_category(0).unwrap().to_string(), "NP");
    }

    #[test]
    fn test_pred_arg_round_trip() {
        let mut ctx = BuildContext::new();
        let lexical = ctx.parse_pred_arg("(S[dcl]\\NP_1)/(S[b]_2\\NP_1)_2").unwrap();
        assert_eq!(
            lexical.category.to_pred_arg(),
            "(S[dcl]\\NP_1)/(S[b]_2\\NP_1)_2"
        );
        assert_eq!(lexical.slots.len(), 2);
    }
}
