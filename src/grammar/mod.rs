//! # Grammar Store
//!
//! Binary and unary rules keyed by the plain text of their operand
//! categories. A key maps to every distinct rule observed for it, ordered
//! by descending frequency; ties fall back to rule-type precedence with
//! coordination last.
//!
//! The textual dump has one section per arity, each terminated by a blank
//! line:
//!
//! ```text
//! 12 # 1 # 0 # S[dcl]\NP --> (S[dcl]\NP)/NP NP
//!
//! 40 # 1 # NP --> N
//! ```

mod lexicon;

pub use lexicon::{CategoryInventory, LexicalResources, Lexicon, MarkupTable};

use crate::category::{BuildContext, Category, CategoryError, ClassId};
use crate::combinator::{BinaryRuleType, UnaryRuleType};
use crate::derivation::DerivationNode;
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("malformed rule at line {line} ({reason}): {text}")]
    MalformedRule {
        line: usize,
        text: String,
        reason: String,
    },
    #[error("unknown rule type ordinal {0}")]
    UnknownRuleType(usize),
    #[error("category error: {0}")]
    Category(#[from] CategoryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GrammarResult<T> = Result<T, GrammarError>;

/// Result of applying a rule: the new category and the child-to-parent
/// class links established while wiring it.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub category: Category,
    pub links: Vec<(ClassId, ClassId)>,
}

fn canonical(text: &str) -> GrammarResult<(String, Category)> {
    let category = Category::from_plain(text)?;
    Ok((category.to_string(), category))
}

#[derive(Debug, Clone)]
pub struct BinaryRule {
    left: String,
    right: String,
    result: String,
    result_category: Category,
    rule_type: BinaryRuleType,
    head_child: usize,
    frequency: u64,
}

impl BinaryRule {
    /// Builds a rule from category text and classifies it.
    pub fn new(left: &str, right: &str, result: &str, head_child: usize) -> GrammarResult<Self> {
        let (left, left_category) = canonical(left)?;
        let (right, right_category) = canonical(right)?;
        let (result, result_category) = canonical(result)?;
        let rule_type = BinaryRuleType::classify(&left_category, &right_category, &result_category, None);
        Ok(Self {
            left,
            right,
            result,
            result_category,
            rule_type,
            head_child,
            frequency: 1,
        })
    }

    pub fn from_categories(left: &Category, right: &Category, result: &Category, head_child: usize) -> Self {
        let result_category = result.unwired();
        Self {
            left: left.to_string(),
            right: right.to_string(),
            result: result_category.to_string(),
            rule_type: BinaryRuleType::classify(left, right, &result_category, None),
            result_category,
            head_child,
            frequency: 1,
        }
    }

    pub fn with_frequency(mut self, frequency: u64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Reads `freq # typeOrdinal # headChild # result --> left right`.
    pub fn parse_line(line: usize, text: &str) -> GrammarResult<Self> {
        let malformed = |reason: &str| GrammarError::MalformedRule {
            line,
            text: text.to_string(),
            reason: reason.to_string(),
        };
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != 10 {
            return Err(malformed("expected 10 fields"));
        }
        if tokens[1] != "#" || tokens[3] != "#" || tokens[5] != "#" || tokens[7] != "-->" {
            return Err(malformed("misplaced separator"));
        }
        let frequency = tokens[0].parse::<u64>().map_err(|_| malformed("bad frequency"))?;
        let ordinal = tokens[2].parse::<usize>().map_err(|_| malformed("bad rule type"))?;
        let rule_type = BinaryRuleType::from_ordinal(ordinal).ok_or(GrammarError::UnknownRuleType(ordinal))?;
        let head_child = match tokens[4] {
            "0" => 0,
            "1" => 1,
            _ => return Err(malformed("head child must be 0 or 1")),
        };
        let (result, result_category) = canonical(tokens[6])?;
        let (left, _) = canonical(tokens[8])?;
        let (right, _) = canonical(tokens[9])?;
        Ok(Self {
            left,
            right,
            result,
            result_category,
            rule_type,
            head_child,
            frequency,
        })
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn result_category(&self) -> &Category {
        &self.result_category
    }

    pub fn rule_type(&self) -> BinaryRuleType {
        self.rule_type
    }

    pub fn head_child(&self) -> usize {
        self.head_child
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn key(&self) -> String {
        binary_key(&self.left, &self.right)
    }

    /// Verifies the declared result against the operands and wires it.
    pub fn perform(&self, left: &Category, right: &Category, ctx: &mut BuildContext) -> Option<Reduction> {
        let arity_cap = ctx.arity_cap();
        let mut category = self.result_category.clone();
        let mut wiring = ctx.wiring();
        if !self
            .rule_type
            .verify(left, right, &mut category, Some(&mut wiring), arity_cap)
        {
            return None;
        }
        wiring.normalize(&mut category);
        let links = wiring.links();
        Some(Reduction { category, links })
    }

    fn same_rule(&self, result: &str, head_child: usize) -> bool {
        self.result == result && self.head_child == head_child
    }
}

impl PartialEq for BinaryRule {
    fn eq(&self, other: &Self) -> bool {
        self.rule_type == other.rule_type
            && self.left == other.left
            && self.right == other.right
            && self.result == other.result
            && self.head_child == other.head_child
    }
}

impl Eq for BinaryRule {}

impl fmt::Display for BinaryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} # {} # {} # {} --> {} {}",
            self.frequency,
            self.rule_type.ordinal(),
            self.head_child,
            self.result,
            self.left,
            self.right
        )
    }
}

#[derive(Debug, Clone)]
pub struct UnaryRule {
    child: String,
    result: String,
    result_category: Category,
    rule_type: UnaryRuleType,
    frequency: u64,
}

impl UnaryRule {
    pub fn new(child: &str, result: &str) -> GrammarResult<Self> {
        let (child, child_category) = canonical(child)?;
        let (result, result_category) = canonical(result)?;
        let rule_type = UnaryRuleType::classify(&child_category, &result_category);
        Ok(Self {
            child,
            result,
            result_category,
            rule_type,
            frequency: 1,
        })
    }

    pub fn with_frequency(mut self, frequency: u64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Reads `freq # typeOrdinal # result --> child`.
    pub fn parse_line(line: usize, text: &str) -> GrammarResult<Self> {
        let malformed = |reason: &str| GrammarError::MalformedRule {
            line,
            text: text.to_string(),
            reason: reason.to_string(),
        };
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != 7 {
            return Err(malformed("expected 7 fields"));
        }
        if tokens[1] != "#" || tokens[3] != "#" || tokens[5] != "-->" {
            return Err(malformed("misplaced separator"));
        }
        let frequency = tokens[0].parse::<u64>().map_err(|_| malformed("bad frequency"))?;
        let ordinal = tokens[2].parse::<usize>().map_err(|_| malformed("bad rule type"))?;
        let rule_type = UnaryRuleType::from_ordinal(ordinal).ok_or(GrammarError::UnknownRuleType(ordinal))?;
        let (result, result_category) = canonical(tokens[4])?;
        let (child, _) = canonical(tokens[6])?;
        Ok(Self {
            child,
            result,
            result_category,
            rule_type,
            frequency,
        })
    }

    pub fn child(&self) -> &str {
        &self.child
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn result_category(&self) -> &Category {
        &self.result_category
    }

    pub fn rule_type(&self) -> UnaryRuleType {
        self.rule_type
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn perform(&self, child: &Category, ctx: &mut BuildContext) -> Option<Reduction> {
        let mut category = self.result_category.clone();
        let mut wiring = ctx.wiring();
        if !self.rule_type.verify(child, &mut category, Some(&mut wiring)) {
            return None;
        }
        wiring.normalize(&mut category);
        let links = wiring.links();
        Some(Reduction { category, links })
    }
}

impl PartialEq for UnaryRule {
    fn eq(&self, other: &Self) -> bool {
        self.rule_type == other.rule_type && self.child == other.child && self.result == other.result
    }
}

impl Eq for UnaryRule {}

impl fmt::Display for UnaryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} # {} # {} --> {}",
            self.frequency,
            self.rule_type.ordinal(),
            self.result,
            self.child
        )
    }
}

pub fn binary_key(left: &str, right: &str) -> String {
    format!("{left}+{right}")
}

fn precedence(frequency: u64, ordinal: usize) -> (Reverse<u64>, bool, usize) {
    (Reverse(frequency), ordinal == 0, ordinal)
}

fn binary_order(a: &BinaryRule, b: &BinaryRule) -> Ordering {
    precedence(a.frequency, a.rule_type.ordinal()).cmp(&precedence(b.frequency, b.rule_type.ordinal()))
}

fn unary_order(a: &UnaryRule, b: &UnaryRule) -> Ordering {
    precedence(a.frequency, a.rule_type.ordinal()).cmp(&precedence(b.frequency, b.rule_type.ordinal()))
}

#[derive(Debug, Clone, Default)]
pub struct Grammar {
    binary: HashMap<String, Vec<BinaryRule>>,
    unary: HashMap<String, Vec<UnaryRule>>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_binary(&self, left: &str, right: &str) -> &[BinaryRule] {
        self.binary
            .get(&binary_key(left, right))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn lookup_unary(&self, child: &str) -> &[UnaryRule] {
        self.unary.get(child).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn binary_rule_count(&self) -> usize {
        self.binary.values().map(Vec::len).sum()
    }

    pub fn unary_rule_count(&self) -> usize {
        self.unary.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.binary.is_empty() && self.unary.is_empty()
    }

    /// Adds `frequency` to the rule `(left, right) -> result` headed by
    /// `head_child`, creating it on first sight.
    pub fn incre_seen_count_binary(
        &mut self,
        left: &str,
        right: &str,
        result: &str,
        head_child: usize,
        frequency: u64,
    ) -> GrammarResult<()> {
        let rule = BinaryRule::new(left, right, result, head_child)?.with_frequency(frequency);
        self.add_binary(rule);
        Ok(())
    }

    pub fn incre_seen_count_unary(&mut self, child: &str, result: &str, frequency: u64) -> GrammarResult<()> {
        let rule = UnaryRule::new(child, result)?.with_frequency(frequency);
        self.add_unary(rule);
        Ok(())
    }

    /// Inserts a rule, merging its frequency into an existing entry with the
    /// same result and head child.
    pub fn add_binary(&mut self, rule: BinaryRule) {
        let rules = self.binary.entry(rule.key()).or_default();
        match rules
            .iter_mut()
            .find(|existing| existing.same_rule(&rule.result, rule.head_child))
        {
            Some(existing) => existing.frequency += rule.frequency,
            None => rules.push(rule),
        }
        rules.sort_by(binary_order);
    }

    pub fn add_unary(&mut self, rule: UnaryRule) {
        let rules = self.unary.entry(rule.child.clone()).or_default();
        match rules.iter_mut().find(|existing| existing.result == rule.result) {
            Some(existing) => existing.frequency += rule.frequency,
            None => rules.push(rule),
        }
        rules.sort_by(unary_order);
    }

    /// Counts every rule application of a reference derivation.
    pub fn observe(&mut self, tree: &DerivationNode) -> GrammarResult<()> {
        let children = tree.children();
        match children {
            [left, right] => {
                self.add_binary(BinaryRule::from_categories(
                    left.category(),
                    right.category(),
                    tree.category(),
                    tree.head_child(),
                ));
            }
            [child] => {
                let rule = UnaryRule::new(&child.category().to_string(), &tree.category().to_string())?;
                self.add_unary(rule);
            }
            _ => {}
        }
        for child in children {
            self.observe(child)?;
        }
        Ok(())
    }

    /// Probes every combinator in precedence order and returns a rule for
    /// the first one that constructs a result.
    #[instrument(level = "debug", skip(ctx), fields(left = %left, right = %right))]
    pub fn try_all_rules(left: &Category, right: &Category, ctx: &mut BuildContext) -> Option<BinaryRule> {
        let mut wiring = ctx.wiring();
        let found = BinaryRuleType::iter()
            .filter(|rule_type| *rule_type != BinaryRuleType::Unknown)
            .find_map(|rule_type| {
                rule_type
                    .construct(left, right, &mut wiring)
                    .map(|result| (rule_type, result))
            });
        let (rule_type, result) = found?;
        debug!(%rule_type, result = %result, "open-class reduction");
        Some(BinaryRule::from_categories(left, right, &result, rule_type.head_child()))
    }

    /// Writes the binary section then the unary section, keys sorted.
    pub fn dump<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut keys: Vec<&String> = self.binary.keys().collect();
        keys.sort();
        for key in keys {
            for rule in &self.binary[key] {
                writeln!(writer, "{rule}")?;
            }
        }
        writeln!(writer)?;
        let mut keys: Vec<&String> = self.unary.keys().collect();
        keys.sort();
        for key in keys {
            for rule in &self.unary[key] {
                writeln!(writer, "{rule}")?;
            }
        }
        writeln!(writer)?;
        Ok(())
    }

    /// Reads a dump; stops at the first malformed line.
    #[instrument(level = "debug", skip(reader))]
    pub fn load<R: BufRead>(reader: R) -> GrammarResult<Self> {
        let mut grammar = Grammar::new();
        let mut in_unary = false;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() {
                if in_unary {
                    break;
                }
                in_unary = true;
                continue;
            }
            let number = index + 1;
            let parsed = if in_unary {
                UnaryRule::parse_line(number, text).map(|rule| grammar.add_unary(rule))
            } else {
                BinaryRule::parse_line(number, text).map(|rule| grammar.add_binary(rule))
            };
            if let Err(e) = parsed {
                warn!(line = number, error = %e, "malformed grammar line");
                return Err(e);
            }
        }
        debug!(
            binary = grammar.binary_rule_count(),
            unary = grammar.unary_rule_count(),
            "grammar loaded"
        );
        Ok(grammar)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> GrammarResult<Self> {
        let file = File::open(path)?;
        Self::load(BufReader::new(file))
    }
}
