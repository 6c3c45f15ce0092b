//! Reader for bracketed derivation text:
//!
//! ```text
//! (<T S[dcl] 1 2> (<L NP NNP NNP John NP>) (<L S[dcl]\NP VBD VBD left S[dcl]\NP_1>) )
//! ```
//!
//! Labels are delimited by `<` and `>`, so brackets inside a label belong
//! to the category text.

use super::{DerivationError, DerivationNode, DerivationResult, Terminal};
use crate::category::{BuildContext, Category};
use crate::grammar::MarkupTable;
use nom::{
    bytes::complete::is_not,
    character::complete::{char, multispace0},
    combinator::{all_consuming, map},
    error::{context, VerboseError},
    multi::many0,
    sequence::{delimited, pair, terminated},
    IResult,
};
use std::sync::Arc;
use tracing::{instrument, trace};

type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Debug)]
struct Block<'a> {
    label: &'a str,
    children: Vec<Block<'a>>,
}

fn label(input: &str) -> ParserResult<&str> {
    context("label", delimited(char('<'), is_not(">"), char('>')))(input)
}

fn block(input: &str) -> ParserResult<Block<'_>> {
    context(
        "node",
        map(
            delimited(
                pair(char('('), multispace0),
                pair(terminated(label, multispace0), many0(terminated(block, multispace0))),
                char(')'),
            ),
            |(label, children)| Block { label, children },
        ),
    )(input)
}

/// A tree read from a treebank with the source line preceding it, if any.
#[derive(Debug, Clone)]
pub struct TreebankEntry {
    pub source: Option<String>,
    pub tree: DerivationNode,
}

/// Reads one derivation. Terminal categories come from `markups` when it
/// interprets the plain category, otherwise from the predicate-argument
/// field.
#[instrument(level = "debug", skip(markups, ctx))]
pub fn parse_tree(text: &str, markups: Option<&MarkupTable>, ctx: &mut BuildContext) -> DerivationResult<DerivationNode> {
    let trimmed = text.trim();
    let root = match all_consuming(block)(trimmed) {
        Ok((_, root)) => root,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(DerivationError::malformed(nom::error::convert_error(trimmed, e)));
        }
        Err(nom::Err::Incomplete(_)) => return Err(DerivationError::malformed("incomplete tree")),
    };
    let mut next_word = 0;
    build(&root, &mut next_word, markups, ctx)
}

fn build(
    block: &Block<'_>,
    next_word: &mut usize,
    markups: Option<&MarkupTable>,
    ctx: &mut BuildContext,
) -> DerivationResult<DerivationNode> {
    let fields: Vec<&str> = block.label.split_whitespace().collect();
    match fields.first().copied() {
        Some("L") => {
            if !block.children.is_empty() {
                return Err(DerivationError::malformed(format!("leaf <{}> has children", block.label)));
            }
            build_terminal(&fields, next_word, markups, ctx)
        }
        Some("T") => {
            let [_, category, head, arity, rest @ ..] = fields.as_slice() else {
                return Err(DerivationError::malformed(format!("short label <{}>", block.label)));
            };
            let category = Category::from_plain(category)?;
            let head: usize = head
                .parse()
                .map_err(|_| DerivationError::malformed(format!("bad head index in <{}>", block.label)))?;
            let arity: usize = arity
                .parse()
                .map_err(|_| DerivationError::malformed(format!("bad arity in <{}>", block.label)))?;
            if arity != block.children.len() {
                return Err(DerivationError::malformed(format!(
                    "<{}> declares {arity} children, found {}",
                    block.label,
                    block.children.len()
                )));
            }
            let mut children = Vec::with_capacity(arity);
            for child in &block.children {
                let node = build(child, next_word, markups, ctx)?;
                children.push(Arc::new(collapse(node)));
            }
            let node = DerivationNode::from_parts(category, head, children)?;
            Ok(node.with_extra(rest.first().map(|extra| extra.to_string())))
        }
        _ => Err(DerivationError::malformed(format!("unknown node label <{}>", block.label))),
    }
}

fn build_terminal(
    fields: &[&str],
    next_word: &mut usize,
    markups: Option<&MarkupTable>,
    ctx: &mut BuildContext,
) -> DerivationResult<DerivationNode> {
    let [_, category, mod_pos, orig_pos, word, pred_arg, rest @ ..] = fields else {
        return Err(DerivationError::malformed(format!("short leaf label <{}>", fields.join(" "))));
    };
    let index = *next_word;
    *next_word += 1;
    let plain = Category::from_plain(category)?;
    let lexical = match markups.and_then(|table| table.get(&plain)) {
        Some(markup) => ctx.parse_markedup(markup)?,
        None => ctx.parse_pred_arg(pred_arg)?,
    };
    trace!(word, index, "leaf");
    let terminal = Terminal::build(word, mod_pos, orig_pos, pred_arg, lexical, index, ctx);
    Ok(DerivationNode::Terminal(terminal).with_extra(rest.first().map(|extra| extra.to_string())))
}

/// Drops a unary node rewriting a category to itself.
fn collapse(node: DerivationNode) -> DerivationNode {
    match node.children() {
        [only] if only.category().to_string() == node.category().to_string() => (**only).clone(),
        _ => node,
    }
}

/// Reads a treebank: one tree per line, each optionally preceded by a
/// source line that does not start with `(`.
pub fn read_treebank(
    text: &str,
    markups: Option<&MarkupTable>,
    ctx: &mut BuildContext,
) -> DerivationResult<Vec<TreebankEntry>> {
    let mut entries = Vec::new();
    let mut source = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('(') {
            source = Some(line.to_string());
            continue;
        }
        let tree = parse_tree(line, markups, ctx)?;
        entries.push(TreebankEntry {
            source: source.take(),
            tree,
        });
    }
    Ok(entries)
}
