//! Readers for the plain, predicate-argument and marked-up notations.
//!
//! All three notations are first read into a [`Draft`] tree by nom
//! combinators and then materialized into a [`Category`], assigning coindex
//! classes from the chosen arena.

use super::{Category, CategoryError, CategoryResult, ClassId, CoindexArena, Direction, LexicalCategory};
use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{all_consuming, map, map_opt, map_res, opt},
    error::{context, ErrorKind, ParseError, VerboseError},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};
use lazy_static::lazy_static;
use std::collections::HashMap;

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

const CONJ_SUFFIX: &str = "[conj]";

lazy_static! {
    /// Head wiring for complex categories synthesized without a lexical
    /// source, keyed by their feature-free plain text.
    static ref HEAD_PATTERNS: HashMap<&'static str, &'static str> = {
        let mut patterns = HashMap::new();
        patterns.insert("(S\\NP)\\(S\\NP)", "(S_1\\NP_2)_1\\(S_1\\NP_2)_1");
        patterns.insert("S\\NP", "S\\NP_1");
        patterns
    };
}

pub(crate) fn lookup_pattern(key: &str) -> Option<&'static str> {
    HEAD_PATTERNS.get(key).copied()
}

#[derive(Debug, Clone)]
enum DraftShape {
    Atom {
        symbol: String,
        feature: Option<String>,
    },
    Functor {
        dir: Direction,
        result: Box<Draft>,
        argument: Box<Draft>,
    },
}

#[derive(Debug, Clone)]
struct Draft {
    shape: DraftShape,
    index: Option<u32>,
    marker: Option<(char, bool)>,
    slot: Option<usize>,
    conj: bool,
}

impl Draft {
    fn atom(symbol: &str) -> Self {
        Self {
            shape: DraftShape::Atom {
                symbol: symbol.to_string(),
                feature: None,
            },
            index: None,
            marker: None,
            slot: None,
            conj: false,
        }
    }

    fn functor(result: Draft, dir: Direction, argument: Draft) -> Self {
        Self {
            shape: DraftShape::Functor {
                dir,
                result: Box::new(result),
                argument: Box::new(argument),
            },
            index: None,
            marker: None,
            slot: None,
            conj: false,
        }
    }

    /// Applies `[...]` suffixes; only atoms take a feature.
    fn with_features(mut self, features: Vec<&str>) -> Option<Self> {
        for feature in features {
            if feature == "conj" {
                self.conj = true;
                continue;
            }
            match &mut self.shape {
                DraftShape::Atom { feature: slot, .. } if slot.is_none() => {
                    *slot = Some(feature.to_string())
                }
                _ => return None,
            }
        }
        Some(self)
    }
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !"()[]{}<>/\\_".contains(c)
}

fn symbol(input: &str) -> ParserResult<&str> {
    context("symbol", take_while1(is_symbol_char))(input)
}

fn feature(input: &str) -> ParserResult<&str> {
    context(
        "feature",
        delimited(
            char('['),
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            char(']'),
        ),
    )(input)
}

fn slash(input: &str) -> ParserResult<Direction> {
    context("slash", map_opt(one_of("/\\"), Direction::from_slash))(input)
}

fn coindex(input: &str) -> ParserResult<u32> {
    context(
        "coindex",
        preceded(char('_'), map_res(digit1, |s: &str| s.parse::<u32>())),
    )(input)
}

fn featured(input: &str, draft: Draft) -> ParserResult<Draft> {
    let (rest, features) = many0(feature)(input)?;
    match draft.with_features(features) {
        Some(draft) => Ok((rest, draft)),
        None => Err(nom::Err::Failure(VerboseError::from_error_kind(
            input,
            ErrorKind::Verify,
        ))),
    }
}

fn term(input: &str) -> ParserResult<Draft> {
    let (input, draft) = context(
        "term",
        alt((
            delimited(one_of("({"), category, one_of(")}")),
            map(symbol, Draft::atom),
        )),
    )(input)?;
    let (input, mut draft) = featured(input, draft)?;
    let (input, index) = opt(coindex)(input)?;
    if index.is_some() {
        draft.index = index;
    }
    Ok((input, draft))
}

fn category(input: &str) -> ParserResult<Draft> {
    let (input, head) = term(input)?;
    let (input, tail) = opt(pair(slash, category))(input)?;
    Ok(match tail {
        Some((dir, argument)) => (input, Draft::functor(head, dir, argument)),
        None => (input, head),
    })
}

fn marker(input: &str) -> ParserResult<(char, bool)> {
    context(
        "marker",
        delimited(
            char('{'),
            pair(
                satisfy(|c| c == '_' || c.is_ascii_uppercase()),
                map(opt(char('*')), |star| star.is_some()),
            ),
            char('}'),
        ),
    )(input)
}

fn slot(input: &str) -> ParserResult<usize> {
    context(
        "slot",
        delimited(
            char('<'),
            map_res(digit1, |s: &str| s.parse::<usize>()),
            char('>'),
        ),
    )(input)
}

fn marked_term(input: &str) -> ParserResult<Draft> {
    let (input, draft) = context(
        "marked term",
        alt((
            delimited(char('('), marked_category, char(')')),
            map(symbol, Draft::atom),
        )),
    )(input)?;
    let (input, mut draft) = featured(input, draft)?;
    let (input, marker) = marker(input)?;
    let (input, slot) = opt(slot)(input)?;
    draft.marker = Some(marker);
    draft.slot = slot;
    Ok((input, draft))
}

fn marked_category(input: &str) -> ParserResult<Draft> {
    let (input, head) = marked_term(input)?;
    let (input, tail) = opt(pair(slash, marked_category))(input)?;
    Ok(match tail {
        Some((dir, argument)) => (input, Draft::functor(head, dir, argument)),
        None => (input, head),
    })
}

fn check_balance(text: &str) -> CategoryResult<()> {
    let mut round = 0i32;
    let mut square = 0i32;
    for c in text.chars() {
        match c {
            '(' | '{' => round += 1,
            ')' | '}' => round -= 1,
            '[' => square += 1,
            ']' => square -= 1,
            _ => {}
        }
        if round < 0 || square < 0 {
            return Err(CategoryError::UnbalancedBrackets(text.to_string()));
        }
    }
    if round != 0 || square != 0 {
        return Err(CategoryError::UnbalancedBrackets(text.to_string()));
    }
    Ok(())
}

/// Trims, drops `:B`/`:U` markers and splits off a trailing `[conj]`.
fn prepare(text: &str) -> CategoryResult<(String, bool)> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CategoryError::EmptyCategory);
    }
    let cleaned = trimmed.replace(":B", "").replace(":U", "");
    check_balance(&cleaned)?;
    match cleaned.strip_suffix(CONJ_SUFFIX) {
        Some(body) if !body.is_empty() => Ok((body.to_string(), true)),
        _ => Ok((cleaned, false)),
    }
}

fn read<'a, T>(
    text: &str,
    input: &'a str,
    parser: impl FnMut(&'a str) -> ParserResult<'a, T>,
) -> CategoryResult<T> {
    match all_consuming(parser)(input) {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(CategoryError::malformed(
            text,
            nom::error::convert_error(input, e),
        )),
        Err(nom::Err::Incomplete(needed)) => Err(CategoryError::malformed(
            text,
            format!("incomplete input, {needed:?}"),
        )),
    }
}

fn materialize(draft: &Draft, assign: &mut impl FnMut(&Draft) -> Option<ClassId>) -> Category {
    let mut category = match &draft.shape {
        DraftShape::Atom { symbol, feature } => Category::atomic(symbol.clone(), feature.clone()),
        DraftShape::Functor {
            dir,
            result,
            argument,
        } => {
            let class = assign(draft);
            let result = materialize(result, assign);
            let argument = materialize(argument, assign);
            let mut category = Category::functor(result, *dir, argument);
            category.set_class(class);
            category.set_conj(draft.conj);
            category.set_long_range(draft.marker.map(|(_, star)| star).unwrap_or(false));
            return category;
        }
    };
    category.set_class(assign(draft));
    category.set_conj(draft.conj);
    category.set_long_range(draft.marker.map(|(_, star)| star).unwrap_or(false));
    category
}

#[tracing::instrument(level = "trace")]
pub(crate) fn parse_plain(text: &str) -> CategoryResult<Category> {
    let (body, conj) = prepare(text)?;
    let draft = read(text, &body, category)?;
    let mut category = materialize(&draft, &mut |_| None);
    if conj {
        category.set_conj(true);
    }
    Ok(category)
}

#[tracing::instrument(level = "trace", skip(arena))]
pub(crate) fn parse_pred_arg(text: &str, arena: &mut CoindexArena) -> CategoryResult<LexicalCategory> {
    let (body, conj) = prepare(text)?;
    let draft = read(text, &body, category)?;
    let mut classes: HashMap<u32, ClassId> = HashMap::new();
    let mut category = materialize(&draft, &mut |node| {
        let index = node.index.unwrap_or(0);
        Some(*classes.entry(index).or_insert_with(|| arena.fresh()))
    });
    if conj {
        category.set_conj(true);
    }
    let slots = category.spine_argument_positions().into_iter().map(Some).collect();
    Ok(LexicalCategory { category, slots })
}

#[tracing::instrument(level = "trace", skip(arena))]
pub(crate) fn parse_markedup(text: &str, arena: &mut CoindexArena) -> CategoryResult<LexicalCategory> {
    let uncommented = text.split('#').next().unwrap_or_default().trim();
    if uncommented.is_empty() {
        return Err(CategoryError::EmptyCategory);
    }
    let cleaned = uncommented.replace("[X]", "");
    let (count, body) = cleaned
        .split_once(char::is_whitespace)
        .ok_or_else(|| CategoryError::malformed(text, "missing slot count"))?;
    let count: usize = count
        .parse()
        .map_err(|_| CategoryError::malformed(text, format!("bad slot count '{count}'")))?;
    let body = body.trim();
    check_balance(body)?;
    let draft = read(text, body, marked_category)?;

    let mut letters: HashMap<char, ClassId> = HashMap::new();
    let mut marked_slots: Vec<(usize, usize)> = Vec::new();
    let mut position = 0;
    let category = materialize(&draft, &mut |node| {
        if let Some(slot) = node.slot {
            marked_slots.push((slot, position));
        }
        position += 1;
        node.marker
            .map(|(letter, _)| *letters.entry(letter).or_insert_with(|| arena.fresh()))
    });

    let mut slots: Vec<Option<usize>> = vec![None; count];
    for (slot, position) in marked_slots {
        if slot == 0 || slot > count {
            return Err(CategoryError::SlotOutOfRange { slot, count });
        }
        slots[slot - 1] = Some(position);
    }
    for (i, _) in slots.iter().enumerate().filter(|(_, position)| position.is_none()) {
        tracing::warn!("slot <{}> of '{}' is not marked", i + 1, text.trim());
    }
    Ok(LexicalCategory { category, slots })
}

/// Coindexes `target` after a predicate-argument pattern of the same shape.
pub(crate) fn apply_pattern(
    pattern: &str,
    target: &mut Category,
    arena: &mut CoindexArena,
) -> CategoryResult<()> {
    let (body, _) = prepare(pattern)?;
    let draft = read(pattern, &body, category)?;
    let mut classes: HashMap<u32, ClassId> = HashMap::new();
    wire_pattern(&draft, target, &mut classes, arena)
        .then_some(())
        .ok_or_else(|| CategoryError::malformed(pattern, format!("does not fit '{target}'")))
}

fn wire_pattern(
    draft: &Draft,
    target: &mut Category,
    classes: &mut HashMap<u32, ClassId>,
    arena: &mut CoindexArena,
) -> bool {
    let index = draft.index.unwrap_or(0);
    match classes.get(&index) {
        Some(class) => {
            let merged = match target.class() {
                Some(own) => arena.union(*class, own),
                None => *class,
            };
            target.set_class(Some(merged));
            classes.insert(index, merged);
        }
        None => {
            let class = match target.class() {
                Some(class) => class,
                None => arena.fresh(),
            };
            target.set_class(Some(class));
            classes.insert(index, class);
        }
    }
    match (&draft.shape, target.parts_mut()) {
        (DraftShape::Atom { .. }, None) => true,
        (
            DraftShape::Functor {
                result, argument, ..
            },
            Some((target_result, target_argument)),
        ) => {
            wire_pattern(argument, target_argument, classes, arena)
                && wire_pattern(result, target_result, classes, arena)
        }
        _ => false,
    }
}
