//! Transition sequences that rebuild a reference derivation.

use super::state::{Action, Move, ParserState};
use super::{ParseError, ParseOutcome, ParseResult, ParseStatus};
use crate::category::BuildContext;
use crate::derivation::DerivationNode;
use crate::grammar::{BinaryRule, UnaryRule};
use crate::sentence::Sentence;
use tracing::{debug, instrument};

/// Actions in the order a shift-reduce parser takes them: leaves shift
/// their markedup category, unary nodes follow their child and binary
/// nodes follow both children.
pub fn action_sequence(tree: &DerivationNode) -> ParseResult<Vec<Action>> {
    let mut actions = Vec::with_capacity(tree.node_count());
    collect_actions(tree, &mut actions)?;
    Ok(actions)
}

fn collect_actions(node: &DerivationNode, actions: &mut Vec<Action>) -> ParseResult<()> {
    match node {
        DerivationNode::Terminal(terminal) => {
            let markup = terminal
                .to_markedup()
                .map_err(crate::derivation::DerivationError::from)?;
            actions.push(Action::Shift(markup));
        }
        DerivationNode::Internal(_) => {
            for child in node.children() {
                collect_actions(child, actions)?;
            }
            match node.children() {
                [child] => {
                    let rule = UnaryRule::new(&child.category().to_string(), &node.category().to_string())?;
                    actions.push(Action::Unary(rule));
                }
                [left, right] => {
                    let rule = BinaryRule::from_categories(
                        left.category(),
                        right.category(),
                        node.category(),
                        node.head_child(),
                    );
                    actions.push(Action::Reduce(rule));
                }
                _ => return Err(ParseError::NoGoldDerivation),
            }
        }
    }
    Ok(())
}

/// Groups the action sequence into moves, attaching every unary action to
/// the shift or reduce before it. Fails on a unary rewrite of a unary node,
/// which no single move can express.
pub fn gold_moves(tree: &DerivationNode) -> ParseResult<Vec<Move>> {
    let mut moves: Vec<Move> = Vec::new();
    for action in action_sequence(tree)? {
        match action {
            Action::Unary(rule) => match moves.last_mut() {
                Some(last) if last.unary.is_none() => last.unary = Some(rule),
                _ => return Err(ParseError::NoGoldDerivation),
            },
            action => moves.push(Move::new(action)),
        }
    }
    Ok(moves)
}

/// Replays the oracle sequence of `tree` from an empty configuration. The
/// outcome carries the dependencies the reference derivation implies.
#[instrument(level = "debug", skip(tree))]
pub fn gold_parse(tree: &DerivationNode) -> ParseResult<ParseOutcome> {
    let sentence = Sentence::from_derivation(tree);
    let mut ctx = BuildContext::new();
    let actions = action_sequence(tree)?;
    let mut state = ParserState::new();
    for action in &actions {
        state = match state.apply(action, &sentence, &mut ctx)? {
            Some(next) => next,
            None => {
                debug!(action = %action, "reference derivation cannot be replayed");
                return Err(ParseError::NoGoldDerivation);
            }
        };
    }
    let mut outcome = ParseOutcome::from_state(ParseStatus::Success, &state);
    outcome.steps = actions.len();
    Ok(outcome)
}
