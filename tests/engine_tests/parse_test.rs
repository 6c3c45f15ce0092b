use super::{john_saw_mary, sentence, the_cat, JOHN_SAW_MARY};
use lingua_ccg::category::BuildContext;
use lingua_ccg::combinator::BinaryRuleType;
use lingua_ccg::derivation::parse_tree;
use lingua_ccg::parser::{action_sequence, gold_parse, Action, Chart, ChartPhase};
use lingua_ccg::{BinaryRule, DerivationNode, ParseStatus, ParserConfig};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[test]
fn test_the_cat_step_by_step() {
    let fixture = the_cat();
    let parser = fixture.parser(ParserConfig::default());
    let words = sentence(&[("the", "DT"), ("cat", "N")]);
    let mut chart = Chart::new(&parser, &words);
    assert_eq!(chart.phase(), ChartPhase::Init);

    assert_eq!(chart.step().unwrap(), ChartPhase::Stepping);
    assert_eq!(chart.best().unwrap().stack().len(), 1);
    assert_eq!(chart.step().unwrap(), ChartPhase::Stepping);
    assert_eq!(chart.best().unwrap().stack().len(), 2);
    assert_eq!(chart.step().unwrap(), ChartPhase::Done(ParseStatus::Success));
    assert_eq!(chart.iterations(), 3);

    let best = chart.best().unwrap();
    let actions = best.actions();
    assert_eq!(actions.len(), 3);
    assert!(actions[0].is_shift());
    assert!(actions[1].is_shift());
    match &actions[2] {
        Action::Reduce(rule) => assert_eq!(rule.rule_type(), BinaryRuleType::ForwardApply),
        other => panic!("expected a reduction, got {other}"),
    }

    let outcome = chart.outcome();
    assert!(outcome.is_success());
    assert_eq!(outcome.stack.len(), 1);
    assert_eq!(outcome.stack[0].category().to_string(), "NP[nb]");
    assert_eq!(outcome.dependencies[0], vec![Some(BTreeSet::from([1]))]);
    assert_eq!(outcome.dependencies[1], Vec::new());
}

#[test]
fn test_transitive_sentence_in_two_n_minus_one_steps() {
    let fixture = john_saw_mary();
    let parser = fixture.parser(ParserConfig::default());
    let words = sentence(&[("John", "NNP"), ("saw", "VBD"), ("Mary", "NNP")]);
    let outcome = parser.parse(&words).unwrap();
    assert_eq!(outcome.status, ParseStatus::Success);
    assert_eq!(outcome.steps, 2 * words.len() - 1);
    let tree = outcome.tree().unwrap();
    assert_eq!(tree.category().to_string(), "S[dcl]");
    assert_eq!(tree.head_terminal().word, "saw");
    assert_eq!(
        outcome.dependencies[1],
        vec![Some(BTreeSet::from([0])), Some(BTreeSet::from([2]))]
    );
}

#[test]
fn test_reparse_is_deterministic() {
    let fixture = john_saw_mary();
    let parser = fixture.parser(ParserConfig::default());
    let words = sentence(&[("John", "NNP"), ("saw", "VBD"), ("Mary", "NNP")]);
    let first = parser.parse(&words).unwrap();
    let second = parser.parse(&words).unwrap();
    assert_eq!(first.status, second.status);
    assert_eq!(first.steps, second.steps);
    assert_eq!(first.dependencies, second.dependencies);
    assert_eq!(first.tree().unwrap().to_string(), second.tree().unwrap().to_string());
}

#[test]
fn test_stuck_sentence_fails_without_panicking() {
    let fixture = super::Fixture::new(&[("to", "TO", "0 PP{_}"), ("Mary", "NNP", super::NP)]);
    let parser = fixture.parser(ParserConfig::default());
    let words = sentence(&[("to", "TO"), ("Mary", "NNP")]);
    let outcome = parser.parse(&words).unwrap();
    assert_eq!(outcome.status, ParseStatus::Failure);
    assert!(outcome.tree().is_none());
    assert!(outcome.steps <= 2 * words.len() - 1);
}

#[test]
fn test_unknown_item_reports_position() {
    let fixture = the_cat();
    let parser = fixture.parser(ParserConfig::default());
    let words = sentence(&[("the", "DT"), ("dog", "NN")]);
    let err = parser.parse(&words).unwrap_err();
    assert_eq!(err.to_string(), "Unknown lexical item 'dog' (NN) at position 1");
}

#[test]
fn test_cancelled_parse_stops() {
    let fixture = the_cat();
    let parser = fixture.parser(ParserConfig::default());
    let words = sentence(&[("the", "DT"), ("cat", "N")]);
    let outcome = parser.parse_with_cancel(&words, &AtomicBool::new(true)).unwrap();
    assert_eq!(outcome.status, ParseStatus::Cancelled);
    assert_eq!(outcome.steps, 0);
}

#[test]
fn test_gold_replay_of_hand_built_tree() {
    let mut ctx = BuildContext::new();
    let leaf = |word: &str, markup: &str, index: usize, ctx: &mut BuildContext| {
        Arc::new(DerivationNode::from_markedup(word, "X", markup, index, ctx).unwrap())
    };
    let john = leaf("John", super::NP, 0, &mut ctx);
    let saw = leaf("saw", super::TRANSITIVE, 1, &mut ctx);
    let mary = leaf("Mary", super::NP, 2, &mut ctx);
    let object = BinaryRule::new("(S[dcl]\\NP)/NP", "NP", "S[dcl]\\NP", 0).unwrap();
    let vp = Arc::new(DerivationNode::combine(&object, &saw, &mary, &mut ctx).unwrap().unwrap());
    let subject = BinaryRule::new("NP", "S[dcl]\\NP", "S[dcl]", 1).unwrap();
    let tree = DerivationNode::combine(&subject, &john, &vp, &mut ctx).unwrap().unwrap();

    assert_eq!(action_sequence(&tree).unwrap().len(), tree.node_count());
    let outcome = gold_parse(&tree).unwrap();
    assert_eq!(outcome.stack.len(), 1);
    assert!(outcome.stack[0].same_structure(&tree));
    assert_eq!(outcome.dependencies, tree.dependencies().to_vec());
}

#[test]
fn test_gold_replay_of_treebank_tree() {
    let mut ctx = BuildContext::new();
    let tree = parse_tree(JOHN_SAW_MARY, None, &mut ctx).unwrap();
    let outcome = gold_parse(&tree).unwrap();
    assert!(outcome.stack[0].same_structure(&tree));
    assert_eq!(outcome.steps, 5);
}
