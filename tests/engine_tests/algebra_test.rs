use lingua_ccg::category::{unifiable, unify, BuildContext, Category, Direction};
use lingua_ccg::combinator::BinaryRuleType;
use lingua_ccg::{BinaryRule, DerivationNode, Grammar, UnaryRule};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use strum::IntoEnumIterator;

fn plain(text: &str) -> Category {
    Category::from_plain(text).unwrap()
}

fn construct(rule_type: BinaryRuleType, left: &str, right: &str) -> Option<String> {
    let mut ctx = BuildContext::new();
    let left = ctx.parse_pred_arg(left).unwrap().category;
    let right = ctx.parse_pred_arg(right).unwrap().category;
    let mut wiring = ctx.wiring();
    rule_type.construct(&left, &right, &mut wiring).map(|c| c.to_string())
}

#[test]
fn test_classified_rules_survive_their_text_form() {
    let triples = [
        ("(S\\NP)/NP", "NP", "S\\NP", 0),
        ("NP", "S[dcl]\\NP", "S[dcl]", 1),
        ("S/NP", "NP/N", "S/N", 0),
        ("NP\\NP", "S\\NP", "S\\NP", 1),
        ("conj", "NP", "NP[conj]", 1),
        ("NP", "NP[conj]", "NP", 0),
        ("S/S", "(S/NP)/PP", "(S/NP)/PP", 0),
        ("PP", "NP", "S", 0),
    ];
    for (left, right, result, head) in triples {
        let rule = BinaryRule::new(left, right, result, head).unwrap().with_frequency(7);
        let parsed = BinaryRule::parse_line(1, &rule.to_string()).unwrap();
        assert_eq!(parsed, rule, "{rule}");
        assert_eq!(parsed.rule_type(), rule.rule_type());
        assert_eq!(parsed.head_child(), head);
    }
    assert_eq!(
        BinaryRule::new("PP", "NP", "S", 0).unwrap().rule_type(),
        BinaryRuleType::Unknown
    );

    let unary = UnaryRule::new("S[pss]\\NP", "NP\\NP").unwrap();
    assert_eq!(UnaryRule::parse_line(1, &unary.to_string()).unwrap(), unary);
}

#[test]
fn test_every_rule_type_has_a_stable_ordinal() {
    for (ordinal, rule_type) in BinaryRuleType::iter().enumerate() {
        assert_eq!(rule_type.ordinal(), ordinal);
        assert_eq!(BinaryRuleType::from_ordinal(ordinal), Some(rule_type));
        assert!(rule_type.head_child() <= 1);
    }
    assert_eq!(BinaryRuleType::from_ordinal(BinaryRuleType::iter().count()), None);
}

#[test]
fn test_atomic_unification() {
    assert!(unify(&plain("NP"), &plain("N"), None).is_some());
    assert!(unify(&plain("N"), &plain("NP"), None).is_some());
    assert!(unify(&plain("NP"), &plain("PP"), None).is_none());
}

#[test]
fn test_application_results() {
    assert_eq!(
        construct(BinaryRuleType::ForwardApply, "(S\\NP)/NP", "NP"),
        Some("S\\NP".to_string())
    );
    assert_eq!(
        construct(BinaryRuleType::BackwardApply, "NP", "S\\NP"),
        Some("S".to_string())
    );
}

#[test]
fn test_composition_results() {
    assert_eq!(
        construct(BinaryRuleType::SimpleForwardCompose, "X/Y", "Y/Z"),
        Some("X/Z".to_string())
    );
    for (left, right) in [("X/Y", "Y/Z"), ("S/NP", "NP/PP"), ("S/(S\\NP)", "(S\\NP)/NP")] {
        assert_eq!(
            construct(BinaryRuleType::GeneralizedForwardCompose, left, right),
            construct(BinaryRuleType::SimpleForwardCompose, left, right)
        );
    }
}

#[test]
fn test_forward_application_coindexes_head_and_argument() {
    let mut ctx = BuildContext::new();
    let saw = Arc::new(
        DerivationNode::from_pred_arg("saw", "VBD", "VBD", "(S[dcl]\\NP_1)/NP_2", 0, &mut ctx).unwrap(),
    );
    let mary = Arc::new(DerivationNode::from_pred_arg("Mary", "NNP", "NNP", "NP", 1, &mut ctx).unwrap());
    let rule = BinaryRule::new("(S[dcl]\\NP)/NP", "NP", "S[dcl]\\NP", 0).unwrap();
    assert_eq!(rule.rule_type(), BinaryRuleType::ForwardApply);

    let vp = DerivationNode::combine(&rule, &saw, &mary, &mut ctx).unwrap().unwrap();
    assert_eq!(ctx.heads(vp.category()), BTreeSet::from([0]));
    assert_eq!(vp.dependencies()[0], vec![None, Some(BTreeSet::from([1]))]);
    assert_eq!(vp.head_terminal().word, "saw");
}

#[test]
fn test_try_all_rules_agrees_with_classification() {
    let mut ctx = BuildContext::new();
    let left = ctx.parse_pred_arg("NP[nb]/N").unwrap().category;
    let right = ctx.parse_pred_arg("N").unwrap().category;
    let rule = Grammar::try_all_rules(&left, &right, &mut ctx).unwrap();
    assert_eq!(rule.rule_type(), BinaryRuleType::ForwardApply);
    assert_eq!(rule.result(), "NP[nb]");
    assert_eq!(rule.head_child(), 0);
}

fn atomic_strategy() -> impl Strategy<Value = Category> {
    (
        prop::sample::select(vec!["NP", "N", "S", "PP"]),
        prop::option::of(prop::sample::select(vec!["dcl", "nb", "b", "ng"])),
    )
        .prop_map(|(symbol, feature)| Category::atomic(symbol, feature.map(str::to_string)))
}

fn category_strategy() -> impl Strategy<Value = Category> {
    atomic_strategy().prop_recursive(4, 24, 2, |inner| {
        (inner.clone(), any::<bool>(), inner).prop_map(|(result, forward, argument)| {
            let dir = if forward { Direction::Forward } else { Direction::Backward };
            Category::functor(result, dir, argument)
        })
    })
}

proptest! {
    #[test]
    fn prop_unification_is_symmetric(a in atomic_strategy(), b in atomic_strategy()) {
        prop_assert_eq!(unifiable(&a, &b), unifiable(&b, &a));
        prop_assert_eq!(unify(&a, &b, None).is_some(), unify(&b, &a, None).is_some());
    }

    #[test]
    fn prop_category_unifies_with_itself(category in category_strategy()) {
        let unified = unify(&category, &category, None);
        prop_assert_eq!(unified, Some(category));
    }

    #[test]
    fn prop_plain_notation_round_trip(category in category_strategy()) {
        let text = category.to_string();
        let parsed = Category::from_plain(&text).unwrap();
        prop_assert_eq!(parsed.to_string(), text);
        prop_assert_eq!(parsed, category);
    }
}
