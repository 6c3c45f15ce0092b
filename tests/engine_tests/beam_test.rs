use super::{sentence, Fixture, DET, NOUN};
use lingua_ccg::category::BuildContext;
use lingua_ccg::parser::{gold_moves, Chart, ChartPhase};
use lingua_ccg::{BinaryRule, DerivationNode, ParseStatus, Parser, ParserConfig, WeightTable};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

// Readings of an ambiguous first word, each combining with the noun after it.
const READINGS: [(&str, &str, &str); 4] = [
    ("1 (NP[nb]{Y}/N{Y}<1>){_}", "NP[nb]/N", "NP[nb]"),
    ("1 (NP{Y}/N{Y}<1>){_}", "NP/N", "NP"),
    ("1 (S{_}/N{Y}<1>){_}", "S/N", "S"),
    ("1 (N{Y}/N{Y}<1>){_}", "N/N", "N"),
];

fn ambiguous_fixture(weights: &[(i64, i64, i64)]) -> Fixture {
    let mut entries: Vec<(&str, &str, &str)> = READINGS.iter().map(|(markup, _, _)| ("the", "DT", *markup)).collect();
    entries.push(("cat", "NN", NOUN));
    let mut fixture = Fixture::new(&entries);
    let mut table = WeightTable::new();
    for ((_, category, result), (shifted, stacked, reduced)) in READINGS.iter().zip(weights) {
        table.set(&format!("L1W_S1C=the_{category}"), *shifted);
        table.set(&format!("S1C_S2C=N_{category}"), *stacked);
        table.set(&format!("S1C_S2C_S3C={result}_#BOS#_#BOS#"), *reduced);
    }
    fixture.weights = table;
    fixture
}

fn best_score(parser: &Parser<'_>) -> (ParseStatus, f64) {
    let words = sentence(&[("the", "DT"), ("cat", "NN")]);
    let mut chart = Chart::new(parser, &words);
    let outcome = chart.run(None).unwrap();
    (outcome.status, chart.best().map_or(f64::NEG_INFINITY, |best| best.score()))
}

fn config(beam_size: usize) -> ParserConfig {
    ParserConfig {
        beam_size,
        max_shifts_per_step: READINGS.len(),
        ..ParserConfig::default()
    }
}

#[test]
fn test_narrow_beam_commits_to_first_step_winner() {
    // Best first shift leads to the worst total.
    let fixture = ambiguous_fixture(&[(3, 0, -10), (1, 0, 5), (0, 0, 0), (0, 0, 0)]);
    let (status, greedy) = best_score(&fixture.parser(config(1)));
    assert_eq!(status, ParseStatus::Success);
    assert_eq!(greedy, -7.0);
    let (_, wide) = best_score(&fixture.parser(config(4)));
    assert_eq!(wide, 6.0);
}

#[test]
fn test_states_outside_the_beam_are_retained() {
    let fixture = ambiguous_fixture(&[(0, 0, 0); 4]);
    let parser = fixture.parser(config(1));
    let words = sentence(&[("the", "DT"), ("cat", "NN")]);
    let mut chart = Chart::new(&parser, &words);
    chart.step().unwrap();
    assert_eq!(chart.beam().len(), 1);
    assert_eq!(chart.retained_len(), READINGS.len() - 1);

    let unpruned = ParserConfig {
        approximate_pruning: false,
        ..config(1)
    };
    let parser = fixture.parser(unpruned);
    let mut chart = Chart::new(&parser, &words);
    chart.step().unwrap();
    assert_eq!(chart.retained_len(), 0);
}

// "a" prefers a reading that cannot combine with the noun after it.
fn dead_end_fixture() -> Fixture {
    let mut fixture = Fixture::new(&[("a", "DT", "0 PP{_}"), ("a", "DT", DET), ("cat", "NN", NOUN)]);
    fixture.weights.set("L1W_S1C=a_PP", 10);
    fixture
}

fn a_cat_tree() -> DerivationNode {
    let mut ctx = BuildContext::new();
    let a = Arc::new(DerivationNode::from_markedup("a", "DT", DET, 0, &mut ctx).unwrap());
    let cat = Arc::new(DerivationNode::from_markedup("cat", "NN", NOUN, 1, &mut ctx).unwrap());
    let rule = BinaryRule::new("NP[nb]/N", "N", "NP[nb]", 0).unwrap();
    DerivationNode::combine(&rule, &a, &cat, &mut ctx).unwrap().unwrap()
}

#[test]
fn test_dead_end_resumes_from_retained_states() {
    let fixture = dead_end_fixture();
    let parser = fixture.parser(config(1));
    let words = sentence(&[("a", "DT"), ("cat", "NN")]);
    let mut chart = Chart::new(&parser, &words);
    let outcome = chart.run(None).unwrap();
    assert_eq!(outcome.status, ParseStatus::Success);
    assert_eq!(outcome.steps, 3);
    assert_eq!(chart.iterations(), 5);
    assert_eq!(outcome.tree().unwrap().category().to_string(), "NP[nb]");

    let no_retry = ParserConfig {
        max_retries: 0,
        ..config(1)
    };
    let parser = fixture.parser(no_retry);
    let outcome = parser.parse(&words).unwrap();
    assert_eq!(outcome.status, ParseStatus::Failure);
    assert!(outcome.tree().is_none());
}

#[test]
fn test_gold_falling_out_of_the_beam_stops_early() {
    let fixture = dead_end_fixture();
    let training = ParserConfig {
        early_update: true,
        ..config(1)
    };
    let parser = fixture.parser(training);
    let words = sentence(&[("a", "DT"), ("cat", "NN")]);
    let gold = gold_moves(&a_cat_tree()).unwrap();
    assert_eq!(gold.len(), 3);

    let mut chart = Chart::new(&parser, &words).with_gold(gold);
    assert_eq!(chart.step().unwrap(), ChartPhase::Done(ParseStatus::EarlyUpdate));
    assert_eq!(chart.iterations(), 1);
    assert!(!chart.best().unwrap().on_gold_path());

    let delta = chart.update_delta().unwrap().unwrap();
    assert_eq!(delta.get("L1W_S1C=a_NP[nb]/N"), 1);
    assert_eq!(delta.get("L1W_S1C=a_PP"), -1);
}

proptest! {
    #[test]
    fn prop_widening_the_beam_never_lowers_the_best_score(
        weights in prop::collection::vec((-5i64..=5, -5i64..=5, -5i64..=5), READINGS.len())
    ) {
        let fixture = ambiguous_fixture(&weights);
        let mut previous = f64::NEG_INFINITY;
        for beam_size in 1..=READINGS.len() {
            let (status, score) = best_score(&fixture.parser(config(beam_size)));
            prop_assert_eq!(status, ParseStatus::Success);
            prop_assert!(score >= previous, "beam {} scored {} after {}", beam_size, score, previous);
            previous = score;
        }
        let exhaustive = weights
            .iter()
            .map(|(a, b, c)| (a + b + c) as f64)
            .fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(previous, exhaustive);
    }
}
