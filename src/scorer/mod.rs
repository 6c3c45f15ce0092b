//! # Linear Scorer
//!
//! Sparse string features and a perceptron weight table. A configuration is
//! scored by the dot product of its feature counts with the weights; the
//! training update adds the gold configuration's counts and subtracts the
//! predicted one's.
//!
//! Weight files hold one `weight<TAB>feature` line per non-zero weight and
//! end at the first blank line.

mod features;

pub use features::{CcgFeatures, FeatureTemplate, BOUNDARY, MAX_WINDOW};

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Malformed weight at line {line}: {text}")]
    MalformedWeight { line: usize, text: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScorerResult<T> = Result<T, ScorerError>;

/// Feature counts keyed by rendered feature text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    counts: BTreeMap<String, i64>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one occurrence of `feature`.
    pub fn put<S: Into<String>>(&mut self, feature: S) {
        self.add(feature, 1);
    }

    pub fn add<S: Into<String>>(&mut self, feature: S, count: i64) {
        *self.counts.entry(feature.into()).or_default() += count;
    }

    pub fn accumulate(&mut self, other: &FeatureSet) {
        for (feature, count) in &other.counts {
            self.add(feature.clone(), *count);
        }
    }

    pub fn subtract(&mut self, other: &FeatureSet) {
        for (feature, count) in &other.counts {
            self.add(feature.clone(), -count);
        }
    }

    pub fn get(&self, feature: &str) -> i64 {
        self.counts.get(feature).copied().unwrap_or_default()
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.counts.contains_key(feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.counts.iter().map(|(feature, count)| (feature.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Turns a configuration into features.
pub trait FeatureExtractor<S: ?Sized> {
    fn features(&self, state: &S) -> FeatureSet;

    /// Number of words looked at on each side of the read position.
    fn window(&self) -> usize;
}

/// Perceptron weights.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightTable {
    weights: BTreeMap<String, i64>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, feature: &str) -> i64 {
        self.weights.get(feature).copied().unwrap_or_default()
    }

    pub fn set(&mut self, feature: &str, weight: i64) {
        self.weights.insert(feature.to_string(), weight);
    }

    pub fn score(&self, features: &FeatureSet) -> f64 {
        features
            .iter()
            .map(|(feature, count)| count * self.weight(feature))
            .sum::<i64>() as f64
    }

    pub fn plus(&mut self, features: &FeatureSet) {
        for (feature, count) in features.iter() {
            *self.weights.entry(feature.to_string()).or_default() += count;
        }
    }

    pub fn minus(&mut self, features: &FeatureSet) {
        for (feature, count) in features.iter() {
            *self.weights.entry(feature.to_string()).or_default() -= count;
        }
    }

    /// Drops zero weights.
    pub fn rebuild(&mut self) {
        self.weights.retain(|_, weight| *weight != 0);
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn dump<W: Write>(&mut self, writer: &mut W) -> ScorerResult<()> {
        self.rebuild();
        for (feature, weight) in &self.weights {
            writeln!(writer, "{weight}\t{feature}")?;
        }
        writeln!(writer)?;
        Ok(())
    }

    #[instrument(level = "debug", skip(reader))]
    pub fn load<R: BufRead>(reader: R) -> ScorerResult<Self> {
        let mut table = WeightTable::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                break;
            }
            let parsed = line
                .split_once('\t')
                .and_then(|(weight, feature)| Some((weight.trim().parse::<i64>().ok()?, feature.trim())));
            match parsed {
                Some((weight, feature)) if !feature.is_empty() => {
                    table.weights.insert(feature.to_string(), weight);
                }
                _ => {
                    warn!(line = index + 1, text = %line, "malformed weight line");
                    return Err(ScorerError::MalformedWeight { line: index + 1, text: line });
                }
            }
        }
        debug!(weights = table.len(), "weight table loaded");
        Ok(table)
    }
}
