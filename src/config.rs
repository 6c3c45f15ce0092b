use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::scorer::MAX_WINDOW;
use crate::{Error, InternalResult};

/// Beam search settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_beam_size")]
    pub beam_size: usize,

    /// Restarts from retained states after a step without successors.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_max_shifts_per_step")]
    pub max_shifts_per_step: usize,

    /// Drops states equivalent to an accepted one and keeps them for
    /// restarts.
    #[serde(default = "default_true")]
    pub approximate_pruning: bool,

    #[serde(default = "default_retained_capacity")]
    pub retained_capacity: usize,

    /// Bound on the arity generalized composition may add; unbounded when
    /// absent or zero.
    #[serde(default)]
    pub max_secondary_functor_arity: Option<usize>,

    /// Stop as soon as the reference derivation leaves the beam.
    #[serde(default)]
    pub early_update: bool,

    /// Words looked at on each side of the read position, and stack items
    /// looked at from the top; between 1 and 3.
    #[serde(default = "default_feature_window")]
    pub feature_window: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            beam_size: default_beam_size(),
            max_retries: default_max_retries(),
            max_shifts_per_step: default_max_shifts_per_step(),
            approximate_pruning: default_true(),
            retained_capacity: default_retained_capacity(),
            max_secondary_functor_arity: None,
            early_update: false,
            feature_window: default_feature_window(),
        }
    }
}

impl ParserConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        let config: Self = from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> InternalResult<()> {
        if self.beam_size == 0 {
            return Err(Error::Config("beam_size must be positive".to_string()));
        }
        if self.max_shifts_per_step == 0 {
            return Err(Error::Config("max_shifts_per_step must be positive".to_string()));
        }
        if !(1..=MAX_WINDOW).contains(&self.feature_window) {
            return Err(Error::Config(format!("feature_window must be between 1 and {MAX_WINDOW}")));
        }
        Ok(())
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file = File::open(path).map_err(|e| Error::Config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config =
        serde_json::from_reader(reader).map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_beam_size() -> usize {
    16
}
fn default_max_retries() -> usize {
    2
}
fn default_max_shifts_per_step() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_retained_capacity() -> usize {
    1024
}
fn default_feature_window() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: ParserConfig = from_str("{}").unwrap();
        assert_eq!(config, ParserConfig::default());
        assert_eq!(config.beam_size, 16);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_shifts_per_step, 4);
        assert!(config.approximate_pruning);
        assert_eq!(config.max_secondary_functor_arity, None);
    }

    #[test]
    fn test_partial_override() {
        let config: ParserConfig = from_str(r#"{"beam_size": 4, "max_secondary_functor_arity": 2}"#).unwrap();
        assert_eq!(config.beam_size, 4);
        assert_eq!(config.max_secondary_functor_arity, Some(2));
        assert_eq!(config.retained_capacity, 1024);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(from_str::<ParserConfig>("{"), Err(Error::Config(_))));
        let config = ParserConfig {
            beam_size: 0,
            ..ParserConfig::default()
        };
        assert!(config.validate().is_err());
        for feature_window in [0, MAX_WINDOW + 1] {
            let config = ParserConfig {
                feature_window,
                ..ParserConfig::default()
            };
            assert!(matches!(config.validate(), Err(Error::Config(_))));
        }
        assert!(matches!(
            ParserConfig::from_file("/nonexistent/parser.json"),
            Err(Error::Config(_))
        ));
    }
}
