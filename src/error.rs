use thiserror::Error;

use crate::category::CategoryError;
use crate::derivation::DerivationError;
use crate::grammar::GrammarError;
use crate::parser::ParseError;
use crate::scorer::ScorerError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Category error: {0}")]
    Category(#[from] CategoryError),
    #[error("Grammar error: {0}")]
    Grammar(#[from] GrammarError),
    #[error("Derivation error: {0}")]
    Derivation(#[from] DerivationError),
    // weights
    #[error("Scorer error: {0}")]
    Scorer(#[from] ScorerError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
