use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CategoryError {
    #[error("Malformed category '{text}': {reason}")]
    Malformed { text: String, reason: String },
    #[error("Unbalanced brackets in category '{0}'")]
    UnbalancedBrackets(String),
    #[error("Empty category text")]
    EmptyCategory,
    #[error("Slot {slot} out of range for a category with {count} slots")]
    SlotOutOfRange { slot: usize, count: usize },
    #[error("Too many coindex classes to render '{0}'")]
    TooManyClasses(String),
}

impl CategoryError {
    pub fn malformed<T: Into<String>, R: Into<String>>(text: T, reason: R) -> Self {
        Self::Malformed {
            text: text.into(),
            reason: reason.into(),
        }
    }
}

pub type CategoryResult<T> = Result<T, CategoryError>;
