//! # lingua-ccg: Combinatory Categorial Grammar Derivation Engine
//!
//! Category algebra, rule classification and an incremental beam-search
//! shift-reduce parser with perceptron scoring.
//!
//! ## Layers
//!
//! ### 1. Category Algebra
//! CCG categories, their three text notations and unification
//! ([`category`]). Coindexation lives in a per-parse union-find arena owned
//! by a [`category::BuildContext`], so independent parses never share
//! state.
//!
//! ### 2. Combinators and Rules
//! Application, composition, substitution, coordination, type raising and
//! type changing ([`combinator`]), in a fixed precedence order used to
//! classify rule triples. Rules are stored and counted in a [`grammar::Grammar`];
//! lexical categories in [`grammar::LexicalResources`].
//!
//! ### 3. Derivations
//! Binary-branching trees whose nodes carry per-word dependency slots
//! ([`derivation`]), plus a reader and writer for bracketed tree text.
//!
//! ### 4. Scoring and Parsing
//! Sparse features and perceptron weights ([`scorer`]) drive the beam
//! search in [`parser`], which also replays reference derivations and
//! trains with early update.
//!
//! ## Pipeline
//!
//! ```text
//! Treebank → Grammar / Lexicon induction → Trainer → WeightTable
//! Sentence → Parser (Chart steps) → ParseOutcome
//! ```

pub mod category;
pub mod combinator;
pub mod config;
pub mod derivation;
pub mod error;
pub mod grammar;
pub mod parser;
pub mod scorer;
pub mod sentence;

// Re-exports
pub use category::{BuildContext, Category};
pub use config::ParserConfig;
pub use derivation::DerivationNode;
pub use error::*;
pub use grammar::{BinaryRule, Grammar, LexicalResources, UnaryRule};
pub use parser::{ParseOutcome, ParseStatus, Parser, Trainer};
pub use scorer::WeightTable;
pub use sentence::{Sentence, Token};
