//! Token sequences fed to the parser.
//!
//! Two text layouts are read: one sentence per line as `word/POS` pairs,
//! and one token per line as `word<TAB>POS` columns with blank lines
//! between sentences. Either may put a source line before each sentence.

use crate::derivation::{DerivationError, DerivationNode, DerivationResult};
use std::fmt;

/// Placeholder for positions before the first word.
pub const BEGIN: &str = "#BOS#";
/// Placeholder for positions after the last word.
pub const END: &str = "#EOS#";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub pos: String,
    pub extra: Option<String>,
}

impl Token {
    pub fn new(word: &str, pos: &str) -> Self {
        Self {
            word: word.to_string(),
            pos: pos.to_string(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: &str) -> Self {
        self.extra = Some(extra.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    pub source: Option<String>,
    tokens: Vec<Token>,
}

impl Sentence {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { source: None, tokens }
    }

    /// Sentence from `(word, POS)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(pairs.iter().map(|(word, pos)| Token::new(word, pos)).collect())
    }

    /// Words of a reference derivation, keeping each terminal's extra field.
    pub fn from_derivation(tree: &DerivationNode) -> Self {
        let tokens = tree
            .terminals()
            .into_iter()
            .map(|terminal| Token {
                word: terminal.word.clone(),
                pos: terminal.pos.clone(),
                extra: terminal.extra.clone(),
            })
            .collect();
        Self::new(tokens)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    fn padded<'a>(&'a self, index: isize, field: impl Fn(&'a Token) -> &'a str) -> &'a str {
        if index < 0 {
            return BEGIN;
        }
        match self.tokens.get(index as usize) {
            Some(token) => field(token),
            None => END,
        }
    }

    /// Word at `index`, padded with [`BEGIN`]/[`END`] outside the sentence.
    pub fn word(&self, index: isize) -> &str {
        self.padded(index, |token| token.word.as_str())
    }

    pub fn pos(&self, index: isize) -> &str {
        self.padded(index, |token| token.pos.as_str())
    }

    /// Extra field at `index`; `None` unless every token carries one.
    pub fn extra(&self, index: isize) -> Option<&str> {
        if !self.has_extras() {
            return None;
        }
        Some(self.padded(index, |token| token.extra.as_deref().unwrap_or_default()))
    }

    pub fn has_extras(&self) -> bool {
        !self.tokens.is_empty() && self.tokens.iter().all(|token| token.extra.is_some())
    }

    /// Parses `word/POS word/POS ...`; the POS is whatever follows the last
    /// slash.
    pub fn parse_line(line: &str) -> DerivationResult<Self> {
        let mut tokens = Vec::new();
        for pair in line.split_whitespace() {
            let Some((word, pos)) = pair.rsplit_once('/') else {
                return Err(DerivationError::malformed(format!("token without POS: {pair}")));
            };
            tokens.push(Token::new(word, pos));
        }
        Ok(Self::new(tokens))
    }

    /// One sentence per non-blank line, each preceded by a source line when
    /// `with_source` is set.
    pub fn read_lines(text: &str, with_source: bool) -> DerivationResult<Vec<Self>> {
        let mut sentences = Vec::new();
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        while let Some(first) = lines.next() {
            let (source, body) = if with_source {
                let Some(body) = lines.next() else {
                    return Err(DerivationError::malformed(format!("source line without sentence: {first}")));
                };
                (Some(first.to_string()), body)
            } else {
                (None, first)
            };
            let mut sentence = Self::parse_line(body)?;
            sentence.source = source;
            sentences.push(sentence);
        }
        Ok(sentences)
    }

    /// One `word<TAB>POS` token per line, sentences separated by blank
    /// lines.
    pub fn read_columns(text: &str, with_source: bool) -> DerivationResult<Vec<Self>> {
        let mut sentences = Vec::new();
        let mut current: Option<Sentence> = None;
        for line in text.lines() {
            if line.trim().is_empty() {
                sentences.extend(current.take());
                continue;
            }
            if current.is_none() && with_source {
                current = Some(Sentence {
                    source: Some(line.to_string()),
                    tokens: Vec::new(),
                });
                continue;
            }
            let sentence = current.get_or_insert_with(Sentence::default);
            let mut columns = line.split('\t');
            match (columns.next(), columns.next()) {
                (Some(word), Some(pos)) => sentence.tokens.push(Token::new(word, pos)),
                _ => return Err(DerivationError::malformed(format!("column line without POS: {line}"))),
            }
        }
        sentences.extend(current);
        Ok(sentences)
    }

    pub fn to_columns(&self) -> String {
        let mut out = String::new();
        if let Some(source) = &self.source {
            out.push_str(source);
            out.push('\n');
        }
        for token in &self.tokens {
            out.push_str(&format!("{}\t{}\n", token.word, token.pos));
        }
        out
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            writeln!(f, "{source}")?;
        }
        let pairs: Vec<String> = self
            .tokens
            .iter()
            .map(|token| format!("{}/{}", token.word, token.pos))
            .collect();
        write!(f, "{}", pairs.join(" "))
    }
}
