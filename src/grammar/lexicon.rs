use super::{GrammarError, GrammarResult};
use crate::category::Category;
use crate::derivation::DerivationNode;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use tracing::{debug, warn};

/// Interned markedup category strings.
#[derive(Debug, Clone, Default)]
pub struct CategoryInventory {
    markups: Vec<String>,
    ids: HashMap<String, usize>,
}

impl CategoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, markup: &str) -> usize {
        if let Some(id) = self.ids.get(markup) {
            return *id;
        }
        let id = self.markups.len();
        self.markups.push(markup.to_string());
        self.ids.insert(markup.to_string(), id);
        id
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.markups.get(id).map(String::as_str)
    }

    pub fn id_of(&self, markup: &str) -> Option<usize> {
        self.ids.get(markup).copied()
    }

    pub fn len(&self) -> usize {
        self.markups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markups.is_empty()
    }
}

/// Maps a key (word form or POS tag) to the lexical category ids seen
/// with it, with counts.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, BTreeMap<usize, u64>>,
    lowercase: bool,
}

impl Lexicon {
    /// Word-form lexicon; keys are lower-cased.
    pub fn for_words() -> Self {
        Self {
            entries: HashMap::new(),
            lowercase: true,
        }
    }

    pub fn for_tags() -> Self {
        Self::default()
    }

    fn normalize(&self, key: &str) -> String {
        if self.lowercase {
            key.to_lowercase()
        } else {
            key.to_string()
        }
    }

    pub fn add(&mut self, key: &str, category_id: usize, count: u64) {
        let key = self.normalize(key);
        *self.entries.entry(key).or_default().entry(category_id).or_default() += count;
    }

    /// Category ids for `key`, most frequent first.
    pub fn lookup(&self, key: &str) -> Vec<usize> {
        let Some(counts) = self.entries.get(&self.normalize(key)) else {
            return Vec::new();
        };
        let mut ids: Vec<(usize, u64)> = counts.iter().map(|(id, count)| (*id, *count)).collect();
        ids.sort_by_key(|(id, count)| (Reverse(*count), *id));
        ids.into_iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Word and POS lexicons sharing one category inventory.
#[derive(Debug, Clone)]
pub struct LexicalResources {
    pub words: Lexicon,
    pub tags: Lexicon,
    pub inventory: CategoryInventory,
}

impl Default for LexicalResources {
    fn default() -> Self {
        Self {
            words: Lexicon::for_words(),
            tags: Lexicon::for_tags(),
            inventory: CategoryInventory::new(),
        }
    }
}

impl LexicalResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, word: &str, pos: &str, markup: &str) {
        let id = self.inventory.intern(markup);
        self.words.add(word, id, 1);
        self.tags.add(pos, id, 1);
    }

    /// Markups for a token: word lexicon first, POS lexicon on a miss.
    /// Empty when both miss.
    pub fn candidates(&self, word: &str, pos: &str) -> Vec<&str> {
        let mut ids = self.words.lookup(word);
        if ids.is_empty() {
            ids = self.tags.lookup(pos);
        }
        ids.into_iter().filter_map(|id| self.inventory.get(id)).collect()
    }

    /// Adds every terminal of a reference derivation to both lexicons.
    pub fn observe(&mut self, tree: &DerivationNode) -> GrammarResult<()> {
        for terminal in tree.terminals() {
            let markup = terminal.to_markedup()?;
            self.add_entry(&terminal.word, &terminal.pos, &markup);
        }
        Ok(())
    }
}

/// Plain category text to its markedup interpretation.
#[derive(Debug, Clone, Default)]
pub struct MarkupTable {
    entries: HashMap<String, String>,
}

impl MarkupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, plain: &str, markup: &str) -> GrammarResult<()> {
        let key = Category::from_plain(plain)?.to_string();
        self.entries.insert(key, markup.to_string());
        Ok(())
    }

    pub fn get(&self, category: &Category) -> Option<&str> {
        self.entries.get(&category.to_string()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads blank-line separated blocks whose first line is the plain
    /// category and second line its markup; further lines are ignored,
    /// `#` starts a comment and a line `EOP` ends the input.
    pub fn load<R: BufRead>(reader: R) -> GrammarResult<Self> {
        let mut table = MarkupTable::new();
        let mut block: Vec<String> = Vec::new();
        let mut block_start = 0;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line == "EOP" {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                table.finish_block(&mut block, block_start)?;
                continue;
            }
            let content = trimmed.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            if block.is_empty() {
                block_start = index + 1;
            }
            block.push(content.to_string());
        }
        table.finish_block(&mut block, block_start)?;
        debug!(entries = table.len(), "markup table loaded");
        Ok(table)
    }

    fn finish_block(&mut self, block: &mut Vec<String>, line: usize) -> GrammarResult<()> {
        match block.as_slice() {
            [] => {}
            [plain] => {
                warn!(line, plain = %plain, "markup block without interpretation");
                return Err(GrammarError::MalformedRule {
                    line,
                    text: plain.clone(),
                    reason: "missing markup line".to_string(),
                });
            }
            [plain, markup, ..] => self.insert(plain, markup)?,
        }
        block.clear();
        Ok(())
    }
}
