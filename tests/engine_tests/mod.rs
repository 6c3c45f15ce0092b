mod algebra_test;
mod beam_test;
mod parse_test;
mod training_test;

use lingua_ccg::{Grammar, LexicalResources, ParserConfig, Sentence, WeightTable};

pub const DET: &str = "1 (NP[nb]{Y}/N{Y}<1>){_}";
pub const NOUN: &str = "0 N{_}";
pub const NP: &str = "0 NP{_}";
pub const TRANSITIVE: &str = "2 ((S[dcl]{_}\\NP{Y}<1>){_}/NP{Z}<2>){_}";

pub const JOHN_SAW_MARY: &str = "(<T S[dcl] 1 2> (<L NP NNP NNP John NP>) (<T S[dcl]\\NP 0 2> (<L (S[dcl]\\NP)/NP VBD VBD saw (S[dcl]\\NP_1)/NP_2>) (<L NP NNP NNP Mary NP>) ) )";

pub struct Fixture {
    pub grammar: Grammar,
    pub lexicon: LexicalResources,
    pub weights: WeightTable,
}

impl Fixture {
    pub fn new(entries: &[(&str, &str, &str)]) -> Self {
        let mut lexicon = LexicalResources::new();
        for (word, pos, markup) in entries {
            lexicon.add_entry(word, pos, markup);
        }
        Self {
            grammar: Grammar::new(),
            lexicon,
            weights: WeightTable::new(),
        }
    }

    pub fn parser(&self, config: ParserConfig) -> lingua_ccg::Parser<'_> {
        lingua_ccg::Parser::new(&self.grammar, &self.lexicon, &self.weights, config)
    }
}

pub fn the_cat() -> Fixture {
    Fixture::new(&[("the", "DT", DET), ("cat", "N", NOUN)])
}

pub fn john_saw_mary() -> Fixture {
    Fixture::new(&[
        ("John", "NNP", NP),
        ("saw", "VBD", TRANSITIVE),
        ("Mary", "NNP", NP),
    ])
}

pub fn sentence(pairs: &[(&str, &str)]) -> Sentence {
    Sentence::from_pairs(pairs)
}
