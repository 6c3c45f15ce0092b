use lingua_ccg::category::BuildContext;
use lingua_ccg::derivation::read_treebank;
use lingua_ccg::parser::ParseError;
use lingua_ccg::{config, Error, Grammar, LexicalResources, ParserConfig, Sentence, Trainer, WeightTable};
use lingua_ccg::Parser;
use pretty_assertions::assert_eq;

const TREEBANK: &str = "\
ID=1 saw Mary
(<T S[dcl]\\NP 0 2> (<L (S[dcl]\\NP)/NP VBD VBD saw (S[dcl]\\NP_1)/NP_2>) (<L NP NNP NNP Mary NP>) )
ID=2 saw
(<L S[dcl]\\NP VBD VBD saw S[dcl]\\NP_1>)
";

#[test]
fn test_induce_train_and_parse() {
    let mut ctx = BuildContext::new();
    let entries = read_treebank(TREEBANK, None, &mut ctx).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].source.as_deref(), Some("ID=2 saw"));

    let mut grammar = Grammar::new();
    let mut lexicon = LexicalResources::new();
    for entry in &entries {
        grammar.observe(&entry.tree).unwrap();
        lexicon.observe(&entry.tree).unwrap();
    }
    assert_eq!(grammar.lookup_binary("(S[dcl]\\NP)/NP", "NP").len(), 1);
    assert_eq!(lexicon.candidates("Saw", "VBD").len(), 2);

    let mut trainer = Trainer::new(&grammar, &lexicon, ParserConfig::default(), WeightTable::new());
    for _ in 0..3 {
        for entry in &entries {
            trainer.train(&entry.tree).unwrap();
        }
    }
    assert_eq!(trainer.updates(), 1);

    let weights = trainer.into_weights();
    let parser = Parser::new(&grammar, &lexicon, &weights, ParserConfig::default());
    for entry in &entries {
        let outcome = parser.parse(&Sentence::from_derivation(&entry.tree)).unwrap();
        assert!(outcome.is_success());
        assert!(outcome.tree().unwrap().same_structure(&entry.tree));
    }
}

#[test]
fn test_trained_weights_survive_dump_and_load() {
    let mut ctx = BuildContext::new();
    let entries = read_treebank(TREEBANK, None, &mut ctx).unwrap();
    let mut grammar = Grammar::new();
    let mut lexicon = LexicalResources::new();
    for entry in &entries {
        grammar.observe(&entry.tree).unwrap();
        lexicon.observe(&entry.tree).unwrap();
    }
    let mut trainer = Trainer::new(&grammar, &lexicon, ParserConfig::default(), WeightTable::new());
    trainer.train(&entries[1].tree).unwrap();
    let mut weights = trainer.into_weights();
    assert!(!weights.is_empty());
    assert_eq!(weights.weight("L1W_S1C=saw_S[dcl]\\NP"), 1);
    assert_eq!(weights.weight("L1W_S1C=saw_(S[dcl]\\NP)/NP"), -1);

    let mut buffer = Vec::new();
    weights.dump(&mut buffer).unwrap();
    let loaded = WeightTable::load(buffer.as_slice()).unwrap();
    assert_eq!(loaded, weights);
}

#[test]
fn test_grammar_dump_reloads() {
    let mut ctx = BuildContext::new();
    let entries = read_treebank(TREEBANK, None, &mut ctx).unwrap();
    let mut grammar = Grammar::new();
    for entry in &entries {
        grammar.observe(&entry.tree).unwrap();
    }
    let mut buffer = Vec::new();
    grammar.dump(&mut buffer).unwrap();
    let reloaded = Grammar::load(buffer.as_slice()).unwrap();
    assert_eq!(reloaded.binary_rule_count(), grammar.binary_rule_count());
    assert_eq!(
        reloaded.lookup_binary("(S[dcl]\\NP)/NP", "NP"),
        grammar.lookup_binary("(S[dcl]\\NP)/NP", "NP")
    );
}

#[test]
fn test_config_and_error_surface() {
    let config: ParserConfig = config::from_str(r#"{"beam_size": 2, "early_update": true}"#).unwrap();
    assert_eq!(config.beam_size, 2);
    assert!(config.early_update);
    assert_eq!(config.max_retries, ParserConfig::default().max_retries);

    let err: Error = ParseError::NoGoldDerivation.into();
    assert_eq!(err.to_string(), "Parse error: No gold derivation");
    assert!(matches!(config::from_str::<ParserConfig>("[]"), Err(Error::Config(_))));
}
