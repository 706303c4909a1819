//! Languages, grammar descriptions and trees through serde.

mod common;

use std::sync::Arc;
use weft::grammar::{GrammarDescription, string};
use weft::syntax::GreenNode;
use weft::{Grammar, Language, Parser};

#[test]
fn test_language_round_trips() {
    let language = common::bang_language();
    let json = serde_json::to_string(&*language).unwrap();
    let restored: Language = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, *language);

    let scanners = common::bang_scanners();
    let original = Parser::new(language).with_scanners(&scanners);
    let loaded = Parser::new(Arc::new(restored)).with_scanners(&scanners);
    for source in ["!x + 1\n!y\n", "x !y\n", "x +\n"] {
        assert_eq!(original.parse(source).to_sexp(), loaded.parse(source).to_sexp());
    }
}

#[test]
fn test_grammar_from_json_description() {
    let description: GrammarDescription = serde_json::from_str(
        r#"{
            "name": "lines",
            "rules": {
                "program": { "type": "REPEAT", "content": { "type": "SYMBOL", "name": "line" } },
                "line": {
                    "type": "SEQ",
                    "members": [
                        { "type": "CHOICE", "members": [
                            { "type": "SYMBOL", "name": "MARK" },
                            { "type": "BLANK" }
                        ] },
                        { "type": "SYMBOL", "name": "word" },
                        { "type": "STRING", "value": ";" }
                    ]
                },
                "word": { "type": "PATTERN", "value": "[a-z!]+" }
            },
            "externals": [{ "name": "MARK", "shape": { "type": "STRING", "value": "!" } }],
            "conflicts": [["MARK", "word"]],
            "extras": [{ "type": "PATTERN", "value": "\\s" }]
        }"#,
    )
    .unwrap();
    let grammar = Grammar::from_description(description).unwrap();
    assert_eq!(grammar.externals()[0].shape, Some(string("!")));

    let restored = Grammar::from_description(
        serde_json::from_value(serde_json::to_value(grammar.to_description()).unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(
        grammar.rules().collect::<Vec<_>>(),
        restored.rules().collect::<Vec<_>>()
    );
    assert_eq!(grammar.externals(), restored.externals());

    let tree = Parser::new(common::language(&restored)).parse("ab; cd;");
    assert_eq!(tree.to_sexp(), "(program (line (word)) (line (word)))");
}

#[test]
fn test_green_tree_round_trips() {
    let parser = Parser::new(common::arithmetic_language());
    let tree = parser.parse("x + 1\n(y\n");
    let json = serde_json::to_string(&**tree.green()).unwrap();
    let restored: GreenNode = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, **tree.green());
}
