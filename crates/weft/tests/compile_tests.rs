//! Compiling grammars into shared languages: conflict reporting, LALR
//! versus canonical LR(1) tables, and structural errors.

mod common;

use common::{arithmetic, bang_extension};
use std::sync::Arc;
use weft::compile::{Action, SymbolKind};
use weft::error::{ConflictKind, Resolution};
use weft::grammar::{ExternalToken, choice, pattern, repeat, seq, string, sym};
use weft::syntax::StateId;
use weft::{CompileOptions, GrammarBuilder, GrammarError, GrammarExtension, Parser, compile, compile_with};

#[test]
fn test_arithmetic_compiles_without_diagnostics() {
    let compiled = compile(&arithmetic()).unwrap();
    assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
    let language = compiled.language;
    assert_eq!(language.name(), "arithmetic");
    assert_eq!(language.symbol_name(language.start_symbol()), "program");
    assert_eq!(
        language.symbol_kind(language.symbol_for_name("identifier").unwrap()),
        Some(SymbolKind::Token)
    );
    assert!(language.is_extra(language.symbol_for_name("extras_token1").unwrap()));
    assert!(!language.is_visible(language.symbol_for_name("extras_token1").unwrap()));
    assert!(language.is_named(language.symbol_for_name("not_operator").unwrap()));
    assert!(!language.is_named(language.symbol_for_name("+").unwrap()));
    assert_eq!(language.field_count(), 2);
    assert!(language.field_id_for_name("left").is_some());
}

#[test]
fn test_extended_language_appends_externals() {
    let grammar = arithmetic().extend(bang_extension()).unwrap();
    let language = compile(&grammar).unwrap().language;
    let bang = language.symbol_for_name("BANG").unwrap();
    assert_eq!(language.symbol_kind(bang), Some(SymbolKind::External));
    assert!(language.is_external(bang));
    assert_eq!(language.external_index(bang), Some(0));
    assert!(language.is_visible(bang));
    assert!(language.declared_together(bang, language.symbol_for_name("not_operator").unwrap()));
    assert_eq!(language.externals().collect::<Vec<_>>(), vec![bang]);

    let start = language.valid_tokens(StateId::START).unwrap();
    assert!(start.contains(bang));
    assert!(matches!(language.action(StateId::START, bang), Action::Shift(_)));
}

#[test]
fn test_hidden_external_is_invisible() {
    let grammar = arithmetic()
        .extend(GrammarExtension::new().external("_indent").rule(
            "statement",
            seq([
                weft::grammar::optional(sym("_indent")),
                weft::grammar::repeat1(sym("expression")),
                string("\n"),
            ]),
        ))
        .unwrap();
    let language = compile(&grammar).unwrap().language;
    let indent = language.symbol_for_name("_indent").unwrap();
    assert!(!language.is_visible(indent));
}

#[test]
fn test_ambiguity_is_reported_and_resolved_by_shift() {
    let grammar = GrammarBuilder::new("ambiguous")
        .rule("program", repeat(sym("expression")))
        .rule(
            "expression",
            choice([seq([sym("expression"), string("-"), sym("expression")]), sym("number")]),
        )
        .rule("number", pattern("[0-9]+"))
        .build()
        .unwrap();
    let compiled = compile(&grammar).unwrap();
    assert!(!compiled.diagnostics.is_empty());
    let diagnostic = &compiled.diagnostics[0];
    assert!(matches!(diagnostic.kind, ConflictKind::ShiftReduce { .. }));
    assert_eq!(diagnostic.resolution, Resolution::Shift);
    assert!(diagnostic.to_string().contains("resolved as shift"));

    // Shifting makes the operator right-associative.
    let tree = Parser::new(compiled.language).parse("1 - 2 - 3");
    assert!(tree.errors().is_empty());
    assert_eq!(
        tree.to_sexp(),
        "(program (expression (expression (number)) \
         (expression (expression (number)) (expression (number)))))"
    );
}

#[test]
fn test_canonical_tables_parse_the_same() {
    let grammar = arithmetic().extend(bang_extension()).unwrap();
    let lalr = compile(&grammar).unwrap().language;
    let canonical = compile_with(&grammar, CompileOptions::default().with_lalr(false))
        .unwrap()
        .language;
    assert!(lalr.state_count() <= canonical.state_count());

    let scanners = common::bang_scanners();
    for source in ["!x + 1\n!y\n", "x !y\n", "(a\n", "a * (b + c) d\n) e\n"] {
        let a = Parser::new(Arc::clone(&lalr)).with_scanners(&scanners).parse(source);
        let b = Parser::new(Arc::clone(&canonical)).with_scanners(&scanners).parse(source);
        assert_eq!(a.to_sexp(), b.to_sexp(), "{source:?}");
    }
}

#[test]
fn test_shaped_external_reports_lexical_overlap() {
    let grammar = arithmetic()
        .extend(
            GrammarExtension::new()
                .external_token(ExternalToken::with_shape("BANG", string("!")))
                .rule(
                    "statement",
                    choice([
                        seq([sym("BANG"), sym("expression"), string("\n")]),
                        seq([weft::grammar::repeat1(sym("expression")), string("\n")]),
                    ]),
                ),
        )
        .unwrap();
    let compiled = compile(&grammar).unwrap();
    let overlap = compiled
        .diagnostics
        .iter()
        .find(|diagnostic| matches!(diagnostic.kind, ConflictKind::LexicalOverlap { .. }))
        .expect("overlap reported");
    assert_eq!(
        overlap.kind,
        ConflictKind::LexicalOverlap {
            external: "BANG".into(),
            internal: "not_operator".into(),
        }
    );
    assert_eq!(overlap.resolution, Resolution::ExternalFirst);

    let quiet = compile_with(&grammar, CompileOptions::default().with_lexical_overlaps(false)).unwrap();
    assert!(quiet.diagnostics.is_empty());

    // Declaring the pair silences the report.
    let declared = grammar
        .extend(GrammarExtension::new().conflict(["BANG", "not_operator"]))
        .unwrap();
    assert!(compile(&declared).unwrap().diagnostics.is_empty());
}

#[test]
fn test_unreachable_rule_is_structural() {
    let grammar = GrammarBuilder::new("orphans")
        .rule("program", repeat(sym("word")))
        .rule("word", pattern("[a-z]+"))
        .rule("orphan", seq([sym("word"), sym("word")]))
        .build()
        .unwrap();
    assert_eq!(
        compile(&grammar).unwrap_err(),
        GrammarError::UnreachableRule {
            rule: "orphan".into()
        }
    );
}

#[test]
fn test_invalid_pattern_is_structural() {
    let grammar = GrammarBuilder::new("broken")
        .rule("program", repeat(sym("word")))
        .rule("word", pattern("[a-z"))
        .build()
        .unwrap();
    assert!(matches!(
        compile(&grammar),
        Err(GrammarError::InvalidPattern { .. })
    ));
}

#[test]
fn test_language_is_shared_between_parsers() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<weft::Language>();

    let language = compile(&arithmetic()).unwrap().language;
    let first = Parser::new(Arc::clone(&language));
    let second = first.clone();
    assert!(Arc::ptr_eq(first.language(), second.language()));
    assert_eq!(Arc::strong_count(&language), 3);
}
