//! Context-aware lexing: valid-token sets, external scanners first, and
//! the tie-breaking rules between overlapping internal tokens.

mod common;

use std::sync::Arc;
use weft::compile::TokenSet;
use weft::grammar::{choice, pattern, prec, repeat, sym};
use weft::lexer::{LexMode, Lexer};
use weft::syntax::StateId;
use weft::{ExternalScanner, GrammarBuilder, Language, Parser, Symbol, TextRange, TextSize};

fn hex_words(declare_conflict: bool) -> Arc<Language> {
    let mut builder = GrammarBuilder::new("hex_words")
        .rule("program", repeat(sym("value")))
        .rule("value", choice([sym("hex"), sym("identifier")]))
        .rule("hex", prec(2, pattern("[0-9a-f]+")))
        .rule("identifier", pattern("[a-z]+"));
    if declare_conflict {
        builder = builder.conflict(["hex", "identifier"]);
    }
    common::language(&builder.build().unwrap())
}

fn start_tokens(language: &Language) -> TokenSet {
    language.valid_tokens(StateId::START).cloned().unwrap_or_default()
}

fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(TextSize::new(start), TextSize::new(end))
}

#[test]
fn test_declared_precedence_beats_longer_match() {
    let language = hex_words(true);
    let lexer = Lexer::new(&language, b"facet", &[]);
    let token = lexer.next_token(0, &start_tokens(&language), LexMode::default());
    assert_eq!(language.symbol_name(token.kind), "hex");
    assert_eq!(token.range, range(0, 4));

    let tree = Parser::new(language).parse("facet");
    assert_eq!(tree.to_sexp(), "(program (value (hex)) (value (identifier)))");
}

#[test]
fn test_undeclared_overlap_takes_longest_match() {
    let language = hex_words(false);
    let tree = Parser::new(language.clone()).parse("facet");
    assert_eq!(tree.to_sexp(), "(program (value (identifier)))");

    // Same length: precedence decides.
    let tree = Parser::new(language).parse("face zoo");
    assert_eq!(
        tree.to_sexp(),
        "(program (value (hex)) (value (identifier)))"
    );
}

#[test]
fn test_only_valid_tokens_are_produced() {
    let language = common::arithmetic_language();
    let lexer = Lexer::new(&language, b"!x", &[]);
    let valid = start_tokens(&language);
    let token = lexer.next_token(0, &valid, LexMode::default());
    assert_eq!(language.symbol_name(token.kind), "not_operator");

    let plus = language.symbol_for_name("+").unwrap();
    assert!(!valid.contains(plus));
    // Not valid here, but still reported as what it is.
    let lexer = Lexer::new(&language, b"+", &[]);
    let token = lexer.next_token(0, &valid, LexMode::default());
    assert_eq!(token.kind, plus);
}

#[test]
fn test_unrecognized_input_is_one_character() {
    let language = common::arithmetic_language();
    let valid = start_tokens(&language);

    let lexer = Lexer::new(&language, "é#".as_bytes(), &[]);
    let token = lexer.next_token(0, &valid, LexMode::default());
    assert!(token.is_error());
    assert_eq!(token.range, range(0, 2));

    let invalid = [0xe2, 0x82];
    let lexer = Lexer::new(&language, &invalid, &[]);
    let token = lexer.next_token(0, &valid, LexMode::default());
    assert!(token.is_error());
    assert_eq!(token.range, range(0, 1));
}

#[test]
fn test_end_of_input_looks_one_past_the_end() {
    let language = common::arithmetic_language();
    let lexer = Lexer::new(&language, b"ab", &[]);
    let token = lexer.next_token(2, &start_tokens(&language), LexMode::default());
    assert!(token.is_end());
    assert_eq!(token.kind, Symbol::END);
    assert_eq!(token.range, range(2, 2));
    assert_eq!(token.inspected.end(), TextSize::new(3));

    let token = lexer.next_token(0, &start_tokens(&language), LexMode::default());
    assert_eq!(token.range, range(0, 2));
    // The identifier only ends because the input does.
    assert_eq!(token.inspected.end(), TextSize::new(3));
}

#[test]
fn test_external_scanner_runs_first_and_records_lookbehind() {
    let language = common::bang_language();
    let scanners: Vec<Option<Arc<dyn ExternalScanner>>> = vec![Some(Arc::new(common::bang))];
    let source = b"x\n!y";
    let lexer = Lexer::new(&language, source, &scanners);
    let valid = start_tokens(&language);

    let token = lexer.next_token(2, &valid, LexMode::default());
    assert_eq!(language.symbol_name(token.kind), "BANG");
    assert_eq!(token.range, range(2, 3));
    // The column check read back to the newline.
    assert_eq!(token.inspected.start(), TextSize::new(1));

    // Away from the first column the internal operator matches.
    let lexer = Lexer::new(&language, b" !y", &scanners);
    let token = lexer.next_token(1, &valid, LexMode::default());
    assert_eq!(language.symbol_name(token.kind), "not_operator");
}

#[test]
fn test_external_scanner_skipped_when_not_valid() {
    let language = common::bang_language();
    let scanners: Vec<Option<Arc<dyn ExternalScanner>>> = vec![Some(Arc::new(common::bang))];
    let lexer = Lexer::new(&language, b"!y", &scanners);
    let bang = language.symbol_for_name("BANG").unwrap();
    let mut valid = start_tokens(&language);
    valid.remove(bang);
    let token = lexer.next_token(0, &valid, LexMode::default());
    assert_eq!(language.symbol_name(token.kind), "not_operator");
}

#[test]
fn test_literals_win_ties_with_patterns() {
    let grammar = GrammarBuilder::new("keywords")
        .rule("program", repeat(choice([sym("keyword"), sym("identifier")])))
        .rule("keyword", weft::grammar::string("let"))
        .rule("identifier", pattern("[a-z]+"))
        .build()
        .unwrap();
    let language = common::language(&grammar);
    let tree = Parser::new(language).parse("let letter");
    assert_eq!(tree.to_sexp(), "(program (keyword) (identifier))");
}
