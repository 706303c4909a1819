//! Incremental reparsing: results equal a fresh parse, and subtrees the
//! edits cannot affect are shared with the previous tree.

mod common;

use common::{arithmetic_language, assert_spans_nested, bang_language, bang_scanners};
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use weft::{Edit, ParseOptions, ParseStatus, Parser, SyntaxNode, SyntaxTree};

fn statements(tree: &SyntaxTree) -> Vec<SyntaxNode> {
    tree.root_node()
        .named_children()
        .into_iter()
        .filter(|node| node.kind_name() == "statement")
        .collect()
}

fn shares(a: &SyntaxNode, b: &SyntaxNode) -> bool {
    match (a.green().as_node(), b.green().as_node()) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn document(lines: usize) -> String {
    let mut out = String::new();
    for line in 0..lines {
        let _ = writeln!(out, "item{line} + {line}");
    }
    out
}

#[test]
fn test_unchanged_statements_are_shared() {
    let parser = Parser::new(arithmetic_language());
    let old = parser.parse("a\nb\nc\n");
    let (edit, source) = Edit::splice(old.source(), 0, 1, b"aa");

    let mut session = parser.reparse_session(&old, &[edit], &source);
    while session.step() == ParseStatus::InProgress {}
    assert_eq!(session.reused_nodes(), 2);
    let new = session.finish();

    assert!(new.same_structure(&parser.parse(&source)));
    let (before, after) = (statements(&old), statements(&new));
    assert!(!shares(&before[0], &after[0]));
    assert!(shares(&before[1], &after[1]));
    assert!(shares(&before[2], &after[2]));
    assert_eq!(after[1].start_byte(), 3);
}

#[test]
fn test_lookahead_into_edit_prevents_reuse() {
    let parser = Parser::new(arithmetic_language());
    let old = parser.parse("a\nb\nc\n");
    // Changing `b` changes what was seen when `a\n` was reduced.
    let (edit, source) = Edit::splice(old.source(), 2, 3, b"bb");
    let new = parser.reparse(&old, &[edit], &source);

    assert!(new.same_structure(&parser.parse(&source)));
    let (before, after) = (statements(&old), statements(&new));
    assert!(!shares(&before[0], &after[0]));
    assert!(!shares(&before[1], &after[1]));
    assert!(shares(&before[2], &after[2]));
}

#[test]
fn test_reparse_lexes_less_than_fresh_parse() {
    let parser = Parser::new(arithmetic_language());
    let text = document(50);
    let old = parser.parse(&text);
    assert!(old.errors().is_empty());

    let at = text.find("item25").unwrap() + "item25".len();
    let (edit, source) = Edit::splice(old.source(), at, at, b"z");

    let mut fresh = parser.session(&source);
    while fresh.step() == ParseStatus::InProgress {}
    let mut incremental = parser.reparse_session(&old, &[edit], &source);
    while incremental.step() == ParseStatus::InProgress {}

    assert!(incremental.reused_nodes() > 0);
    assert!(incremental.tokens_lexed() * 2 < fresh.tokens_lexed());
    let (fresh, incremental) = (fresh.finish(), incremental.finish());
    assert!(incremental.same_structure(&fresh));
    assert_spans_nested(&incremental);
}

#[test]
fn test_edit_that_changes_structure() {
    let parser = Parser::new(arithmetic_language());
    let old = parser.parse("x + 1\ny * 2\n");
    // `+` becomes `*`: the first line regroups.
    let (edit, source) = Edit::splice(old.source(), 2, 3, b"*");
    let new = parser.reparse(&old, &[edit], &source);
    assert!(new.same_structure(&parser.parse(&source)));

    // Joining the lines merges two statements into one.
    let (edit, joined) = Edit::splice(new.source(), 5, 6, b" ");
    let merged = parser.reparse(&new, &[edit], &joined);
    assert!(merged.same_structure(&parser.parse(&joined)));
    assert_eq!(statements(&merged).len(), 1);
}

#[test]
fn test_sequential_edits_compose() {
    let parser = Parser::new(arithmetic_language());
    let old = parser.parse("a\nb\nc\nd\n");
    let (first, middle) = Edit::splice(old.source(), 2, 3, b"bee");
    let (second, source) = Edit::splice(&middle, 8, 9, b"");
    assert_eq!(source, b"a\nbee\nc\n\n");

    let new = parser.reparse(&old, &[first, second], &source);
    assert!(new.same_structure(&parser.parse(&source)));
    assert!(new.root_node().has_error());
}

#[test]
fn test_fixing_an_error_by_reparse() {
    let parser = Parser::new(arithmetic_language());
    let old = parser.parse("x +\ny\n");
    assert!(!old.errors().is_empty());

    let (edit, source) = Edit::splice(old.source(), 3, 3, b" 1");
    let new = parser.reparse(&old, &[edit], &source);
    assert!(new.errors().is_empty());
    assert!(new.same_structure(&parser.parse(&source)));
}

#[test]
fn test_introducing_an_error_by_reparse() {
    let parser = Parser::new(arithmetic_language());
    let old = parser.parse("x + 1\ny\nz\n");
    let edit = Edit::between(old.source(), b"x + 1\n)\nz\n").unwrap();
    let new = parser.reparse(&old, &[edit], "x + 1\n)\nz\n");
    assert!(new.root_node().has_error());
    assert!(new.same_structure(&parser.parse("x + 1\n)\nz\n")));
    assert_eq!(new.errors(), parser.parse("x + 1\n)\nz\n").errors());
}

#[test]
fn test_node_completed_after_recovery_is_rebuilt() {
    let parser = Parser::new(bang_language()).with_scanners(&bang_scanners());
    // `*(` is popped into an error before the first line's expressions are
    // reduced, so those reductions do not hold once `*` parses again.
    let old = parser.parse("a*(\na");
    let (edit, source) = Edit::splice(old.source(), 5, 5, b"");
    let new = parser.reparse(&old, &[edit], &source);
    let fresh = parser.parse(&source);
    assert!(new.same_structure(&fresh), "{}\n{}", new.to_sexp(), fresh.to_sexp());
    assert_eq!(new.errors(), fresh.errors());
}

#[test]
fn test_errors_after_reparse_match_fresh_parse() {
    let parser = Parser::new(bang_language()).with_scanners(&bang_scanners());
    let old = parser.parse("a)(\na");
    let (edit, source) = Edit::splice(old.source(), 2, 3, b"");
    assert_eq!(source, b"a)\na");
    let new = parser.reparse(&old, &[edit], &source);
    let fresh = parser.parse(&source);
    assert!(new.same_structure(&fresh));
    assert_eq!(new.errors(), fresh.errors());
    assert_spans_nested(&new);
}

#[test]
fn test_inconsistent_edits_fall_back_to_fresh_parse() {
    let parser = Parser::new(arithmetic_language());
    let old = parser.parse("a\nb\n");
    // The edit list does not account for the extra byte.
    let mut session = parser.reparse_session(&old, &[], "a\nbb\n");
    while session.step() == ParseStatus::InProgress {}
    assert_eq!(session.reused_nodes(), 0);
    assert!(session.finish().same_structure(&parser.parse("a\nbb\n")));
}

#[test]
fn test_other_language_is_not_reused() {
    let base = Parser::new(arithmetic_language());
    let extended = Parser::new(bang_language()).with_scanners(&bang_scanners());
    let old = base.parse("!x\n");
    let mut session = extended.reparse_session(&old, &[], "!x\n");
    while session.step() == ParseStatus::InProgress {}
    assert_eq!(session.reused_nodes(), 0);
    let new = session.finish();
    assert!(Arc::ptr_eq(new.language(), extended.language()));
    assert!(new.to_sexp().contains("BANG"));
}

#[test]
fn test_cancelled_tree_is_not_reused() {
    let flag = Arc::new(AtomicBool::new(true));
    let cancelled = Parser::new(arithmetic_language())
        .with_options(ParseOptions::new().with_cancellation(flag))
        .parse("a\nb\n");
    assert!(!cancelled.is_complete());

    let parser = Parser::new(arithmetic_language());
    let mut session = parser.reparse_session(&cancelled, &[], "a\nb\n");
    while session.step() == ParseStatus::InProgress {}
    assert_eq!(session.reused_nodes(), 0);
    assert!(session.finish().is_complete());
}

#[test]
fn test_identical_reparse_reuses_whole_tree() {
    let parser = Parser::new(arithmetic_language());
    let text = document(10);
    let old = parser.parse(&text);
    let mut session = parser.reparse_session(&old, &[], &text);
    while session.step() == ParseStatus::InProgress {}
    assert_eq!(session.reused_nodes(), 1);
    assert_eq!(session.tokens_lexed(), 2);
    let new = session.finish();
    assert!(new.same_structure(&old));
}
