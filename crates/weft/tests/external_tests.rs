//! External scanners layered onto a base grammar through `extend`
//!
//! The arithmetic grammar treats `!` as a prefix operator everywhere. The
//! `BANG` extension recognises `!` as a statement marker, but only in the
//! first column, so the same character lexes differently by position.

mod common;

use common::{
    arithmetic, arithmetic_language, bang_language, bang_scanners, comment_language,
    comment_scanners,
};
use weft::{Edit, Parser, ScanCursor, SyntaxTree};

fn kinds_at(tree: &SyntaxTree, name: &str) -> Vec<usize> {
    tree.root_node()
        .descendants()
        .into_iter()
        .filter(|node| node.kind_name() == name)
        .map(|node| node.start_byte())
        .collect()
}

#[test]
fn test_bang_at_line_start() {
    let parser = Parser::new(bang_language()).with_scanners(&bang_scanners());
    let tree = parser.parse("!x + 1\n!y\n");

    assert!(tree.errors().is_empty(), "{:?}", tree.errors());
    assert_eq!(
        tree.to_sexp(),
        "(program \
         (statement (BANG) (expression left: (expression (identifier)) right: (expression (number)))) \
         (statement (BANG) (expression (identifier))))"
    );
    assert_eq!(kinds_at(&tree, "BANG"), vec![0, 7]);
    assert!(kinds_at(&tree, "not_operator").is_empty());

    let statements = tree.root_node().named_children();
    assert_eq!(statements.len(), 2);
    let first = statements[0].child(0).unwrap();
    assert_eq!(first.kind_name(), "BANG");
    assert_eq!(first.text(), "!");
}

#[test]
fn test_bang_inside_line_is_operator() {
    let parser = Parser::new(bang_language()).with_scanners(&bang_scanners());
    let tree = parser.parse("x !y\n");

    assert!(tree.errors().is_empty());
    assert_eq!(
        tree.to_sexp(),
        "(program (statement (expression (identifier)) \
         (expression (not_operator) (expression (identifier)))))"
    );
    assert!(kinds_at(&tree, "BANG").is_empty());
    assert_eq!(kinds_at(&tree, "not_operator"), vec![2]);
}

#[test]
fn test_indented_bang_is_operator() {
    // The scanner is consulted here, but the column rules it out.
    let parser = Parser::new(bang_language()).with_scanners(&bang_scanners());
    let tree = parser.parse(" !y\n");

    assert!(tree.errors().is_empty());
    assert_eq!(
        tree.to_sexp(),
        "(program (statement (expression (not_operator) (expression (identifier)))))"
    );
}

#[test]
fn test_base_grammar_is_unchanged_by_extension() {
    let base = arithmetic();
    let _ = bang_language();
    assert!(base.externals().is_empty());

    let tree = Parser::new(arithmetic_language()).parse("!x + 1\n");
    assert!(tree.errors().is_empty());
    assert_eq!(
        tree.to_sexp(),
        "(program (statement (expression \
         left: (expression (not_operator) (expression (identifier))) \
         right: (expression (number)))))"
    );
}

#[test]
fn test_missing_scanner_never_matches() {
    let tree = Parser::new(bang_language()).parse("!x\n");
    assert!(tree.errors().is_empty());
    assert!(kinds_at(&tree, "BANG").is_empty());
    assert_eq!(kinds_at(&tree, "not_operator"), vec![0]);
}

#[test]
fn test_scanner_sees_only_valid_positions() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let scanners = weft::ExternalScanners::new().with("BANG", move |cursor: &mut ScanCursor<'_>| {
        counter.fetch_add(1, Ordering::Relaxed);
        common::bang(cursor)
    });
    let parser = Parser::new(bang_language()).with_scanners(&scanners);
    let tree = parser.parse("x + y\n");
    assert!(tree.errors().is_empty());
    // Only at the start of the statement and after its newline.
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn test_comment_marker_overrides_identifier_in_first_column() {
    let parser = Parser::new(comment_language()).with_scanners(&comment_scanners());
    let tree = parser.parse("Cat food\n Cat\nC\n");

    assert!(tree.errors().is_empty(), "{:?}", tree.errors());
    assert_eq!(
        tree.to_sexp(),
        "(program \
         (statement (comment (comment_marker) (comment_text))) \
         (statement (expression (identifier))) \
         (statement (comment (comment_marker))))"
    );
    let identifiers: Vec<_> = tree
        .root_node()
        .descendants()
        .into_iter()
        .filter(|node| node.kind_name() == "identifier")
        .map(|node| node.text().into_owned())
        .collect();
    assert_eq!(identifiers, vec!["Cat"]);
}

#[test]
fn test_column_change_is_seen_by_reparse() {
    let parser = Parser::new(bang_language()).with_scanners(&bang_scanners());
    let old = parser.parse("!x\n!y\n");
    assert_eq!(kinds_at(&old, "BANG"), vec![0, 3]);

    // Indenting the second line moves its `!` out of the first column.
    let (edit, source) = Edit::splice(old.source(), 3, 3, b" ");
    let new = parser.reparse(&old, &[edit], &source);
    assert_eq!(kinds_at(&new, "BANG"), vec![0]);
    assert_eq!(kinds_at(&new, "not_operator"), vec![4]);
    assert!(new.same_structure(&parser.parse(&source)));
}

#[test]
fn test_column_restored_by_reparse() {
    let parser = Parser::new(bang_language()).with_scanners(&bang_scanners());
    let old = parser.parse("!x\n !y\n");
    assert_eq!(kinds_at(&old, "BANG"), vec![0]);

    let (edit, source) = Edit::splice(old.source(), 3, 4, b"");
    let new = parser.reparse(&old, &[edit], &source);
    assert_eq!(kinds_at(&new, "BANG"), vec![0, 3]);
    assert!(new.same_structure(&parser.parse(&source)));
}
