//! Grammars and scanners shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use weft::grammar::{
    choice, field, optional, pattern, prec, prec_left, repeat, repeat1, seq, string, sym,
};
use weft::{ExternalScanners, Grammar, GrammarBuilder, GrammarExtension, Language, ScanCursor, compile};

/// Line-oriented arithmetic: every line is a statement made of one or more
/// expressions, `!` is a prefix operator.
pub fn arithmetic() -> Grammar {
    GrammarBuilder::new("arithmetic")
        .rule("program", repeat(sym("statement")))
        .rule("statement", seq([repeat1(sym("expression")), string("\n")]))
        .rule(
            "expression",
            choice([
                prec_left(
                    1,
                    seq([
                        field("left", sym("expression")),
                        string("+"),
                        field("right", sym("expression")),
                    ]),
                ),
                prec_left(
                    2,
                    seq([
                        field("left", sym("expression")),
                        string("*"),
                        field("right", sym("expression")),
                    ]),
                ),
                prec(3, seq([sym("not_operator"), sym("expression")])),
                seq([string("("), sym("expression"), string(")")]),
                sym("identifier"),
                sym("number"),
            ]),
        )
        .rule("not_operator", string("!"))
        .rule("identifier", pattern("[a-zA-Z_][a-zA-Z0-9_]*"))
        .rule("number", pattern("[0-9]+"))
        .extras([pattern("[ \t]")])
        .build()
        .expect("arithmetic grammar is valid")
}

/// Adds a `BANG` statement marker recognised only in the first column.
pub fn bang_extension() -> GrammarExtension {
    GrammarExtension::new()
        .name("arithmetic_bang")
        .external("BANG")
        .conflict(["BANG", "not_operator"])
        .rule(
            "statement",
            choice([
                seq([sym("BANG"), sym("expression"), string("\n")]),
                seq([repeat1(sym("expression")), string("\n")]),
            ]),
        )
}

/// Adds comment lines introduced by a `C` in the first column.
pub fn comment_extension() -> GrammarExtension {
    GrammarExtension::new()
        .name("arithmetic_comments")
        .external("comment_marker")
        .conflict(["comment_marker", "identifier"])
        .rule(
            "statement",
            choice([
                seq([sym("comment"), string("\n")]),
                seq([repeat1(sym("expression")), string("\n")]),
            ]),
        )
        .rule("comment", seq([sym("comment_marker"), optional(sym("comment_text"))]))
        .rule("comment_text", pattern("[^\n]+"))
}

pub fn bang(cursor: &mut ScanCursor<'_>) -> bool {
    if cursor.column() == 0 && cursor.lookahead() == Some('!') {
        cursor.advance();
        return true;
    }
    false
}

pub fn comment_marker(cursor: &mut ScanCursor<'_>) -> bool {
    if cursor.column() == 0 && cursor.lookahead() == Some('C') {
        cursor.advance();
        return true;
    }
    false
}

pub fn language(grammar: &Grammar) -> Arc<Language> {
    compile(grammar).expect("grammar compiles").language
}

pub fn arithmetic_language() -> Arc<Language> {
    language(&arithmetic())
}

pub fn bang_language() -> Arc<Language> {
    let grammar = arithmetic()
        .extend(bang_extension())
        .expect("extension is valid");
    language(&grammar)
}

pub fn bang_scanners() -> ExternalScanners {
    ExternalScanners::new().with("BANG", bang)
}

pub fn comment_language() -> Arc<Language> {
    let grammar = arithmetic()
        .extend(comment_extension())
        .expect("extension is valid");
    language(&grammar)
}

pub fn comment_scanners() -> ExternalScanners {
    ExternalScanners::new().with("comment_marker", comment_marker)
}

/// Checks that every node's children are ordered, disjoint and inside it.
pub fn assert_spans_nested(tree: &weft::SyntaxTree) {
    for node in tree.root_node().descendants() {
        let range = node.text_range();
        let mut cursor = range.start();
        for child in node.children() {
            let child_range = child.text_range();
            assert!(
                child_range.start() >= cursor,
                "{child:?} overlaps its previous sibling in {node:?}"
            );
            assert!(child_range.end() <= range.end(), "{child:?} escapes {node:?}");
            cursor = child_range.end();
        }
    }
}
