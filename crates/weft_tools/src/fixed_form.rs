//! Scanners for fixed-form source layout.
//!
//! Fixed-form files give meaning to columns: a `c`, `C` or `*` in the first
//! column starts a comment line, `!` starts a comment anywhere, and any
//! non-blank character in column 6 continues the previous line. Grammars
//! opt in by declaring the external tokens `_comment_character` and
//! `_line_continuation`.

use weft::{ExternalScanner, ExternalScanners, ScanCursor};

pub const COMMENT_CHARACTER: &str = "_comment_character";
pub const LINE_CONTINUATION: &str = "_line_continuation";

/// Column of the continuation marker, counted from zero.
const CONTINUATION_COLUMN: usize = 5;

/// Which fixed-form token a [`FixedFormScanner`] recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedFormScanner {
    CommentCharacter,
    LineContinuation,
}

impl FixedFormScanner {
    /// Both scanners, registered under their token names.
    #[must_use]
    pub fn scanners() -> ExternalScanners {
        Self::register(ExternalScanners::new())
    }

    #[must_use]
    pub fn register(scanners: ExternalScanners) -> ExternalScanners {
        scanners
            .with(COMMENT_CHARACTER, Self::CommentCharacter)
            .with(LINE_CONTINUATION, Self::LineContinuation)
    }
}

impl ExternalScanner for FixedFormScanner {
    fn scan(&self, cursor: &mut ScanCursor<'_>) -> bool {
        match self {
            Self::CommentCharacter => scan_comment_character(cursor),
            Self::LineContinuation => scan_continuation(cursor),
        }
    }
}

fn scan_comment_character(cursor: &mut ScanCursor<'_>) -> bool {
    let Some(c) = cursor.lookahead() else {
        return false;
    };
    let first_column = matches!(c, 'c' | 'C' | '*') && cursor.column() == 0;
    if first_column || c == '!' {
        cursor.advance();
        return true;
    }
    false
}

fn scan_continuation(cursor: &mut ScanCursor<'_>) -> bool {
    match cursor.lookahead() {
        Some(c) if !matches!(c, ' ' | '\t' | '\n' | '\r') => {
            if cursor.column() != CONTINUATION_COLUMN {
                return false;
            }
            cursor.advance();
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use weft::grammar::{choice, optional, pattern, repeat, seq, string, sym, token};
    use weft::{GrammarBuilder, Language, Parser, compile};

    fn language() -> Arc<Language> {
        let grammar = GrammarBuilder::new("fixed_form")
            .rule("program", repeat(sym("_line")))
            .rule(
                "_line",
                choice([sym("comment"), sym("assignment"), string("\n")]),
            )
            .rule(
                "comment",
                seq([sym("_comment_character"), optional(token(pattern("[^\n]+"))), string("\n")]),
            )
            .rule(
                "assignment",
                seq([
                    sym("identifier"),
                    string("="),
                    sym("value"),
                    repeat(seq([
                        string("\n"),
                        sym("_line_continuation"),
                        string("+"),
                        sym("value"),
                    ])),
                    string("\n"),
                ]),
            )
            .rule("value", choice([sym("identifier"), sym("number")]))
            .rule("identifier", pattern("[a-zA-Z][a-zA-Z0-9]*"))
            .rule("number", pattern("[0-9]+"))
            .external(COMMENT_CHARACTER)
            .external(LINE_CONTINUATION)
            .conflict([COMMENT_CHARACTER, "identifier"])
            .extras([pattern("[ \t]")])
            .build()
            .unwrap();
        compile(&grammar).unwrap().language
    }

    fn parse(source: &str) -> weft::SyntaxTree {
        Parser::new(language())
            .with_scanners(&FixedFormScanner::scanners())
            .parse(source)
    }

    #[test]
    fn test_comment_only_in_first_column() {
        let tree = parse("c a comment\n      count = 1\n");
        assert!(tree.errors().is_empty(), "{:?}", tree.errors());
        assert_eq!(
            tree.to_sexp(),
            "(program (comment) (assignment (identifier) (value (number))))"
        );
    }

    #[test]
    fn test_bang_comment_anywhere() {
        let tree = parse("      ! trailing note\n");
        assert!(tree.errors().is_empty(), "{:?}", tree.errors());
        assert_eq!(tree.to_sexp(), "(program (comment))");
    }

    #[test]
    fn test_continuation_in_column_six() {
        let tree = parse("      x = a\n     &+ b\n");
        assert!(tree.errors().is_empty(), "{:?}", tree.errors());
        assert_eq!(
            tree.to_sexp(),
            "(program (assignment (identifier) (value (identifier)) (value (identifier))))"
        );
    }

    #[test]
    fn test_marker_outside_column_six_is_an_error() {
        let tree = parse("      x = a\n    &+ b\n");
        assert!(!tree.errors().is_empty());
    }
}
