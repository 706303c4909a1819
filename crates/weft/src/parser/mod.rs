//! # Parser Engine
//!
//! Drives a compiled [`Language`] over a buffer and builds a
//! [`SyntaxTree`].
//!
//! ## Overview
//!
//! The engine is a deterministic LR parser that pulls tokens from the
//! context-aware [`Lexer`](crate::lexer::Lexer) one at a time, passing the
//! tokens valid in the current state. Extras are kept in the tree as extra
//! leaves between grammar symbols.
//!
//! Parsing never fails. On a table miss the parser inserts a missing token,
//! pops symbols into an `ERROR` node or skips the offending token, and
//! records the problem on the tree ([`SyntaxTree::errors`]). Every repair
//! consumes input or is tried at most once per token, so recovery always
//! terminates.
//!
//! ## Stepping and cancellation
//!
//! [`Parser::session`] returns a [`ParseSession`] that can be driven a few
//! tokens at a time. A cancellation flag in [`ParseOptions`] is checked
//! every [`ParseOptions::check_interval`] tokens; a cancelled parse yields
//! the partial tree built so far.
//!
//! ## Example
//!
//! ```rust
//! use weft::compile::compile;
//! use weft::grammar::{GrammarBuilder, pattern, repeat, seq, string, sym};
//! use weft::Parser;
//!
//! let grammar = GrammarBuilder::new("lists")
//!     .rule("program", repeat(sym("item")))
//!     .rule("item", seq([sym("word"), string(";")]))
//!     .rule("word", pattern("[a-z]+"))
//!     .build()?;
//! let language = compile(&grammar)?.language;
//!
//! let tree = Parser::new(language).parse("ab; cd;");
//! assert_eq!(tree.to_sexp(), "(program (item (word)) (item (word)))");
//! assert!(tree.errors().is_empty());
//! # Ok::<(), weft::error::GrammarError>(())
//! ```

mod engine;
#[cfg(feature = "parallel")]
mod parallel;
pub(crate) mod recovery;
pub(crate) mod stack;

pub use engine::{ParseSession, ParseStatus};
#[cfg(feature = "parallel")]
pub use parallel::parse_batch;

use crate::compile::Language;
use crate::incremental::reuse::ReuseCursor;
use crate::incremental::{Edit, EditMap};
use crate::lexer::{ExternalScanner, ExternalScanners};
use crate::syntax::SyntaxTree;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Run-time knobs for a parse
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Recovered errors allowed before the rest of the input is wrapped in
    /// one error node. `None` is unbounded.
    pub max_errors: Option<usize>,
    /// Set to `true` from any thread to stop the parse.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Tokens lexed between checks of the cancellation flag.
    pub check_interval: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_errors: None,
            cancellation: None,
            check_interval: 1,
        }
    }
}

impl ParseOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = Some(max_errors);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(flag);
        self
    }

    /// Zero is treated as one.
    #[must_use]
    pub fn with_check_interval(mut self, tokens: usize) -> Self {
        self.check_interval = tokens.max(1);
        self
    }
}

/// Parses buffers with one compiled language and a set of external
/// scanners.
///
/// Cheap to clone; clones share the language and the scanners. A `Parser`
/// is `Send + Sync`, so one instance can serve many threads.
#[derive(Clone)]
pub struct Parser {
    language: Arc<Language>,
    scanners: Arc<[Option<Arc<dyn ExternalScanner>>]>,
    options: ParseOptions,
}

impl Parser {
    /// A parser without external scanners. External tokens never match
    /// until scanners are added with [`with_scanners`](Self::with_scanners).
    #[must_use]
    pub fn new(language: Arc<Language>) -> Self {
        let scanners = language.externals().map(|_| None).collect();
        Self {
            language,
            scanners,
            options: ParseOptions::default(),
        }
    }

    /// Binds scanners to the language's external tokens by name.
    #[must_use]
    pub fn with_scanners(mut self, scanners: &ExternalScanners) -> Self {
        self.scanners = scanners.resolve(&self.language).into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn language(&self) -> &Arc<Language> {
        &self.language
    }

    #[must_use]
    pub const fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parses `source` from scratch.
    #[must_use]
    pub fn parse(&self, source: impl AsRef<[u8]>) -> SyntaxTree {
        self.session(source).finish()
    }

    /// Starts a stepwise parse of `source`.
    #[must_use]
    pub fn session(&self, source: impl AsRef<[u8]>) -> ParseSession {
        self.start(Arc::from(source.as_ref()), None)
    }

    /// Parses `source`, the result of applying `edits` to the buffer of
    /// `old`, reusing the subtrees of `old` the edits cannot have changed.
    ///
    /// The result is the tree [`parse`](Self::parse) would produce. When
    /// `old` belongs to another language, was cancelled, or the edits do
    /// not account for the new length, nothing is reused.
    #[must_use]
    pub fn reparse(&self, old: &SyntaxTree, edits: &[Edit], source: impl AsRef<[u8]>) -> SyntaxTree {
        self.reparse_session(old, edits, source).finish()
    }

    /// Stepwise form of [`reparse`](Self::reparse).
    #[must_use]
    pub fn reparse_session(
        &self,
        old: &SyntaxTree,
        edits: &[Edit],
        source: impl AsRef<[u8]>,
    ) -> ParseSession {
        let source: Arc<[u8]> = Arc::from(source.as_ref());
        let map = EditMap::new(edits);
        let expected = i64::try_from(old.source().len())
            .ok()
            .map(|len| len + map.delta());
        let consistent = expected == i64::try_from(source.len()).ok();
        let same_language =
            Arc::ptr_eq(old.language(), &self.language) || **old.language() == *self.language;
        let reuse = if consistent && same_language && old.is_complete() {
            Some(ReuseCursor::new(
                Arc::clone(old.green()),
                map,
                Arc::clone(old.shared_source()),
            ))
        } else {
            tracing::debug!(
                consistent,
                same_language,
                complete = old.is_complete(),
                "reparsing without reuse"
            );
            None
        };
        self.start(source, reuse)
    }

    fn start(&self, source: Arc<[u8]>, reuse: Option<ReuseCursor>) -> ParseSession {
        ParseSession::new(
            Arc::clone(&self.language),
            Arc::clone(&self.scanners),
            self.options.clone(),
            source,
            reuse,
        )
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scanners = self.scanners.iter().filter(|scanner| scanner.is_some()).count();
        f.debug_struct("Parser")
            .field("language", &self.language.name())
            .field("scanners", &scanners)
            .field("options", &self.options)
            .finish()
    }
}

/// Parses `source` with `language` and `scanners`.
#[must_use]
pub fn parse(language: &Arc<Language>, source: impl AsRef<[u8]>, scanners: &ExternalScanners) -> SyntaxTree {
    Parser::new(Arc::clone(language))
        .with_scanners(scanners)
        .parse(source)
}

/// Reparses `source` after `edits`, reusing what it can from `old`.
#[must_use]
pub fn reparse(
    language: &Arc<Language>,
    old: &SyntaxTree,
    edits: &[Edit],
    source: impl AsRef<[u8]>,
    scanners: &ExternalScanners,
) -> SyntaxTree {
    Parser::new(Arc::clone(language))
        .with_scanners(scanners)
        .reparse(old, edits, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::error::{ParseDiagnostic, Recovery};
    use crate::grammar::{GrammarBuilder, choice, pattern, repeat, seq, string, sym};
    use std::sync::atomic::Ordering;

    fn items() -> Arc<Language> {
        let grammar = GrammarBuilder::new("items")
            .rule("program", repeat(sym("item")))
            .rule(
                "item",
                choice([
                    seq([sym("word"), string(";")]),
                    seq([string("("), sym("word"), string(")")]),
                ]),
            )
            .rule("word", pattern("[a-z]+"))
            .build()
            .unwrap();
        compile(&grammar).unwrap().language
    }

    #[test]
    fn test_parse_keeps_extras() {
        let tree = Parser::new(items()).parse(" a;\n");
        assert_eq!(tree.root_node().end_byte(), 4);
        assert_eq!(tree.to_sexp(), "(program (item (word)))");
        assert!(tree.is_complete());
    }

    #[test]
    fn test_empty_input() {
        let tree = Parser::new(items()).parse("");
        assert_eq!(tree.to_sexp(), "(program)");
        assert!(tree.errors().is_empty());
    }

    #[test]
    fn test_missing_token_inserted() {
        let tree = Parser::new(items()).parse("a");
        assert_eq!(tree.to_sexp(), "(program (item (word) (MISSING ;)))");
        match &tree.errors()[0] {
            ParseDiagnostic::Syntax(error) => assert_eq!(error.recovery, Recovery::Inserted),
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_token_skipped() {
        let tree = Parser::new(items()).parse("a; ) b;");
        assert_eq!(tree.root_node().end_byte(), 7);
        assert!(tree.root_node().has_error());
        assert_eq!(
            tree.to_sexp(),
            "(program (item (word)) (ERROR) (item (word)))"
        );
    }

    #[test]
    fn test_insertion_after_reductions() {
        // The stray `;` fits once an empty item is assumed before it.
        let tree = Parser::new(items()).parse("a; ; b;");
        assert_eq!(
            tree.to_sexp(),
            "(program (item (word)) (item (MISSING word)) (item (word)))"
        );
        match &tree.errors()[0] {
            ParseDiagnostic::Syntax(error) => assert_eq!(error.recovery, Recovery::Inserted),
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn test_popped_symbols_wrapped_in_error() {
        let tree = Parser::new(items()).parse("( (a)");
        assert_eq!(tree.to_sexp(), "(program (ERROR) (item (word)))");
        match &tree.errors()[0] {
            ParseDiagnostic::Syntax(error) => {
                assert_eq!(error.recovery, Recovery::Popped { frames: 1 });
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_bytes_become_error_tokens() {
        let tree = Parser::new(items()).parse("a; # b;");
        assert!(matches!(tree.errors()[0], ParseDiagnostic::Lex(_)));
        assert_eq!(tree.root_node().end_byte(), 7);
    }

    #[test]
    fn test_max_errors_truncates() {
        let parser = Parser::new(items()).with_options(ParseOptions::new().with_max_errors(0));
        let tree = parser.parse("a; ; b; c;");
        assert_eq!(tree.errors().len(), 1);
        assert_eq!(tree.root_node().end_byte(), 10);
        match &tree.errors()[0] {
            ParseDiagnostic::Syntax(error) => assert_eq!(error.recovery, Recovery::Truncated),
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn test_session_steps_and_cancels() {
        let flag = Arc::new(AtomicBool::new(false));
        let parser =
            Parser::new(items()).with_options(ParseOptions::new().with_cancellation(flag.clone()));
        let mut session = parser.session("a; b; c;");
        assert_eq!(session.run(2), ParseStatus::InProgress);
        assert_eq!(session.position(), 2);
        flag.store(true, Ordering::Relaxed);
        assert_eq!(session.step(), ParseStatus::Cancelled);
        let tree = session.finish();
        assert!(!tree.is_complete());
        assert_eq!(tree.root_node().end_byte(), 2);
    }

    #[test]
    fn test_parser_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Parser>();
        assert_send_sync::<SyntaxTree>();
        assert_send_sync::<ParseSession>();
    }
}
