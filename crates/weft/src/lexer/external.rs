//! External token recognizers.
//!
//! An external token is declared by name in the grammar and recognized by
//! code supplied at parse time. Scanners are registered by token name in
//! [`ExternalScanners`] and are only called where the parser can accept
//! their token, before any grammar-internal pattern.

use crate::compile::Language;
use crate::lexer::tokenizer::{Unit, decode};
use compact_str::CompactString;
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;

/// Recognizer for one external token.
///
/// Scanners are shared between threads parsing different buffers, so they
/// must not rely on unsynchronised shared state.
pub trait ExternalScanner: Send + Sync {
    /// Tries to recognise the token at the cursor. On `true` the token ends
    /// at the last [`ScanCursor::mark_end`], or at the cursor position when
    /// the end was never marked.
    fn scan(&self, cursor: &mut ScanCursor<'_>) -> bool;
}

impl<F> ExternalScanner for F
where
    F: Fn(&mut ScanCursor<'_>) -> bool + Send + Sync,
{
    fn scan(&self, cursor: &mut ScanCursor<'_>) -> bool {
        self(cursor)
    }
}

/// Read-only view of the buffer handed to an [`ExternalScanner`].
///
/// The cursor records every byte the scanner looks at; incremental
/// reparsing uses that window to decide whether the token can be reused.
#[derive(Debug)]
pub struct ScanCursor<'a> {
    source: &'a [u8],
    start: usize,
    position: usize,
    marked_end: Option<usize>,
    low: usize,
    high: usize,
}

impl<'a> ScanCursor<'a> {
    pub(crate) const fn new(source: &'a [u8], start: usize) -> Self {
        Self {
            source,
            start,
            position: start,
            marked_end: None,
            low: start,
            high: start,
        }
    }

    /// Character at the cursor; `None` at end of input. Invalid UTF-8
    /// reads as `U+FFFD`.
    pub fn lookahead(&mut self) -> Option<char> {
        match decode(self.source, self.position) {
            Unit::Char(c, len) => {
                self.touch(self.position + len);
                Some(c)
            }
            Unit::Invalid => {
                self.touch(self.position + 1);
                Some(char::REPLACEMENT_CHARACTER)
            }
            Unit::End => {
                self.touch(self.source.len() + 1);
                None
            }
        }
    }

    /// Moves past the character at the cursor. Does nothing at the end.
    pub fn advance(&mut self) {
        self.position += match decode(self.source, self.position) {
            Unit::Char(_, len) => len,
            Unit::Invalid => 1,
            Unit::End => 0,
        };
        self.touch(self.position);
    }

    /// Ends the token at the current position. Later advances only look
    /// ahead.
    pub fn mark_end(&mut self) {
        self.marked_end = Some(self.position);
    }

    /// Byte offset from the start of the current line.
    pub fn column(&mut self) -> usize {
        let before = self.source.get(..self.position).unwrap_or_default();
        match memchr::memrchr(b'\n', before) {
            Some(newline) => {
                self.low = self.low.min(newline);
                self.position - newline - 1
            }
            None => {
                self.low = 0;
                self.position
            }
        }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Where the scan started.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    pub fn is_at_eof(&mut self) -> bool {
        let eof = self.position >= self.source.len();
        if eof {
            self.touch(self.source.len() + 1);
        }
        eof
    }

    fn touch(&mut self, end: usize) {
        self.high = self.high.max(end);
    }

    pub(crate) fn token_end(&self) -> usize {
        self.marked_end.unwrap_or(self.position)
    }

    /// Bytes inspected so far, `[low, high)`.
    pub(crate) const fn inspected(&self) -> (usize, usize) {
        (self.low, self.high)
    }
}

/// Scanners keyed by external token name.
#[derive(Clone, Default)]
pub struct ExternalScanners {
    scanners: HashMap<CompactString, Arc<dyn ExternalScanner>, ahash::RandomState>,
}

impl ExternalScanners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `scanner` for the external token `name`.
    #[must_use]
    pub fn with(mut self, name: &str, scanner: impl ExternalScanner + 'static) -> Self {
        self.insert(name, scanner);
        self
    }

    pub fn insert(&mut self, name: &str, scanner: impl ExternalScanner + 'static) {
        self.scanners.insert(name.into(), Arc::new(scanner));
    }

    pub fn insert_shared(&mut self, name: &str, scanner: Arc<dyn ExternalScanner>) {
        self.scanners.insert(name.into(), scanner);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExternalScanner>> {
        self.scanners.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// Scanners in the order of `language`'s external tokens. Tokens
    /// without a scanner never match.
    pub(crate) fn resolve(&self, language: &Language) -> Vec<Option<Arc<dyn ExternalScanner>>> {
        language
            .externals()
            .map(|symbol| {
                let name = language.symbol_name(symbol);
                let scanner = self.scanners.get(name).cloned();
                if scanner.is_none() {
                    tracing::warn!(token = name, "no scanner registered for external token");
                }
                scanner
            })
            .collect()
    }
}

impl fmt::Debug for ExternalScanners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.scanners.keys().map(CompactString::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ExternalScanners")
            .field("tokens", &names)
            .finish()
    }
}
