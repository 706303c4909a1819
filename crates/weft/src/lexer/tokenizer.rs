use crate::compile::{Language, TokenSet};
use crate::lexer::dfa::Dfa;
use crate::lexer::external::{ExternalScanner, ScanCursor};
use crate::syntax::{Symbol, TextRange, TextSize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::sync::Arc;

/// One decoding step over the raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    Char(char, usize),
    /// A byte that does not start a valid UTF-8 sequence.
    Invalid,
    End,
}

pub(crate) fn decode(source: &[u8], at: usize) -> Unit {
    let rest = source.get(at..).unwrap_or_default();
    if rest.is_empty() {
        return Unit::End;
    }
    let head = &rest[..rest.len().min(4)];
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        Err(error) => std::str::from_utf8(&head[..error.valid_up_to()]).unwrap_or_default(),
    };
    text.chars()
        .next()
        .map_or(Unit::Invalid, |c| Unit::Char(c, c.len_utf8()))
}

/// A lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: Symbol,
    pub range: TextRange,
    /// Bytes looked at to produce the token. The end may be one past the
    /// buffer when the lexer checked for end of input.
    pub inspected: TextRange,
}

impl Token {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.kind.is_error()
    }

    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.kind.index() == Symbol::END.index()
    }

    #[must_use]
    pub const fn len(&self) -> TextSize {
        self.range.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// How the previous token constrains the next one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexMode {
    /// An extra was just consumed, so immediate tokens cannot match.
    pub after_extra: bool,
    /// A zero-width token was just produced here; another one would not
    /// make progress.
    pub forbid_empty: bool,
}

/// Context-aware lexer over one buffer.
///
/// The parser passes the set of tokens valid in its current state; only
/// those are considered, so the same text can lex differently in different
/// states. External scanners are consulted first, in declaration order.
pub struct Lexer<'a> {
    language: &'a Language,
    source: &'a [u8],
    scanners: &'a [Option<Arc<dyn ExternalScanner>>],
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    symbol: Symbol,
    end: usize,
}

/// Furthest bytes looked at while lexing one token.
#[derive(Debug, Clone, Copy)]
struct Window {
    low: usize,
    high: usize,
}

impl Window {
    const fn at(position: usize) -> Self {
        Self {
            low: position,
            high: position,
        }
    }

    fn include(&mut self, low: usize, high: usize) {
        self.low = self.low.min(low);
        self.high = self.high.max(high);
    }

    fn range(self) -> TextRange {
        TextRange::new(TextSize::of(self.low), TextSize::of(self.high))
    }
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(
        language: &'a Language,
        source: &'a [u8],
        scanners: &'a [Option<Arc<dyn ExternalScanner>>],
    ) -> Self {
        Self {
            language,
            source,
            scanners,
        }
    }

    #[must_use]
    pub const fn source(&self) -> &'a [u8] {
        self.source
    }

    /// Produces the token at `position`.
    ///
    /// Never fails: at the end of the buffer the result is the end token,
    /// and bytes no recognizer accepts become a one-character error token.
    /// If no valid token matches but another internal token does, that
    /// token is returned so the parser can report it.
    #[must_use]
    pub fn next_token(&self, position: usize, valid: &TokenSet, mode: LexMode) -> Token {
        let position = position.min(self.source.len());
        let mut window = Window::at(position);

        if let Some(token) = self.scan_external(position, valid, mode, &mut window) {
            return token;
        }

        if position >= self.source.len() {
            window.include(position, self.source.len() + 1);
            return self.token(Symbol::END, position, position, window);
        }

        let internal = self.internal_set(Some(valid), mode);
        if let Some(found) = self.scan_internal(position, &internal, &mut window) {
            return self.token(found.symbol, position, found.end, window);
        }

        // Nothing valid here. Report what the text actually is, if anything.
        let all = self.internal_set(None, mode);
        if let Some(found) = self.scan_internal(position, &all, &mut window) {
            return self.token(found.symbol, position, found.end, window);
        }

        let end = match decode(self.source, position) {
            Unit::Char(_, len) => position + len,
            Unit::Invalid | Unit::End => position + 1,
        };
        window.include(position, end);
        tracing::trace!(position, "unrecognized input");
        self.token(Symbol::ERROR, position, end, window)
    }

    fn token(&self, kind: Symbol, start: usize, end: usize, window: Window) -> Token {
        let token = Token {
            kind,
            range: TextRange::new(TextSize::of(start), TextSize::of(end)),
            inspected: window.range(),
        };
        tracing::trace!(
            kind = self.language.symbol_name(kind),
            range = %token.range,
            "lexed token"
        );
        token
    }

    fn scan_external(
        &self,
        position: usize,
        valid: &TokenSet,
        mode: LexMode,
        window: &mut Window,
    ) -> Option<Token> {
        for (symbol, scanner) in self.language.externals().zip(self.scanners) {
            let Some(scanner) = scanner else {
                continue;
            };
            if !valid.contains(symbol) {
                continue;
            }
            let mut cursor = ScanCursor::new(self.source, position);
            let accepted = scanner.scan(&mut cursor);
            let (low, high) = cursor.inspected();
            window.include(low, high);
            if !accepted {
                continue;
            }
            let end = cursor.token_end().clamp(position, self.source.len());
            if end == position && mode.forbid_empty {
                continue;
            }
            return Some(self.token(symbol, position, end, *window));
        }
        None
    }

    /// Internal tokens to consider: the valid ones, or all of them when
    /// `valid` is `None`.
    fn internal_set(&self, valid: Option<&TokenSet>, mode: LexMode) -> TokenSet {
        let language = self.language;
        (1..language.terminal_count())
            .filter_map(|index| u16::try_from(index).ok().map(Symbol::new))
            .filter(|&symbol| valid.is_none_or(|valid| valid.contains(symbol)))
            .filter(|&symbol| {
                language
                    .token_info(symbol)
                    .is_some_and(|info| valid.is_none() || !(mode.after_extra && info.immediate))
            })
            .collect()
    }

    /// Runs the token DFA from `position` while any wanted token is still
    /// reachable and picks the best accepted candidate.
    fn scan_internal(
        &self,
        position: usize,
        wanted: &TokenSet,
        window: &mut Window,
    ) -> Option<Candidate> {
        if wanted.is_empty() {
            return None;
        }
        let dfa: &Dfa = self.language.dfa();
        let mut candidates: SmallVec<[Candidate; 4]> = SmallVec::new();
        let mut state = Dfa::START;
        let mut cursor = position;
        loop {
            if !dfa.alive(state).is_some_and(|alive| alive.intersects(wanted)) {
                break;
            }
            let (c, len) = match decode(self.source, cursor) {
                Unit::Char(c, len) => (c, len),
                Unit::Invalid => {
                    window.include(position, cursor + 1);
                    break;
                }
                Unit::End => {
                    window.include(position, self.source.len() + 1);
                    break;
                }
            };
            window.include(position, cursor + len);
            let Some(next) = dfa.step(state, c) else {
                break;
            };
            state = next;
            cursor += len;
            for &symbol in dfa.accepting(state) {
                if !wanted.contains(symbol) {
                    continue;
                }
                match candidates.iter_mut().find(|found| found.symbol == symbol) {
                    Some(found) => found.end = cursor,
                    None => candidates.push(Candidate { symbol, end: cursor }),
                }
            }
        }

        let mut best: Option<Candidate> = None;
        for candidate in candidates {
            best = match best {
                Some(current) if self.compare(candidate, current) != Ordering::Greater => {
                    Some(current)
                }
                _ => Some(candidate),
            };
        }
        best
    }

    /// Orders two candidates that matched at the same position.
    fn compare(&self, a: Candidate, b: Candidate) -> Ordering {
        let language = self.language;
        let (Some(info_a), Some(info_b)) =
            (language.token_info(a.symbol), language.token_info(b.symbol))
        else {
            return Ordering::Equal;
        };
        if language.declared_together(a.symbol, b.symbol)
            && info_a.precedence != info_b.precedence
        {
            return info_a.precedence.cmp(&info_b.precedence);
        }
        a.end
            .cmp(&b.end)
            .then(info_a.precedence.cmp(&info_b.precedence))
            .then(info_a.literal.cmp(&info_b.literal))
            .then(b.symbol.cmp(&a.symbol))
    }
}
