use crate::compile::{Action, Language, TokenSet};
use crate::error::{LexError, ParseDiagnostic, Recovery, SyntaxError};
use crate::incremental::reuse::{Candidate, ReuseCursor};
use crate::lexer::{ExternalScanner, LexMode, Lexer, Token};
use crate::parser::ParseOptions;
use crate::parser::recovery::{self, Attempts};
use crate::parser::stack::{Entry, Stack, error_node};
use crate::syntax::{
    GreenElement, GreenNode, GreenToken, Lookaround, NodeFlags, StateId, Symbol, SyntaxTree,
    TextRange, TextSize,
};
use compact_str::CompactString;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Where a [`ParseSession`] stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStatus {
    InProgress,
    Finished,
    /// The cancellation flag was observed; only a prefix was parsed.
    Cancelled,
}

/// A parse that can be driven a few tokens at a time.
///
/// Created by [`Parser::session`](crate::Parser::session). Each
/// [`step`](Self::step) consumes one token, or one reused subtree during a
/// reparse, performing the reductions and recovery that lead up to it.
/// [`finish`](Self::finish) runs to the end and returns the tree; after
/// cancellation it returns the partial tree built so far.
pub struct ParseSession {
    language: Arc<Language>,
    scanners: Arc<[Option<Arc<dyn ExternalScanner>>]>,
    options: ParseOptions,
    source: Arc<[u8]>,
    stack: Stack,
    position: usize,
    lookahead: Option<Token>,
    /// State whose valid tokens drive the next lex.
    lex_state: StateId,
    after_extra: bool,
    /// Position of the last zero-width token consumed.
    empty_at: Option<usize>,
    /// Furthest byte inspected since the last grammar token was shifted.
    pending_reach: usize,
    attempts: Attempts,
    /// Set while recovery reduces towards an inserted token.
    inserting: bool,
    reductions: usize,
    reduction_budget: usize,
    diagnostics: Vec<ParseDiagnostic>,
    reuse: Option<ReuseCursor>,
    lexed: usize,
    reused: usize,
    status: ParseStatus,
    root: Option<Arc<GreenNode>>,
}

impl ParseSession {
    pub(crate) fn new(
        language: Arc<Language>,
        scanners: Arc<[Option<Arc<dyn ExternalScanner>>]>,
        options: ParseOptions,
        source: Arc<[u8]>,
        reuse: Option<ReuseCursor>,
    ) -> Self {
        Self {
            language,
            scanners,
            options,
            source,
            stack: Stack::default(),
            position: 0,
            lookahead: None,
            lex_state: StateId::START,
            after_extra: false,
            empty_at: None,
            pending_reach: 0,
            attempts: Attempts::default(),
            inserting: false,
            reductions: 0,
            reduction_budget: 0,
            diagnostics: Vec::new(),
            reuse,
            lexed: 0,
            reused: 0,
            status: ParseStatus::InProgress,
            root: None,
        }
    }

    #[must_use]
    pub const fn status(&self) -> ParseStatus {
        self.status
    }

    /// Byte offset up to which input has been consumed.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn errors(&self) -> &[ParseDiagnostic] {
        &self.diagnostics
    }

    /// Subtrees taken over from the previous tree so far.
    #[must_use]
    pub const fn reused_nodes(&self) -> usize {
        self.reused
    }

    #[must_use]
    pub const fn tokens_lexed(&self) -> usize {
        self.lexed
    }

    /// Consumes one token, or one reused subtree.
    pub fn step(&mut self) -> ParseStatus {
        while self.status == ParseStatus::InProgress {
            let token = match self.lookahead {
                Some(token) => token,
                None => {
                    if self.cancellation_requested() {
                        tracing::debug!(position = self.position, "parse cancelled");
                        self.status = ParseStatus::Cancelled;
                        break;
                    }
                    let token = self.lex();
                    self.lookahead = Some(token);
                    token
                }
            };
            if self.advance(token) {
                break;
            }
        }
        self.status
    }

    /// Performs up to `steps` steps.
    pub fn run(&mut self, steps: usize) -> ParseStatus {
        for _ in 0..steps {
            if self.step() != ParseStatus::InProgress {
                break;
            }
        }
        self.status
    }

    /// Runs to completion, or to cancellation, and returns the tree.
    #[must_use]
    pub fn finish(mut self) -> SyntaxTree {
        while self.status == ParseStatus::InProgress {
            self.step();
        }
        let complete = self.status == ParseStatus::Finished;
        let root = match self.root.take() {
            Some(root) => root,
            None => {
                let children = self.stack.drain().into_iter().map(|entry| entry.element).collect();
                GreenNode::new(
                    self.language.start_symbol(),
                    None,
                    NodeFlags::empty(),
                    children,
                    0,
                )
            }
        };
        SyntaxTree::new(root, self.source, self.language, self.diagnostics, complete)
    }

    fn cancellation_requested(&self) -> bool {
        let Some(flag) = &self.options.cancellation else {
            return false;
        };
        self.lexed % self.options.check_interval.max(1) == 0 && flag.load(Ordering::Relaxed)
    }

    fn lex(&mut self) -> Token {
        let empty = TokenSet::default();
        let valid = self.language.valid_tokens(self.lex_state).unwrap_or(&empty);
        let mode = LexMode {
            after_extra: self.after_extra,
            forbid_empty: self.empty_at == Some(self.position),
        };
        let token = Lexer::new(&self.language, &self.source, &self.scanners).next_token(
            self.position,
            valid,
            mode,
        );
        self.pending_reach = self.pending_reach.max(token.inspected.end().to_usize());
        self.attempts = Attempts::default();
        self.lexed += 1;
        token
    }

    /// Acts on the lookahead. Returns `true` once it is consumed or the
    /// parse is over.
    fn advance(&mut self, token: Token) -> bool {
        if token.is_error() {
            self.lex_error(token);
            return true;
        }
        let state = self.stack.state();
        match self.language.action(state, token.kind) {
            Action::Shift(next) => {
                if !self.try_reuse(token, state) {
                    self.shift(token, state, next);
                }
                true
            }
            Action::Reduce(production) => {
                if self.reductions == 0 {
                    self.reduction_budget = (self.stack.entries().len() + 1)
                        .saturating_mul(self.language.production_count() + 1);
                }
                self.reductions += 1;
                if self.reductions > self.reduction_budget {
                    tracing::warn!(position = self.position, "reduction limit reached");
                    self.report(token, state, Recovery::Skipped);
                    self.skip(token, state);
                    return true;
                }
                self.reduce(production);
                false
            }
            Action::Accept => {
                self.accept();
                true
            }
            Action::Error if self.language.is_extra(token.kind) => {
                self.shift_extra(token, state);
                true
            }
            Action::Error => self.recover(token, state),
        }
    }

    fn leaf(token: Token, flags: NodeFlags, parse_state: StateId, lex_state: StateId) -> GreenElement {
        let lookaround = Lookaround {
            before: token.range.start().get().saturating_sub(token.inspected.start().get()),
            after: token.inspected.end().get().saturating_sub(token.range.end().get()),
        };
        GreenToken::new(token.kind, token.len(), flags, lookaround, parse_state, lex_state).into()
    }

    fn consume(&mut self, token: Token) {
        self.position = token.range.end().to_usize();
        if token.is_empty() {
            self.empty_at = Some(self.position);
        }
        self.lookahead = None;
        self.reductions = 0;
    }

    fn shift(&mut self, token: Token, state: StateId, next: StateId) {
        tracing::trace!(
            kind = self.language.symbol_name(token.kind),
            range = %token.range,
            %state,
            "shift"
        );
        let leaf = Self::leaf(token, NodeFlags::empty(), state, next);
        self.stack.push(next, leaf, false);
        self.consume(token);
        self.lex_state = next;
        self.after_extra = false;
        self.pending_reach = 0;
    }

    fn shift_extra(&mut self, token: Token, state: StateId) {
        let leaf = Self::leaf(token, NodeFlags::EXTRA, state, self.lex_state);
        self.stack.push_extra(leaf);
        self.consume(token);
        self.after_extra = true;
    }

    fn reduce(&mut self, production: u32) {
        let Some(info) = self.language.production(production) else {
            return;
        };
        let (lhs, count) = (info.lhs, usize::from(info.child_count));
        let trailing = self.stack.take_trailing_extras();
        let children = self.stack.pop_symbols(count);
        let end = self.stack.end()
            + children
                .iter()
                .map(|child| child.text_len().to_usize())
                .sum::<usize>();
        let lookahead = u32::try_from(self.pending_reach.saturating_sub(end)).unwrap_or(u32::MAX);
        // The lookahead that completed the node is not the text following
        // it: recovery consumed or replaced that text first.
        let flags = if self.inserting || trailing.iter().any(|entry| entry.element.has_error()) {
            NodeFlags::RECOVERED
        } else {
            NodeFlags::empty()
        };
        let node = GreenNode::new(lhs, Some(production), flags, children, lookahead);
        let below = self.stack.state();
        let goto = self.language.goto(below, lhs).unwrap_or_else(|| {
            tracing::warn!(rule = self.language.symbol_name(lhs), %below, "missing goto");
            below
        });
        tracing::trace!(rule = self.language.symbol_name(lhs), %goto, "reduce");
        self.stack.push(goto, node.into(), false);
        self.stack.restore_extras(goto, trailing);
    }

    fn accept(&mut self) {
        let start = self.language.start_symbol();
        let mut production = None;
        let mut children = Vec::new();
        for Entry { element, extra, .. } in self.stack.drain() {
            match element {
                GreenElement::Node(node) if !extra && node.kind() == start => {
                    production = node.production();
                    children.extend(node.children().iter().cloned());
                }
                other => children.push(other),
            }
        }
        self.finish_with(GreenNode::new(start, production, NodeFlags::empty(), children, 0));
    }

    fn finish_with(&mut self, root: Arc<GreenNode>) {
        tracing::debug!(
            len = self.source.len(),
            errors = self.diagnostics.len(),
            reused = self.reused,
            "parse finished"
        );
        self.root = Some(root);
        self.lookahead = None;
        self.status = ParseStatus::Finished;
    }

    fn error_budget_spent(&self) -> bool {
        self.options
            .max_errors
            .is_some_and(|max| self.diagnostics.len() >= max)
    }

    fn report(&mut self, token: Token, state: StateId, recovery: Recovery) {
        let language = &self.language;
        let expected = language
            .expected_symbols(state)
            .into_iter()
            .map(|symbol| CompactString::from(language.symbol_name(symbol)))
            .collect();
        let error = SyntaxError {
            range: token.range,
            found: language.symbol_name(token.kind).into(),
            expected,
            recovery,
        };
        tracing::trace!(%error, "syntax error");
        self.diagnostics.push(error.into());
    }

    /// Applies the next untried repair. Returns `true` if the lookahead was
    /// consumed.
    fn recover(&mut self, token: Token, state: StateId) -> bool {
        if self.error_budget_spent() {
            self.truncate(token, state);
            return true;
        }
        let states = self.stack.states();
        if !self.attempts.inserted {
            self.attempts.inserted = true;
            if let Some(missing) = recovery::find_insertion(&self.language, &states, token.kind) {
                self.report(token, state, Recovery::Inserted);
                self.insert_missing(missing);
                self.reductions = 0;
                return false;
            }
        }
        if !self.attempts.popped {
            self.attempts.popped = true;
            if let Some(frames) = recovery::find_pop_depth(&self.language, &states, token.kind) {
                self.report(token, state, Recovery::Popped { frames });
                let trailing = self.stack.take_trailing_extras();
                let mut elements = self.stack.pop_symbols(frames);
                elements.extend(trailing.into_iter().map(|entry| entry.element));
                self.stack.push_error(elements);
                self.reductions = 0;
                return false;
            }
        }
        if token.is_end() {
            let frames = states.len().saturating_sub(1);
            self.report(token, state, Recovery::Popped { frames });
            let elements = self.stack.drain().into_iter().map(|entry| entry.element).collect();
            let root = GreenNode::new(
                self.language.start_symbol(),
                None,
                NodeFlags::empty(),
                vec![error_node(elements).into()],
                0,
            );
            self.finish_with(root);
            return true;
        }
        self.report(token, state, Recovery::Skipped);
        self.skip(token, state);
        true
    }

    /// Reduces as `missing` requires, then shifts it with zero width.
    fn insert_missing(&mut self, missing: Symbol) {
        self.inserting = true;
        self.reduce_to_missing(missing);
        self.inserting = false;
    }

    fn reduce_to_missing(&mut self, missing: Symbol) {
        for _ in 0..recovery::REDUCTION_LIMIT {
            let state = self.stack.state();
            match self.language.action(state, missing) {
                Action::Reduce(production) => self.reduce(production),
                Action::Shift(next) => {
                    let leaf = GreenToken::new(
                        missing,
                        TextSize::zero(),
                        NodeFlags::MISSING,
                        Lookaround::default(),
                        state,
                        next,
                    );
                    self.stack.push(next, leaf.into(), false);
                    return;
                }
                Action::Accept | Action::Error => return,
            }
        }
    }

    fn skip(&mut self, token: Token, state: StateId) {
        let leaf = Self::leaf(token, NodeFlags::empty(), state, self.lex_state);
        self.stack.push_error(vec![leaf]);
        self.consume(token);
        self.after_extra = false;
    }

    fn lex_error(&mut self, token: Token) {
        let state = self.stack.state();
        if self.error_budget_spent() {
            self.truncate(token, state);
            return;
        }
        tracing::trace!(range = %token.range, "lexical error");
        self.diagnostics.push(LexError { range: token.range }.into());
        let leaf = Self::leaf(token, NodeFlags::ERROR, state, self.lex_state);
        self.stack.push_error(vec![leaf]);
        self.consume(token);
        self.after_extra = false;
    }

    /// Gives up: the stack and the rest of the input become one error node.
    fn truncate(&mut self, token: Token, state: StateId) {
        let end = self.source.len();
        let range = TextRange::new(TextSize::of(self.position), TextSize::of(end));
        tracing::debug!(%range, "error limit reached");
        self.diagnostics.push(
            SyntaxError {
                range,
                found: self.language.symbol_name(token.kind).into(),
                expected: Vec::new(),
                recovery: Recovery::Truncated,
            }
            .into(),
        );
        let mut elements: Vec<GreenElement> =
            self.stack.drain().into_iter().map(|entry| entry.element).collect();
        if end > self.position {
            elements.push(
                GreenToken::new(
                    Symbol::ERROR,
                    range.len(),
                    NodeFlags::ERROR,
                    Lookaround::default(),
                    state,
                    state,
                )
                .into(),
            );
        }
        self.position = end;
        let root = GreenNode::new(
            self.language.start_symbol(),
            None,
            NodeFlags::empty(),
            vec![error_node(elements).into()],
            0,
        );
        self.finish_with(root);
    }

    fn try_reuse(&mut self, token: Token, state: StateId) -> bool {
        let Some(mut cursor) = self.reuse.take() else {
            return false;
        };
        let reused = self.reuse_from(&mut cursor, token, state);
        self.reuse = Some(cursor);
        reused
    }

    fn reuse_from(&mut self, cursor: &mut ReuseCursor, token: Token, state: StateId) -> bool {
        loop {
            let Some(candidate) = cursor.peek(self.position) else {
                return false;
            };
            if let Some((node, goto)) = self.reusable(cursor, &candidate, token, state) {
                cursor.advance();
                self.push_reused(node, goto);
                return true;
            }
            if cursor.descend() {
                continue;
            }
            let empty = candidate.element.text_len() == TextSize::zero();
            cursor.advance();
            if !empty {
                return false;
            }
        }
    }

    fn reusable(
        &self,
        cursor: &ReuseCursor,
        candidate: &Candidate,
        token: Token,
        state: StateId,
    ) -> Option<(Arc<GreenNode>, StateId)> {
        let GreenElement::Node(node) = &candidate.element else {
            return None;
        };
        let flags = node.flags();
        if node.has_error()
            || flags.contains(NodeFlags::EXTRA)
            || flags.contains(NodeFlags::RECOVERED)
            || node.kind().is_error()
        {
            return None;
        }
        if node.parse_state() != Some(state) || node.lex_state().is_none() {
            return None;
        }
        let first = node.first_token()?;
        if first.kind() != token.kind || first.text_len() != token.len() {
            return None;
        }
        let goto = self.language.goto(state, node.kind())?;
        cursor
            .window_unchanged(candidate, self.position, &self.source)
            .then(|| (Arc::clone(node), goto))
    }

    fn push_reused(&mut self, node: Arc<GreenNode>, goto: StateId) {
        tracing::trace!(
            rule = self.language.symbol_name(node.kind()),
            position = self.position,
            len = %node.text_len(),
            "reused subtree"
        );
        let ends_empty = node
            .last_token()
            .is_some_and(|token| token.text_len() == TextSize::zero());
        let lex_state = node.lex_state().unwrap_or(goto);
        self.position += node.text_len().to_usize();
        if ends_empty {
            self.empty_at = Some(self.position);
        }
        self.stack.push(goto, GreenElement::Node(node), false);
        self.lex_state = lex_state;
        self.after_extra = false;
        self.pending_reach = 0;
        self.lookahead = None;
        self.reductions = 0;
        self.reused += 1;
    }
}

impl fmt::Debug for ParseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseSession")
            .field("language", &self.language.name())
            .field("position", &self.position)
            .field("status", &self.status)
            .field("depth", &self.stack.entries().len())
            .field("errors", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}
