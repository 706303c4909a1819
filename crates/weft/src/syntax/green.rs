use crate::syntax::{StateId, Symbol, TextSize};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Per-element flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct NodeFlags(u8);

impl NodeFlags {
    /// Appears between grammar symbols without being part of a production.
    pub const EXTRA: Self = Self(1);
    /// An `ERROR` node or an unrecognised token.
    pub const ERROR: Self = Self(1 << 1);
    /// A zero-width token inserted by recovery.
    pub const MISSING: Self = Self(1 << 2);
    /// The element or one of its descendants is erroneous.
    pub const HAS_ERROR: Self = Self(1 << 3);
    /// Reduced while recovery output followed it on the stack, or while
    /// recovery was inserting a token. Such a node only fits the context it
    /// was built in.
    pub const RECOVERED: Self = Self(1 << 4);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl std::ops::BitOr for NodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// Bytes outside an element's own span that influenced how it was built.
///
/// `before` counts bytes preceding the start (non-zero when a scanner asked
/// for the column), `after` counts bytes past the end that the lexer looked
/// at, including the token that triggered the final reduction. Both are
/// relative so the window moves with the element when it is reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Lookaround {
    pub before: u32,
    pub after: u32,
}

/// Leaf of the green tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct GreenToken {
    kind: Symbol,
    text_len: TextSize,
    flags: NodeFlags,
    lookaround: Lookaround,
    /// State on top of the stack when the token was shifted.
    parse_state: StateId,
    /// State after the shift; the next token is lexed in it.
    lex_state: StateId,
}

impl GreenToken {
    #[must_use]
    pub const fn new(
        kind: Symbol,
        text_len: TextSize,
        flags: NodeFlags,
        lookaround: Lookaround,
        parse_state: StateId,
        lex_state: StateId,
    ) -> Self {
        Self {
            kind,
            text_len,
            flags,
            lookaround,
            parse_state,
            lex_state,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> Symbol {
        self.kind
    }

    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.text_len
    }

    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[must_use]
    pub const fn lookaround(&self) -> Lookaround {
        self.lookaround
    }

    #[must_use]
    pub const fn parse_state(&self) -> StateId {
        self.parse_state
    }

    #[must_use]
    pub const fn lex_state(&self) -> StateId {
        self.lex_state
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) const fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Interior node of the green tree. Immutable once built and shared by
/// `Arc` between tree versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct GreenNode {
    kind: Symbol,
    text_len: TextSize,
    flags: NodeFlags,
    lookaround: Lookaround,
    /// Production that built the node, `None` for error and root wrappers.
    production: Option<u32>,
    parse_state: Option<StateId>,
    lex_state: Option<StateId>,
    children: GreenChildren,
}

/// Children storage specialised for the common small cases.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
enum GreenChildren {
    Empty,
    One(GreenElement),
    Inline(SmallVec<[GreenElement; 4]>),
    Many(Arc<[GreenElement]>),
}

impl GreenChildren {
    fn from_vec(mut children: Vec<GreenElement>) -> Self {
        match children.len() {
            0 => Self::Empty,
            1 => children.pop().map_or(Self::Empty, Self::One),
            2..=4 => Self::Inline(children.into_iter().collect()),
            _ => Self::Many(children.into()),
        }
    }

    fn as_slice(&self) -> &[GreenElement] {
        match self {
            Self::Empty => &[],
            Self::One(child) => std::slice::from_ref(child),
            Self::Inline(children) => children.as_slice(),
            Self::Many(children) => children,
        }
    }
}

/// Green tree element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum GreenElement {
    Node(Arc<GreenNode>),
    Token(GreenToken),
}

impl GreenNode {
    /// Builds a node over `children`, deriving length, error flags, the
    /// dependency window and the boundary states from them.
    ///
    /// `trailing_lookahead` is the absolute lexing extent, relative to the
    /// end of the node, of the token that triggered the reduction.
    #[must_use]
    pub fn new(
        kind: Symbol,
        production: Option<u32>,
        flags: NodeFlags,
        children: Vec<GreenElement>,
        trailing_lookahead: u32,
    ) -> Arc<Self> {
        let mut text_len = TextSize::zero();
        let mut flags = flags;
        let mut before = 0u32;
        // Furthest inspected byte, measured from the node start.
        let mut reach = 0u32;
        let mut parse_state = None;
        let mut lex_state = None;
        let mut first = true;

        for child in &children {
            let offset = text_len.get();
            let look = child.lookaround();
            if offset < look.before {
                before = before.max(look.before - offset);
            }
            let child_end = offset.saturating_add(child.text_len().get());
            reach = reach.max(child_end.saturating_add(look.after));
            text_len += child.text_len();

            if child.flags().contains(NodeFlags::ERROR)
                || child.flags().contains(NodeFlags::HAS_ERROR)
                || child.flags().contains(NodeFlags::MISSING)
            {
                flags = flags | NodeFlags::HAS_ERROR;
            }
            if child.is_step() {
                // A node opening with an empty child has no single start state.
                if first {
                    parse_state = child.parse_state();
                    first = false;
                }
                lex_state = child.lex_state();
            }
        }
        if flags.contains(NodeFlags::ERROR) {
            flags = flags | NodeFlags::HAS_ERROR;
        }

        let end = text_len.get();
        let after = reach
            .saturating_sub(end)
            .max(trailing_lookahead);

        Arc::new(Self {
            kind,
            text_len,
            flags,
            lookaround: Lookaround { before, after },
            production,
            parse_state,
            lex_state,
            children: GreenChildren::from_vec(children),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> Symbol {
        self.kind
    }

    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.text_len
    }

    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[must_use]
    pub const fn lookaround(&self) -> Lookaround {
        self.lookaround
    }

    #[must_use]
    pub const fn production(&self) -> Option<u32> {
        self.production
    }

    /// State in which the first token of the node was shifted.
    #[must_use]
    pub const fn parse_state(&self) -> Option<StateId> {
        self.parse_state
    }

    /// State in which the token following the node was lexed.
    #[must_use]
    pub const fn lex_state(&self) -> Option<StateId> {
        self.lex_state
    }

    #[must_use]
    pub fn children(&self) -> &[GreenElement] {
        self.children.as_slice()
    }

    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.flags.contains(NodeFlags::HAS_ERROR)
    }

    /// First leaf in document order, skipping extras.
    #[must_use]
    pub fn first_token(&self) -> Option<&GreenToken> {
        self.children().iter().find_map(|child| match child {
            GreenElement::Token(token) if !token.flags().contains(NodeFlags::EXTRA) => Some(token),
            GreenElement::Token(_) => None,
            GreenElement::Node(node) => {
                if node.flags.contains(NodeFlags::EXTRA) {
                    None
                } else {
                    node.first_token()
                }
            }
        })
    }

    /// Last leaf in document order, skipping extras.
    #[must_use]
    pub fn last_token(&self) -> Option<&GreenToken> {
        self.children().iter().rev().find_map(|child| match child {
            GreenElement::Token(token) if !token.flags().contains(NodeFlags::EXTRA) => Some(token),
            GreenElement::Token(_) => None,
            GreenElement::Node(node) => {
                if node.flags.contains(NodeFlags::EXTRA) {
                    None
                } else {
                    node.last_token()
                }
            }
        })
    }

    /// Compares kinds, lengths, flags and shape, ignoring reuse metadata.
    #[must_use]
    pub fn same_structure(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.text_len == other.text_len
            && self.flags.without(NodeFlags::RECOVERED)
                == other.flags.without(NodeFlags::RECOVERED)
            && self.children().len() == other.children().len()
            && self
                .children()
                .iter()
                .zip(other.children())
                .all(|(a, b)| a.same_structure(b))
    }
}

impl GreenElement {
    #[must_use]
    pub fn kind(&self) -> Symbol {
        match self {
            Self::Node(node) => node.kind(),
            Self::Token(token) => token.kind(),
        }
    }

    #[must_use]
    pub fn text_len(&self) -> TextSize {
        match self {
            Self::Node(node) => node.text_len(),
            Self::Token(token) => token.text_len(),
        }
    }

    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        match self {
            Self::Node(node) => node.flags(),
            Self::Token(token) => token.flags(),
        }
    }

    #[must_use]
    pub fn lookaround(&self) -> Lookaround {
        match self {
            Self::Node(node) => node.lookaround(),
            Self::Token(token) => token.lookaround(),
        }
    }

    #[must_use]
    pub fn parse_state(&self) -> Option<StateId> {
        match self {
            Self::Node(node) => node.parse_state(),
            Self::Token(token) => Some(token.parse_state()),
        }
    }

    #[must_use]
    pub fn lex_state(&self) -> Option<StateId> {
        match self {
            Self::Node(node) => node.lex_state(),
            Self::Token(token) => Some(token.lex_state()),
        }
    }

    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.flags().contains(NodeFlags::EXTRA)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.flags().contains(NodeFlags::ERROR) || self.flags().contains(NodeFlags::MISSING)
    }

    /// `true` if the element stands for a production step: not an extra
    /// and not an `ERROR` node left by recovery.
    #[must_use]
    pub fn is_step(&self) -> bool {
        !self.is_extra() && !self.kind().is_error()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.is_error() || self.flags().contains(NodeFlags::HAS_ERROR)
    }

    #[must_use]
    pub const fn as_node(&self) -> Option<&Arc<GreenNode>> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub const fn as_token(&self) -> Option<&GreenToken> {
        match self {
            Self::Token(token) => Some(token),
            Self::Node(_) => None,
        }
    }

    /// Returns the element marked as an extra.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn into_extra(self) -> Self {
        match self {
            Self::Token(token) => {
                let flags = token.flags() | NodeFlags::EXTRA;
                Self::Token(token.with_flags(flags))
            }
            Self::Node(node) => {
                let mut node = Arc::unwrap_or_clone(node);
                node.flags = node.flags | NodeFlags::EXTRA;
                Self::Node(Arc::new(node))
            }
        }
    }

    #[must_use]
    pub fn same_structure(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Node(a), Self::Node(b)) => Arc::ptr_eq(a, b) || a.same_structure(b),
            (Self::Token(a), Self::Token(b)) => {
                a.kind() == b.kind() && a.text_len() == b.text_len() && a.flags() == b.flags()
            }
            _ => false,
        }
    }
}

impl From<Arc<GreenNode>> for GreenElement {
    fn from(node: Arc<GreenNode>) -> Self {
        Self::Node(node)
    }
}

impl From<GreenToken> for GreenElement {
    fn from(token: GreenToken) -> Self {
        Self::Token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: u16, len: u32, after: u32) -> GreenElement {
        GreenElement::Token(GreenToken::new(
            Symbol::new(kind),
            TextSize::new(len),
            NodeFlags::empty(),
            Lookaround { before: 0, after },
            StateId::new(u32::from(kind)),
            StateId::new(u32::from(kind) + 10),
        ))
    }

    #[test]
    fn test_node_derives_length_and_states() {
        let node = GreenNode::new(
            Symbol::new(9),
            Some(0),
            NodeFlags::empty(),
            vec![token(1, 3, 1), token(2, 2, 1)],
            0,
        );
        assert_eq!(node.text_len(), TextSize::new(5));
        assert_eq!(node.parse_state(), Some(StateId::new(1)));
        assert_eq!(node.lex_state(), Some(StateId::new(12)));
        assert_eq!(node.lookaround().after, 1);
        assert!(!node.has_error());
    }

    #[test]
    fn test_lookahead_reach_of_inner_token_extends_past_end() {
        // The first token looked 6 bytes past its end, beyond the node.
        let node = GreenNode::new(
            Symbol::new(9),
            Some(0),
            NodeFlags::empty(),
            vec![token(1, 2, 6), token(2, 2, 0)],
            1,
        );
        assert_eq!(node.lookaround().after, 4);
    }

    #[test]
    fn test_error_child_marks_parent() {
        let bad = GreenElement::Token(GreenToken::new(
            Symbol::ERROR,
            TextSize::new(1),
            NodeFlags::ERROR,
            Lookaround::default(),
            StateId::new(0),
            StateId::new(0),
        ));
        let node = GreenNode::new(Symbol::new(9), None, NodeFlags::empty(), vec![bad], 0);
        assert!(node.has_error());
    }

    #[test]
    fn test_extras_do_not_set_boundary_states() {
        let extra = token(5, 1, 0).into_extra();
        let node = GreenNode::new(
            Symbol::new(9),
            Some(0),
            NodeFlags::empty(),
            vec![extra, token(2, 1, 0)],
            0,
        );
        assert_eq!(node.parse_state(), Some(StateId::new(2)));
    }

    #[test]
    fn test_same_structure_ignores_lookaround() {
        let a = GreenNode::new(Symbol::new(9), Some(0), NodeFlags::empty(), vec![token(1, 3, 1)], 0);
        let b = GreenNode::new(Symbol::new(9), Some(0), NodeFlags::empty(), vec![token(1, 3, 4)], 2);
        assert!(a.same_structure(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_recovered_flag_is_reuse_metadata() {
        let a = GreenNode::new(Symbol::new(9), Some(0), NodeFlags::RECOVERED, vec![token(1, 3, 1)], 0);
        let b = GreenNode::new(Symbol::new(9), Some(0), NodeFlags::empty(), vec![token(1, 3, 1)], 0);
        assert!(a.flags().contains(NodeFlags::RECOVERED));
        assert!(!a.has_error());
        assert!(a.same_structure(&b));
    }
}
