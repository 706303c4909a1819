use crate::compile::Language;
use crate::error::ParseDiagnostic;
use crate::syntax::{GreenElement, GreenNode, NodeFlags, Point, Symbol, TextRange, TextSize};
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Result of a parse: an immutable green tree over the buffer it was built
/// from. Cheap to clone and safe to read from many threads.
#[derive(Clone)]
pub struct SyntaxTree {
    inner: Arc<TreeInner>,
}

struct TreeInner {
    root: Arc<GreenNode>,
    source: Arc<[u8]>,
    language: Arc<Language>,
    diagnostics: Vec<ParseDiagnostic>,
    complete: bool,
}

impl SyntaxTree {
    #[must_use]
    pub(crate) fn new(
        root: Arc<GreenNode>,
        source: Arc<[u8]>,
        language: Arc<Language>,
        diagnostics: Vec<ParseDiagnostic>,
        complete: bool,
    ) -> Self {
        Self {
            inner: Arc::new(TreeInner {
                root,
                source,
                language,
                diagnostics,
                complete,
            }),
        }
    }

    #[must_use]
    pub fn root_node(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.clone())
    }

    #[must_use]
    pub fn green(&self) -> &Arc<GreenNode> {
        &self.inner.root
    }

    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.inner.source
    }

    pub(crate) fn shared_source(&self) -> &Arc<[u8]> {
        &self.inner.source
    }

    #[must_use]
    pub fn language(&self) -> &Arc<Language> {
        &self.inner.language
    }

    /// Lexical and syntax errors recovered from while building the tree.
    #[must_use]
    pub fn errors(&self) -> &[ParseDiagnostic] {
        &self.inner.diagnostics
    }

    /// `false` when the parse was cancelled and the tree only covers a prefix.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.complete
    }

    /// Compares two trees by kinds, spans and shape.
    #[must_use]
    pub fn same_structure(&self, other: &Self) -> bool {
        self.inner.root.same_structure(&other.inner.root)
    }

    /// Renders the named visible nodes as an S-expression.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        write_sexp(&self.root_node(), None, &mut out);
        out
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("language", &self.inner.language.name())
            .field("len", &self.inner.source.len())
            .field("complete", &self.inner.complete)
            .field("sexp", &self.to_sexp())
            .finish()
    }
}

/// Red tree node: a green element plus its absolute position and parent.
///
/// Tokens are nodes too. Hidden rules (leading `_`) and repetition helpers
/// are skipped by [`SyntaxNode::children`]; their children are returned in
/// their place.
#[derive(Clone)]
pub struct SyntaxNode {
    data: Arc<NodeData>,
}

struct NodeData {
    element: GreenElement,
    offset: TextSize,
    parent: Option<SyntaxNode>,
    /// Production step of this element within the raw parent, if any.
    field: Option<u16>,
    tree: SyntaxTree,
}

impl SyntaxNode {
    fn new_root(tree: SyntaxTree) -> Self {
        let element = GreenElement::Node(tree.inner.root.clone());
        Self {
            data: Arc::new(NodeData {
                element,
                offset: TextSize::zero(),
                parent: None,
                field: None,
                tree,
            }),
        }
    }

    fn new_child(&self, element: GreenElement, offset: TextSize, field: Option<u16>) -> Self {
        Self {
            data: Arc::new(NodeData {
                element,
                offset,
                parent: Some(self.clone()),
                field,
                tree: self.data.tree.clone(),
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Symbol {
        self.data.element.kind()
    }

    /// Grammar name of the node kind (`"ERROR"` for error nodes).
    #[must_use]
    pub fn kind_name(&self) -> &str {
        self.data.tree.language().symbol_name(self.kind())
    }

    #[must_use]
    pub fn green(&self) -> &GreenElement {
        &self.data.element
    }

    #[must_use]
    pub fn tree(&self) -> &SyntaxTree {
        &self.data.tree
    }

    #[must_use]
    pub fn text_range(&self) -> TextRange {
        TextRange::at(self.data.offset, self.data.element.text_len())
    }

    #[must_use]
    pub fn start_byte(&self) -> usize {
        self.data.offset.to_usize()
    }

    #[must_use]
    pub fn end_byte(&self) -> usize {
        self.text_range().end().to_usize()
    }

    #[must_use]
    pub fn start_point(&self) -> Point {
        Point::of_offset(self.data.tree.source(), self.start_byte())
    }

    #[must_use]
    pub fn end_point(&self) -> Point {
        Point::of_offset(self.data.tree.source(), self.end_byte())
    }

    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        let source = self.data.tree.source();
        let range = self.text_range().as_usize_range();
        String::from_utf8_lossy(source.get(range).unwrap_or_default())
    }

    /// `true` for `ERROR` nodes and zero-width placeholders inserted by
    /// recovery.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.data.element.is_error()
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.data.element.flags().contains(NodeFlags::MISSING)
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.data.element.has_error()
    }

    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.data.element.is_extra()
    }

    #[must_use]
    pub fn is_named(&self) -> bool {
        self.kind().is_error() || self.data.tree.language().is_named(self.kind())
    }

    #[must_use]
    pub fn is_token(&self) -> bool {
        matches!(self.data.element, GreenElement::Token(_))
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.data.parent.as_ref()
    }

    /// Name of the field this node fills in its parent, if any.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        let parent = self.data.parent.as_ref()?;
        let production = parent.raw_production()?;
        let step = self.data.field?;
        self.data
            .tree
            .language()
            .field_name(production, usize::from(step))
    }

    fn raw_production(&self) -> Option<u32> {
        self.data.element.as_node().and_then(|node| node.production())
    }

    fn is_visible_element(&self, element: &GreenElement) -> bool {
        element.is_error()
            || element.kind().is_error()
            || self.data.tree.language().is_visible(element.kind())
    }

    /// Visible children in document order.
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        let mut out = Vec::new();
        if let GreenElement::Node(node) = &self.data.element {
            self.collect_visible(node, self.data.offset, &mut out);
        }
        out
    }

    fn collect_visible(&self, node: &GreenNode, mut offset: TextSize, out: &mut Vec<Self>) {
        let mut step = 0u16;
        for child in node.children() {
            let field = if child.is_step() {
                let current = step;
                step = step.saturating_add(1);
                Some(current)
            } else {
                None
            };
            if self.is_visible_element(child) {
                // Fields are only resolvable against the raw parent.
                let field = if std::ptr::eq(node, self.green_node_ptr()) {
                    field
                } else {
                    None
                };
                out.push(self.new_child(child.clone(), offset, field));
            } else if let GreenElement::Node(hidden) = child {
                self.collect_visible(hidden, offset, out);
            }
            offset += child.text_len();
        }
    }

    fn green_node_ptr(&self) -> *const GreenNode {
        self.data
            .element
            .as_node()
            .map_or(std::ptr::null(), |node| Arc::as_ptr(node))
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<Self> {
        self.children().into_iter().nth(index)
    }

    #[must_use]
    pub fn named_children(&self) -> Vec<Self> {
        self.children()
            .into_iter()
            .filter(Self::is_named)
            .collect()
    }

    /// First child whose production step carries `name`.
    #[must_use]
    pub fn child_by_field_name(&self, name: &str) -> Option<Self> {
        let node = self.data.element.as_node()?;
        let production = node.production()?;
        let language = self.data.tree.language();
        let mut offset = self.data.offset;
        let mut step = 0usize;
        for child in node.children() {
            if child.is_step() {
                if language.field_name(production, step) == Some(name) {
                    let step_id = u16::try_from(step).ok();
                    let wrapped = self.new_child(child.clone(), offset, step_id);
                    if self.is_visible_element(child) {
                        return Some(wrapped);
                    }
                    return wrapped.children().into_iter().next();
                }
                step += 1;
            }
            offset += child.text_len();
        }
        None
    }

    /// Pre-order traversal of this node and its visible descendants.
    #[must_use]
    pub fn descendants(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            let children = node.children();
            out.push(node);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Smallest visible descendant covering `offset`.
    #[must_use]
    pub fn descendant_at(&self, offset: TextSize) -> Option<Self> {
        if !self.text_range().contains(offset) {
            return None;
        }
        let mut current = self.clone();
        'descend: loop {
            for child in current.children() {
                if child.text_range().contains(offset) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }
}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind_name(), self.text_range())
    }
}

impl PartialEq for SyntaxNode {
    fn eq(&self, other: &Self) -> bool {
        self.data.offset == other.data.offset
            && self.data.element == other.data.element
            && Arc::ptr_eq(&self.data.tree.inner, &other.data.tree.inner)
    }
}

impl Eq for SyntaxNode {}

fn write_sexp(node: &SyntaxNode, field: Option<&str>, out: &mut String) {
    if let Some(field) = field {
        let _ = write!(out, "{field}: ");
    }
    if node.is_missing() {
        let _ = write!(out, "(MISSING {})", node.kind_name());
        return;
    }
    let _ = write!(out, "({}", node.kind_name());
    for child in node.children() {
        if !child.is_named() && !child.is_error() {
            continue;
        }
        out.push(' ');
        let field = child.field_name().map(str::to_owned);
        write_sexp(&child, field.as_deref(), out);
    }
    out.push(')');
}
