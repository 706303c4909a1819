use crate::incremental::EditMap;
use crate::syntax::{GreenElement, GreenNode};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Frame {
    node: Arc<GreenNode>,
    index: usize,
    /// Offset of `node.children()[index]` in the old buffer.
    offset: usize,
}

impl Frame {
    fn step(&mut self) {
        if let Some(element) = self.node.children().get(self.index) {
            self.offset += element.text_len().to_usize();
            self.index += 1;
        }
    }
}

/// A node of the previous tree offered for reuse.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub(crate) element: GreenElement,
    /// Start in the old buffer.
    pub(crate) old_start: usize,
}

/// Walks the previous tree in document order alongside a new parse.
///
/// The parser asks for the element starting at its current position in
/// the new buffer. A rejected candidate is either entered, to offer its
/// first child, or skipped.
#[derive(Debug, Clone)]
pub(crate) struct ReuseCursor {
    stack: Vec<Frame>,
    edits: EditMap,
    old_source: Arc<[u8]>,
}

impl ReuseCursor {
    pub(crate) fn new(root: Arc<GreenNode>, edits: EditMap, old_source: Arc<[u8]>) -> Self {
        Self {
            stack: vec![Frame {
                node: root,
                index: 0,
                offset: 0,
            }],
            edits,
            old_source,
        }
    }

    fn current(&self) -> Option<(&GreenElement, usize)> {
        let frame = self.stack.last()?;
        let element = frame.node.children().get(frame.index)?;
        Some((element, frame.offset))
    }

    /// The element starting at `position` of the new buffer, entering
    /// elements that straddle it and skipping the ones that end before.
    pub(crate) fn peek(&mut self, position: usize) -> Option<Candidate> {
        loop {
            let (element, old_start) = self.current()?;
            let old_end = old_start + element.text_len().to_usize();
            let new_start = self.edits.to_new(old_start);
            let new_end = self.edits.to_new(old_end).max(new_start);
            if new_start > position {
                return None;
            }
            if new_start == position {
                return Some(Candidate {
                    element: element.clone(),
                    old_start,
                });
            }
            if new_end <= position || !self.descend() {
                self.advance();
            }
        }
    }

    /// Enters the current element. Returns `false` for tokens and empty
    /// nodes.
    pub(crate) fn descend(&mut self) -> bool {
        let Some((GreenElement::Node(node), offset)) = self.current() else {
            return false;
        };
        if node.children().is_empty() {
            return false;
        }
        let frame = Frame {
            node: node.clone(),
            index: 0,
            offset,
        };
        self.stack.push(frame);
        true
    }

    /// `true` if the bytes `candidate` depends on, its lookaround window
    /// included, read the same at `position` of `source` as they did in the
    /// old buffer. A window that reached the end of the old buffer must
    /// reach the end of the new one.
    pub(crate) fn window_unchanged(&self, candidate: &Candidate, position: usize, source: &[u8]) -> bool {
        let look = candidate.element.lookaround();
        let len = candidate.element.text_len().to_usize();
        let (before, after) = (look.before as usize, look.after as usize);
        let (Some(old_low), Some(new_low)) = (
            candidate.old_start.checked_sub(before),
            position.checked_sub(before),
        ) else {
            return false;
        };
        let old_high = candidate.old_start + len + after;
        let new_high = position + len + after;
        if self.edits.touches(old_low, old_high) {
            return false;
        }
        let old = &*self.old_source;
        if (old_high > old.len()) != (new_high > source.len()) {
            return false;
        }
        let old_bytes = old.get(old_low..old_high.min(old.len()));
        let new_bytes = source.get(new_low..new_high.min(source.len()));
        matches!((old_bytes, new_bytes), (Some(a), Some(b)) if a == b)
    }

    /// Moves past the current element, leaving exhausted nodes.
    pub(crate) fn advance(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.step();
        }
        while let Some(frame) = self.stack.last() {
            if frame.index < frame.node.children().len() {
                return;
            }
            self.stack.pop();
            if let Some(parent) = self.stack.last_mut() {
                parent.step();
            }
        }
    }
}
