use crate::syntax::{GreenElement, GreenNode, NodeFlags, StateId, Symbol};
use std::sync::Arc;

/// One parse stack slot.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) state: StateId,
    pub(crate) element: GreenElement,
    /// Extras and error nodes. They sit between grammar symbols and repeat
    /// the state of the entry below them.
    pub(crate) extra: bool,
    /// Absolute end offset of the element.
    pub(crate) end: usize,
}

/// LR stack of states and the subtrees built so far.
///
/// There is no bottom sentinel: an empty stack is in [`StateId::START`].
#[derive(Debug, Clone, Default)]
pub(crate) struct Stack {
    entries: Vec<Entry>,
}

impl Stack {
    pub(crate) fn state(&self) -> StateId {
        self.entries.last().map_or(StateId::START, |entry| entry.state)
    }

    /// End offset of the topmost element.
    pub(crate) fn end(&self) -> usize {
        self.entries.last().map_or(0, |entry| entry.end)
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub(crate) fn push(&mut self, state: StateId, element: GreenElement, extra: bool) {
        let end = self.end() + element.text_len().to_usize();
        self.entries.push(Entry {
            state,
            element,
            extra,
            end,
        });
    }

    pub(crate) fn push_extra(&mut self, element: GreenElement) {
        let state = self.state();
        self.push(state, element, true);
    }

    /// States of the grammar symbols on the stack, bottom first, starting
    /// with [`StateId::START`].
    pub(crate) fn states(&self) -> Vec<StateId> {
        std::iter::once(StateId::START)
            .chain(
                self.entries
                    .iter()
                    .filter(|entry| !entry.extra)
                    .map(|entry| entry.state),
            )
            .collect()
    }

    /// Detaches the extras on top of the stack. They belong after the node
    /// about to be reduced.
    pub(crate) fn take_trailing_extras(&mut self) -> Vec<Entry> {
        let keep = self
            .entries
            .iter()
            .rposition(|entry| !entry.extra)
            .map_or(0, |index| index + 1);
        self.entries.split_off(keep)
    }

    /// Re-pushes detached entries on top of `state`.
    pub(crate) fn restore_extras(&mut self, state: StateId, extras: Vec<Entry>) {
        for entry in extras {
            self.push(state, entry.element, true);
        }
    }

    /// Pops `count` grammar symbols together with the extras between them,
    /// in document order. Extras below the first symbol stay.
    pub(crate) fn pop_symbols(&mut self, count: usize) -> Vec<GreenElement> {
        let mut popped = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            if !entry.extra {
                remaining -= 1;
            }
            popped.push(entry.element);
        }
        popped.reverse();
        popped
    }

    /// Empties the stack, returning its entries bottom first.
    pub(crate) fn drain(&mut self) -> Vec<Entry> {
        std::mem::take(&mut self.entries)
    }

    /// Pushes `elements` wrapped in an `ERROR` node. An error node already
    /// on top, possibly behind extras, absorbs them instead.
    pub(crate) fn push_error(&mut self, elements: Vec<GreenElement>) {
        let keep = self
            .entries
            .iter()
            .rposition(|entry| !entry.extra || is_error_node(&entry.element))
            .map_or(0, |index| index + 1);
        let mut children = Vec::new();
        let previous_error = keep
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
            .is_some_and(|entry| entry.extra && is_error_node(&entry.element));
        if previous_error {
            let between = self.entries.split_off(keep);
            children.extend(self.entries.pop().map(|entry| entry.element));
            children.extend(between.into_iter().map(|entry| entry.element));
        }
        children.extend(elements);
        self.push_extra(error_node(children).into());
    }
}

fn is_error_node(element: &GreenElement) -> bool {
    element.kind().is_error() && element.as_node().is_some()
}

/// An `ERROR` node over `elements`, splicing in the children of nested
/// error nodes.
pub(crate) fn error_node(elements: Vec<GreenElement>) -> Arc<GreenNode> {
    let mut children = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            GreenElement::Node(node) if node.kind().is_error() => {
                children.extend(node.children().iter().cloned());
            }
            other => children.push(other),
        }
    }
    GreenNode::new(Symbol::ERROR, None, NodeFlags::ERROR, children, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{GreenToken, Lookaround, TextSize};

    fn leaf(kind: u16, len: u32) -> GreenElement {
        GreenElement::Token(GreenToken::new(
            Symbol::new(kind),
            TextSize::new(len),
            NodeFlags::empty(),
            Lookaround::default(),
            StateId::START,
            StateId::START,
        ))
    }

    #[test]
    fn test_extras_repeat_state_below() {
        let mut stack = Stack::default();
        stack.push(StateId::new(3), leaf(1, 2), false);
        stack.push_extra(leaf(2, 1).into_extra());
        assert_eq!(stack.state(), StateId::new(3));
        assert_eq!(stack.end(), 3);
        assert_eq!(stack.states(), [StateId::START, StateId::new(3)]);
    }

    #[test]
    fn test_pop_symbols_keeps_leading_extras() {
        let mut stack = Stack::default();
        stack.push_extra(leaf(9, 1).into_extra());
        stack.push(StateId::new(1), leaf(1, 1), false);
        stack.push_extra(leaf(9, 1).into_extra());
        stack.push(StateId::new(2), leaf(2, 1), false);
        stack.push_extra(leaf(9, 1).into_extra());

        let trailing = stack.take_trailing_extras();
        assert_eq!(trailing.len(), 1);
        let children = stack.pop_symbols(2);
        assert_eq!(children.len(), 3);
        assert!(children[1].is_extra());
        assert_eq!(stack.entries().len(), 1);
        assert_eq!(stack.end(), 1);
    }

    #[test]
    fn test_adjacent_errors_coalesce() {
        let mut stack = Stack::default();
        stack.push(StateId::new(1), leaf(1, 1), false);
        stack.push_error(vec![leaf(2, 1)]);
        stack.push_extra(leaf(9, 1).into_extra());
        stack.push_error(vec![leaf(3, 1)]);

        assert_eq!(stack.entries().len(), 2);
        let error = stack.entries()[1].element.as_node().unwrap();
        assert!(error.kind().is_error());
        assert_eq!(error.children().len(), 3);
        assert_eq!(stack.end(), 4);
        assert_eq!(stack.state(), StateId::new(1));
    }

    #[test]
    fn test_error_node_flattens_nested_errors() {
        let inner = error_node(vec![leaf(1, 1), leaf(2, 1)]);
        let outer = error_node(vec![inner.into(), leaf(3, 2)]);
        assert_eq!(outer.children().len(), 3);
        assert_eq!(outer.text_len(), TextSize::new(4));
        assert!(outer.has_error());
    }
}
