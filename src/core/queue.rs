//! FIFO buffer of actions awaiting execution.

use super::action::Action;
use super::state::Event;
use std::collections::VecDeque;

/// Ordered buffer of pending actions.
///
/// Owned by exactly one machine. There is no concurrency control; the owning
/// machine serializes every access through `&mut self`.
#[derive(Clone, Debug)]
pub struct ActionQueue<E: Event> {
    elements: VecDeque<Action<E>>,
}

impl<E: Event> Default for ActionQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> ActionQueue<E> {
    pub fn new() -> Self {
        Self {
            elements: VecDeque::new(),
        }
    }

    /// Append an action at the tail.
    pub fn enqueue(&mut self, action: Action<E>) {
        self.elements.push_back(action);
    }

    /// Remove and return the head, or `None` when empty.
    pub fn dequeue(&mut self) -> Option<Action<E>> {
        self.elements.pop_front()
    }

    /// The head, without removing it.
    pub fn peek(&self) -> Option<&Action<E>> {
        self.elements.front()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Discard every buffered action.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Copy of the full ordered contents.
    pub fn snapshot_elements(&self) -> Vec<Action<E>> {
        self.elements.iter().cloned().collect()
    }

    /// Replace the contents with a copy of `elements`.
    pub fn restore_elements(&mut self, elements: &[Action<E>]) {
        self.elements = elements.iter().cloned().collect();
    }
}
