//! Bounded undo/redo stacks of whole-state snapshots.

use std::collections::VecDeque;

use super::StateValue;

/// Undo/redo history.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<StateValue>,
    redo: Vec<StateValue>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a pre-mutation snapshot. Clears the redo stack and returns
    /// the oldest entry if it was evicted.
    pub fn push(&mut self, snapshot: StateValue) -> Option<StateValue> {
        self.redo.clear();
        self.push_undo(snapshot)
    }

    fn push_undo(&mut self, snapshot: StateValue) -> Option<StateValue> {
        if self.capacity == 0 {
            return Some(snapshot);
        }
        self.undo.push_back(snapshot);
        if self.undo.len() > self.capacity {
            self.undo.pop_front()
        } else {
            None
        }
    }

    /// Pop the latest snapshot, parking `current` on the redo stack.
    pub fn undo(&mut self, current: StateValue) -> Option<StateValue> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Pop the latest redo snapshot, parking `current` on the undo stack.
    pub fn redo(&mut self, current: StateValue) -> Option<StateValue> {
        let next = self.redo.pop()?;
        self.push_undo(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Drop the newest undo entry without applying it.
    pub(crate) fn discard_newest(&mut self) -> Option<StateValue> {
        self.undo.pop_back()
    }

    /// Put back an entry evicted by [`History::push`].
    pub(crate) fn restore_oldest(&mut self, snapshot: StateValue) {
        if self.undo.len() < self.capacity {
            self.undo.push_front(snapshot);
        }
    }

    pub(crate) fn take_redo(&mut self) -> Vec<StateValue> {
        std::mem::take(&mut self.redo)
    }

    pub(crate) fn restore_redo(&mut self, redo: Vec<StateValue>) {
        self.redo = redo;
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::config::MAX_UNDO_STACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> StateValue {
        StateValue::Number(v)
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut history = History::new(2);
        assert!(history.push(n(1.0)).is_none());
        assert!(history.push(n(2.0)).is_none());
        assert_eq!(history.push(n(3.0)), Some(n(1.0)));
        assert_eq!(history.undo_len(), 2);
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut history = History::new(10);
        history.push(n(0.0));
        let restored = history.undo(n(1.0)).unwrap();
        assert_eq!(restored, n(0.0));
        assert!(history.can_redo());
        let again = history.redo(restored).unwrap();
        assert_eq!(again, n(1.0));
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = History::new(10);
        history.push(n(0.0));
        history.undo(n(1.0));
        history.push(n(5.0));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_stacks() {
        let mut history = History::new(10);
        assert!(history.undo(n(1.0)).is_none());
        assert!(history.redo(n(1.0)).is_none());
        assert!(!history.can_redo());
    }
}
