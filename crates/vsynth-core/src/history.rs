//! Snapshot undo/redo history.
//!
//! Documents are immutable values shared through [`Arc`], so history is just
//! three places to keep them: the past, the present and the future. Undo and
//! redo move the present pointer; they never recompute anything.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::document::Document;

/// Past/present/future stacks of document snapshots.
#[derive(Debug, Clone)]
pub struct History {
    past: VecDeque<Arc<Document>>,
    present: Arc<Document>,
    future: Vec<Arc<Document>>,
    /// Maximum number of past snapshots kept. `None` is unbounded.
    limit: Option<usize>,
}

impl History {
    pub fn new(initial: Document) -> Self {
        Self::with_limit(initial, None)
    }

    pub fn with_limit(initial: Document, limit: Option<usize>) -> Self {
        History {
            past: VecDeque::new(),
            present: Arc::new(initial),
            future: Vec::new(),
            limit,
        }
    }

    /// The current snapshot.
    pub fn present(&self) -> &Arc<Document> {
        &self.present
    }

    /// Records a new present. The redo future is discarded and, with a
    /// limit set, the oldest past snapshots are dropped.
    pub fn push(&mut self, document: Document) {
        let previous = std::mem::replace(&mut self.present, Arc::new(document));
        self.past.push_back(previous);
        self.future.clear();
        if let Some(limit) = self.limit {
            while self.past.len() > limit {
                self.past.pop_front();
            }
        }
    }

    /// Steps back one snapshot. Returns `false` if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push(current);
        true
    }

    /// Steps forward one snapshot. Returns `false` if there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Replaces the present and forgets both stacks.
    pub fn reset(&mut self, document: Document) {
        self.past.clear();
        self.future.clear();
        self.present = Arc::new(document);
    }
}
