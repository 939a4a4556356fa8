//! Append-only alert history.
//!
//! Records form a shared singly linked list with the newest record at the
//! head. Appending swaps the head pointer in O(1). Listing clones the head
//! `Arc` and walks it lazily, so a listing is unaffected by later appends and
//! can be restarted by cloning the iterator or calling `list` again.

use std::sync::{Arc, Mutex, MutexGuard};

use railsafe_core::types::AlertRecord;

struct Node {
    record: AlertRecord,
    next: Option<Arc<Node>>,
}

impl Drop for Node {
    // Unlink iteratively so a long history does not recurse on drop.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

#[derive(Default)]
struct Head {
    first: Option<Arc<Node>>,
    len: usize,
}

/// Session-scoped alert history. Cloning shares the same log.
#[derive(Clone, Default)]
pub struct AlertHistory {
    head: Arc<Mutex<Head>>,
}

impl AlertHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Never fails.
    pub fn record(&self, record: AlertRecord) {
        tracing::debug!(alert_id = %record.id, status = %record.resolution_status, "Alert recorded");
        let mut head = self.lock();
        let next = head.first.take();
        head.first = Some(Arc::new(Node { record, next }));
        head.len += 1;
    }

    /// Records, most recent first.
    pub fn list(&self) -> HistoryIter {
        HistoryIter {
            cursor: self.lock().first.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Head> {
        self.head
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for AlertHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertHistory")
            .field("len", &self.len())
            .finish()
    }
}

/// Lazy most-recent-first walk over a history snapshot.
#[derive(Clone)]
pub struct HistoryIter {
    cursor: Option<Arc<Node>>,
}

impl Iterator for HistoryIter {
    type Item = AlertRecord;

    fn next(&mut self) -> Option<AlertRecord> {
        let node = self.cursor.take()?;
        self.cursor = node.next.clone();
        Some(node.record.clone())
    }
}
