use std::collections::VecDeque;

use crate::connection::Connection;
use crate::event::ConnHandle;

/// Connections with bumps that have not been sent to the fast path.
///
/// Each connection is listed at most once, tracked by a flag in the connection itself. The flag
/// is only cleared when the entry is taken from the list.
#[derive(Debug, Default)]
pub(crate) struct PendingList {
    queue: VecDeque<ConnHandle>,
}

impl PendingList {
    pub(crate) fn new() -> Self {
        PendingList::default()
    }

    /// Schedule a bump for a connection, unless it is already scheduled.
    pub(crate) fn schedule(&mut self, handle: ConnHandle, conn: &mut Connection) {
        if !conn.is_pending() {
            conn.set_pending(true);
            self.queue.push_back(handle);
        }
    }

    /// Take the oldest entry.
    ///
    /// The caller must clear the flag of the connection, or put the entry back.
    pub(crate) fn pop(&mut self) -> Option<ConnHandle> {
        self.queue.pop_front()
    }

    /// Put an entry back at the front, it keeps its place in the order.
    pub(crate) fn unpop(&mut self, handle: ConnHandle) {
        self.queue.push_front(handle);
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
