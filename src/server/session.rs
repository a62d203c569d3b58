//! Shared session state: the one graph every connection collaborates on,
//! plus the most recently computed MST.
//!
//! Exclusive access is a single coarse mutex over both, shared by all
//! connections. The locking discipline is non-blocking reject-and-retry:
//! [`SharedSession::try_lock`] either grants the guard immediately or fails
//! with [`CommandError::Busy`], and the server never queues a waiter. This
//! bounds per-connection latency at the cost of spurious "in use" failures
//! under contention; any retry is client-initiated.

use tokio::sync::{Mutex, MutexGuard};

use crate::error::CommandError;
use crate::graph::{Edge, Graph};

/// Everything behind the graph lock.
#[derive(Debug, Default)]
pub struct SessionState {
    pub graph: Graph,
    /// Result of the last successful `mst` command. Deliberately NOT
    /// invalidated by later graph mutation: a stale MST stays usable for
    /// `metric` until the next `mst` run replaces it.
    pub last_mst: Vec<Edge>,
}

/// The cross-connection shared state and its lock.
#[derive(Debug, Default)]
pub struct SharedSession {
    state: Mutex<SessionState>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive graph lock without waiting.
    ///
    /// The returned guard may legitimately be held across a command's nested
    /// socket reads, which is why this is an async-aware mutex: a multi-step
    /// command is atomic from the protocol's point of view.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, SessionState>, CommandError> {
        self.state.try_lock().map_err(|_| CommandError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_locker_is_rejected_not_queued() {
        let session = SharedSession::new();
        let guard = session.try_lock().unwrap();
        assert!(matches!(session.try_lock(), Err(CommandError::Busy)));
        drop(guard);
        assert!(session.try_lock().is_ok());
    }

    #[test]
    fn state_starts_empty() {
        let session = SharedSession::new();
        let state = session.try_lock().unwrap();
        assert_eq!(state.graph.vertex_count(), 0);
        assert!(state.last_mst.is_empty());
    }
}
