//! Per-chat serialization of mutating operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// One async mutex per `(uid, chat_id)`, created on demand.
///
/// Entries nobody holds are pruned whenever a new lock is taken, so the
/// table only grows with the number of chats currently being written.
#[derive(Default)]
pub struct ChatLocks {
    table: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one chat.
    pub async fn acquire(&self, uid: &str, chat_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self
                .table
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            table.retain(|_, l| Arc::strong_count(l) > 1);
            table
                .entry(format!("{uid}/{chat_id}"))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}
