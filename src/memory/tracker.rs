//! Session initialization tracking
//!
//! Remembers which sessions have already had their conversation history
//! loaded into context during this process lifetime.

use crate::models::SessionKey;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-lifetime "already primed" flags, one per session.
///
/// Two concurrent requests for the same fresh session may both see
/// `should_load_history() == true`; the worst case is one redundant
/// history read.
#[derive(Debug, Default)]
pub struct SessionTracker {
    initialized: RwLock<HashMap<SessionKey, bool>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn should_load_history(&self, key: &SessionKey) -> bool {
        let initialized = self.initialized.read().await;
        !initialized.get(key).copied().unwrap_or(false)
    }

    pub async fn mark_loaded(&self, key: &SessionKey) {
        let mut initialized = self.initialized.write().await;
        initialized.insert(key.clone(), true);
    }

    /// Number of sessions primed so far
    pub async fn initialized_count(&self) -> usize {
        self.initialized.read().await.values().filter(|v| **v).count()
    }
}
