//! In-memory record store.
//!
//! Useful for testing and dry runs.

use super::RecordStore;
use crate::error::Result;
use crate::record::LogEntry;
use async_trait::async_trait;
use std::sync::RwLock;

/// In-memory store keeping `(domain, entry)` pairs in insertion order.
pub struct MemoryStore {
    entries: RwLock<Vec<(String, LogEntry)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of everything appended so far.
    pub fn entries(&self) -> Vec<(String, LogEntry)> {
        self.entries.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, entry: &LogEntry, domain_id: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.push((domain_id.to_string(), entry.clone()));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
