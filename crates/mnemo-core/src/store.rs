//! In-memory store of memory entries, iterated in insertion order.

use std::collections::{BTreeMap, HashMap};

use crate::entry::{EntryId, MemoryEntry};
use crate::error::{MemoryError, MemoryResult};

/// Owned aggregate of entries. Each entry carries its own embedding, so an
/// entry and its vector are inserted and removed as one value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<u64, MemoryEntry>,
    positions: HashMap<EntryId, u64>,
    next_seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Insert an entry. An existing entry with the same id is replaced in
    /// place and keeps its insertion position; the old value is returned.
    pub fn put(&mut self, entry: MemoryEntry) -> Option<MemoryEntry> {
        if let Some(&seq) = self.positions.get(&entry.id) {
            return self.entries.insert(seq, entry);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.positions.insert(entry.id.clone(), seq);
        self.entries.insert(seq, entry);
        None
    }

    /// Get an entry by id.
    pub fn get(&self, id: &str) -> MemoryResult<&MemoryEntry> {
        self.positions
            .get(id)
            .and_then(|seq| self.entries.get(seq))
            .ok_or_else(|| MemoryError::EntryNotFound { id: id.into() })
    }

    /// Remove an entry by id. No-op (returns `None`) if absent.
    pub fn delete(&mut self, id: &str) -> Option<MemoryEntry> {
        let seq = self.positions.remove(id)?;
        self.entries.remove(&seq)
    }

    /// All entries in insertion order.
    pub fn list_all(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.values()
    }

    /// Owned copy of all entries in insertion order.
    pub fn snapshot(&self) -> Vec<MemoryEntry> {
        self.entries.values().cloned().collect()
    }

    /// Replace an entry's content and embedding together.
    pub fn replace_content(
        &mut self,
        id: &str,
        content: impl Into<String>,
        embedding: Vec<f32>,
        session: u32,
        reason: Option<String>,
    ) -> MemoryResult<&MemoryEntry> {
        let seq = *self
            .positions
            .get(id)
            .ok_or_else(|| MemoryError::EntryNotFound { id: id.into() })?;
        let entry = self
            .entries
            .get_mut(&seq)
            .ok_or_else(|| MemoryError::EntryNotFound { id: id.into() })?;
        entry.replace_content(content, embedding, session, reason);
        Ok(entry)
    }

    /// Allocate an id not currently used by any entry.
    pub fn allocate_id(&self) -> EntryId {
        loop {
            let id = EntryId::generate();
            if !self.contains(id.as_str()) {
                return id;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
        self.next_seq = 0;
    }
}
