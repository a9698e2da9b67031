use indexmap::IndexMap;
use std::collections::HashMap;

use crate::domain::utils::id::FileId;
use crate::domain::workflow::graph::NodeKey;
use crate::error::{Error, Result};

/// The cleanup node responsible for deleting a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cleaner {
    /// A cleanup node already inserted into the graph.
    Node(NodeKey),

    /// A clustered node of the level being built, by its slot in that level.
    Pending(usize),
}

/// Maps every claimed file to its cleaner.
///
/// One index per site: it is created when the site's processing starts and
/// dropped afterwards. Entries are never removed or replaced, only pending
/// cleaners are resolved to their graph node once it is inserted.
#[derive(Debug, Clone, Default)]
pub struct CleanedByIndex {
    entries: IndexMap<FileId, Cleaner>,
    pending: HashMap<usize, Vec<FileId>>,
}

impl CleanedByIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lfn: &FileId) -> Option<Cleaner> {
        self.entries.get(lfn).copied()
    }

    /// Records `cleaner` as the one node deleting `lfn`.
    pub fn claim(&mut self, lfn: FileId, cleaner: Cleaner) -> Result<()> {
        if let Some(existing) = self.entries.get(&lfn) {
            return Err(Error::ClusteringInvariant(format!("file {} is already cleaned by {:?}", lfn, existing)));
        }

        if let Cleaner::Pending(slot) = cleaner {
            self.pending.entry(slot).or_default().push(lfn.clone());
        }
        self.entries.insert(lfn, cleaner);

        Ok(())
    }

    /// Points every file claimed by pending `slot` at the inserted node `key`.
    ///
    /// # Returns
    /// Returns the number of files resolved.
    pub fn resolve(&mut self, slot: usize, key: NodeKey) -> usize {
        let Some(files) = self.pending.remove(&slot) else {
            return 0;
        };

        for lfn in &files {
            if let Some(entry) = self.entries.get_mut(lfn) {
                *entry = Cleaner::Node(key);
            }
        }
        files.len()
    }

    /// Number of slots still waiting for their node.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FileId, Cleaner)> {
        self.entries.iter().map(|(lfn, cleaner)| (lfn, *cleaner))
    }
}
