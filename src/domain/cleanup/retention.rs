use std::collections::HashSet;

use crate::domain::utils::id::FileId;
use crate::domain::workflow::graph::Graph;
use crate::domain::workflow::job::JobType;

/// Files that must never be scheduled for deletion. Built once per run.
#[derive(Debug, Clone, Default)]
pub struct RetentionSet {
    files: HashSet<FileId>,
}

impl RetentionSet {
    pub fn contains(&self, lfn: &FileId) -> bool {
        self.files.contains(lfn)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileId> {
        self.files.iter()
    }
}

/// A compute job without a stage-out child leaves its non transient outputs in
/// place: those files are final results and are retained.
pub fn build_retention_set(graph: &Graph) -> RetentionSet {
    let mut retention = RetentionSet::default();

    for (key, node) in graph.iter() {
        if node.job.typ != JobType::Compute {
            continue;
        }

        let has_stage_out = graph.children(key).any(|child| graph.job(child).is_some_and(|job| job.typ == JobType::StageOut));
        if has_stage_out {
            continue;
        }

        for file in node.job.output_files.values().filter(|file| !file.transient) {
            log::trace!("Retaining {} produced by {}", file.lfn, node.id());
            retention.files.insert(file.lfn.clone());
        }
    }

    log::debug!("{} files are retained and never cleaned up", retention.len());
    retention
}
