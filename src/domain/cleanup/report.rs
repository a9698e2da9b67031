use serde::Serialize;
use std::path::Path;

use crate::domain::utils::id::{FileId, JobId, SiteId};
use crate::error::Result;

/// Which cleanup job deletes a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanedFile {
    pub lfn: FileId,
    pub site: SiteId,
    pub cleanup_job: JobId,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummary {
    pub level: i32,
    pub candidates: usize,
    pub cleanup_jobs: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteCleanupSummary {
    pub site: SiteId,

    /// Jobs bucketed under this site.
    pub jobs: usize,

    /// Levels that produced at least one candidate, deepest first.
    pub levels: Vec<LevelSummary>,

    pub cleanup_jobs: Vec<JobId>,
    pub cleaned_files: Vec<CleanedFile>,

    /// Parent edges dropped by the transitive reduction.
    pub removed_edges: usize,
}

/// Outcome of one in-place cleanup pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub max_depth: i32,
    pub retained_files: usize,
    pub prioritized_jobs: usize,

    /// Throttle for the cleanup job category, for the job submitter.
    pub cleanup_category_max_jobs: usize,

    pub sites: Vec<SiteCleanupSummary>,
}

impl CleanupReport {
    pub fn cleanup_job_count(&self) -> usize {
        self.sites.iter().map(|site| site.cleanup_jobs.len()).sum()
    }

    pub fn cleaned_file_count(&self) -> usize {
        self.sites.iter().map(|site| site.cleaned_files.len()).sum()
    }

    pub fn removed_edge_count(&self) -> usize {
        self.sites.iter().map(|site| site.removed_edges).sum()
    }

    /// All file -> cleanup job entries of every site.
    pub fn cleanup_list(&self) -> impl Iterator<Item = &CleanedFile> {
        self.sites.iter().flat_map(|site| site.cleaned_files.iter())
    }

    /// Writes the cleanup list as CSV with the columns `lfn,site,cleanupJob`.
    pub fn write_cleanup_list(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for entry in self.cleanup_list() {
            writer.serialize(entry)?;
        }
        writer.flush()?;

        Ok(())
    }
}
