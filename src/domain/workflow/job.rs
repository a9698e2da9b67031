use indexmap::IndexMap;

use crate::domain::utils::id::{FileId, JobId, SiteId};

/// Closed set of job kinds, decided once when the job is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    Compute,
    StageIn,
    StageOut,
    /// Transfer between two execution sites.
    InterPool,
    CreateDir,
    /// Composite job that plans and runs a nested workflow.
    SubWorkflow,
    Cleanup,
    Other,
}

impl JobType {
    /// Stage-out and inter-pool jobs are both transfers away from a staging site.
    pub fn is_stage_out(self) -> bool {
        matches!(self, JobType::StageOut | JobType::InterPool)
    }
}

/// A file referenced by a job, keyed by its logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowFile {
    pub lfn: FileId,

    /// The file is not staged out to an output site and may be deleted once
    /// every consumer has run.
    pub transient: bool,

    /// Site independent override: `false` disables cleanup of this file
    /// regardless of transience.
    pub cleanup: bool,
}

impl WorkflowFile {
    pub fn new(lfn: impl Into<String>) -> Self {
        WorkflowFile { lfn: FileId::new(lfn), transient: false, cleanup: true }
    }

    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// Ordered set of files, iteration follows the order the job declared them.
pub type FileSet = IndexMap<FileId, WorkflowFile>;

/// Builds a `FileSet`, a later duplicate of the same logical name is dropped.
pub fn file_set(files: impl IntoIterator<Item = WorkflowFile>) -> FileSet {
    let mut set = FileSet::new();
    for file in files {
        set.entry(file.lfn.clone()).or_insert(file);
    }
    set
}

/// The job descriptor carried by every graph node.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub typ: JobType,

    /// Logical transformation executed by the job.
    pub transformation: String,

    /// Execution site.
    pub site: SiteId,

    /// Site holding the job's working directory files.
    pub staging_site: Option<SiteId>,

    /// For transfer jobs: the site the transfer is not third party for.
    pub non_third_party_site: Option<SiteId>,

    pub input_files: FileSet,
    pub output_files: FileSet,

    pub priority: Option<i32>,
    pub category: Option<String>,
    pub executable: Option<String>,
    pub arguments: String,

    /// Name of the stdin file of the job.
    pub stdin: Option<String>,

    /// Cleanup jobs only: the transfer request document read on stdin.
    pub transfer_request: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>, typ: JobType, site: impl Into<String>) -> Self {
        Job {
            id: JobId::new(id),
            typ,
            transformation: String::new(),
            site: SiteId::new(site),
            staging_site: None,
            non_third_party_site: None,
            input_files: FileSet::new(),
            output_files: FileSet::new(),
            priority: None,
            category: None,
            executable: None,
            arguments: String::new(),
            stdin: None,
            transfer_request: None,
        }
    }

    pub fn with_staging_site(mut self, site: impl Into<String>) -> Self {
        self.staging_site = Some(SiteId::new(site));
        self
    }

    pub fn with_non_third_party_site(mut self, site: impl Into<String>) -> Self {
        self.non_third_party_site = Some(SiteId::new(site));
        self
    }

    pub fn with_inputs(mut self, files: impl IntoIterator<Item = WorkflowFile>) -> Self {
        self.input_files = file_set(files);
        self
    }

    pub fn with_outputs(mut self, files: impl IntoIterator<Item = WorkflowFile>) -> Self {
        self.output_files = file_set(files);
        self
    }

    /// Site whose working directory holds this job's files.
    pub fn staging_site_or_site(&self) -> &SiteId {
        self.staging_site.as_ref().unwrap_or(&self.site)
    }

    /// The site a job is bucketed under for cleanup.
    ///
    /// Transfer jobs use their non third party site, compute jobs their
    /// staging site, everything else the execution site.
    pub fn site_for_cleanup(&self) -> &SiteId {
        match self.typ {
            JobType::StageOut | JobType::InterPool => match &self.non_third_party_site {
                Some(site) => site,
                None => {
                    log::debug!("Transfer job {} has no non third party site, using execution site {}", self.id, self.site);
                    &self.site
                }
            },
            JobType::Compute => match &self.staging_site {
                Some(site) => site,
                None => {
                    log::debug!("Compute job {} has no staging site, using execution site {}", self.id, self.site);
                    &self.site
                }
            },
            JobType::StageIn | JobType::CreateDir | JobType::SubWorkflow | JobType::Cleanup | JobType::Other => &self.site,
        }
    }
}
