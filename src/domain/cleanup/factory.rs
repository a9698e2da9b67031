use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::api::cleanup_config_dto::SiteDto;
use crate::domain::utils::id::{JobId, LOCAL_SITE, SiteId};
use crate::domain::workflow::job::{Job, JobType, WorkflowFile, file_set};
use crate::error::{Error, Result};

/// Category assigned to cleanup jobs that do not carry one.
pub const DEFAULT_CLEANUP_CATEGORY: &str = "cleanup";

/// Transformation name of cleanup jobs.
pub const CLEANUP_TRANSFORMATION: &str = "cleanup";

/// Basename of the transfer client under `<installDirectory>/bin`.
pub const EXECUTABLE_BASENAME: &str = "wf-transfer";

const FILE_URL_SCHEME: &str = "file:";
const SYMLINK_URL_SCHEME: &str = "symlink:";

/// Turns a clustered cleanup node into the job that deletes its files.
pub trait CleanupJobFactory {
    /// `primary` is the job the cleanup is associated with; it supplies the
    /// staging site and the execution parameters.
    fn create(&self, id: &JobId, files: &[WorkflowFile], primary: &Job) -> Result<Job>;
}

/// What the factory needs to know about a site.
#[derive(Debug, Clone)]
pub struct SiteEntry {
    pub id: SiteId,
    pub work_directory_url: String,
    pub cleanup_executable: Option<String>,
    pub install_directory: Option<String>,
    pub visible_to_local_site: bool,
}

impl SiteEntry {
    pub fn from_dto(dto: &SiteDto) -> Self {
        SiteEntry {
            id: SiteId::new(dto.id.clone()),
            work_directory_url: dto.work_directory_url.trim_end_matches('/').to_string(),
            cleanup_executable: dto.cleanup_executable.clone(),
            install_directory: dto.install_directory.clone(),
            visible_to_local_site: dto.visible_to_local_site,
        }
    }

    /// URL of `lfn` in the site's work directory.
    pub fn url_for(&self, lfn: &str) -> String {
        format!("{}/{}", self.work_directory_url, lfn)
    }

    /// Path of the cleanup executable on this site.
    pub fn executable(&self) -> Option<String> {
        if let Some(executable) = &self.cleanup_executable {
            return Some(executable.clone());
        }
        self.install_directory.as_ref().map(|home| format!("{}/bin/{}", home.trim_end_matches('/'), EXECUTABLE_BASENAME))
    }
}

/// One entry of the transfer request read by the cleanup job on stdin.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveRequest {
    pub id: usize,
    #[serde(rename = "type")]
    pub typ: &'static str,
    pub target: RemoveTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveTarget {
    pub site_label: String,
    pub url: String,
    pub recursive: &'static str,
}

/// Creates cleanup jobs that hand the transfer client a list of remove requests.
///
/// The job is derived from the primary job, runs on the local site unless a
/// file URL on a staging site that the local site cannot see forces it onto the
/// staging site, and gets its stdin document written to the submit directory
/// when one is configured.
#[derive(Debug, Clone, Default)]
pub struct TransferCleanupFactory {
    sites: HashMap<SiteId, SiteEntry>,
    submit_directory: Option<PathBuf>,
}

impl TransferCleanupFactory {
    pub fn new(sites: impl IntoIterator<Item = SiteEntry>) -> Self {
        TransferCleanupFactory { sites: sites.into_iter().map(|site| (site.id.clone(), site)).collect(), submit_directory: None }
    }

    pub fn from_dtos(sites: &[SiteDto]) -> Self {
        Self::new(sites.iter().map(SiteEntry::from_dto))
    }

    pub fn with_submit_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.submit_directory = Some(directory.into());
        self
    }

    pub fn site(&self, id: &SiteId) -> Option<&SiteEntry> {
        self.sites.get(id)
    }

    /// Builds the remove requests and picks the execution site.
    ///
    /// # Returns
    /// Returns the requests and the site the cleanup job has to run on.
    pub fn build_requests(&self, id: &JobId, files: &[WorkflowFile], staging_site: &SiteEntry) -> (Vec<RemoveRequest>, SiteId) {
        let mut execution_site = SiteId::new(LOCAL_SITE);

        let requests = files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let url = staging_site.url_for(file.lfn.as_str());
                let local_path = url.starts_with(FILE_URL_SCHEME) || url.starts_with(SYMLINK_URL_SCHEME);
                if local_path && !staging_site.visible_to_local_site && execution_site.as_str() == LOCAL_SITE {
                    log::debug!("URL for file {} on staging site is a file|symlink URL {}", file.lfn, url);
                    log::debug!("Cleanup job {} instead of running on local site, will run on site {}", id, staging_site.id);
                    execution_site = staging_site.id.clone();
                }

                RemoveRequest {
                    id: i + 1,
                    typ: "remove",
                    target: RemoveTarget { site_label: staging_site.id.id.clone(), url, recursive: "False" },
                }
            })
            .collect();

        (requests, execution_site)
    }
}

impl CleanupJobFactory for TransferCleanupFactory {
    fn create(&self, id: &JobId, files: &[WorkflowFile], primary: &Job) -> Result<Job> {
        let staging_site_id = primary.staging_site_or_site();
        let staging_site = self.site(staging_site_id).ok_or_else(|| Error::SiteNotFound { site: staging_site_id.id.clone() })?;

        let (requests, execution_site) = self.build_requests(id, files, staging_site);
        let executable = self
            .site(&execution_site)
            .and_then(SiteEntry::executable)
            .ok_or_else(|| Error::ExecutableNotFound { site: execution_site.id.clone() })?;

        let request = serde_json::to_string_pretty(&requests).map_err(Error::SerializationError)?;
        let stdin = format!("{}.in", id);
        if let Some(directory) = &self.submit_directory {
            fs::write(directory.join(&stdin), &request)?;
        }

        let mut job = primary.clone();
        job.id = id.clone();
        job.typ = JobType::Cleanup;
        job.transformation = CLEANUP_TRANSFORMATION.to_string();
        job.site = execution_site;
        job.staging_site = Some(staging_site_id.clone());
        job.non_third_party_site = None;
        job.input_files = file_set(files.iter().cloned());
        job.output_files.clear();
        job.arguments.clear();
        job.priority = None;
        job.executable = Some(executable);
        job.stdin = Some(stdin);
        job.transfer_request = Some(request);
        if job.category.is_none() {
            job.category = Some(DEFAULT_CLEANUP_CATEGORY.to_string());
        }

        Ok(job)
    }
}
