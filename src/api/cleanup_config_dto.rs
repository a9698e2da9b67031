use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CleanupConfigDto {
    /// Maximum number of clustered cleanup jobs per level.
    #[serde(default)]
    pub clusters_num: Option<usize>,

    /// Number of cleanup candidates merged into one clustered cleanup job.
    /// Takes precedence over `clusters_num`.
    #[serde(default)]
    pub clusters_size: Option<usize>,

    #[serde(default)]
    pub apply_job_priorities: bool,

    #[serde(default)]
    pub cleanup_category_max_jobs: Option<usize>,

    #[serde(default)]
    pub submit_directory: Option<String>,

    #[serde(default)]
    pub sites: Vec<SiteDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SiteDto {
    pub id: String,

    /// URL prefix of the shared scratch directory on the site.
    pub work_directory_url: String,

    #[serde(default)]
    pub cleanup_executable: Option<String>,

    #[serde(default)]
    pub install_directory: Option<String>,

    #[serde(default = "default_visible")]
    pub visible_to_local_site: bool,
}

fn default_visible() -> bool {
    true
}
