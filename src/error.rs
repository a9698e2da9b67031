use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse workflow JSON: {0}")]
    DeserializationError(#[source] serde_json::Error),

    #[error("Failed to serialize JSON document: {0}")]
    SerializationError(#[source] serde_json::Error),

    #[error("Failed to write cleanup list: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Failed to build workflow graph: {0}")]
    ModelConstructionError(String),

    #[error("Workflow graph is not acyclic, jobs on a cycle: {jobs:?}")]
    CycleDetected { jobs: Vec<String> },

    #[error("Node {0} is not part of the workflow graph")]
    UnknownNode(String),

    #[error("Cleanup job {cleanup_job}: transfer job {job} has no compute job parent")]
    MissingComputeParent { cleanup_job: String, job: String },

    #[error("Logic error in the in-place cleanup algorithm: {0}")]
    ClusteringInvariant(String),

    #[error("Site {site} is not known to the cleanup job factory")]
    SiteNotFound { site: String },

    #[error("Could not determine a cleanup executable for site {site}")]
    ExecutableNotFound { site: String },

    #[error("Invalid cleanup configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
