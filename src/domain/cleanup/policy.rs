use crate::error::{Error, Result};

/// Candidates merged into one clustered cleanup job when nothing is configured.
pub const DEFAULT_CANDIDATES_PER_CLUSTER: usize = 10;

/// How the cleanup candidates of one level are merged into clustered jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusteringPolicy {
    /// At most this many clustered jobs per level.
    MaxJobsPerLevel(usize),

    /// This many candidates per clustered job.
    ClusterSize(usize),

    /// One clustered job per ten candidates.
    #[default]
    Default,
}

impl ClusteringPolicy {
    /// Builds the policy from the two configuration knobs.
    /// The cluster size wins when both are set; 0 is rejected.
    pub fn from_knobs(max_jobs_per_level: Option<usize>, cluster_size: Option<usize>) -> Result<Self> {
        match (max_jobs_per_level, cluster_size) {
            (_, Some(0)) => Err(Error::InvalidConfiguration("cleanup cluster size must be greater than 0".to_string())),
            (_, Some(size)) => {
                if max_jobs_per_level.is_some() {
                    log::debug!("Both cleanup cluster size and number are set, using cluster size {}", size);
                }
                Ok(ClusteringPolicy::ClusterSize(size))
            }
            (Some(0), None) => Err(Error::InvalidConfiguration("maximum cleanup jobs per level must be greater than 0".to_string())),
            (Some(jobs), None) => Ok(ClusteringPolicy::MaxJobsPerLevel(jobs)),
            (None, None) => Ok(ClusteringPolicy::Default),
        }
    }

    /// Number of candidates per clustered job for a level of `candidate_count` candidates.
    ///
    /// # Returns
    /// Returns 0 only when there are no candidates.
    pub fn cluster_size(&self, candidate_count: usize) -> usize {
        if candidate_count == 0 {
            return 0;
        }

        match *self {
            ClusteringPolicy::ClusterSize(size) => size.max(1),
            ClusteringPolicy::MaxJobsPerLevel(jobs) => candidate_count.div_ceil(jobs.max(1)),
            ClusteringPolicy::Default => {
                let jobs = candidate_count.div_ceil(DEFAULT_CANDIDATES_PER_CLUSTER);
                candidate_count.div_ceil(jobs)
            }
        }
    }

    /// Number of clustered jobs a level of `candidate_count` candidates is split into.
    pub fn cluster_count(&self, candidate_count: usize) -> usize {
        match self.cluster_size(candidate_count) {
            0 => 0,
            size => candidate_count.div_ceil(size),
        }
    }
}
