use crate::domain::cleanup::retention::RetentionSet;
use crate::domain::workflow::graph::{Graph, NodeKey};
use crate::domain::workflow::job::{FileSet, JobType, WorkflowFile};

/// The files a single job renders deletable at its point in the DAG walk.
#[derive(Debug, Clone)]
pub struct CleanupCandidate {
    pub node: NodeKey,
    pub files: Vec<WorkflowFile>,
}

/// Checks whether the files of a job are looked at for cleanup.
///
/// Compute and sub-workflow jobs always are. Stage-out and inter-pool jobs
/// only when they have a parent; a parentless transfer is logged and skipped.
pub fn needs_cleanup(graph: &Graph, key: NodeKey) -> bool {
    let Some(node) = graph.node(key) else {
        return false;
    };

    match node.job.typ {
        JobType::Compute | JobType::SubWorkflow => true,
        JobType::StageOut | JobType::InterPool => {
            if node.parents().is_empty() {
                log::warn!("{:?} job {} has no parents, its files are not considered for cleanup", node.job.typ, node.id());
                return false;
            }
            true
        }
        JobType::StageIn | JobType::CreateDir | JobType::Cleanup | JobType::Other => false,
    }
}

/// Computes the cleanup candidate of one job.
///
/// Inputs and outputs whose cleanup flag is set, minus the retained files.
/// Works on a private copy; the job's own file lists are never touched.
///
/// # Returns
/// Returns None if the job is not cleaned up or nothing is left to delete.
pub fn build_candidate(graph: &Graph, key: NodeKey, retention: &RetentionSet) -> Option<CleanupCandidate> {
    if !needs_cleanup(graph, key) {
        return None;
    }
    let job = graph.job(key)?;

    let mut files = FileSet::new();
    for file in job.input_files.values().chain(job.output_files.values()) {
        if !file.cleanup || retention.contains(&file.lfn) {
            continue;
        }
        files.entry(file.lfn.clone()).or_insert_with(|| file.clone());
    }

    if files.is_empty() {
        log::trace!("Job {} leaves nothing to clean up", job.id);
        return None;
    }

    Some(CleanupCandidate { node: key, files: files.into_values().collect() })
}
