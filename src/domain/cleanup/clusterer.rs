use indexmap::IndexSet;

use crate::domain::cleanup::candidate::CleanupCandidate;
use crate::domain::cleanup::cleaned_by::{CleanedByIndex, Cleaner};
use crate::domain::cleanup::policy::ClusteringPolicy;
use crate::domain::utils::id::{JobId, SiteId};
use crate::domain::workflow::graph::{Graph, NodeKey};
use crate::domain::workflow::job::WorkflowFile;
use crate::error::{Error, Result};

/// Prefix of every cleanup job id.
pub const CLEANUP_JOB_PREFIX: &str = "clean_up_";

/// A cleanup node built from a chunk of candidates, not yet in the graph.
#[derive(Debug, Clone)]
pub struct ClusteredCleanupNode {
    pub id: JobId,
    pub site: SiteId,
    pub level: i32,

    /// Position among the clusters emitted for this level.
    pub slot: usize,

    /// Files this node deletes, each claimed by no other node of the site.
    pub files: Vec<WorkflowFile>,

    /// The candidate whose job supplies the execution parameters.
    pub primary: NodeKey,

    /// Jobs that must finish before the files are deleted.
    pub parents: IndexSet<NodeKey>,

    /// Number of candidates merged into this node.
    pub constituents: usize,
}

/// Output of clustering one level of one site.
#[derive(Debug, Clone, Default)]
pub struct LevelClusters {
    pub clusters: Vec<ClusteredCleanupNode>,

    /// `producer -> cleanup node` edges towards cleanup nodes of deeper
    /// levels that already claimed one of the producer's files.
    pub guard_edges: IndexSet<(NodeKey, NodeKey)>,
}

/// Id of the `index`-th clustered cleanup job of a level.
pub fn generate_clustered_job_id(site: &SiteId, level: i32, index: usize) -> JobId {
    JobId::new(format!("{}{}_level_{}_{}", CLEANUP_JOB_PREFIX, site, level, index))
}

/// Merges the candidates of one level into clustered cleanup nodes.
///
/// Candidates are consumed in the given order in contiguous chunks of the
/// size the policy picks. A file already claimed in `index` is not deleted
/// again: the candidate's job becomes a parent of the node that claimed it
/// instead. A chunk whose files were all claimed produces no node.
pub fn cluster_level(
    graph: &Graph,
    site: &SiteId,
    level: i32,
    candidates: &[CleanupCandidate],
    policy: ClusteringPolicy,
    index: &mut CleanedByIndex,
) -> Result<LevelClusters> {
    let mut level_clusters = LevelClusters::default();
    if candidates.is_empty() {
        return Ok(level_clusters);
    }

    let cluster_size = policy.cluster_size(candidates.len());
    if cluster_size == 0 {
        return Err(Error::ClusteringInvariant(format!("cluster size 0 for {} candidates at level {}", candidates.len(), level)));
    }
    log::debug!("Clustering {} cleanup nodes at level {} with cluster size {}", candidates.len(), level, cluster_size);

    for (chunk_index, chunk) in candidates.chunks(cluster_size).enumerate() {
        let id = generate_clustered_job_id(site, level, chunk_index);
        log::debug!("\tCreating a clustered cleanup job named {} consisting of {} nodes", id, chunk.len());

        if let Some(cluster) = build_clustered_node(graph, id, site, level, chunk, index, &mut level_clusters)? {
            level_clusters.clusters.push(cluster);
        }
    }

    Ok(level_clusters)
}

/// Builds the clustered node for one chunk.
///
/// # Returns
/// Returns None if every file of the chunk was already claimed.
fn build_clustered_node(
    graph: &Graph,
    id: JobId,
    site: &SiteId,
    level: i32,
    chunk: &[CleanupCandidate],
    index: &mut CleanedByIndex,
    level_clusters: &mut LevelClusters,
) -> Result<Option<ClusteredCleanupNode>> {
    let slot = level_clusters.clusters.len();
    let mut files: Vec<WorkflowFile> = Vec::new();
    let mut parents: IndexSet<NodeKey> = IndexSet::new();
    let mut primary: Option<NodeKey> = None;

    for candidate in chunk {
        let mut contributed = false;

        for file in &candidate.files {
            match index.get(&file.lfn) {
                None => {
                    index.claim(file.lfn.clone(), Cleaner::Pending(slot))?;
                    files.push(file.clone());
                    contributed = true;
                }
                Some(Cleaner::Pending(claimed_by)) if claimed_by == slot => {
                    parents.insert(candidate.node);
                }
                Some(Cleaner::Pending(claimed_by)) => {
                    let earlier = level_clusters.clusters.get_mut(claimed_by).ok_or_else(|| {
                        Error::ClusteringInvariant(format!("file {} is claimed by unknown slot {} at level {}", file.lfn, claimed_by, level))
                    })?;
                    earlier.parents.insert(candidate.node);
                }
                Some(Cleaner::Node(cleanup)) => {
                    log::trace!("File {} is already cleaned by {}, guarding it after {}", file.lfn, graph.describe(cleanup), graph.describe(candidate.node));
                    level_clusters.guard_edges.insert((candidate.node, cleanup));
                }
            }
        }

        if contributed {
            parents.insert(candidate.node);
            primary = Some(candidate.node);
        }
    }

    if files.is_empty() {
        log::debug!("\tDiscarding {}, all of its files are cleaned up elsewhere", id);
        return Ok(None);
    }
    let primary = primary.ok_or_else(|| Error::ClusteringInvariant(format!("{} has files but no contributing job", id)))?;

    Ok(Some(ClusteredCleanupNode { id, site: site.clone(), level, slot, files, primary, parents, constituents: chunk.len() }))
}
