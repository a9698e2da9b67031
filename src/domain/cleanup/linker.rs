use crate::domain::cleanup::cleaned_by::CleanedByIndex;
use crate::domain::cleanup::clusterer::{ClusteredCleanupNode, LevelClusters};
use crate::domain::cleanup::factory::CleanupJobFactory;
use crate::domain::workflow::graph::{Graph, NodeKey};
use crate::domain::workflow::job::JobType;
use crate::error::{Error, Result};

/// First compute job among the parents of `key`.
pub fn compute_parent(graph: &Graph, key: NodeKey) -> Option<NodeKey> {
    graph.parents(key).find(|parent| graph.job(*parent).is_some_and(|job| job.typ == JobType::Compute))
}

/// The job whose parameters the cleanup job is created from.
///
/// For a stage-out or inter-pool candidate this is its compute parent, which
/// has to exist; otherwise it is the candidate itself.
pub fn primary_node(graph: &Graph, cluster: &ClusteredCleanupNode) -> Result<NodeKey> {
    let job = graph.job(cluster.primary).ok_or_else(|| Error::UnknownNode(format!("{:?}", cluster.primary)))?;

    if !job.typ.is_stage_out() {
        return Ok(cluster.primary);
    }

    let compute = compute_parent(graph, cluster.primary)
        .ok_or_else(|| Error::MissingComputeParent { cleanup_job: cluster.id.id.clone(), job: job.id.id.clone() })?;
    log::debug!("For cleanup job {} the associated compute job is {}", cluster.id, graph.describe(compute));

    Ok(compute)
}

/// Materialises the clusters of one level and wires them into the graph.
///
/// Every cluster becomes a node holding the factory's job with an edge from
/// each of its parents; its pending claims in `index` are resolved to the new
/// node. Afterwards the guard edges towards deeper cleanup nodes are added.
///
/// # Returns
/// Returns the keys of the inserted cleanup nodes in cluster order.
pub fn link_level(graph: &mut Graph, level_clusters: LevelClusters, factory: &dyn CleanupJobFactory, index: &mut CleanedByIndex) -> Result<Vec<NodeKey>> {
    let mut inserted = Vec::with_capacity(level_clusters.clusters.len());

    for cluster in level_clusters.clusters {
        let primary = primary_node(graph, &cluster)?;
        let primary_job = graph.job(primary).ok_or_else(|| Error::UnknownNode(format!("{:?}", primary)))?;

        let mut job = factory.create(&cluster.id, &cluster.files, primary_job)?;
        if job.id != cluster.id {
            return Err(Error::ClusteringInvariant(format!("factory renamed cleanup job {} to {}", cluster.id, job.id)));
        }
        job.typ = JobType::Cleanup;

        let key = graph.add_node(job)?;
        for parent in &cluster.parents {
            graph.add_edge(*parent, key)?;
        }
        let resolved = index.resolve(cluster.slot, key);
        log::debug!("Added cleanup job {} deleting {} files after {} jobs", cluster.id, resolved, cluster.parents.len());

        inserted.push(key);
    }

    for (producer, cleanup) in level_clusters.guard_edges {
        graph.add_edge(producer, cleanup)?;
    }

    if index.pending_count() > 0 {
        return Err(Error::ClusteringInvariant(format!("{} clustered cleanup nodes were never inserted", index.pending_count())));
    }

    Ok(inserted)
}
