use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

use crate::domain::utils::id::SiteId;
use crate::domain::workflow::graph::{Graph, NodeKey, UNSET_DEPTH};
use crate::domain::workflow::job::JobType;

/// Nodes grouped by the site used for cleanup, in discovery order.
pub type SiteBucket = IndexMap<SiteId, IndexSet<NodeKey>>;

#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub site_bucket: SiteBucket,

    /// Largest depth assigned to any node, 0 for an empty graph.
    pub max_depth: i32,
}

impl Annotation {
    pub fn site_count(&self) -> usize {
        self.site_bucket.len()
    }
}

/// Breadth first pass that sets the depth of every node (roots have depth 1)
/// and buckets the nodes by their cleanup site.
///
/// The depth is the length of the longest path from any root: a child is
/// enqueued again whenever a later parent offers a larger depth.
/// Depths left over from an earlier pass are cleared first.
pub fn annotate_depth_and_sites(graph: &mut Graph) -> Annotation {
    let all: Vec<NodeKey> = graph.keys().collect();
    for key in all {
        graph.set_depth(key, UNSET_DEPTH);
    }

    let mut annotation = Annotation::default();
    let mut queue: VecDeque<NodeKey> = VecDeque::new();

    for root in graph.roots() {
        graph.set_depth(root, 1);
        queue.push_back(root);
    }
    if !queue.is_empty() {
        annotation.max_depth = 1;
    }

    while let Some(current) = queue.pop_front() {
        let Some(node) = graph.node(current) else {
            continue;
        };
        let depth = node.depth();
        let site = node.job.site_for_cleanup().clone();
        annotation.site_bucket.entry(site).or_default().insert(current);

        let children: Vec<NodeKey> = node.children().iter().copied().collect();
        for child in children {
            let child_depth = graph.node(child).map_or(UNSET_DEPTH, |child| child.depth());
            if child_depth != UNSET_DEPTH && child_depth > depth {
                continue;
            }

            graph.set_depth(child, depth + 1);
            annotation.max_depth = annotation.max_depth.max(depth + 1);
            queue.push_back(child);
        }
    }

    log::debug!("Number of sites {}, maximum depth {}", annotation.site_count(), annotation.max_depth);
    for (site, nodes) in &annotation.site_bucket {
        log::debug!("Site {} count jobs = {}", site, nodes.len());
    }

    annotation
}

/// Sets `priority = depth` on every job that has no explicit priority.
/// Cleanup jobs are left alone.
///
/// # Returns
/// Returns the number of jobs that received a priority.
pub fn apply_job_priorities(graph: &mut Graph) -> usize {
    let keys: Vec<NodeKey> = graph.keys().collect();
    let mut applied = 0;

    for key in keys {
        let Some(depth) = graph.node(key).map(|node| node.depth()) else {
            continue;
        };
        if depth == UNSET_DEPTH {
            continue;
        }
        if let Some(job) = graph.job_mut(key) {
            if job.priority.is_none() && job.typ != JobType::Cleanup {
                log::debug!("Applying priority of {} to {}", depth, job.id);
                job.priority = Some(depth);
                applied += 1;
            }
        }
    }

    applied
}
