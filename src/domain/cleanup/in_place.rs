use indexmap::{IndexMap, IndexSet};

use crate::domain::cleanup::annotator::{annotate_depth_and_sites, apply_job_priorities};
use crate::domain::cleanup::candidate::{CleanupCandidate, build_candidate};
use crate::domain::cleanup::cleaned_by::{CleanedByIndex, Cleaner};
use crate::domain::cleanup::clusterer::cluster_level;
use crate::domain::cleanup::factory::CleanupJobFactory;
use crate::domain::cleanup::linker::link_level;
use crate::domain::cleanup::policy::ClusteringPolicy;
use crate::domain::cleanup::reducer::reduce_all;
use crate::domain::cleanup::report::{CleanedFile, CleanupReport, LevelSummary, SiteCleanupSummary};
use crate::domain::cleanup::retention::{RetentionSet, build_retention_set};
use crate::domain::utils::id::SiteId;
use crate::domain::workflow::graph::{Graph, NodeKey};
use crate::error::{Error, Result};

/// Default `maxjobs` throttle of the cleanup job category.
pub const DEFAULT_MAX_JOBS_FOR_CLEANUP_CATEGORY: usize = 4;

/// Inserts cleanup jobs into a workflow graph, deleting every intermediate
/// file as soon as the last job touching it on its site has run.
pub struct InPlaceCleanup<'a> {
    factory: &'a dyn CleanupJobFactory,
    policy: ClusteringPolicy,
    apply_job_priorities: bool,
    cleanup_category_max_jobs: usize,
}

impl<'a> InPlaceCleanup<'a> {
    pub fn new(factory: &'a dyn CleanupJobFactory) -> Self {
        InPlaceCleanup {
            factory,
            policy: ClusteringPolicy::default(),
            apply_job_priorities: false,
            cleanup_category_max_jobs: DEFAULT_MAX_JOBS_FOR_CLEANUP_CATEGORY,
        }
    }

    pub fn with_policy(mut self, policy: ClusteringPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_job_priorities(mut self, apply: bool) -> Self {
        self.apply_job_priorities = apply;
        self
    }

    pub fn with_cleanup_category_max_jobs(mut self, max_jobs: usize) -> Self {
        self.cleanup_category_max_jobs = max_jobs;
        self
    }

    /// Adds the cleanup jobs to `graph` in place.
    ///
    /// **Phase 1:** The graph is checked for cycles, then every node gets its
    /// depth and is bucketed by the site its files are cleaned on.
    ///
    /// **Phase 2:** The retained files (final outputs that are not staged out)
    /// are collected once for the whole workflow.
    ///
    /// **Phase 3:** Each site is processed on its own, from the deepest level
    /// up to the roots. See [`InPlaceCleanup::process_site`].
    ///
    /// # Errors
    /// Any error aborts the pass. The graph may then already hold some
    /// cleanup jobs and must be discarded.
    pub fn add_cleanup_jobs(&self, graph: &mut Graph) -> Result<CleanupReport> {
        graph.topological_order()?;

        // Phase 1
        let annotation = annotate_depth_and_sites(graph);
        let prioritized_jobs = if self.apply_job_priorities { apply_job_priorities(graph) } else { 0 };

        // Phase 2
        let retention = build_retention_set(graph);

        // Phase 3
        let mut report = CleanupReport {
            max_depth: annotation.max_depth,
            retained_files: retention.len(),
            prioritized_jobs,
            cleanup_category_max_jobs: self.cleanup_category_max_jobs,
            sites: Vec::with_capacity(annotation.site_count()),
        };

        for (site, nodes) in &annotation.site_bucket {
            let summary = self.process_site(graph, site, nodes, annotation.max_depth, &retention)?;
            log::info!(
                "Site {}: {} jobs, {} cleanup jobs deleting {} files, {} redundant edges removed",
                site,
                summary.jobs,
                summary.cleanup_jobs.len(),
                summary.cleaned_files.len(),
                summary.removed_edges
            );
            report.sites.push(summary);
        }

        Ok(report)
    }

    /// Adds the cleanup jobs of one site.
    ///
    /// Levels are walked from `max_depth` down to 1. The candidates of a
    /// level are clustered, the clusters are linked into the graph, and after
    /// the last level the parent edges of the new cleanup jobs are reduced.
    /// The cleaned-by index lives only for this call.
    pub fn process_site(
        &self,
        graph: &mut Graph,
        site: &SiteId,
        nodes: &IndexSet<NodeKey>,
        max_depth: i32,
        retention: &RetentionSet,
    ) -> Result<SiteCleanupSummary> {
        log::debug!("Processing site {} with {} jobs", site, nodes.len());

        let levels = bucket_by_depth(graph, nodes);
        let mut index = CleanedByIndex::new();
        let mut inserted: Vec<NodeKey> = Vec::new();
        let mut summary = SiteCleanupSummary {
            site: site.clone(),
            jobs: nodes.len(),
            levels: Vec::new(),
            cleanup_jobs: Vec::new(),
            cleaned_files: Vec::new(),
            removed_edges: 0,
        };

        for level in (1..=max_depth).rev() {
            let Some(level_nodes) = levels.get(&level) else {
                continue;
            };

            let candidates: Vec<CleanupCandidate> = level_nodes.iter().filter_map(|key| build_candidate(graph, *key, retention)).collect();
            if candidates.is_empty() {
                continue;
            }

            let level_clusters = cluster_level(graph, site, level, &candidates, self.policy, &mut index)?;
            let keys = link_level(graph, level_clusters, self.factory, &mut index)?;

            summary.levels.push(LevelSummary { level, candidates: candidates.len(), cleanup_jobs: keys.len() });
            inserted.extend(keys);
        }

        log_cleanup_list(graph, site, &index);
        for (lfn, cleaner) in index.iter() {
            let Cleaner::Node(key) = cleaner else {
                return Err(Error::ClusteringInvariant(format!("file {} has no cleanup job on site {}", lfn, site)));
            };
            let job = graph.job(key).ok_or_else(|| Error::UnknownNode(graph.describe(key)))?;
            summary.cleaned_files.push(CleanedFile { lfn: lfn.clone(), site: site.clone(), cleanup_job: job.id.clone() });
        }

        summary.removed_edges = reduce_all(graph, &inserted);
        summary.cleanup_jobs = inserted.iter().filter_map(|key| graph.job(*key)).map(|job| job.id.clone()).collect();

        Ok(summary)
    }
}

/// Groups the nodes of a site by depth, keeping their bucket order.
fn bucket_by_depth(graph: &Graph, nodes: &IndexSet<NodeKey>) -> IndexMap<i32, Vec<NodeKey>> {
    let mut levels: IndexMap<i32, Vec<NodeKey>> = IndexMap::new();
    for key in nodes {
        if let Some(node) = graph.node(*key) {
            levels.entry(node.depth()).or_default().push(*key);
        }
    }
    levels
}

fn log_cleanup_list(graph: &Graph, site: &SiteId, index: &CleanedByIndex) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    log::debug!("CLEANUP LIST for site {}", site);
    for (lfn, cleaner) in index.iter() {
        match cleaner {
            Cleaner::Node(key) => log::debug!("\t{} -> {}", lfn, graph.describe(key)),
            Cleaner::Pending(slot) => log::debug!("\t{} -> pending slot {}", lfn, slot),
        }
    }
}
