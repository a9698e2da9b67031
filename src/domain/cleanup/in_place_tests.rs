/// Unit tests for the cleanup pipeline: each stage on small hand built graphs,
/// then the whole pass through `InPlaceCleanup`.
#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use crate::domain::cleanup::annotator::{annotate_depth_and_sites, apply_job_priorities};
    use crate::domain::cleanup::candidate::{build_candidate, needs_cleanup};
    use crate::domain::cleanup::cleaned_by::{CleanedByIndex, Cleaner};
    use crate::domain::cleanup::clusterer::{cluster_level, generate_clustered_job_id};
    use crate::domain::cleanup::factory::CleanupJobFactory;
    use crate::domain::cleanup::in_place::InPlaceCleanup;
    use crate::domain::cleanup::policy::ClusteringPolicy;
    use crate::domain::cleanup::reducer::{reduce_all, reduce_parents};
    use crate::domain::cleanup::retention::{RetentionSet, build_retention_set};
    use crate::domain::utils::id::{FileId, JobId, SiteId};
    use crate::domain::workflow::graph::{Graph, NodeKey};
    use crate::domain::workflow::job::{Job, JobType, WorkflowFile};
    use crate::error::{Error, Result};

    // --- HELPER FUNCTIONS FOR TEST SETUP ---

    /// Builds the cleanup job from the primary and remembers which primary it got.
    #[derive(Default)]
    struct StubFactory {
        primaries: RefCell<Vec<String>>,
    }

    impl CleanupJobFactory for StubFactory {
        fn create(&self, id: &JobId, files: &[WorkflowFile], primary: &Job) -> Result<Job> {
            self.primaries.borrow_mut().push(primary.id.id.clone());
            Ok(Job::new(id.id.clone(), JobType::Cleanup, "local")
                .with_staging_site(primary.staging_site_or_site().id.clone())
                .with_inputs(files.iter().cloned()))
        }
    }

    fn compute(id: &str) -> Job {
        Job::new(id, JobType::Compute, "cluster").with_staging_site("scratch")
    }

    fn stage_out(id: &str) -> Job {
        Job::new(id, JobType::StageOut, "local").with_non_third_party_site("scratch")
    }

    fn inter_pool(id: &str) -> Job {
        Job::new(id, JobType::InterPool, "grid").with_non_third_party_site("scratch")
    }

    fn sub_workflow(id: &str) -> Job {
        Job::new(id, JobType::SubWorkflow, "scratch")
    }

    fn transient(lfn: &str) -> WorkflowFile {
        WorkflowFile::new(lfn).transient(true)
    }

    fn add(graph: &mut Graph, job: Job, parents: &[NodeKey]) -> NodeKey {
        let key = graph.add_node(job).unwrap();
        for parent in parents {
            graph.add_edge(*parent, key).unwrap();
        }
        key
    }

    fn cleanup_nodes(graph: &Graph) -> Vec<NodeKey> {
        graph.iter().filter(|(_, node)| node.job.typ == JobType::Cleanup).map(|(key, _)| key).collect()
    }

    fn parent_ids(graph: &Graph, key: NodeKey) -> Vec<String> {
        let mut ids: Vec<String> = graph.parents(key).map(|parent| graph.describe(parent)).collect();
        ids.sort();
        ids
    }

    fn deleted_files(graph: &Graph, key: NodeKey) -> Vec<String> {
        graph.job(key).unwrap().input_files.keys().map(|lfn| lfn.id.clone()).collect()
    }

    // --- ANNOTATION ---

    #[test]
    fn test_depth_is_longest_path() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a"), &[]);
        let b = add(&mut graph, compute("b"), &[a]);
        let c = add(&mut graph, compute("c"), &[b]);
        // shortcut a -> d and the long way round through c
        let d = add(&mut graph, compute("d"), &[a, c]);

        let annotation = annotate_depth_and_sites(&mut graph);

        assert_eq!(graph.node(a).unwrap().depth(), 1);
        assert_eq!(graph.node(c).unwrap().depth(), 3);
        assert_eq!(graph.node(d).unwrap().depth(), 4);
        assert_eq!(annotation.max_depth, 4);
        assert_eq!(annotation.site_count(), 1);
        assert_eq!(annotation.site_bucket[&SiteId::new("scratch")].len(), 4);
    }

    #[test]
    fn test_sites_are_bucketed_by_job_type() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a"), &[]);
        add(&mut graph, Job::new("out", JobType::StageOut, "local").with_non_third_party_site("archive"), &[a]);
        add(&mut graph, Job::new("mkdir", JobType::CreateDir, "cluster").with_staging_site("scratch"), &[]);

        let annotation = annotate_depth_and_sites(&mut graph);

        let sites: Vec<&str> = annotation.site_bucket.keys().map(|site| site.as_str()).collect();
        assert_eq!(annotation.site_count(), 3);
        assert!(sites.contains(&"scratch"));
        assert!(sites.contains(&"archive"));
        assert!(sites.contains(&"cluster"));
    }

    #[test]
    fn test_empty_graph_has_depth_zero() {
        let mut graph = Graph::new();

        let annotation = annotate_depth_and_sites(&mut graph);

        assert_eq!(annotation.max_depth, 0);
        assert_eq!(annotation.site_count(), 0);
    }

    #[test]
    fn test_job_priorities_follow_depth() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a"), &[]);
        let mut fixed = compute("fixed");
        fixed.priority = Some(42);
        let b = add(&mut graph, fixed, &[a]);
        let c = add(&mut graph, compute("c"), &[b]);

        annotate_depth_and_sites(&mut graph);
        let applied = apply_job_priorities(&mut graph);

        assert_eq!(applied, 2);
        assert_eq!(graph.job(a).unwrap().priority, Some(1));
        assert_eq!(graph.job(b).unwrap().priority, Some(42));
        assert_eq!(graph.job(c).unwrap().priority, Some(3));
    }

    // --- RETENTION AND CANDIDATES ---

    #[test]
    fn test_retention_set() {
        let mut graph = Graph::new();
        let final_job = add(&mut graph, compute("final").with_outputs([WorkflowFile::new("result"), transient("scratch.tmp")]), &[]);
        let staged = add(&mut graph, compute("staged").with_outputs([WorkflowFile::new("shipped")]), &[]);
        add(&mut graph, stage_out("ship").with_inputs([WorkflowFile::new("shipped")]), &[staged]);

        let retention = build_retention_set(&graph);

        assert_eq!(retention.len(), 1);
        assert_eq!(retention.iter().map(|lfn| lfn.as_str()).collect::<Vec<_>>(), vec!["result"]);
        assert!(retention.contains(&FileId::new("result")));
        assert!(!retention.contains(&FileId::new("scratch.tmp")));
        assert!(!retention.contains(&FileId::new("shipped")));
        assert!(needs_cleanup(&graph, final_job));
    }

    #[test]
    fn test_candidate_drops_flagged_and_retained_files() {
        let mut graph = Graph::new();
        let job = compute("a")
            .with_inputs([WorkflowFile::new("keep").cleanup(false), WorkflowFile::new("in")])
            .with_outputs([WorkflowFile::new("result"), transient("tmp"), transient("in")]);
        let a = add(&mut graph, job, &[]);
        let retention = build_retention_set(&graph);

        let candidate = build_candidate(&graph, a, &retention).unwrap();

        let files: Vec<&str> = candidate.files.iter().map(|file| file.lfn.as_str()).collect();
        assert_eq!(files, vec!["in", "tmp"]);
        // the job itself is untouched
        assert_eq!(graph.job(a).unwrap().input_files.len(), 2);
        assert_eq!(graph.job(a).unwrap().output_files.len(), 3);
    }

    #[test]
    fn test_candidate_skips_jobs_that_are_not_cleaned() {
        let mut graph = Graph::new();
        let stage_in = add(&mut graph, Job::new("in", JobType::StageIn, "local").with_outputs([transient("raw")]), &[]);
        let orphan = add(&mut graph, stage_out("orphan").with_inputs([transient("x")]), &[]);
        let retention = RetentionSet::default();

        assert!(build_candidate(&graph, stage_in, &retention).is_none());
        assert!(!needs_cleanup(&graph, orphan));
        assert!(build_candidate(&graph, orphan, &retention).is_none());
    }

    // --- CLUSTERING ---

    #[test]
    fn test_clustered_job_id() {
        assert_eq!(generate_clustered_job_id(&SiteId::new("scratch"), 3, 1).as_str(), "clean_up_scratch_level_3_1");
    }

    #[test]
    fn test_shared_file_in_later_chunk_joins_earlier_cluster() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a").with_outputs([transient("x")]), &[]);
        let b = add(&mut graph, compute("b").with_inputs([transient("x")]), &[a]);
        let c = add(&mut graph, compute("c").with_inputs([transient("x")]), &[a]);
        let retention = RetentionSet::default();
        let candidates: Vec<_> = [b, c].iter().filter_map(|key| build_candidate(&graph, *key, &retention)).collect();
        let mut index = CleanedByIndex::new();

        let level = cluster_level(&graph, &SiteId::new("scratch"), 2, &candidates, ClusteringPolicy::ClusterSize(1), &mut index).unwrap();

        // c's chunk only held the already claimed x and is discarded
        assert_eq!(level.clusters.len(), 1);
        let cluster = &level.clusters[0];
        assert_eq!(cluster.id.as_str(), "clean_up_scratch_level_2_0");
        assert_eq!(cluster.primary, b);
        assert_eq!(cluster.parents.iter().copied().collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(index.get(&FileId::new("x")), Some(Cleaner::Pending(0)));
        assert!(level.guard_edges.is_empty());
    }

    #[test]
    fn test_claiming_a_file_twice_is_an_invariant_error() {
        let mut index = CleanedByIndex::new();
        index.claim(FileId::new("x"), Cleaner::Pending(0)).unwrap();

        assert!(matches!(index.claim(FileId::new("x"), Cleaner::Pending(1)), Err(Error::ClusteringInvariant(_))));
    }

    // --- REDUCTION ---

    #[test]
    fn test_reduction_keeps_only_the_deepest_parent_of_a_chain() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a"), &[]);
        let b = add(&mut graph, compute("b"), &[a]);
        let c = add(&mut graph, compute("c"), &[b]);
        let side = add(&mut graph, compute("side"), &[]);
        let cleanup = add(&mut graph, Job::new("clean_up_x", JobType::Cleanup, "local"), &[a, b, c, side]);

        assert_eq!(reduce_parents(&mut graph, cleanup), 2);
        assert_eq!(parent_ids(&graph, cleanup), vec!["c", "side"]);
        assert!(graph.is_ancestor(a, cleanup));

        // idempotent
        assert_eq!(reduce_all(&mut graph, &[cleanup]), 0);
        assert_eq!(parent_ids(&graph, cleanup), vec!["c", "side"]);
    }

    #[test]
    fn test_reduction_finds_parents_reachable_only_through_other_ancestors() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a"), &[]);
        let b = add(&mut graph, compute("b"), &[a]);
        let c = add(&mut graph, compute("c"), &[b]);
        let d = add(&mut graph, compute("d"), &[c]);
        // b is seen first from d, a is only reachable through b
        let cleanup = add(&mut graph, Job::new("clean_up_x", JobType::Cleanup, "local"), &[d, b, a]);

        assert_eq!(reduce_parents(&mut graph, cleanup), 2);
        assert_eq!(parent_ids(&graph, cleanup), vec!["d"]);
    }

    // --- WHOLE PASS ---

    #[test]
    fn test_diamond_cleanup_depends_on_both_consumers() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("A").with_outputs([transient("x")]), &[]);
        let b = add(&mut graph, compute("B").with_inputs([transient("x")]), &[a]);
        let c = add(&mut graph, compute("C").with_inputs([transient("x")]), &[a]);
        add(&mut graph, stage_out("D").with_inputs([WorkflowFile::new("report").cleanup(false)]), &[b, c]);
        let factory = StubFactory::default();

        let report = InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph).unwrap();

        let cleanups = cleanup_nodes(&graph);
        assert_eq!(cleanups.len(), 1);
        let cleanup = cleanups[0];
        assert_eq!(graph.describe(cleanup), "clean_up_scratch_level_2_0");
        assert_eq!(parent_ids(&graph, cleanup), vec!["B", "C"]);
        assert_eq!(deleted_files(&graph, cleanup), vec!["x"]);
        // the guard edge A -> cleanup was reduced away
        assert_eq!(report.removed_edge_count(), 1);
        assert_eq!(report.max_depth, 3);
        graph.topological_order().unwrap();
    }

    #[test]
    fn test_twelve_candidates_make_two_clusters_of_six() {
        let mut graph = Graph::new();
        for i in 0..12 {
            add(&mut graph, compute(&format!("job{}", i)).with_outputs([transient(&format!("f{}", i))]), &[]);
        }
        let factory = StubFactory::default();

        let report = InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph).unwrap();

        let cleanups = cleanup_nodes(&graph);
        assert_eq!(cleanups.len(), 2);
        for (i, cleanup) in cleanups.iter().enumerate() {
            assert_eq!(graph.describe(*cleanup), format!("clean_up_scratch_level_1_{}", i));
            assert_eq!(graph.node(*cleanup).unwrap().parents().len(), 6);
            assert_eq!(deleted_files(&graph, *cleanup).len(), 6);
        }
        assert_eq!(report.sites[0].levels[0].candidates, 12);
        assert_eq!(report.sites[0].levels[0].cleanup_jobs, 2);
        assert_eq!(report.cleaned_file_count(), 12);
    }

    #[test]
    fn test_policies_change_the_cluster_count() {
        let build = || {
            let mut graph = Graph::new();
            for i in 0..12 {
                add(&mut graph, compute(&format!("job{}", i)).with_outputs([transient(&format!("f{}", i))]), &[]);
            }
            graph
        };
        let factory = StubFactory::default();

        let mut graph = build();
        InPlaceCleanup::new(&factory).with_policy(ClusteringPolicy::MaxJobsPerLevel(5)).add_cleanup_jobs(&mut graph).unwrap();
        // ceil(12 / 5) = 3 per cluster
        assert_eq!(cleanup_nodes(&graph).len(), 4);

        let mut graph = build();
        InPlaceCleanup::new(&factory).with_policy(ClusteringPolicy::ClusterSize(5)).add_cleanup_jobs(&mut graph).unwrap();
        assert_eq!(cleanup_nodes(&graph).len(), 3);

        let mut graph = build();
        InPlaceCleanup::new(&factory).with_policy(ClusteringPolicy::ClusterSize(1)).add_cleanup_jobs(&mut graph).unwrap();
        assert_eq!(cleanup_nodes(&graph).len(), 12);
    }

    #[test]
    fn test_deeper_consumer_guards_earlier_users() {
        let mut graph = Graph::new();
        let p = add(&mut graph, compute("P").with_outputs([transient("f")]), &[]);
        let c1 = add(&mut graph, compute("C1").with_inputs([transient("f")]), &[p]);
        let c2 = add(&mut graph, compute("C2").with_inputs([transient("f")]), &[c1]);
        let factory = StubFactory::default();

        InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph).unwrap();

        let cleanups = cleanup_nodes(&graph);
        assert_eq!(cleanups.len(), 1);
        assert_eq!(graph.describe(cleanups[0]), "clean_up_scratch_level_3_0");
        assert_eq!(parent_ids(&graph, cleanups[0]), vec!["C2"]);
        for user in [p, c1, c2] {
            assert!(graph.is_ancestor(user, cleanups[0]));
        }
    }

    #[test]
    fn test_stage_out_cleanup_uses_compute_parent_as_primary() {
        let mut graph = Graph::new();
        let p = add(&mut graph, compute("P").with_outputs([WorkflowFile::new("y")]), &[]);
        add(&mut graph, stage_out("S").with_inputs([WorkflowFile::new("y")]), &[p]);
        let factory = StubFactory::default();

        InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph).unwrap();

        assert_eq!(*factory.primaries.borrow(), vec!["P".to_string()]);
        let cleanups = cleanup_nodes(&graph);
        assert_eq!(cleanups.len(), 1);
        assert_eq!(parent_ids(&graph, cleanups[0]), vec!["S"]);
    }

    #[test]
    fn test_stage_out_without_compute_parent_is_fatal() {
        let mut graph = Graph::new();
        let stage_in = add(&mut graph, Job::new("I", JobType::StageIn, "local").with_outputs([transient("y")]), &[]);
        add(&mut graph, stage_out("S").with_inputs([transient("y")]), &[stage_in]);
        let factory = StubFactory::default();

        let result = InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph);

        assert!(matches!(result, Err(Error::MissingComputeParent { job, .. }) if job == "S"));
    }

    #[test]
    fn test_inter_pool_cleanup_uses_compute_parent_as_primary() {
        let mut graph = Graph::new();
        let p = add(&mut graph, compute("P").with_outputs([transient("y")]), &[]);
        let ip = add(&mut graph, inter_pool("ip").with_inputs([transient("y")]), &[p]);
        let factory = StubFactory::default();

        let report = InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph).unwrap();

        assert!(needs_cleanup(&graph, ip));
        assert_eq!(graph.job(ip).unwrap().site_for_cleanup().as_str(), "scratch");
        // ip claims y at the deeper level, the cleanup is built against its compute parent
        assert_eq!(*factory.primaries.borrow(), vec!["P".to_string()]);
        let cleanups = cleanup_nodes(&graph);
        assert_eq!(cleanups.len(), 1);
        assert_eq!(graph.describe(cleanups[0]), "clean_up_scratch_level_2_0");
        assert_eq!(parent_ids(&graph, cleanups[0]), vec!["ip"]);
        assert_eq!(deleted_files(&graph, cleanups[0]), vec!["y"]);
        assert!(graph.is_ancestor(p, cleanups[0]));
        assert_eq!(report.cleaned_file_count(), 1);
    }

    #[test]
    fn test_inter_pool_below_sub_workflow_is_fatal() {
        let mut graph = Graph::new();
        let sub = add(&mut graph, sub_workflow("sub").with_outputs([transient("z")]), &[]);
        add(&mut graph, inter_pool("ip").with_inputs([transient("z")]), &[sub]);
        let factory = StubFactory::default();

        let result = InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph);

        assert!(matches!(result, Err(Error::MissingComputeParent { job, .. }) if job == "ip"));
    }

    #[test]
    fn test_sub_workflow_outputs_are_cleaned_and_guarded() {
        let mut graph = Graph::new();
        let s = add(&mut graph, sub_workflow("S").with_outputs([transient("s"), transient("w")]), &[]);
        let c = add(&mut graph, compute("C").with_inputs([transient("s")]), &[s]);
        let factory = StubFactory::default();

        let report = InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph).unwrap();

        assert!(needs_cleanup(&graph, s));
        assert_eq!(*factory.primaries.borrow(), vec!["C".to_string(), "S".to_string()]);
        let consumer_cleanup = graph.node_by_id("clean_up_scratch_level_2_0").unwrap();
        assert_eq!(consumer_cleanup.job.input_files.keys().map(|lfn| lfn.as_str()).collect::<Vec<_>>(), vec!["s"]);
        let consumer_cleanup = graph.key_of(&JobId::new("clean_up_scratch_level_2_0")).unwrap();
        assert_eq!(parent_ids(&graph, consumer_cleanup), vec!["C"]);
        // the guard edge from S was reduced, S still runs first
        assert!(graph.is_ancestor(s, consumer_cleanup));
        assert!(graph.is_ancestor(c, consumer_cleanup));

        let own_cleanup = graph.key_of(&JobId::new("clean_up_scratch_level_1_0")).unwrap();
        assert_eq!(parent_ids(&graph, own_cleanup), vec!["S"]);
        assert_eq!(deleted_files(&graph, own_cleanup), vec!["w"]);

        let cleaned: Vec<&str> = report.cleanup_list().map(|entry| entry.lfn.as_str()).collect();
        assert_eq!(cleaned.iter().filter(|lfn| **lfn == "s").count(), 1);
        assert_eq!(report.cleaned_file_count(), 2);
    }

    #[test]
    fn test_each_site_cleans_its_own_copy() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a").with_outputs([transient("x")]), &[]);
        add(&mut graph, Job::new("b", JobType::Compute, "grid").with_staging_site("remote").with_inputs([transient("x")]), &[a]);
        let factory = StubFactory::default();

        let report = InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph).unwrap();

        assert_eq!(report.sites.len(), 2);
        let jobs: Vec<String> = report.cleanup_list().map(|entry| entry.cleanup_job.id.clone()).collect();
        assert_eq!(jobs, vec!["clean_up_scratch_level_1_0".to_string(), "clean_up_remote_level_2_0".to_string()]);
    }

    #[test]
    fn test_retained_files_are_never_cleaned() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a").with_outputs([WorkflowFile::new("result"), transient("tmp")]), &[]);
        add(&mut graph, compute("b").with_inputs([WorkflowFile::new("result"), transient("tmp")]), &[a]);
        let factory = StubFactory::default();

        let report = InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph).unwrap();

        assert_eq!(report.retained_files, 1);
        let cleaned: Vec<&str> = report.cleanup_list().map(|entry| entry.lfn.as_str()).collect();
        assert_eq!(cleaned, vec!["tmp"]);
    }

    #[test]
    fn test_cycle_aborts_the_pass() {
        let mut graph = Graph::new();
        let a = add(&mut graph, compute("a"), &[]);
        let b = add(&mut graph, compute("b"), &[a]);
        graph.add_edge(b, a).unwrap();
        let factory = StubFactory::default();

        assert!(matches!(InPlaceCleanup::new(&factory).add_cleanup_jobs(&mut graph), Err(Error::CycleDetected { .. })));
        assert!(cleanup_nodes(&graph).is_empty());
    }
}
