use std::path::Path;

use crate::api::cleanup_config_dto::CleanupConfigDto;
use crate::api::workflow_dto::WorkflowDto;
use crate::domain::cleanup::factory::TransferCleanupFactory;
use crate::domain::cleanup::in_place::{DEFAULT_MAX_JOBS_FOR_CLEANUP_CATEGORY, InPlaceCleanup};
use crate::domain::cleanup::policy::ClusteringPolicy;
use crate::domain::cleanup::report::CleanupReport;
use crate::domain::workflow::workflow::Workflow;
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a workflow JSON file and builds its graph.
pub fn load_workflow(file_path: impl AsRef<Path>) -> Result<Workflow> {
    let dto: WorkflowDto = parse_json_file(file_path)?;
    log::info!("Workflow {} parsed successfully, {} jobs.", dto.id, dto.jobs.len());

    let workflow = Workflow::create_from_dto(dto)?;
    log::info!("Workflow graph of {} constructed successfully.", workflow.id);

    Ok(workflow)
}

pub fn load_config(file_path: impl AsRef<Path>) -> Result<CleanupConfigDto> {
    parse_json_file(file_path)
}

/// Builds the clustering policy from the configured knobs.
pub fn clustering_policy(config: &CleanupConfigDto) -> Result<ClusteringPolicy> {
    ClusteringPolicy::from_knobs(config.clusters_num, config.clusters_size)
}

pub fn cleanup_factory(config: &CleanupConfigDto) -> TransferCleanupFactory {
    let factory = TransferCleanupFactory::from_dtos(&config.sites);
    match &config.submit_directory {
        Some(directory) => factory.with_submit_directory(directory),
        None => factory,
    }
}

/// Adds the cleanup jobs to `workflow` as configured by `config`.
pub fn refine_workflow(workflow: &mut Workflow, config: &CleanupConfigDto) -> Result<CleanupReport> {
    let policy = clustering_policy(config)?;
    let max_jobs = config.cleanup_category_max_jobs.unwrap_or(DEFAULT_MAX_JOBS_FOR_CLEANUP_CATEGORY);
    if max_jobs == 0 {
        return Err(Error::InvalidConfiguration("cleanup category max jobs must be greater than 0".to_string()));
    }
    let factory = cleanup_factory(config);

    log::info!("Adding cleanup jobs to workflow {} with policy {:?}", workflow.id, policy);
    let report = InPlaceCleanup::new(&factory)
        .with_policy(policy)
        .with_job_priorities(config.apply_job_priorities)
        .with_cleanup_category_max_jobs(max_jobs)
        .add_cleanup_jobs(&mut workflow.graph)?;
    log::info!("Added {} cleanup jobs deleting {} files.", report.cleanup_job_count(), report.cleaned_file_count());

    Ok(report)
}
