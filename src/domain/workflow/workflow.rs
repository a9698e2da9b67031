use std::collections::HashMap;

use crate::api::workflow_dto::{FileUseDto, JobDto, JobTypeDto, LinkDto, WorkflowDto};
use crate::domain::utils::id::{JobId, SiteId, WorkflowId};
use crate::domain::workflow::graph::{Graph, NodeKey};
use crate::domain::workflow::job::{FileSet, Job, JobType, WorkflowFile};
use crate::error::{Error, Result};

/// A named workflow: the job graph the cleanup pass refines.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: WorkflowId,
    pub graph: Graph,
}

impl Workflow {
    pub fn new(id: impl Into<String>, graph: Graph) -> Self {
        Workflow { id: WorkflowId::new(id), graph }
    }

    /// Constructs the workflow graph from a `WorkflowDto`.
    ///
    /// This is the main entry point for turning the JSON description into the
    /// internal domain model.
    pub fn create_from_dto(dto: WorkflowDto) -> Result<Self> {
        // Phase 1: Create one node per job
        let mut graph = Graph::new();
        let keys = Self::generate_nodes(&dto, &mut graph)?;

        // Phase 2: Wire parent -> child edges
        Self::build_edges(&dto, &keys, &mut graph)?;

        // Phase 3: The refinement requires a DAG
        graph.topological_order()?;

        log::debug!("Workflow {} constructed with {} jobs and {} edges", dto.id, graph.len(), graph.edge_count());

        Ok(Workflow::new(dto.id, graph))
    }

    /// **Phase 1: Generate Nodes**
    pub fn generate_nodes(dto: &WorkflowDto, graph: &mut Graph) -> Result<HashMap<String, NodeKey>> {
        let mut keys = HashMap::with_capacity(dto.jobs.len());

        for job_dto in &dto.jobs {
            let job = job_from_dto(job_dto);
            let key = graph.add_node(job)?;
            keys.insert(job_dto.id.clone(), key);
        }

        Ok(keys)
    }

    /// **Phase 2: Build Edges**
    ///
    /// Every id listed in `parents` must name a job of the same workflow.
    pub fn build_edges(dto: &WorkflowDto, keys: &HashMap<String, NodeKey>, graph: &mut Graph) -> Result<()> {
        for job_dto in &dto.jobs {
            let child = *keys.get(&job_dto.id).ok_or_else(|| Error::UnknownNode(job_dto.id.clone()))?;

            for parent_id in &job_dto.parents {
                let parent = keys.get(parent_id).ok_or_else(|| {
                    Error::ModelConstructionError(format!("Job {} lists unknown parent {}", job_dto.id, parent_id))
                })?;
                graph.add_edge(*parent, child)?;
            }
        }

        Ok(())
    }

    /// Converts the (possibly refined) graph back into its JSON representation.
    ///
    /// Jobs are emitted in insertion order, so cleanup jobs follow the jobs of
    /// the input workflow.
    pub fn to_dto(&self) -> WorkflowDto {
        let jobs = self
            .graph
            .iter()
            .map(|(_, node)| {
                let mut dto = job_to_dto(&node.job);
                dto.parents = node.parents().iter().map(|parent| self.graph.describe(*parent)).collect();
                dto
            })
            .collect();

        WorkflowDto { id: self.id.id.clone(), jobs }
    }
}

pub fn job_from_dto(dto: &JobDto) -> Job {
    let mut inputs = FileSet::new();
    let mut outputs = FileSet::new();

    for file_use in &dto.uses {
        let file = file_from_dto(file_use);
        match file_use.link {
            LinkDto::Input => {
                inputs.entry(file.lfn.clone()).or_insert(file);
            }
            LinkDto::Output => {
                outputs.entry(file.lfn.clone()).or_insert(file);
            }
            LinkDto::Inout => {
                inputs.entry(file.lfn.clone()).or_insert_with(|| file.clone());
                outputs.entry(file.lfn.clone()).or_insert(file);
            }
        }
    }

    Job {
        id: JobId::new(dto.id.clone()),
        typ: map_job_type(dto.typ),
        transformation: dto.transformation.clone(),
        site: SiteId::new(dto.site.clone()),
        staging_site: dto.staging_site.clone().map(SiteId::new),
        non_third_party_site: dto.non_third_party_site.clone().map(SiteId::new),
        input_files: inputs,
        output_files: outputs,
        priority: dto.priority,
        category: dto.category.clone(),
        executable: dto.executable.clone(),
        arguments: dto.arguments.clone(),
        stdin: dto.stdin.clone(),
        transfer_request: None,
    }
}

pub fn job_to_dto(job: &Job) -> JobDto {
    let mut uses: Vec<FileUseDto> = Vec::with_capacity(job.input_files.len() + job.output_files.len());

    for file in job.input_files.values() {
        let link = if job.output_files.contains_key(&file.lfn) { LinkDto::Inout } else { LinkDto::Input };
        uses.push(file_to_dto(file, link));
    }
    for file in job.output_files.values().filter(|file| !job.input_files.contains_key(&file.lfn)) {
        uses.push(file_to_dto(file, LinkDto::Output));
    }

    JobDto {
        id: job.id.id.clone(),
        typ: map_job_type_to_dto(job.typ),
        transformation: job.transformation.clone(),
        site: job.site.id.clone(),
        staging_site: job.staging_site.as_ref().map(|site| site.id.clone()),
        non_third_party_site: job.non_third_party_site.as_ref().map(|site| site.id.clone()),
        priority: job.priority,
        category: job.category.clone(),
        executable: job.executable.clone(),
        arguments: job.arguments.clone(),
        stdin: job.stdin.clone(),
        uses,
        parents: Vec::new(),
    }
}

fn file_from_dto(dto: &FileUseDto) -> WorkflowFile {
    WorkflowFile::new(dto.lfn.clone()).transient(dto.transient).cleanup(dto.cleanup)
}

fn file_to_dto(file: &WorkflowFile, link: LinkDto) -> FileUseDto {
    FileUseDto { lfn: file.lfn.id.clone(), link, transient: file.transient, cleanup: file.cleanup }
}

pub fn map_job_type(dto_type: JobTypeDto) -> JobType {
    match dto_type {
        JobTypeDto::Compute => JobType::Compute,
        JobTypeDto::StageIn => JobType::StageIn,
        JobTypeDto::StageOut => JobType::StageOut,
        JobTypeDto::InterPool => JobType::InterPool,
        JobTypeDto::CreateDir => JobType::CreateDir,
        JobTypeDto::SubWorkflow => JobType::SubWorkflow,
        JobTypeDto::Cleanup => JobType::Cleanup,
        JobTypeDto::Other => JobType::Other,
    }
}

pub fn map_job_type_to_dto(typ: JobType) -> JobTypeDto {
    match typ {
        JobType::Compute => JobTypeDto::Compute,
        JobType::StageIn => JobTypeDto::StageIn,
        JobType::StageOut => JobTypeDto::StageOut,
        JobType::InterPool => JobTypeDto::InterPool,
        JobType::CreateDir => JobTypeDto::CreateDir,
        JobType::SubWorkflow => JobTypeDto::SubWorkflow,
        JobType::Cleanup => JobTypeDto::Cleanup,
        JobType::Other => JobTypeDto::Other,
    }
}
