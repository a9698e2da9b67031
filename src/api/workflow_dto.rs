use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDto {
    pub id: String,
    pub jobs: Vec<JobDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JobDto {
    pub id: String,

    #[serde(rename = "type")]
    pub typ: JobTypeDto,

    #[serde(default)]
    pub transformation: String,

    pub site: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_site: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_third_party_site: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arguments: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,

    #[serde(default)]
    pub uses: Vec<FileUseDto>,

    /// Ids of the jobs this job depends on.
    #[serde(default)]
    pub parents: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum JobTypeDto {
    Compute,
    StageIn,
    StageOut,
    InterPool,
    CreateDir,
    SubWorkflow,
    Cleanup,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileUseDto {
    pub lfn: String,
    pub link: LinkDto,

    #[serde(default)]
    pub transient: bool,

    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LinkDto {
    Input,
    Output,
    Inout,
}

fn default_cleanup() -> bool {
    true
}
