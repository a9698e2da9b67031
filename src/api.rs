pub mod cleanup_config_dto;
pub mod workflow_dto;
