pub mod graph;
pub mod job;
pub mod workflow;
