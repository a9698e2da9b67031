pub mod cleanup;
pub mod utils;
pub mod workflow;
