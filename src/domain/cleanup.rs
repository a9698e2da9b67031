pub mod annotator;
pub mod candidate;
pub mod cleaned_by;
pub mod clusterer;
pub mod factory;
pub mod in_place;
pub mod linker;
pub mod policy;
pub mod reducer;
pub mod report;
pub mod retention;

#[cfg(test)]
mod in_place_tests;
