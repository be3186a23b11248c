//! CLI command implementations

pub mod find;
pub mod generate;
pub mod reconcile;
pub mod report;
pub mod results;
pub mod run;
