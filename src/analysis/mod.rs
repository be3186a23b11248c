//! Classification and inspection of collected results.

pub mod classify;
pub mod inspect;
pub mod vectors;

pub use classify::{Outcome, ReportKind};
pub use inspect::{discrepancies, domain_coverage, enrich, DomainCoverage};
pub use vectors::{build_vectors, PairVector, VectorGroup, WorkerNames};
