//! Measurement campaign runner
//!
//! Generates test-case matrices from worker profiles and test-tree
//! templates, submits them to the task API, polls for completion and keeps
//! results usable across campaign revisions.
//!
//! ## Module Structure
//!
//! - `util/`: File and hashing helpers
//! - `kind`: Per test kind rules
//! - `profile`, `template`: Generator inputs
//! - `expand`: Parameter template expansion
//! - `builder`, `campaign`: Campaign generation and its YAML file
//! - `client`, `runner`: Task submission and polling
//! - `results`: The results file
//! - `reconcile`: Carrying results over to a regenerated campaign
//! - `lookup`: Locating test IDs
//! - `analysis/`: Classification and inspection of results

// ============================================================================
// GENERATION
// ============================================================================

/// Shared utility functions
pub mod util;

pub mod kind;
pub mod profile;
pub mod template;

/// Parameter template expansion
pub mod expand;

pub mod builder;
pub mod campaign;

// ============================================================================
// EXECUTION
// ============================================================================

pub mod config;

/// Task API client
pub mod client;

pub mod runner;
pub mod results;

// ============================================================================
// POST-PROCESSING
// ============================================================================

pub mod reconcile;
pub mod lookup;

/// Result classification and reporting
pub mod analysis;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use builder::{BuildStats, CampaignBuilder, SkipReason};
pub use campaign::{Campaign, CampaignEntry, WorkerAssignment};
pub use client::{PollOutcome, PollSettings, SubmitError, TaskClient, TaskPayload};
pub use config::RunnerConfig;
pub use expand::{ExpandError, ExpandOptions, FsListSource, ListSource, ParameterExpander, ParameterSet};
pub use kind::TestKind;
pub use profile::{load_profiles, WorkerProfile};
pub use reconcile::{build_id_mapping, remap_results, CollisionPolicy, Fingerprint, IdMapping};
pub use results::{ResultEntry, ResultFilter, ResultMap, ResultStatus, ResultStore};
pub use runner::{CampaignRunner, RunOptions, RunSummary, Selection};
pub use template::{load_templates, TestTemplate};
