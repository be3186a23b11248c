//! Interactive prompts
//!
//! Used when a command runs with `--interactive` or is missing arguments
//! it cannot do without.

pub mod find_wizard;
pub mod run_wizard;

pub use find_wizard::{run_find_wizard, FindQuery};
pub use run_wizard::run_selection_wizard;
