//! Shared utility functions.

pub mod files;
pub mod hash;
