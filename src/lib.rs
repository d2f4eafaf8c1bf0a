//! Bugdrill library crate
//!
//! Exposes the mutation and analysis engine so integration tests and
//! external tooling can exercise it without going through CLI startup.

pub mod analyzer;
pub mod api;
pub mod catalog;
pub mod config;
pub mod generate;
pub mod github;
pub mod planner;
pub mod policy;
pub mod selector;
pub mod symptoms;
pub mod util;
