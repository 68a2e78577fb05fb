//! CLI command implementations

pub mod completions;
pub mod config;
pub mod devices;
pub mod import;
pub mod vehicles;
