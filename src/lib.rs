//! Fleet onboarding toolkit
//!
//! Imports vehicle inventories from CSV, Excel, JSON, XML, or text files
//! through a guided pipeline (upload, field mapping, validation, row
//! selection, commit, summary) and browses the resulting fleet.

pub mod cli;
pub mod core;
pub mod entities;
pub mod onboarding;
