//! AWS-backed adapters and the `tripod` command line.
//!
//! This crate owns the cloud integration details (Lambda and SSM Parameter
//! Store clients, SDK configuration) plus argument parsing and logging setup.
//! Deployment behavior itself lives in `tripod_core`.

pub mod adapters;
pub mod cli;
pub mod logging;
