//! Provider-independent deployment primitives for tripod.
//!
//! This crate owns the manifest model, packaging, layer resolution and the
//! create-or-update publish flow. It intentionally excludes the AWS SDK: the
//! compute platform and the secret store are reached through the traits in
//! [`platform`] and [`environment`], implemented by `tripod_aws`.

pub mod archive;
pub mod commands;
pub mod environment;
pub mod error;
pub mod layer_build;
pub mod layers;
pub mod manifest;
pub mod platform;
pub mod publisher;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{TripodError, TripodResult};
