//! Building and publishing shared layers declared under `layers:`.
//!
//! A layer's files may come from a helper repository that is cloned on first
//! use. The checkout directory is shared by every invocation that uses the
//! same manifest directory and is not locked.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use tracing::info;

use crate::archive::build_archive_with_prefix;
use crate::error::{TripodError, TripodResult};
use crate::platform::{ComputePlatform, PublishLayerRequest};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerBuildSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub compatible_runtimes: Vec<String>,
    pub files: Vec<String>,
    /// Prepended to every archive entry, e.g. `python/psycopg2`.
    #[serde(default)]
    pub archive_prefix: String,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub checkout: Option<String>,
}

impl LayerBuildSpec {
    pub fn validate(&self) -> TripodResult<()> {
        if self.name.trim().is_empty() {
            return Err(TripodError::Validation(
                "layer names must be non-empty".to_string(),
            ));
        }
        if self.files.is_empty() {
            return Err(TripodError::Validation(format!(
                "layer '{}' must list at least one file pattern",
                self.name
            )));
        }
        if self.repository.is_some() && self.checkout.is_none() {
            return Err(TripodError::Validation(format!(
                "layer '{}' declares a repository without a checkout directory",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPublishOutcome {
    pub layer_name: String,
    pub version_arn: String,
    pub entries: usize,
}

/// Clones the layer's repository into its checkout directory unless the
/// directory already exists.
pub fn ensure_checkout(layer: &LayerBuildSpec, base_dir: &Path) -> TripodResult<()> {
    let (Some(repository), Some(checkout)) = (&layer.repository, &layer.checkout) else {
        return Ok(());
    };
    if base_dir.join(checkout).exists() {
        return Ok(());
    }

    let command = format!("git clone {repository} {checkout}");
    info!(layer = %layer.name, repository = %repository, checkout = %checkout, "cloning layer source");
    let status = Command::new("git")
        .args(["clone", repository.as_str(), checkout.as_str()])
        .current_dir(base_dir)
        .status()
        .map_err(|error| TripodError::Process {
            command: command.clone(),
            message: error.to_string(),
        })?;
    if !status.success() {
        return Err(TripodError::Process {
            command,
            message: format!("exited with {status}"),
        });
    }
    Ok(())
}

pub fn publish_layer(
    platform: &dyn ComputePlatform,
    layer: &LayerBuildSpec,
    base_dir: &Path,
) -> TripodResult<LayerPublishOutcome> {
    layer.validate()?;
    ensure_checkout(layer, base_dir)?;

    let package = build_archive_with_prefix(base_dir, &layer.files, &layer.archive_prefix)?;
    let request = PublishLayerRequest {
        layer_name: layer.name.clone(),
        description: layer.description.clone(),
        compatible_runtimes: layer.compatible_runtimes.clone(),
        zip_file: package.bytes().to_vec(),
    };
    let version_arn = platform.publish_layer_version(&request)?;
    info!(layer = %layer.name, arn = %version_arn, "published layer version");

    Ok(LayerPublishOutcome {
        layer_name: layer.name.clone(),
        version_arn,
        entries: package.entries().len(),
    })
}
