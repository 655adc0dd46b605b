//! Handlers behind the `list`, `publish` and `publish-layer` verbs.
//!
//! Handlers take the loaded manifest explicitly and return values; printing
//! is left to the binary.

use std::path::Path;

use tracing::info;

use crate::archive::build_archive;
use crate::error::TripodResult;
use crate::layer_build::{self, LayerPublishOutcome};
use crate::manifest::Manifest;
use crate::platform::ComputePlatform;
use crate::publisher::{publish_function, PublishOutcome};

pub fn list_functions(manifest: &Manifest) -> Vec<&str> {
    manifest.function_names().collect()
}

pub fn render_function_list(manifest: &Manifest) -> String {
    let mut output = String::from("available functions:\n");
    for name in manifest.function_names() {
        output.push_str("  ");
        output.push_str(name);
        output.push('\n');
    }
    output
}

/// Packages and create-or-updates `function_name`. When `archive_dir` is set
/// the package is also kept there as `<function_name>.zip`.
pub fn publish(
    manifest: &Manifest,
    function_name: &str,
    platform: &dyn ComputePlatform,
    archive_dir: Option<&Path>,
) -> TripodResult<PublishOutcome> {
    let function = manifest.function(function_name)?;
    info!(function = %function.name, "publishing");

    let package = build_archive(manifest.base_dir(), &function.files)?;
    if let Some(dir) = archive_dir {
        let path = dir.join(format!("{}.zip", function.name));
        package.write_to(&path)?;
        info!(function = %function.name, archive = %path.display(), "archive saved");
    }

    publish_function(platform, function, &package)
}

pub fn publish_layer(
    manifest: &Manifest,
    layer_name: &str,
    platform: &dyn ComputePlatform,
) -> TripodResult<LayerPublishOutcome> {
    let layer = manifest.layer_build(layer_name)?;
    layer_build::publish_layer(platform, layer, manifest.base_dir())
}
