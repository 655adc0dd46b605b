//! Maps layer names to the ARN of their newest published version.

use tracing::info;

use crate::error::{TripodError, TripodResult};
use crate::platform::{ComputePlatform, LayerVersion};

/// Resolves each name to its newest version ARN, preserving input order.
/// The newest version is picked by version number, never by response order.
pub fn resolve_layer_arns(
    platform: &dyn ComputePlatform,
    layer_names: &[String],
) -> TripodResult<Vec<String>> {
    let mut arns = Vec::with_capacity(layer_names.len());
    for name in layer_names {
        let versions = platform.list_layer_versions(name)?;
        let latest =
            latest_version(&versions).ok_or_else(|| TripodError::not_found("layer", name))?;
        info!(layer = %name, version = latest.version, arn = %latest.arn, "resolved layer");
        arns.push(latest.arn.clone());
    }
    Ok(arns)
}

pub fn latest_version(versions: &[LayerVersion]) -> Option<&LayerVersion> {
    versions.iter().max_by_key(|layer| layer.version)
}
