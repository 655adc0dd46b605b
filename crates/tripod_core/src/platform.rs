//! Seam between the publish flow and the compute platform.
//!
//! Calls are synchronous request/response. Adapters that wrap an async SDK
//! block on it internally so the domain code stays single-threaded.

use std::collections::BTreeMap;

use crate::error::TripodResult;

/// Current remote state of a function as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteFunction {
    pub function_arn: Option<String>,
    pub version: Option<String>,
    pub last_modified: Option<String>,
}

/// Outcome of the single describe call that selects create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionLookup {
    Found(RemoteFunction),
    NotFound,
}

/// The kind of change a function is settling from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionChange {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVersion {
    pub version: i64,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFunctionRequest {
    pub function_name: String,
    pub description: String,
    pub runtime: String,
    pub role_arn: String,
    pub handler: String,
    pub zip_file: Vec<u8>,
    pub environment: BTreeMap<String, String>,
    pub layer_arns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfigurationUpdate {
    pub function_name: String,
    pub description: String,
    pub runtime: String,
    pub role_arn: String,
    pub handler: String,
    pub environment: BTreeMap<String, String>,
    pub layer_arns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishLayerRequest {
    pub layer_name: String,
    pub description: String,
    pub compatible_runtimes: Vec<String>,
    pub zip_file: Vec<u8>,
}

pub trait ComputePlatform {
    fn get_function_configuration(&self, function_name: &str) -> TripodResult<FunctionLookup>;

    fn create_function(&self, request: &CreateFunctionRequest) -> TripodResult<()>;

    fn update_function_code(&self, function_name: &str, zip_file: &[u8]) -> TripodResult<()>;

    fn update_function_configuration(
        &self,
        update: &FunctionConfigurationUpdate,
    ) -> TripodResult<()>;

    /// Blocks until the function accepts the next call after `change`.
    fn wait_until_settled(&self, function_name: &str, change: FunctionChange) -> TripodResult<()>;

    /// Cuts a new immutable version and returns its identifier.
    fn publish_version(&self, function_name: &str) -> TripodResult<String>;

    /// Every published version of a layer, in whatever order the platform
    /// reports them.
    fn list_layer_versions(&self, layer_name: &str) -> TripodResult<Vec<LayerVersion>>;

    /// Returns the ARN of the newly published layer version.
    fn publish_layer_version(&self, request: &PublishLayerRequest) -> TripodResult<String>;
}
