//! Recording fakes for the platform and secret-store seams.
//!
//! Shared by unit tests and the integration tests under `tests/`.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::environment::SecretStore;
use crate::error::{TripodError, TripodResult};
use crate::platform::{
    ComputePlatform, CreateFunctionRequest, FunctionChange, FunctionConfigurationUpdate,
    FunctionLookup, LayerVersion, PublishLayerRequest, RemoteFunction,
};

/// Secret store backed by a fixed map that records every lookup.
#[derive(Default)]
pub struct RecordingSecretStore {
    values: HashMap<String, String>,
    lookups: Mutex<Vec<String>>,
}

impl RecordingSecretStore {
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("poisoned mutex").clone()
    }
}

impl SecretStore for RecordingSecretStore {
    fn get_decrypted_parameter(&self, name: &str) -> TripodResult<String> {
        self.lookups
            .lock()
            .expect("poisoned mutex")
            .push(name.to_string());
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| TripodError::not_found("parameter", name))
    }
}

/// One call observed by [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    GetFunctionConfiguration(String),
    CreateFunction(CreateFunctionRequest),
    UpdateFunctionCode { function_name: String, zip_len: usize },
    UpdateFunctionConfiguration(FunctionConfigurationUpdate),
    WaitUntilSettled { function_name: String, change: FunctionChange },
    PublishVersion(String),
    ListLayerVersions(String),
    PublishLayerVersion(PublishLayerRequest),
}

/// In-memory compute platform: functions exist once created, layers are
/// seeded up front, and any operation can be told to fail.
#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    functions: Mutex<HashMap<String, u32>>,
    layers: Mutex<HashMap<String, Vec<LayerVersion>>>,
    failing_operation: Option<&'static str>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as already deployed with `published_versions` versions.
    pub fn with_function(self, name: &str, published_versions: u32) -> Self {
        self.functions
            .lock()
            .expect("poisoned mutex")
            .insert(name.to_string(), published_versions);
        self
    }

    /// Seeds layer versions in the order the platform will report them.
    pub fn with_layer(self, name: &str, versions: &[i64]) -> Self {
        let listed = versions
            .iter()
            .map(|version| LayerVersion {
                version: *version,
                arn: layer_arn(name, *version),
            })
            .collect();
        self.layers
            .lock()
            .expect("poisoned mutex")
            .insert(name.to_string(), listed);
        self
    }

    /// Makes the named operation (e.g. `"update_function_configuration"`) fail.
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.failing_operation = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn count(&self, predicate: impl Fn(&PlatformCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, operation: &'static str, call: PlatformCall) -> TripodResult<()> {
        self.calls.lock().expect("poisoned mutex").push(call);
        if self.failing_operation == Some(operation) {
            return Err(TripodError::platform(operation, "injected failure"));
        }
        Ok(())
    }
}

pub fn layer_arn(name: &str, version: i64) -> String {
    format!("arn:aws:lambda:eu-west-1:123456789012:layer:{name}:{version}")
}

impl ComputePlatform for RecordingPlatform {
    fn get_function_configuration(&self, function_name: &str) -> TripodResult<FunctionLookup> {
        self.record(
            "get_function_configuration",
            PlatformCall::GetFunctionConfiguration(function_name.to_string()),
        )?;
        let functions = self.functions.lock().expect("poisoned mutex");
        Ok(match functions.get(function_name) {
            Some(version) => FunctionLookup::Found(RemoteFunction {
                function_arn: Some(format!(
                    "arn:aws:lambda:eu-west-1:123456789012:function:{function_name}"
                )),
                version: Some(version.to_string()),
                last_modified: None,
            }),
            None => FunctionLookup::NotFound,
        })
    }

    fn create_function(&self, request: &CreateFunctionRequest) -> TripodResult<()> {
        self.record(
            "create_function",
            PlatformCall::CreateFunction(request.clone()),
        )?;
        self.functions
            .lock()
            .expect("poisoned mutex")
            .insert(request.function_name.clone(), 0);
        Ok(())
    }

    fn update_function_code(&self, function_name: &str, zip_file: &[u8]) -> TripodResult<()> {
        self.record(
            "update_function_code",
            PlatformCall::UpdateFunctionCode {
                function_name: function_name.to_string(),
                zip_len: zip_file.len(),
            },
        )
    }

    fn update_function_configuration(
        &self,
        update: &FunctionConfigurationUpdate,
    ) -> TripodResult<()> {
        self.record(
            "update_function_configuration",
            PlatformCall::UpdateFunctionConfiguration(update.clone()),
        )
    }

    fn wait_until_settled(&self, function_name: &str, change: FunctionChange) -> TripodResult<()> {
        self.record(
            "wait_until_settled",
            PlatformCall::WaitUntilSettled {
                function_name: function_name.to_string(),
                change,
            },
        )
    }

    fn publish_version(&self, function_name: &str) -> TripodResult<String> {
        self.record(
            "publish_version",
            PlatformCall::PublishVersion(function_name.to_string()),
        )?;
        let mut functions = self.functions.lock().expect("poisoned mutex");
        let version = functions
            .get_mut(function_name)
            .ok_or_else(|| TripodError::not_found("function", function_name))?;
        *version += 1;
        Ok(version.to_string())
    }

    fn list_layer_versions(&self, layer_name: &str) -> TripodResult<Vec<LayerVersion>> {
        self.record(
            "list_layer_versions",
            PlatformCall::ListLayerVersions(layer_name.to_string()),
        )?;
        Ok(self
            .layers
            .lock()
            .expect("poisoned mutex")
            .get(layer_name)
            .cloned()
            .unwrap_or_default())
    }

    fn publish_layer_version(&self, request: &PublishLayerRequest) -> TripodResult<String> {
        self.record(
            "publish_layer_version",
            PlatformCall::PublishLayerVersion(request.clone()),
        )?;
        let mut layers = self.layers.lock().expect("poisoned mutex");
        let versions = layers.entry(request.layer_name.clone()).or_default();
        let next = versions.iter().map(|layer| layer.version).max().unwrap_or(0) + 1;
        let arn = layer_arn(&request.layer_name, next);
        versions.push(LayerVersion {
            version: next,
            arn: arn.clone(),
        });
        Ok(arn)
    }
}
