use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use aws_sdk_lambda::client::Waiters;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, LayerVersionContentInput, Runtime};
use tracing::debug;
use tripod_core::platform::{
    ComputePlatform, CreateFunctionRequest, FunctionChange, FunctionConfigurationUpdate,
    FunctionLookup, LayerVersion, PublishLayerRequest, RemoteFunction,
};
use tripod_core::{TripodError, TripodResult};

use super::block_on;

/// Upper bound on waiting for a function to leave `Pending`/`InProgress`.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(300);

/// [`ComputePlatform`] backed by the AWS Lambda API.
pub struct LambdaPlatform {
    client: aws_sdk_lambda::Client,
}

impl LambdaPlatform {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_lambda::Client::new(config),
        }
    }
}

fn platform_error(operation: &str, error: impl std::error::Error) -> TripodError {
    TripodError::platform(operation, DisplayErrorContext(error).to_string())
}

fn waiter_operation(change: FunctionChange) -> &'static str {
    match change {
        FunctionChange::Created => "wait_until_function_active_v2",
        FunctionChange::Updated => "wait_until_function_updated_v2",
    }
}

fn environment(variables: &BTreeMap<String, String>) -> Environment {
    let variables: HashMap<String, String> = variables
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Environment::builder().set_variables(Some(variables)).build()
}

impl ComputePlatform for LambdaPlatform {
    fn get_function_configuration(&self, function_name: &str) -> TripodResult<FunctionLookup> {
        let result = block_on(async {
            self.client
                .get_function_configuration()
                .function_name(function_name)
                .send()
                .await
        });

        match result {
            Ok(output) => Ok(FunctionLookup::Found(RemoteFunction {
                function_arn: output.function_arn().map(str::to_string),
                version: output.version().map(str::to_string),
                last_modified: output.last_modified().map(str::to_string),
            })),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_resource_not_found_exception()) =>
            {
                debug!(function = %function_name, "function not found");
                Ok(FunctionLookup::NotFound)
            }
            Err(error) => Err(platform_error("get_function_configuration", error)),
        }
    }

    fn create_function(&self, request: &CreateFunctionRequest) -> TripodResult<()> {
        let code = FunctionCode::builder()
            .zip_file(Blob::new(request.zip_file.clone()))
            .build();

        block_on(async {
            self.client
                .create_function()
                .function_name(&request.function_name)
                .description(&request.description)
                .runtime(Runtime::from(request.runtime.as_str()))
                .role(&request.role_arn)
                .handler(&request.handler)
                .code(code)
                .environment(environment(&request.environment))
                .set_layers(Some(request.layer_arns.clone()))
                .publish(false)
                .send()
                .await
        })
        .map(|_| ())
        .map_err(|error| platform_error("create_function", error))
    }

    fn update_function_code(&self, function_name: &str, zip_file: &[u8]) -> TripodResult<()> {
        block_on(async {
            self.client
                .update_function_code()
                .function_name(function_name)
                .zip_file(Blob::new(zip_file.to_vec()))
                .send()
                .await
        })
        .map(|_| ())
        .map_err(|error| platform_error("update_function_code", error))
    }

    fn update_function_configuration(
        &self,
        update: &FunctionConfigurationUpdate,
    ) -> TripodResult<()> {
        block_on(async {
            self.client
                .update_function_configuration()
                .function_name(&update.function_name)
                .description(&update.description)
                .runtime(Runtime::from(update.runtime.as_str()))
                .role(&update.role_arn)
                .handler(&update.handler)
                .environment(environment(&update.environment))
                .set_layers(Some(update.layer_arns.clone()))
                .send()
                .await
        })
        .map(|_| ())
        .map_err(|error| platform_error("update_function_configuration", error))
    }

    fn wait_until_settled(&self, function_name: &str, change: FunctionChange) -> TripodResult<()> {
        let operation = waiter_operation(change);
        debug!(function = %function_name, waiter = operation, "waiting for function to settle");

        block_on(async {
            match change {
                FunctionChange::Created => self
                    .client
                    .wait_until_function_active_v2()
                    .function_name(function_name)
                    .wait(SETTLE_TIMEOUT)
                    .await
                    .map(|_| ())
                    .map_err(|error| platform_error(operation, error)),
                FunctionChange::Updated => self
                    .client
                    .wait_until_function_updated_v2()
                    .function_name(function_name)
                    .wait(SETTLE_TIMEOUT)
                    .await
                    .map(|_| ())
                    .map_err(|error| platform_error(operation, error)),
            }
        })
    }

    fn publish_version(&self, function_name: &str) -> TripodResult<String> {
        let output = block_on(async {
            self.client
                .publish_version()
                .function_name(function_name)
                .send()
                .await
        })
        .map_err(|error| platform_error("publish_version", error))?;

        output.version().map(str::to_string).ok_or_else(|| {
            TripodError::platform("publish_version", "response did not include a version")
        })
    }

    fn list_layer_versions(&self, layer_name: &str) -> TripodResult<Vec<LayerVersion>> {
        let mut versions = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let result = block_on(async {
                self.client
                    .list_layer_versions()
                    .layer_name(layer_name)
                    .set_marker(marker.clone())
                    .send()
                    .await
            });
            let output = match result {
                Ok(output) => output,
                Err(error)
                    if error
                        .as_service_error()
                        .is_some_and(|service| service.is_resource_not_found_exception()) =>
                {
                    return Ok(Vec::new());
                }
                Err(error) => return Err(platform_error("list_layer_versions", error)),
            };

            for item in output.layer_versions() {
                if let Some(arn) = item.layer_version_arn() {
                    versions.push(LayerVersion {
                        version: item.version(),
                        arn: arn.to_string(),
                    });
                }
            }

            match output.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(layer = %layer_name, versions = versions.len(), "listed layer versions");
        Ok(versions)
    }

    fn publish_layer_version(&self, request: &PublishLayerRequest) -> TripodResult<String> {
        let content = LayerVersionContentInput::builder()
            .zip_file(Blob::new(request.zip_file.clone()))
            .build();
        let runtimes = request
            .compatible_runtimes
            .iter()
            .map(|runtime| Runtime::from(runtime.as_str()))
            .collect();

        let output = block_on(async {
            self.client
                .publish_layer_version()
                .layer_name(&request.layer_name)
                .description(&request.description)
                .content(content)
                .set_compatible_runtimes(Some(runtimes))
                .send()
                .await
        })
        .map_err(|error| platform_error("publish_layer_version", error))?;

        output.layer_version_arn().map(str::to_string).ok_or_else(|| {
            TripodError::platform(
                "publish_layer_version",
                "response did not include a layer version ARN",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_copies_every_variable() {
        let variables = BTreeMap::from([
            ("STAGE".to_string(), "prod".to_string()),
            ("DB_PASSWORD".to_string(), "hunter2".to_string()),
        ]);
        let converted = environment(&variables);
        let converted = converted.variables().expect("variables set");
        assert_eq!(converted.len(), 2);
        assert_eq!(converted["STAGE"], "prod");
    }

    #[test]
    fn waits_use_state_specific_waiters() {
        assert_eq!(
            waiter_operation(FunctionChange::Created),
            "wait_until_function_active_v2"
        );
        assert_eq!(
            waiter_operation(FunctionChange::Updated),
            "wait_until_function_updated_v2"
        );
    }

    #[test]
    fn platform_errors_name_the_operation() {
        let error = platform_error(
            "publish_version",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
        );
        assert!(error.to_string().starts_with("publish_version failed"));
    }
}
