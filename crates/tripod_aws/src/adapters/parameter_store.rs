use aws_sdk_ssm::error::DisplayErrorContext;
use tripod_core::environment::SecretStore;
use tripod_core::{TripodError, TripodResult};

use super::block_on;

/// SSM Parameter Store lookups with decryption enabled.
pub struct ParameterStore {
    client: aws_sdk_ssm::Client,
}

impl ParameterStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

impl SecretStore for ParameterStore {
    fn get_decrypted_parameter(&self, name: &str) -> TripodResult<String> {
        let result = block_on(async {
            self.client
                .get_parameter()
                .name(name)
                .with_decryption(true)
                .send()
                .await
        });

        let output = match result {
            Ok(output) => output,
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_parameter_not_found()) =>
            {
                return Err(TripodError::not_found("parameter", name));
            }
            Err(error) => {
                return Err(TripodError::platform(
                    "get_parameter",
                    DisplayErrorContext(error).to_string(),
                ));
            }
        };

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_string)
            .ok_or_else(|| {
                TripodError::platform("get_parameter", format!("parameter '{name}' has no value"))
            })
    }
}
