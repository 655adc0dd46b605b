use std::future::Future;

use aws_config::{BehaviorVersion, Region, SdkConfig};

pub mod lambda;
pub mod parameter_store;

/// Loads shared SDK configuration from the default provider chain, with an
/// optional region override.
pub async fn load_sdk_config(region: Option<String>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    loader.load().await
}

/// Drives an SDK future to completion from synchronous adapter code running
/// on the multi-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
