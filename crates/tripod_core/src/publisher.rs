//! Create-or-update of one function followed by a new published version.
//!
//! A single describe call selects the path. After each change the publisher
//! waits for the function to settle before the next call. The platform offers no
//! transactions: a failure between steps can leave the remote function with
//! new code but old configuration (or created but unversioned). Running
//! publish again takes the update path, which rewrites code and configuration
//! in full, so a re-run converges the function.

use std::fmt;

use tracing::{error, info, warn};

use crate::archive::ArchivePackage;
use crate::error::TripodResult;
use crate::layers::resolve_layer_arns;
use crate::manifest::FunctionSpec;
use crate::platform::{
    ComputePlatform, CreateFunctionRequest, FunctionChange, FunctionConfigurationUpdate,
    FunctionLookup, RemoteFunction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    ResolveLayers,
    Describe,
    Create,
    UpdateCode,
    UpdateConfiguration,
    WaitUntilSettled,
    PublishVersion,
}

impl PublishStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolveLayers => "resolve_layers",
            Self::Describe => "describe",
            Self::Create => "create",
            Self::UpdateCode => "update_code",
            Self::UpdateConfiguration => "update_configuration",
            Self::WaitUntilSettled => "wait_until_settled",
            Self::PublishVersion => "publish_version",
        }
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    Created,
    Updated,
}

impl fmt::Display for PublishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub function_name: String,
    pub action: PublishAction,
    pub version: String,
}

pub fn publish_function(
    platform: &dyn ComputePlatform,
    function: &FunctionSpec,
    package: &ArchivePackage,
) -> TripodResult<PublishOutcome> {
    let layer_arns = run_step(function, PublishStep::ResolveLayers, false, || {
        resolve_layer_arns(platform, &function.layers)
    })?;

    let lookup = run_step(function, PublishStep::Describe, false, || {
        platform.get_function_configuration(&function.name)
    })?;

    match lookup {
        FunctionLookup::NotFound => create_function(platform, function, package, layer_arns),
        FunctionLookup::Found(remote) => {
            update_function(platform, function, package, layer_arns, &remote)
        }
    }
}

fn create_function(
    platform: &dyn ComputePlatform,
    function: &FunctionSpec,
    package: &ArchivePackage,
    layer_arns: Vec<String>,
) -> TripodResult<PublishOutcome> {
    let request = CreateFunctionRequest {
        function_name: function.name.clone(),
        description: function.description.clone(),
        runtime: function.runtime.clone(),
        role_arn: function.role_arn.clone(),
        handler: function.handler.clone(),
        zip_file: package.bytes().to_vec(),
        environment: function.environment.clone(),
        layer_arns,
    };
    run_step(function, PublishStep::Create, false, || {
        platform.create_function(&request)
    })?;
    info!(function = %function.name, "created function");
    wait_until_settled(platform, function, FunctionChange::Created)?;

    let version = run_step(function, PublishStep::PublishVersion, true, || {
        platform.publish_version(&function.name)
    })?;
    info!(function = %function.name, version = %version, "published version");

    Ok(PublishOutcome {
        function_name: function.name.clone(),
        action: PublishAction::Created,
        version,
    })
}

fn update_function(
    platform: &dyn ComputePlatform,
    function: &FunctionSpec,
    package: &ArchivePackage,
    layer_arns: Vec<String>,
    remote: &RemoteFunction,
) -> TripodResult<PublishOutcome> {
    info!(
        function = %function.name,
        arn = remote.function_arn.as_deref().unwrap_or("unknown"),
        last_modified = remote.last_modified.as_deref().unwrap_or("unknown"),
        "function exists, updating"
    );

    run_step(function, PublishStep::UpdateCode, false, || {
        platform.update_function_code(&function.name, package.bytes())
    })?;
    wait_until_settled(platform, function, FunctionChange::Updated)?;

    let update = FunctionConfigurationUpdate {
        function_name: function.name.clone(),
        description: function.description.clone(),
        runtime: function.runtime.clone(),
        role_arn: function.role_arn.clone(),
        handler: function.handler.clone(),
        environment: function.environment.clone(),
        layer_arns,
    };
    run_step(function, PublishStep::UpdateConfiguration, true, || {
        platform.update_function_configuration(&update)
    })?;
    info!(function = %function.name, "updated function");
    wait_until_settled(platform, function, FunctionChange::Updated)?;

    let version = run_step(function, PublishStep::PublishVersion, true, || {
        platform.publish_version(&function.name)
    })?;
    info!(function = %function.name, version = %version, "published version");

    Ok(PublishOutcome {
        function_name: function.name.clone(),
        action: PublishAction::Updated,
        version,
    })
}

fn wait_until_settled(
    platform: &dyn ComputePlatform,
    function: &FunctionSpec,
    change: FunctionChange,
) -> TripodResult<()> {
    run_step(function, PublishStep::WaitUntilSettled, true, || {
        platform.wait_until_settled(&function.name, change)
    })
}

/// Runs one remote step, logging which step failed. `remote_changed` marks
/// steps that run after the remote function was already modified.
fn run_step<T>(
    function: &FunctionSpec,
    step: PublishStep,
    remote_changed: bool,
    call: impl FnOnce() -> TripodResult<T>,
) -> TripodResult<T> {
    call().map_err(|failure| {
        error!(function = %function.name, step = %step, error = %failure, "publish step failed");
        if remote_changed {
            warn!(
                function = %function.name,
                step = %step,
                "remote function is partially updated; re-run publish to converge it"
            );
        }
        failure
    })
}
