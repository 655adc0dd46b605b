//! Environment variable declarations and their resolution at manifest load.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{TripodError, TripodResult};

const SECRET_REF_KEY: &str = "paramstore";

/// Decrypting lookup against a parameter/secret store.
pub trait SecretStore {
    fn get_decrypted_parameter(&self, name: &str) -> TripodResult<String>;
}

/// A declared environment value before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentValueSpec {
    Literal(String),
    /// Name of a secret-store parameter, decrypted at load time.
    SecretRef(String),
}

impl EnvironmentValueSpec {
    /// Interprets one raw manifest value. Accepts a plain string or a mapping
    /// containing a `paramstore` string entry; other keys are ignored.
    pub fn from_yaml(key: &str, value: &Value) -> TripodResult<Self> {
        match value {
            Value::String(literal) => Ok(Self::Literal(literal.clone())),
            Value::Mapping(mapping) => secret_ref_from_mapping(key, mapping),
            other => Err(unsupported(key, other)),
        }
    }
}

fn secret_ref_from_mapping(key: &str, mapping: &Mapping) -> TripodResult<EnvironmentValueSpec> {
    match mapping.get(SECRET_REF_KEY) {
        Some(Value::String(parameter)) if !parameter.trim().is_empty() => {
            Ok(EnvironmentValueSpec::SecretRef(parameter.clone()))
        }
        _ => Err(unsupported(key, &Value::Mapping(mapping.clone()))),
    }
}

fn unsupported(key: &str, value: &Value) -> TripodError {
    let rendered = serde_yaml::to_string(value)
        .map(|text| text.trim().replace('\n', " "))
        .unwrap_or_else(|_| format!("{value:?}"));
    TripodError::Validation(format!(
        "unsupported environment spec for '{key}': {rendered}"
    ))
}

/// Parses the raw `environment` mapping of a function entry, keeping the
/// declared order.
pub fn parse_environment(raw: &Mapping) -> TripodResult<Vec<(String, EnvironmentValueSpec)>> {
    raw.iter()
        .map(|(key, value)| {
            let Value::String(name) = key else {
                return Err(TripodError::Validation(format!(
                    "environment variable names must be strings, got {key:?}"
                )));
            };
            Ok((name.clone(), EnvironmentValueSpec::from_yaml(name, value)?))
        })
        .collect()
}

/// Resolves every declared value. Secret references cost exactly one store
/// lookup each.
pub fn resolve_environment(
    specs: &[(String, EnvironmentValueSpec)],
    secrets: &dyn SecretStore,
) -> TripodResult<BTreeMap<String, String>> {
    let mut resolved = BTreeMap::new();
    for (name, spec) in specs {
        let value = match spec {
            EnvironmentValueSpec::Literal(literal) => literal.clone(),
            EnvironmentValueSpec::SecretRef(parameter) => {
                debug!(variable = %name, parameter = %parameter, "resolving secret parameter");
                secrets.get_decrypted_parameter(parameter)?
            }
        };
        resolved.insert(name.clone(), value);
    }
    Ok(resolved)
}
