//! The declarative `tripod.yaml` manifest.
//!
//! Loading reads and validates the whole document first, then resolves
//! environment values, so a malformed manifest never reaches the secret store.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Mapping;
use tracing::debug;

use crate::environment::{parse_environment, resolve_environment, SecretStore};
use crate::error::{TripodError, TripodResult};
use crate::layer_build::LayerBuildSpec;

pub const DEFAULT_MANIFEST_FILE: &str = "tripod.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestDocument {
    pub functions: Vec<FunctionEntry>,
    #[serde(default)]
    pub layers: Vec<LayerBuildSpec>,
}

/// A function declaration exactly as written in the manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub runtime: String,
    pub role_arn: String,
    pub handler: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub environment: Option<Mapping>,
}

/// A fully resolved, immutable function definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub runtime: String,
    pub role_arn: String,
    pub handler: String,
    pub files: Vec<String>,
    pub layers: Vec<String>,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    base_dir: PathBuf,
    functions: Vec<FunctionSpec>,
    layer_builds: Vec<LayerBuildSpec>,
}

impl Manifest {
    /// Directory that glob patterns and layer sources are relative to.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Functions in manifest order.
    pub fn functions(&self) -> &[FunctionSpec] {
        &self.functions
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|function| function.name.as_str())
    }

    pub fn function(&self, name: &str) -> TripodResult<&FunctionSpec> {
        self.functions
            .iter()
            .find(|function| function.name == name)
            .ok_or_else(|| TripodError::not_found("function", name))
    }

    pub fn layer_builds(&self) -> &[LayerBuildSpec] {
        &self.layer_builds
    }

    pub fn layer_build(&self, name: &str) -> TripodResult<&LayerBuildSpec> {
        self.layer_builds
            .iter()
            .find(|layer| layer.name == name)
            .ok_or_else(|| TripodError::not_found("layer build", name))
    }
}

pub fn load_manifest(path: &Path, secrets: &dyn SecretStore) -> TripodResult<Manifest> {
    let text = fs::read_to_string(path).map_err(|error| match error.kind() {
        io::ErrorKind::NotFound => {
            TripodError::Configuration(format!("manifest '{}' does not exist", path.display()))
        }
        _ => TripodError::Configuration(format!(
            "failed to read manifest '{}': {error}",
            path.display()
        )),
    })?;

    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    debug!(manifest = %path.display(), "loaded manifest file");
    parse_manifest(&text, base_dir, secrets)
}

pub fn parse_manifest(
    text: &str,
    base_dir: PathBuf,
    secrets: &dyn SecretStore,
) -> TripodResult<Manifest> {
    let document: ManifestDocument = serde_yaml::from_str(text)
        .map_err(|error| TripodError::Configuration(format!("malformed manifest: {error}")))?;
    validate_document(&document)?;

    let mut declared = Vec::with_capacity(document.functions.len());
    for entry in &document.functions {
        let environment = match &entry.environment {
            Some(raw) => parse_environment(raw)?,
            None => Vec::new(),
        };
        declared.push((entry, environment));
    }

    let mut functions = Vec::with_capacity(declared.len());
    for (entry, environment) in declared {
        functions.push(FunctionSpec {
            name: entry.name.clone(),
            description: entry.description.clone(),
            runtime: entry.runtime.clone(),
            role_arn: entry.role_arn.clone(),
            handler: entry.handler.clone(),
            files: entry.files.clone(),
            layers: entry.layers.clone(),
            environment: resolve_environment(&environment, secrets)?,
        });
    }

    Ok(Manifest {
        base_dir,
        functions,
        layer_builds: document.layers,
    })
}

fn validate_document(document: &ManifestDocument) -> TripodResult<()> {
    let mut names = HashSet::new();
    for entry in &document.functions {
        let name = entry.name.trim();
        if name.is_empty() {
            return Err(TripodError::Configuration(
                "function names must be non-empty".to_string(),
            ));
        }
        if !names.insert(name) {
            return Err(TripodError::Configuration(format!(
                "function '{name}' is declared more than once"
            )));
        }
        for (field, value) in [
            ("runtime", &entry.runtime),
            ("role_arn", &entry.role_arn),
            ("handler", &entry.handler),
        ] {
            if value.trim().is_empty() {
                return Err(TripodError::Configuration(format!(
                    "function '{name}' has an empty {field}"
                )));
            }
        }
        if entry.files.is_empty() {
            return Err(TripodError::Configuration(format!(
                "function '{name}' must list at least one file pattern"
            )));
        }
    }

    let mut layer_names = HashSet::new();
    for layer in &document.layers {
        if !layer_names.insert(layer.name.trim()) {
            return Err(TripodError::Configuration(format!(
                "layer '{}' is declared more than once",
                layer.name
            )));
        }
        layer.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingSecretStore;

    const MANIFEST: &str = r#"
functions:
  - name: ingest
    description: pulls feeds
    runtime: python3.7
    role_arn: arn:aws:iam::123456789012:role/ingest
    handler: ingest.handler
    files: ["src/*.py"]
    layers: [py37-psycopg2]
    environment:
      STAGE: prod
      DB_PASSWORD:
        paramstore: /ingest/db-password
  - name: report
    runtime: python3.7
    role_arn: arn:aws:iam::123456789012:role/report
    handler: report.handler
    files: ["report.py"]
"#;

    fn parse(text: &str, store: &RecordingSecretStore) -> TripodResult<Manifest> {
        parse_manifest(text, PathBuf::from("."), store)
    }

    #[test]
    fn parses_functions_in_declaration_order() {
        let store = RecordingSecretStore::with_values([("/ingest/db-password", "hunter2")]);
        let manifest = parse(MANIFEST, &store).expect("manifest should parse");

        let names: Vec<&str> = manifest.function_names().collect();
        assert_eq!(names, vec!["ingest", "report"]);

        let ingest = manifest.function("ingest").expect("ingest exists");
        assert_eq!(ingest.description, "pulls feeds");
        assert_eq!(ingest.layers, vec!["py37-psycopg2".to_string()]);
        assert_eq!(ingest.environment["STAGE"], "prod");
        assert_eq!(ingest.environment["DB_PASSWORD"], "hunter2");

        let report = manifest.function("report").expect("report exists");
        assert!(report.description.is_empty());
        assert!(report.environment.is_empty());
        assert_eq!(store.lookups(), vec!["/ingest/db-password".to_string()]);
    }

    #[test]
    fn unknown_function_is_not_found() {
        let store = RecordingSecretStore::with_values([("/ingest/db-password", "x")]);
        let manifest = parse(MANIFEST, &store).expect("manifest should parse");
        let error = manifest.function("missing").expect_err("should be absent");
        assert!(matches!(error, TripodError::NotFound { kind: "function", .. }));
    }

    #[test]
    fn duplicate_names_are_rejected_before_secret_lookup() {
        let text = r#"
functions:
  - {name: a, runtime: r, role_arn: x, handler: h, files: [a.py], environment: {K: {paramstore: /p}}}
  - {name: a, runtime: r, role_arn: x, handler: h, files: [b.py]}
"#;
        let store = RecordingSecretStore::with_values([("/p", "v")]);
        let error = parse(text, &store).expect_err("duplicates should fail");
        assert!(matches!(error, TripodError::Configuration(ref m) if m.contains("more than once")));
        assert!(store.lookups().is_empty());
    }

    #[test]
    fn missing_required_field_is_configuration_error() {
        let text = "functions:\n  - {name: a, runtime: r, handler: h, files: [a.py]}\n";
        let error = parse(text, &RecordingSecretStore::default()).expect_err("role_arn missing");
        assert!(matches!(error, TripodError::Configuration(ref m) if m.contains("role_arn")));
    }

    #[test]
    fn unknown_function_field_is_configuration_error() {
        let text = "functions:\n  - {name: a, runtime: r, role_arn: x, handler: h, files: [a.py], memory: 128}\n";
        let error = parse(text, &RecordingSecretStore::default()).expect_err("unknown field");
        assert!(matches!(error, TripodError::Configuration(_)));
    }

    #[test]
    fn unsupported_environment_shape_is_validation_error() {
        let text = "functions:\n  - {name: a, runtime: r, role_arn: x, handler: h, files: [a.py], environment: {PORT: 8080}}\n";
        let error = parse(text, &RecordingSecretStore::default()).expect_err("number env");
        assert!(matches!(error, TripodError::Validation(_)));
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordingSecretStore::default();
        let error = load_manifest(&dir.path().join(DEFAULT_MANIFEST_FILE), &store)
            .expect_err("missing manifest");
        assert!(matches!(error, TripodError::Configuration(ref m) if m.contains("does not exist")));
        assert!(store.lookups().is_empty());
    }

    #[test]
    fn base_dir_is_manifest_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_MANIFEST_FILE);
        fs::write(
            &path,
            "functions:\n  - {name: a, runtime: r, role_arn: x, handler: h, files: [a.py]}\n",
        )
        .expect("write manifest");

        let manifest = load_manifest(&path, &RecordingSecretStore::default()).expect("load");
        assert_eq!(manifest.base_dir(), dir.path());
    }
}
