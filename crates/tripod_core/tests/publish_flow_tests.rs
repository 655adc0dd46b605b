mod support;

use std::io::Cursor;

use support::workspace::TestWorkspace;
use tripod_core::commands::{list_functions, publish, publish_layer, render_function_list};
use tripod_core::manifest::load_manifest;
use tripod_core::publisher::PublishAction;
use tripod_core::test_helpers::{layer_arn, PlatformCall, RecordingPlatform, RecordingSecretStore};
use tripod_core::TripodError;
use zip::ZipArchive;

fn secrets() -> RecordingSecretStore {
    RecordingSecretStore::with_values([("/ingest/db-password", "hunter2")])
}

/// Entry names in the order they were written to the archive.
fn entries_in_order(zip_file: Vec<u8>) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(zip_file)).expect("zip");
    (0..archive.len())
        .map(|index| archive.by_index(index).expect("entry").name().to_string())
        .collect()
}

fn is_create(call: &PlatformCall) -> bool {
    matches!(call, PlatformCall::CreateFunction(_))
}

fn is_update_code(call: &PlatformCall) -> bool {
    matches!(call, PlatformCall::UpdateFunctionCode { .. })
}

fn is_update_configuration(call: &PlatformCall) -> bool {
    matches!(call, PlatformCall::UpdateFunctionConfiguration(_))
}

fn is_publish_version(call: &PlatformCall) -> bool {
    matches!(call, PlatformCall::PublishVersion(_))
}

#[test]
fn list_reports_each_function_once_in_manifest_order() {
    let workspace = TestWorkspace::ingest_project();
    let manifest = load_manifest(&workspace.manifest_path(), &secrets()).expect("manifest");

    assert_eq!(list_functions(&manifest), vec!["ingest", "report"]);
    let rendered = render_function_list(&manifest);
    assert_eq!(rendered.matches("  ingest\n").count(), 1);
    assert_eq!(rendered.matches("  report\n").count(), 1);
}

#[test]
fn absent_function_is_created_and_versioned_once() {
    let workspace = TestWorkspace::ingest_project();
    let manifest = load_manifest(&workspace.manifest_path(), &secrets()).expect("manifest");
    let platform = RecordingPlatform::new().with_layer("py37-psycopg2", &[3, 2, 1]);

    let outcome = publish(&manifest, "ingest", &platform, None).expect("publish");

    assert_eq!(outcome.action, PublishAction::Created);
    assert_eq!(platform.count(is_create), 1);
    assert_eq!(platform.count(is_publish_version), 1);
    assert_eq!(platform.count(is_update_code), 0);
    assert_eq!(platform.count(is_update_configuration), 0);

    let calls = platform.calls();
    let request = calls
        .iter()
        .find_map(|call| match call {
            PlatformCall::CreateFunction(request) => Some(request.clone()),
            _ => None,
        })
        .expect("create request");
    assert_eq!(request.layer_arns, vec![layer_arn("py37-psycopg2", 3)]);
    assert_eq!(request.environment["DB_PASSWORD"], "hunter2");
    assert_eq!(request.runtime, "python3.7");

    assert_eq!(entries_in_order(request.zip_file), vec!["a.py", "b.py"]);
}

#[test]
fn mixed_literal_and_glob_files_keep_literal_directories() {
    let workspace = TestWorkspace::new(
        r#"
functions:
  - name: api
    runtime: python3.7
    role_arn: arn:aws:iam::123456789012:role/api
    handler: app.handler
    files: ["app.py", "lib/util.py", "handlers/*.py"]
"#,
    );
    workspace.write("app.py", "from lib import util\n");
    workspace.write("lib/util.py", "def helper():\n    pass\n");
    workspace.write("handlers/orders.py", "def handle():\n    pass\n");
    workspace.write("handlers/.secrets.py", "TOKEN = 'x'\n");
    let manifest =
        load_manifest(&workspace.manifest_path(), &RecordingSecretStore::default()).expect("load");
    let platform = RecordingPlatform::new();

    publish(&manifest, "api", &platform, None).expect("publish");

    let calls = platform.calls();
    let request = calls
        .iter()
        .find_map(|call| match call {
            PlatformCall::CreateFunction(request) => Some(request.clone()),
            _ => None,
        })
        .expect("create request");
    assert_eq!(
        entries_in_order(request.zip_file),
        vec!["app.py", "lib/util.py", "orders.py"]
    );
}

#[test]
fn existing_function_is_updated_and_versioned_once() {
    let workspace = TestWorkspace::ingest_project();
    let manifest = load_manifest(&workspace.manifest_path(), &secrets()).expect("manifest");
    let platform = RecordingPlatform::new().with_function("report", 7);

    let outcome = publish(&manifest, "report", &platform, None).expect("publish");

    assert_eq!(outcome.action, PublishAction::Updated);
    assert_eq!(outcome.version, "8");
    assert_eq!(platform.count(is_update_code), 1);
    assert_eq!(platform.count(is_update_configuration), 1);
    assert_eq!(platform.count(is_publish_version), 1);
    assert_eq!(platform.count(is_create), 0);
}

#[test]
fn republish_after_partial_update_converges() {
    let workspace = TestWorkspace::ingest_project();
    let manifest = load_manifest(&workspace.manifest_path(), &secrets()).expect("manifest");

    let failing = RecordingPlatform::new()
        .with_function("report", 1)
        .failing_on("update_function_configuration");
    let error = publish(&manifest, "report", &failing, None).expect_err("should fail");
    assert!(matches!(error, TripodError::Platform { .. }));
    assert_eq!(failing.count(is_update_code), 1);

    let healthy = RecordingPlatform::new().with_function("report", 1);
    let outcome = publish(&manifest, "report", &healthy, None).expect("re-publish");
    assert_eq!(outcome.action, PublishAction::Updated);
    assert_eq!(healthy.count(is_update_configuration), 1);
}

#[test]
fn archive_dir_keeps_a_copy_per_function() {
    let workspace = TestWorkspace::ingest_project();
    let manifest = load_manifest(&workspace.manifest_path(), &secrets()).expect("manifest");
    let archive_dir = workspace.root().join("dist");
    let platform = RecordingPlatform::new();

    publish(&manifest, "report", &platform, Some(&archive_dir)).expect("publish");

    let saved = std::fs::read(archive_dir.join("report.zip")).expect("saved archive");
    assert_eq!(entries_in_order(saved), vec!["report.py"]);
}

#[test]
fn missing_source_files_fail_before_platform_calls() {
    let workspace = TestWorkspace::new(
        "functions:\n  - {name: empty, runtime: python3.7, role_arn: r, handler: h, files: [\"src/*.py\"]}\n",
    );
    let manifest =
        load_manifest(&workspace.manifest_path(), &RecordingSecretStore::default()).expect("load");
    let platform = RecordingPlatform::new();

    let error = publish(&manifest, "empty", &platform, None).expect_err("no files");
    assert!(matches!(error, TripodError::Io { .. }));
    assert!(platform.calls().is_empty());
}

#[test]
fn missing_manifest_makes_no_calls() {
    let workspace = TestWorkspace::ingest_project();
    let store = secrets();
    let error = load_manifest(&workspace.root().join("absent.yaml"), &store)
        .expect_err("missing manifest");

    assert!(matches!(error, TripodError::Configuration(_)));
    assert_eq!(error.exit_code(), 2);
    assert!(store.lookups().is_empty());
}

#[test]
fn secrets_are_looked_up_once_per_load() {
    let workspace = TestWorkspace::ingest_project();
    let store = secrets();

    load_manifest(&workspace.manifest_path(), &store).expect("first load");
    assert_eq!(store.lookups(), vec!["/ingest/db-password".to_string()]);

    load_manifest(&workspace.manifest_path(), &store).expect("second load");
    assert_eq!(store.lookups().len(), 2);
}

#[test]
fn declared_layer_is_built_and_published() {
    let workspace = TestWorkspace::ingest_project();
    let manifest = load_manifest(&workspace.manifest_path(), &secrets()).expect("manifest");
    let platform = RecordingPlatform::new();

    let outcome = publish_layer(&manifest, "py37-psycopg2", &platform).expect("publish layer");
    assert_eq!(outcome.version_arn, layer_arn("py37-psycopg2", 1));

    let calls = platform.calls();
    let [PlatformCall::PublishLayerVersion(request)] = calls.as_slice() else {
        panic!("expected one layer publish, got {calls:?}");
    };
    assert_eq!(
        entries_in_order(request.zip_file.clone()),
        vec!["python/psycopg2/_psycopg.so"]
    );
}
