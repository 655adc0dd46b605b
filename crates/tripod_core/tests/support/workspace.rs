use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const INGEST_MANIFEST: &str = r#"
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
    description: nightly report
    runtime: python3.7
    role_arn: arn:aws:iam::123456789012:role/report
    handler: report.handler
    files: ["report.py"]
layers:
  - name: py37-psycopg2
    description: python 3.7 psycopg2 layer
    compatible_runtimes: [python3.7]
    files: ["vendor/psycopg2-3.7/*"]
    archive_prefix: python/psycopg2
"#;

/// A temporary project directory holding a manifest and its source files.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new(manifest: &str) -> Self {
        let workspace = Self {
            dir: tempfile::tempdir().expect("tempdir"),
        };
        workspace.write("tripod.yaml", manifest);
        workspace
    }

    /// The ingest/report project with every referenced file present.
    pub fn ingest_project() -> Self {
        let workspace = Self::new(INGEST_MANIFEST);
        workspace.write("src/a.py", "import b\n");
        workspace.write("src/b.py", "def handler(event, context):\n    return event\n");
        workspace.write("src/README.md", "not packaged\n");
        workspace.write("report.py", "def handler(event, context):\n    pass\n");
        workspace.write("vendor/psycopg2-3.7/_psycopg.so", "elf");
        workspace
    }

    pub fn write(&self, relative: &str, body: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dirs");
        }
        fs::write(path, body).expect("write fixture");
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join("tripod.yaml")
    }
}
