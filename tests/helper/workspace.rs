//! Temporary directory layout for pipeline runs

use std::path::PathBuf;

use tempfile::TempDir;

use dep_reconcile::config::{DownloadConfig, PipelineConfig};

pub const HEADER: &str = "module_name,links,notes,tag,current_version,newest_version,modified_date";

pub struct TestWorkspace {
    pub temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let workspace = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        std::fs::create_dir_all(workspace.upload_dir()).unwrap();
        workspace
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.temp_dir.path().join("upload")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.temp_dir.path().join("output")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.temp_dir.path().join("work")
    }

    /// Config pointing at this workspace, with retries that do not sleep
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            upload_dir: self.upload_dir(),
            output_dir: self.output_dir(),
            work_dir: self.work_dir(),
            download: DownloadConfig {
                retries: 3,
                timeout_ms: 1_000,
                retry_delay_ms: 0,
            },
            ..PipelineConfig::default()
        }
    }

    /// Writes a table with the standard header followed by `rows`
    pub fn write_table(&self, name: &str, rows: &[&str]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut content = format!("{HEADER}\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn write_manifest(&self, name: &str, json: &str) -> PathBuf {
        let path = self.upload_dir().join(name);
        std::fs::write(&path, json).unwrap();
        path
    }
}
