//! End-to-end pipeline runs against a temporary directory layout

mod helper;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use dep_reconcile::annotate::AnnotateStats;
use dep_reconcile::config::PipelineConfig;
use dep_reconcile::pipeline::{Pipeline, PipelineError, PipelineInputs, ReferenceSource};
use dep_reconcile::table::ModuleTable;
use dep_reconcile::version::error::DownloadError;
use dep_reconcile::version::registry::RegistryType;

use helper::{FlakyDownloader, HEADER, MockRegistry, TestWorkspace, create_test_resolver};

const NUGET_LINK: &str = "https://api.nuget.org/v3-flatcontainer/pkga/index.json";
const GITHUB_LINK: &str = "https://github.com/org/pkgd/releases";

const MANIFEST: &str = r#"{
    "runtimeTarget": {"name": ".NETCoreApp,Version=v6.0"},
    "targets": {
        ".NETCoreApp,Version=v6.0": {
            "PkgA/2.0.0": {"runtime": {"lib/net6.0/PkgA.dll": {}}},
            "PkgD/1.0.0": {"compile": {"lib/net6.0/PkgD.dll": {}}}
        }
    }
}"#;

fn current_rows() -> Vec<&'static str> {
    vec![
        "PkgA,,,,,,2024-01-01",
        "PkgB,,,,,,2024-06-01",
        "PkgC,,,,,,2023-01-01",
        "PkgD,,,,,,2022-01-01",
    ]
}

fn reference_rows() -> Vec<String> {
    vec![
        format!("PkgA,{NUGET_LINK},,1,,,"),
        "PkgC,,obsolete,0,,,".to_string(),
        format!("PkgD,{GITHUB_LINK},pinned,3,,,"),
        "PkgOnlyInReference,,,1,,,".to_string(),
    ]
}

fn registries() -> Vec<MockRegistry> {
    vec![
        MockRegistry::new(RegistryType::NuGet).with_version(NUGET_LINK, "2.1.0"),
        MockRegistry::new(RegistryType::GitHub).with_version(GITHUB_LINK, "1.0.0"),
    ]
}

fn pipeline(config: PipelineConfig, downloader: FlakyDownloader) -> Pipeline {
    Pipeline::with_components(config, create_test_resolver(registries()), Arc::new(downloader))
}

#[tokio::test]
async fn run_merges_annotates_and_finalizes() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &current_rows());
    let reference_rows = reference_rows();
    let reference = workspace.write_table(
        "reference.csv",
        &reference_rows.iter().map(String::as_str).collect::<Vec<_>>(),
    );
    let manifest = workspace.write_manifest("App.deps.json", MANIFEST);

    let pipeline = pipeline(workspace.config(), FlakyDownloader::new(0, ""));
    let report = pipeline
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: None,
        })
        .await
        .unwrap();

    assert_eq!(report.output, workspace.output_dir().join("current.csv"));
    assert_eq!(report.rows, 3);
    assert_eq!(report.outdated, 1);
    assert_eq!(
        report.current,
        AnnotateStats {
            resolved: 2,
            unresolved: 2,
            skipped: 0
        }
    );
    assert_eq!(
        report.newest,
        AnnotateStats {
            resolved: 2,
            unresolved: 0,
            skipped: 2
        }
    );

    let expected = format!(
        "{HEADER}\n\
         PkgD,{GITHUB_LINK},pinned,3,1.0.0,1.0.0,2022-01-01\n\
         PkgB,,,2,,,2024-06-01\n\
         PkgA,{NUGET_LINK},,1,2.0.0,2.1.0,2024-01-01\n"
    );
    assert_eq!(std::fs::read_to_string(&report.output).unwrap(), expected);

    assert!(!manifest.exists(), "consumed manifest must be deleted");
    assert!(!workspace.work_dir().join("current.csv").exists());
}

#[tokio::test]
async fn run_output_is_readable_as_module_table() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &current_rows());
    let reference_rows = reference_rows();
    let reference = workspace.write_table(
        "reference.csv",
        &reference_rows.iter().map(String::as_str).collect::<Vec<_>>(),
    );
    workspace.write_manifest("App.deps.json", MANIFEST);

    let report = pipeline(workspace.config(), FlakyDownloader::new(0, ""))
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: None,
        })
        .await
        .unwrap();

    let table = ModuleTable::read(&report.output).unwrap();
    assert!(table.rows.iter().all(|row| row.tag != Some(0)));
    let noted_done = table
        .rows
        .iter()
        .skip_while(|row| row.is_noted())
        .all(|row| !row.is_noted());
    assert!(noted_done, "noted rows must precede unnoted rows");
}

#[tokio::test]
async fn run_downloads_reference_after_transient_failures() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,2024-01-01"]);
    workspace.write_manifest("App.deps.json", MANIFEST);

    let downloader = FlakyDownloader::new(2, &format!("{HEADER}\nPkgA,{NUGET_LINK},,1,,,\n"));
    let attempts = downloader.attempts();

    let report = pipeline(workspace.config(), downloader)
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Remote("https://example.com/modules.csv".to_string()),
            manifest: None,
        })
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    let table = ModuleTable::read(&report.output).unwrap();
    assert_eq!(table.rows[0].links.as_deref(), Some(NUGET_LINK));
    assert_eq!(table.rows[0].newest_version.as_deref(), Some("2.1.0"));
    assert!(!workspace.work_dir().join("reference.download.csv").exists());
}

#[tokio::test]
async fn run_fails_when_download_retries_are_exhausted() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,"]);
    let manifest = workspace.write_manifest("App.deps.json", MANIFEST);

    let downloader = FlakyDownloader::new(3, "");
    let attempts = downloader.attempts();

    let result = pipeline(workspace.config(), downloader)
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Remote("https://example.com/modules.csv".to_string()),
            manifest: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Download(DownloadError::RetriesExhausted { attempts: 3, .. }))
    ));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(manifest.exists());
    assert!(!workspace.output_dir().join("current.csv").exists());
}

#[tokio::test]
async fn run_fails_without_manifest() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,"]);
    let reference = workspace.write_table("reference.csv", &["PkgA,,,1,,,"]);

    let result = pipeline(workspace.config(), FlakyDownloader::new(0, ""))
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: None,
        })
        .await;

    assert!(matches!(result, Err(PipelineError::ManifestNotFound(_))));
    assert!(!workspace.output_dir().exists());
}

#[tokio::test]
async fn run_uses_explicit_manifest_path() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,"]);
    let reference = workspace.write_table("reference.csv", &["PkgA,,,1,,,"]);
    let manifest = workspace.temp_dir.path().join("Build.deps.json");
    std::fs::write(&manifest, MANIFEST).unwrap();

    let report = pipeline(workspace.config(), FlakyDownloader::new(0, ""))
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: Some(manifest.clone()),
        })
        .await
        .unwrap();

    let table = ModuleTable::read(&report.output).unwrap();
    assert_eq!(table.rows[0].current_version.as_deref(), Some("2.0.0"));
    assert!(!manifest.exists());
}

#[tokio::test]
async fn run_does_not_fetch_unknown_hosts() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgX,,,,,0.1.0,"]);
    let reference = workspace.write_table(
        "reference.csv",
        &["PkgX,https://registry.example.com/pkgx,,1,,,"],
    );
    workspace.write_manifest("App.deps.json", MANIFEST);

    let nuget = MockRegistry::new(RegistryType::NuGet);
    let github = MockRegistry::new(RegistryType::GitHub);
    let calls = [nuget.calls(), github.calls()];
    let pipeline = Pipeline::with_components(
        workspace.config(),
        create_test_resolver(vec![nuget, github]),
        Arc::new(FlakyDownloader::new(0, "")),
    );

    let report = pipeline
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: None,
        })
        .await
        .unwrap();

    assert!(calls.iter().all(|c| c.load(Ordering::SeqCst) == 0));
    let table = ModuleTable::read(&report.output).unwrap();
    assert_eq!(table.rows[0].newest_version.as_deref(), Some("0.1.0"));
}

#[tokio::test]
async fn run_without_checkpoint_leaves_work_dir_untouched() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,"]);
    let reference = workspace.write_table("reference.csv", &["PkgA,,,1,,,"]);
    workspace.write_manifest("App.deps.json", MANIFEST);

    let config = PipelineConfig {
        checkpoint: false,
        ..workspace.config()
    };

    pipeline(config, FlakyDownloader::new(0, ""))
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: None,
        })
        .await
        .unwrap();

    assert!(!workspace.work_dir().exists());
    assert!(workspace.output_dir().join("current.csv").exists());
}

#[tokio::test]
async fn run_removes_downloaded_reference_when_a_later_stage_fails() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,"]);
    let manifest = workspace.write_manifest("App.deps.json", MANIFEST);

    let downloader = FlakyDownloader::new(0, "name,link\nPkgA,\n");

    let result = pipeline(workspace.config(), downloader)
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Remote("https://example.com/modules.csv".to_string()),
            manifest: None,
        })
        .await;

    assert!(matches!(result, Err(PipelineError::Table(_))));
    assert!(!workspace.work_dir().join("reference.download.csv").exists());
    assert!(manifest.exists());
}

#[tokio::test]
async fn run_rejects_output_dir_shared_with_work_dir() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,"]);
    let reference = workspace.write_table("reference.csv", &["PkgA,,,1,,,"]);
    let manifest = workspace.write_manifest("App.deps.json", MANIFEST);

    let config = PipelineConfig {
        work_dir: workspace.output_dir(),
        ..workspace.config()
    };

    let result = pipeline(config, FlakyDownloader::new(0, ""))
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: None,
        })
        .await;

    assert!(matches!(result, Err(PipelineError::Config(_))));
    assert!(manifest.exists());
    assert!(!workspace.output_dir().exists());
}

#[tokio::test]
async fn run_with_explicit_manifest_does_not_need_upload_dir() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,"]);
    let reference = workspace.write_table("reference.csv", &["PkgA,,,1,,,"]);
    let manifest = workspace.temp_dir.path().join("Build.deps.json");
    std::fs::write(&manifest, MANIFEST).unwrap();

    let config = PipelineConfig {
        upload_dir: workspace.temp_dir.path().join("no-upload-dir"),
        ..workspace.config()
    };

    let report = pipeline(config, FlakyDownloader::new(0, ""))
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: Some(manifest),
        })
        .await
        .unwrap();

    assert!(report.output.exists());
}

#[tokio::test]
async fn run_fails_when_upload_dir_is_missing_and_manifest_must_be_discovered() {
    let workspace = TestWorkspace::new();
    let current = workspace.write_table("current.csv", &["PkgA,,,,,,"]);
    let reference = workspace.write_table("reference.csv", &["PkgA,,,1,,,"]);

    let config = PipelineConfig {
        upload_dir: workspace.temp_dir.path().join("no-upload-dir"),
        ..workspace.config()
    };

    let result = pipeline(config, FlakyDownloader::new(0, ""))
        .run(&PipelineInputs {
            current_table: current,
            reference: ReferenceSource::Local(reference),
            manifest: None,
        })
        .await;

    assert!(matches!(result, Err(PipelineError::UploadDirMissing(_))));
}
