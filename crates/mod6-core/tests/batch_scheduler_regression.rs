#![cfg(unix)]

use mod6_core::domain::{ArtifactKind, CaseError, RetentionPolicy};
use mod6_core::{
    BatchOptions, CaseRequest, EngineEnv, PipelineOptions, StopHandle, run_batch,
    run_batch_with_stop,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn fake_engine(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("engine.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("script should be written");
    let mut permissions = fs::metadata(&path)
        .expect("script metadata should be readable")
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("script should be executable");
    path
}

fn log_request(name: &str) -> CaseRequest {
    CaseRequest::new(name)
        .set("FILEOPTIONS", "NOFILE", "FC_TAPE6ONLY")
        .set("FILEOPTIONS", "JSONOPT", "WRT_NONE")
}

fn batch_options(max_concurrency: usize) -> BatchOptions {
    BatchOptions {
        pipeline: PipelineOptions {
            timeout: Duration::from_secs(20),
            retention: RetentionPolicy::Never,
            ..PipelineOptions::default()
        },
        max_concurrency: Some(max_concurrency),
    }
}

#[tokio::test]
async fn invalid_case_fails_only_its_own_slot() {
    let temp = TempDir::new().expect("tempdir should be created");
    let exe = fake_engine(
        temp.path(),
        "job=$(basename \"$(dirname \"$1\")\")\necho ' TOTAL TRANSMITTANCE = 0.5' > \"case$job.tp6\"",
    );
    let requests = (0..5)
        .map(|index| {
            let request = log_request(&format!("case{index}"))
                .set("FILEOPTIONS", "FLROOT", format!("casejob{index}"));
            if index == 2 {
                request.set("SPECTRAL", "V3", 1.0)
            } else {
                request
            }
        })
        .collect::<Vec<_>>();

    let batch = run_batch(
        EngineEnv::new(&exe, temp.path()),
        temp.path().join("batch"),
        requests,
        batch_options(2),
    )
    .await
    .expect("batch should run");

    assert_eq!(batch.len(), 5);
    assert_eq!(batch.succeeded(), 4);
    assert_eq!(batch.failed(), 1);
    for (position, entry) in batch.entries().iter().enumerate() {
        assert_eq!(entry.index, position);
        assert_eq!(entry.label, format!("case{position}"));
        match (&entry.outcome, position) {
            (Err(error), 2) => assert_eq!(error.placeholder(), "INPUT.INVALID_CONFIG"),
            (Ok(result), _) => {
                assert_eq!(result.case_id().as_str(), format!("case{position}"));
                assert!(result.record(ArtifactKind::Log).is_some());
            }
            (Err(error), _) => panic!("slot {position} failed: {error}"),
        }
    }
    assert!(temp.path().join("batch/job0").is_dir());
    assert!(!temp.path().join("batch/job2").exists());
}

#[tokio::test]
async fn stopped_batch_cancels_cases_that_have_not_started() {
    let temp = TempDir::new().expect("tempdir should be created");
    let exe = fake_engine(temp.path(), "exit 0");
    let stop = StopHandle::new();
    stop.stop();

    let requests = vec![
        log_request("first"),
        log_request("second").set("SPECTRAL", "V9", 1.0),
        log_request("third"),
    ];
    let batch = run_batch_with_stop(
        EngineEnv::new(&exe, temp.path()),
        temp.path().join("batch"),
        requests,
        batch_options(1),
        &stop,
    )
    .await
    .expect("batch should run");

    let outcomes = batch
        .entries()
        .iter()
        .map(|entry| entry.outcome.as_ref().map_err(CaseError::placeholder))
        .collect::<Vec<_>>();
    assert!(matches!(outcomes[0], Err("RUN.CANCELLED")));
    assert!(matches!(outcomes[1], Err("INPUT.INVALID_CONFIG")));
    assert!(matches!(outcomes[2], Err("RUN.CANCELLED")));
    assert!(!temp.path().join("batch/job0").exists());
}

#[tokio::test]
async fn worker_pool_bounds_concurrent_engines() {
    let temp = TempDir::new().expect("tempdir should be created");
    let active = temp.path().join("active");
    fs::create_dir(&active).expect("active dir should be created");
    let exe = fake_engine(
        temp.path(),
        "if [ -n \"$(ls \"$MODTRAN_TEST_ACTIVE\")\" ]; then touch \"$MODTRAN_TEST_ACTIVE/../overlap\"; fi\n\
         touch \"$MODTRAN_TEST_ACTIVE/$$\"\n\
         sleep 0.2\n\
         rm \"$MODTRAN_TEST_ACTIVE/$$\"",
    );
    let env = EngineEnv::new(&exe, temp.path())
        .with_extra("MODTRAN_TEST_ACTIVE", active.display().to_string());

    let requests = (0..4)
        .map(|index| log_request(&format!("serial{index}")))
        .collect::<Vec<_>>();
    let batch = run_batch(env, temp.path().join("batch"), requests, batch_options(1))
        .await
        .expect("batch should run");

    assert_eq!(batch.succeeded(), 4);
    assert!(!temp.path().join("overlap").exists());
}

#[tokio::test]
async fn empty_batch_is_an_empty_result() {
    let temp = TempDir::new().expect("tempdir should be created");
    let exe = fake_engine(temp.path(), "exit 0");
    let batch = run_batch(
        EngineEnv::new(&exe, temp.path()),
        temp.path().join("batch"),
        Vec::new(),
        BatchOptions::default(),
    )
    .await
    .expect("empty batch should run");
    assert!(batch.is_empty());
}
