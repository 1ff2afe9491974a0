// src/attribution/external.rs
//
// Out-of-process team classifier. The full-resolution frame is written to a
// fixed handoff image, the configured program is run with that path as its
// only argument, and a single token is read back from stdout. The call is
// bounded by a timeout; a child that overruns is killed.

use super::TeamClassifier;
use crate::calibration::Regions;
use crate::config::ClassifierConfig;
use crate::types::{Frame, Team};
use anyhow::{Context, Result};
use async_trait::async_trait;
use opencv::{core::Vector, imgcodecs};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

const HANDOFF_FILE: &str = "pickup_scorer_handoff.jpg";

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to write handoff image {0}")]
    ImageWrite(PathBuf),

    #[error("failed to run classifier: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("classifier timed out after {0} ms")]
    Timeout(u64),

    #[error("classifier exited with status {0:?}")]
    ExitStatus(Option<i32>),

    #[error("classifier wrote to stderr: {0}")]
    Stderr(String),
}

pub struct ExternalProcessClassifier {
    program: PathBuf,
    timeout: Duration,
    image_path: PathBuf,
    // Keeps a private handoff directory alive for the classifier's lifetime.
    _handoff_dir: Option<TempDir>,
}

impl ExternalProcessClassifier {
    /// Build from config; `None` when no command is configured.
    pub fn from_config(config: &ClassifierConfig) -> Result<Option<Self>> {
        let Some(program) = config.command.clone() else {
            return Ok(None);
        };

        let (dir, handoff_dir) = match &config.handoff_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                (dir.clone(), None)
            }
            None => {
                let tmp = tempfile::Builder::new()
                    .prefix("pickup-scorer-")
                    .tempdir()
                    .context("failed to create classifier handoff directory")?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };

        Ok(Some(Self {
            program,
            timeout: Duration::from_millis(config.timeout_ms),
            image_path: dir.join(HANDOFF_FILE),
            _handoff_dir: handoff_dir,
        }))
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    fn write_handoff(&self, frame: &Frame) -> Result<(), ClassifierError> {
        let path = self.image_path.to_string_lossy();
        match imgcodecs::imwrite(&path, &frame.image, &Vector::new()) {
            Ok(true) => Ok(()),
            _ => Err(ClassifierError::ImageWrite(self.image_path.clone())),
        }
    }

    /// Run the classifier on an image already on disk.
    pub async fn run(&self, image: &Path) -> Result<Team, ClassifierError> {
        let child = Command::new(&self.program)
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the pending future drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => return Err(ClassifierError::Timeout(self.timeout.as_millis() as u64)),
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Err(ClassifierError::Stderr(stderr.trim().to_string()));
        }
        if !output.status.success() {
            return Err(ClassifierError::ExitStatus(output.status.code()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let team = Team::from_token(&stdout);
        debug!("External classifier answered {:?} -> {}", stdout.trim(), team);
        Ok(team)
    }
}

#[async_trait(?Send)]
impl TeamClassifier for ExternalProcessClassifier {
    fn name(&self) -> &'static str {
        "external"
    }

    async fn classify(&mut self, frame: &Frame, _regions: &Regions) -> Result<Team> {
        self.write_handoff(frame)?;
        Ok(self.run(&self.image_path).await?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn classifier(dir: &Path, program: PathBuf, timeout_ms: u64) -> ExternalProcessClassifier {
        let config = ClassifierConfig {
            command: Some(program),
            timeout_ms,
            handoff_dir: Some(dir.join("handoff")),
        };
        ExternalProcessClassifier::from_config(&config).unwrap().unwrap()
    }

    #[test]
    fn test_disabled_without_command() {
        let config = ClassifierConfig::default();
        assert!(ExternalProcessClassifier::from_config(&config)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reads_team_token_and_passes_path() {
        let dir = tempfile::tempdir().unwrap();
        // Answers TeamB only when handed the expected path.
        let program = script(
            dir.path(),
            "classify.sh",
            "case \"$1\" in *pickup_scorer_handoff.jpg) echo TeamB ;; *) echo nope ;; esac",
        );
        let c = classifier(dir.path(), program, 2000);
        let team = c.run(c.image_path()).await.unwrap();
        assert_eq!(team, Team::B);
    }

    #[tokio::test]
    async fn test_unexpected_output_is_inconclusive() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "classify.sh", "echo maybe");
        let c = classifier(dir.path(), program, 2000);
        assert_eq!(c.run(c.image_path()).await.unwrap(), Team::Unknown);
    }

    #[tokio::test]
    async fn test_stderr_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "classify.sh", "echo warning >&2\necho TeamA");
        let c = classifier(dir.path(), program, 2000);
        let err = c.run(c.image_path()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Stderr(_)));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "classify.sh", "echo TeamA\nexit 3");
        let c = classifier(dir.path(), program, 2000);
        let err = c.run(c.image_path()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::ExitStatus(Some(3))));
    }

    #[tokio::test]
    async fn test_timeout_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "classify.sh", "sleep 5\necho TeamA");
        let c = classifier(dir.path(), program, 200);

        let started = Instant::now();
        let err = c.run(c.image_path()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Timeout(200)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let c = classifier(dir.path(), dir.path().join("absent"), 2000);
        let err = c.run(c.image_path()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_classify_writes_handoff_image() {
        use opencv::core::{Mat, Scalar, CV_8UC3};

        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "classify.sh", "test -s \"$1\" && echo TeamA");
        let mut c = classifier(dir.path(), program, 2000);

        let frame = Frame {
            index: 5,
            timestamp_secs: 0.5,
            image: Mat::new_rows_cols_with_default(48, 64, CV_8UC3, Scalar::all(90.0)).unwrap(),
            scaled: None,
        };
        let regions = Regions::calibrate(64, 48, &Default::default());
        assert_eq!(c.classify(&frame, &regions).await.unwrap(), Team::A);
        assert!(c.image_path().exists());
    }
}
