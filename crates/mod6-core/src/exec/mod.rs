//! Runs the engine inside a prepared case directory.

pub mod status;

pub use crate::parsers::layouts::EngineVersion;
pub use status::StatusReconciler;

use crate::common::env::EngineEnv;
use crate::domain::{CaseError, CaseResultExt, ExecutionResult};
use crate::input::INPUT_FILE_NAME;
use crate::workspace::CaseDirectory;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Held for as long as an engine process owns a directory.
#[derive(Debug)]
struct RunLock {
    path: PathBuf,
}

impl RunLock {
    fn acquire(dir: &CaseDirectory) -> Result<Self, CaseError> {
        let path = dir.lock_path();
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(CaseError::DirectoryBusy {
                    path: dir.path().to_path_buf(),
                })
            }
            Err(error) => Err(CaseError::io(
                format!("failed to lock case directory '{}'", dir.path().display()),
                error,
            )),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %error, "failed to release directory lock");
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionController {
    env: EngineEnv,
    reconciler: StatusReconciler,
}

impl ExecutionController {
    pub fn new(env: EngineEnv) -> Result<Self, CaseError> {
        Self::for_engine(env, EngineVersion::default())
    }

    pub fn for_engine(env: EngineEnv, version: EngineVersion) -> Result<Self, CaseError> {
        Ok(Self {
            env,
            reconciler: StatusReconciler::for_engine(version)?,
        })
    }

    pub fn env(&self) -> &EngineEnv {
        &self.env
    }

    /// Runs the engine on the directory's input file and classifies the outcome.
    /// On timeout the process is killed and everything it wrote is left in place.
    pub async fn run(
        &self,
        dir: &CaseDirectory,
        timeout: Duration,
    ) -> Result<ExecutionResult, CaseError> {
        let _lock = RunLock::acquire(dir)?;
        let input = std::path::absolute(dir.path().join(INPUT_FILE_NAME))
            .io_context(|| format!("failed to resolve input file in '{}'", dir.path().display()))?;
        if !input.is_file() {
            return Err(CaseError::io(
                format!("input file '{}' is missing", input.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        info!(case = %dir.case_id(), dir = %dir.path().display(), "starting engine");
        let started = Instant::now();
        let mut child = Command::new(self.env.exe())
            .arg(&input)
            .current_dir(dir.path())
            .envs(self.env.to_environ())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaseError::Spawn {
                program: self.env.exe().to_path_buf(),
                source,
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let readers = [stdout.abort_handle(), stderr.abort_handle()];
        let timed_out = || {
            readers.iter().for_each(AbortHandle::abort);
            warn!(
                case = %dir.case_id(),
                timeout_secs = timeout.as_secs_f64(),
                "engine exceeded its deadline"
            );
            CaseError::ExecutionTimeout {
                path: dir.path().to_path_buf(),
                timeout,
            }
        };
        let deadline = tokio::time::Instant::now() + timeout;

        let exit = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(waited) => waited.io_context(|| {
                format!("failed to wait for engine in '{}'", dir.path().display())
            })?,
            Err(_) => {
                if let Err(error) = child.kill().await {
                    warn!(case = %dir.case_id(), %error, "failed to kill timed-out engine");
                }
                return Err(timed_out());
            }
        };
        let duration = started.elapsed();

        // Processes the engine left behind can hold its pipes open past its exit.
        let drained = tokio::time::timeout_at(deadline, async {
            Ok::<_, CaseError>((collect_output(stdout).await?, collect_output(stderr).await?))
        })
        .await;
        let (stdout, stderr) = match drained {
            Ok(output) => output?,
            Err(_) => return Err(timed_out()),
        };

        let (status, findings) = self.reconciler.reconcile(dir.path(), exit.code(), &stdout)?;
        info!(
            case = %dir.case_id(),
            exit_code = ?exit.code(),
            status = status.as_str(),
            elapsed_ms = duration.as_millis() as u64,
            "engine finished"
        );

        Ok(ExecutionResult {
            exit_code: exit.code(),
            stdout,
            stderr,
            duration,
            status,
            findings,
        })
    }

    pub async fn version(&self) -> Result<String, CaseError> {
        self.query("-version").await
    }

    pub async fn license_status(&self) -> Result<String, CaseError> {
        self.query("-license_status").await
    }

    async fn query(&self, flag: &str) -> Result<String, CaseError> {
        let mut command = Command::new(self.env.exe());
        command
            .arg(flag)
            .envs(self.env.to_environ())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = tokio::time::timeout(QUERY_TIMEOUT, command.output())
            .await
            .map_err(|_| {
                CaseError::Environment(format!(
                    "'{} {flag}' did not answer within {}s",
                    self.env.exe().display(),
                    QUERY_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|source| CaseError::Spawn {
                program: self.env.exe().to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(CaseError::Environment(format!(
                "'{} {flag}' failed ({}): {}",
                self.env.exe().display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let answer = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(flag, answer = %answer, "queried engine");
        Ok(answer)
    }
}

/// Resolves the engine release from its `-version` output.
pub async fn detect_version(controller: &ExecutionController) -> Result<EngineVersion, CaseError> {
    let text = controller.version().await?;
    EngineVersion::parse(&text)
        .ok_or_else(|| CaseError::Environment(format!("unsupported engine release '{text}'")))
}

fn spawn_reader<R>(stream: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            stream.read_to_end(&mut buffer).await?;
        }
        Ok(buffer)
    })
}

async fn collect_output(
    reader: JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<String, CaseError> {
    let bytes = reader
        .await
        .map_err(|error| CaseError::Internal(format!("output reader failed: {error}")))?
        .io_context(|| "failed to read engine output".to_string())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::{ExecutionController, detect_version};
    use crate::common::env::EngineEnv;
    use crate::domain::{CaseError, CaseId, ExecutionStatus};
    use crate::input::INPUT_FILE_NAME;
    use crate::parsers::layouts::EngineVersion;
    use crate::workspace::{CaseWorkspace, LOCK_FILE_NAME};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    fn fake_engine(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-engine.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("script should be written");
        let mut permissions = fs::metadata(&path).expect("metadata").permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).expect("script should be executable");
        path
    }

    fn prepared(temp: &TempDir, name: &str) -> crate::workspace::CaseDirectory {
        let workspace = CaseWorkspace::new(temp.path().join("runs"));
        let dir = workspace
            .prepare(&CaseId::parse(name).expect("case id"))
            .expect("directory should be prepared");
        fs::write(dir.path().join(INPUT_FILE_NAME), "{}").expect("input should be written");
        dir
    }

    #[tokio::test]
    async fn engine_runs_in_the_case_directory_with_its_environment() {
        let temp = TempDir::new().expect("tempdir should be created");
        let exe = fake_engine(
            temp.path(),
            "test -f \"$1\" || exit 9\necho \"data=$MODTRAN_DATA extra=$MODTRAN_EXTRA\"\necho ok > case.tp6",
        );
        let env = EngineEnv::new(&exe, "/opt/data").with_extra("MODTRAN_EXTRA", "x");
        let dir = prepared(&temp, "case");

        let result = ExecutionController::new(env)
            .expect("controller should build")
            .run(&dir, Duration::from_secs(10))
            .await
            .expect("run should succeed");
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.status, ExecutionStatus::Success);
        assert!(result.stdout.contains("data=/opt/data extra=x"));
        assert!(dir.path().join("case.tp6").exists());
        assert!(!dir.is_locked());
    }

    #[tokio::test]
    async fn timeout_kills_the_engine_and_keeps_partial_output() {
        let temp = TempDir::new().expect("tempdir should be created");
        let exe = fake_engine(temp.path(), "echo partial > case.tp6\nexec sleep 30");
        let dir = prepared(&temp, "slow");

        let error = ExecutionController::new(EngineEnv::new(&exe, "/opt/data"))
            .expect("controller should build")
            .run(&dir, Duration::from_millis(500))
            .await
            .expect_err("run should time out");
        assert!(matches!(error, CaseError::ExecutionTimeout { .. }));
        assert!(dir.path().join("case.tp6").exists());
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn deadline_covers_output_held_open_after_exit() {
        let temp = TempDir::new().expect("tempdir should be created");
        let exe = fake_engine(temp.path(), "sleep 30 &\necho started\nexit 0");
        let dir = prepared(&temp, "lingering");

        let started = std::time::Instant::now();
        let error = ExecutionController::new(EngineEnv::new(&exe, "/opt/data"))
            .expect("controller should build")
            .run(&dir, Duration::from_millis(500))
            .await
            .expect_err("held-open output should time out");
        assert!(matches!(error, CaseError::ExecutionTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn second_run_against_a_locked_directory_is_busy() {
        let temp = TempDir::new().expect("tempdir should be created");
        let exe = fake_engine(temp.path(), "exit 0");
        let dir = prepared(&temp, "busy");
        fs::write(dir.path().join(LOCK_FILE_NAME), "").expect("lock should be written");

        let error = ExecutionController::new(EngineEnv::new(&exe, "/opt/data"))
            .expect("controller should build")
            .run(&dir, Duration::from_secs(5))
            .await
            .expect_err("locked directory should be busy");
        assert_eq!(error.placeholder(), "IO.DIRECTORY_BUSY");
        assert!(dir.path().join(LOCK_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn version_and_license_queries_return_trimmed_stdout() {
        let temp = TempDir::new().expect("tempdir should be created");
        let exe = fake_engine(
            temp.path(),
            "case \"$1\" in\n  -version) echo '  MODTRAN(R) 6.0.2.5  ';;\n  -license_status) echo 'STAT_VALID';;\n  *) exit 4;;\nesac",
        );
        let controller = ExecutionController::new(EngineEnv::new(&exe, "/opt/data"))
            .expect("controller should build");

        assert_eq!(
            controller.version().await.expect("version should answer"),
            "MODTRAN(R) 6.0.2.5"
        );
        assert_eq!(
            controller.license_status().await.expect("license should answer"),
            "STAT_VALID"
        );
        assert_eq!(
            detect_version(&controller).await.expect("release should parse"),
            EngineVersion::V6
        );
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dir = prepared(&temp, "nowhere");
        let error = ExecutionController::new(EngineEnv::new(temp.path().join("missing"), "/opt/data"))
            .expect("controller should build")
            .run(&dir, Duration::from_secs(5))
            .await
            .expect_err("missing executable should fail");
        assert_eq!(error.placeholder(), "IO.ENGINE_SPAWN");
    }
}
