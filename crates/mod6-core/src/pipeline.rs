//! Runs one case end to end: prepare, serialize, execute, discover, parse, aggregate.

use crate::aggregate::{GridTolerance, aggregate};
use crate::common::env::EngineEnv;
use crate::discovery::{OutputArtifactSet, discover};
use crate::domain::{CaseError, CaseResult, RetentionPolicy};
use crate::exec::ExecutionController;
use crate::input::{CaseConfig, CaseRequest, serialize};
use crate::parsers::{DecoderRegistry, EngineVersion, ParsedArtifacts};
use crate::workspace::{CaseDirectory, CaseWorkspace, cleanup};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub timeout: Duration,
    pub retention: RetentionPolicy,
    pub overwrite: bool,
    pub tolerance: GridTolerance,
    pub engine_version: EngineVersion,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retention: RetentionPolicy::default(),
            overwrite: false,
            tolerance: GridTolerance::default(),
            engine_version: EngineVersion::default(),
        }
    }
}

/// Shared, cheaply cloned state for running cases under one workspace root.
#[derive(Debug, Clone)]
pub struct CaseRunner {
    controller: ExecutionController,
    registry: DecoderRegistry,
    workspace: CaseWorkspace,
    options: PipelineOptions,
}

impl CaseRunner {
    pub fn new(
        env: EngineEnv,
        root: impl Into<PathBuf>,
        options: PipelineOptions,
    ) -> Result<Self, CaseError> {
        Ok(Self {
            controller: ExecutionController::for_engine(env, options.engine_version)?,
            registry: DecoderRegistry::for_engine(options.engine_version),
            workspace: CaseWorkspace::new(root).with_overwrite(options.overwrite),
            options,
        })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn workspace(&self) -> &CaseWorkspace {
        &self.workspace
    }

    /// Runs `config` in `<root>/<case id>`.
    pub async fn run(&self, config: &CaseConfig) -> Result<CaseResult, CaseError> {
        self.run_in(config, config.id().as_str()).await
    }

    /// Runs `config` in `<root>/<dir_name>`. The directory is released under
    /// the retention policy whichever stage fails.
    pub async fn run_in(
        &self,
        config: &CaseConfig,
        dir_name: &str,
    ) -> Result<CaseResult, CaseError> {
        let started = Instant::now();
        let dir = self.workspace.prepare_named(dir_name, config.id())?;
        info!(case = %config.id(), dir = %dir.path().display(), "case started");

        let outcome = self.execute(config, &dir).await;
        let cleanup_warning = cleanup(&dir, self.options.retention, outcome.is_ok());

        match outcome {
            Ok(mut result) => {
                if let Some(warning) = cleanup_warning {
                    result.push_warning(warning);
                }
                info!(
                    case = %config.id(),
                    records = result.records().len(),
                    warnings = result.warnings().len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "case finished"
                );
                Ok(result)
            }
            Err(error) => {
                warn!(case = %config.id(), error = %error, "case failed");
                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        config: &CaseConfig,
        dir: &CaseDirectory,
    ) -> Result<CaseResult, CaseError> {
        serialize(config, dir)?;
        let execution = self.controller.run(dir, self.options.timeout).await?;
        if execution.is_fatal() {
            return Err(CaseError::EngineFatal {
                path: dir.path().to_path_buf(),
                result: Box::new(execution),
            });
        }

        let artifacts = discover(config, dir, &execution);
        let parsed = self.parse(&artifacts, config).await?;
        aggregate(artifacts, parsed, execution, self.options.tolerance)
    }

    async fn parse(
        &self,
        artifacts: &OutputArtifactSet,
        config: &CaseConfig,
    ) -> Result<ParsedArtifacts, CaseError> {
        let registry = self.registry.clone();
        let artifacts = artifacts.clone();
        let plot_axis = config.plot_axis();
        tokio::task::spawn_blocking(move || registry.parse_all(&artifacts, plot_axis))
            .await
            .map_err(|error| {
                CaseError::Internal(format!("artifact decoding task failed: {error}"))
            })?
    }
}

/// Validates `request` and runs it as a single case under `root`.
pub async fn run_case(
    env: EngineEnv,
    root: impl Into<PathBuf>,
    request: CaseRequest,
    options: PipelineOptions,
) -> Result<CaseResult, CaseError> {
    let config = request.validate()?;
    CaseRunner::new(env, root, options)?.run(&config).await
}
