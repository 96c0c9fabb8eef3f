use super::{ArtifactKind, ExecutionResult, GridFamily};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl ErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }
}

/// One offending option found while validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigProblem {
    pub option: String,
    pub detail: String,
}

impl ConfigProblem {
    pub fn new(option: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            detail: detail.into(),
        }
    }
}

impl Display for ConfigProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.option, self.detail)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("invalid configuration ({} problem(s)): {}", problems.len(), join_problems(problems))]
    InvalidConfig { problems: Vec<ConfigProblem> },
    #[error("case directory '{}' already exists and is not empty", path.display())]
    DirectoryConflict { path: PathBuf },
    #[error("case directory '{}' already has an execution in flight", path.display())]
    DirectoryBusy { path: PathBuf },
    #[error("engine exceeded the {}s deadline in '{}'", timeout.as_secs_f64(), path.display())]
    ExecutionTimeout { path: PathBuf, timeout: Duration },
    #[error("engine reported a fatal status in '{}': {}", path.display(), result.fatal_summary())]
    EngineFatal {
        path: PathBuf,
        result: Box<ExecutionResult>,
    },
    #[error("malformed {kind} artifact '{}': {detail}", path.display())]
    MalformedArtifact {
        kind: ArtifactKind,
        path: PathBuf,
        detail: String,
    },
    #[error("{family} grid of {first} disagrees with {second}: {detail}")]
    GridMismatch {
        family: GridFamily,
        first: ArtifactKind,
        second: ArtifactKind,
        detail: String,
    },
    #[error("failed to start engine '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
    #[error("engine environment: {0}")]
    Environment(String),
    #[error("case was cancelled before it started")]
    Cancelled,
    #[error("internal failure: {0}")]
    Internal(String),
}

impl CaseError {
    pub fn malformed(kind: ArtifactKind, path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            kind,
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. } | Self::Environment(_) => {
                ErrorCategory::InputValidationError
            }
            Self::DirectoryConflict { .. }
            | Self::DirectoryBusy { .. }
            | Self::Spawn { .. }
            | Self::Io { .. } => ErrorCategory::IoSystemError,
            Self::ExecutionTimeout { .. }
            | Self::EngineFatal { .. }
            | Self::MalformedArtifact { .. }
            | Self::GridMismatch { .. }
            | Self::Cancelled => ErrorCategory::ComputationError,
            Self::Internal(_) => ErrorCategory::InternalError,
        }
    }

    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "INPUT.INVALID_CONFIG",
            Self::Environment(_) => "INPUT.ENGINE_ENVIRONMENT",
            Self::DirectoryConflict { .. } => "IO.DIRECTORY_CONFLICT",
            Self::DirectoryBusy { .. } => "IO.DIRECTORY_BUSY",
            Self::Spawn { .. } => "IO.ENGINE_SPAWN",
            Self::Io { .. } => "IO.SYSTEM",
            Self::ExecutionTimeout { .. } => "RUN.EXECUTION_TIMEOUT",
            Self::EngineFatal { .. } => "RUN.ENGINE_FATAL",
            Self::MalformedArtifact { .. } => "RUN.MALFORMED_ARTIFACT",
            Self::GridMismatch { .. } => "RUN.GRID_MISMATCH",
            Self::Cancelled => "RUN.CANCELLED",
            Self::Internal(_) => "SYS.INTERNAL",
        }
    }

    pub const fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder(), self)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }

    pub fn problems(&self) -> &[ConfigProblem] {
        match self {
            Self::InvalidConfig { problems } => problems,
            _ => &[],
        }
    }
}

fn join_problems(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Attaches a human context string to I/O failures.
pub trait CaseResultExt<T> {
    fn io_context<F>(self, context: F) -> Result<T, CaseError>
    where
        F: FnOnce() -> String;
}

impl<T> CaseResultExt<T> for std::io::Result<T> {
    fn io_context<F>(self, context: F) -> Result<T, CaseError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| CaseError::io(context(), source))
    }
}

/// Soft problems attached to an otherwise usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseWarning {
    MissingArtifact { artifact: ArtifactKind, path: PathBuf },
    EngineWarning { source: String, line: usize, text: String },
    CleanupFailed { path: PathBuf, detail: String },
}

impl Display for CaseWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingArtifact { artifact, path } => {
                write!(f, "expected {artifact} artifact '{}' was not written", path.display())
            }
            Self::EngineWarning { source, line, text } => {
                write!(f, "engine warning at {source}:{line}: {text}")
            }
            Self::CleanupFailed { path, detail } => {
                write!(f, "failed to remove case directory '{}': {detail}", path.display())
            }
        }
    }
}
