//! Case directories: one per case, created fresh under a workspace root.

use crate::domain::{CaseError, CaseId, CaseResultExt, CaseWarning, RetentionPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Marker held while an engine process runs in a directory.
pub const LOCK_FILE_NAME: &str = ".mod6.lock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDirectory {
    case_id: CaseId,
    path: PathBuf,
}

impl CaseDirectory {
    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.join(LOCK_FILE_NAME)
    }

    pub fn is_locked(&self) -> bool {
        self.lock_path().exists()
    }
}

#[derive(Debug, Clone)]
pub struct CaseWorkspace {
    root: PathBuf,
    overwrite: bool,
}

impl CaseWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overwrite: false,
        }
    }

    /// Allows reuse of non-empty case directories, whose contents are cleared first.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prepare(&self, case_id: &CaseId) -> Result<CaseDirectory, CaseError> {
        self.prepare_named(case_id.as_str(), case_id)
    }

    /// Prepares `<root>/<dir_name>` for `case_id`. The directory is left empty.
    pub fn prepare_named(
        &self,
        dir_name: &str,
        case_id: &CaseId,
    ) -> Result<CaseDirectory, CaseError> {
        let path = self.root.join(dir_name);
        let directory = CaseDirectory {
            case_id: case_id.clone(),
            path,
        };

        if directory.path.exists() {
            if !directory.path.is_dir() {
                return Err(CaseError::DirectoryConflict {
                    path: directory.path,
                });
            }
            if directory.is_locked() {
                return Err(CaseError::DirectoryBusy {
                    path: directory.path,
                });
            }
            if !is_empty_dir(&directory.path)? {
                if !self.overwrite {
                    return Err(CaseError::DirectoryConflict {
                        path: directory.path,
                    });
                }
                clear_dir(&directory.path)?;
                debug!(path = %directory.path.display(), "cleared existing case directory");
            }
        } else {
            fs::create_dir_all(&directory.path).io_context(|| {
                format!(
                    "failed to create case directory '{}'",
                    directory.path.display()
                )
            })?;
        }

        debug!(case = %case_id, path = %directory.path.display(), "prepared case directory");
        Ok(directory)
    }
}

/// Removes `dir` when `policy` asks for it. Failures come back as a warning
/// so they never mask the case outcome.
pub fn cleanup(
    dir: &CaseDirectory,
    policy: RetentionPolicy,
    succeeded: bool,
) -> Option<CaseWarning> {
    if !policy.removes(succeeded) || !dir.path.exists() {
        return None;
    }
    match fs::remove_dir_all(&dir.path) {
        Ok(()) => {
            debug!(path = %dir.path.display(), "removed case directory");
            None
        }
        Err(error) => {
            warn!(path = %dir.path.display(), %error, "failed to remove case directory");
            Some(CaseWarning::CleanupFailed {
                path: dir.path.clone(),
                detail: error.to_string(),
            })
        }
    }
}

fn is_empty_dir(path: &Path) -> Result<bool, CaseError> {
    let mut entries = fs::read_dir(path)
        .io_context(|| format!("failed to list case directory '{}'", path.display()))?;
    Ok(entries.next().is_none())
}

fn clear_dir(path: &Path) -> Result<(), CaseError> {
    let entries = fs::read_dir(path)
        .io_context(|| format!("failed to list case directory '{}'", path.display()))?;
    for entry in entries {
        let entry = entry.io_context(|| format!("failed to list '{}'", path.display()))?;
        let target = entry.path();
        let result = if entry
            .file_type()
            .io_context(|| format!("failed to inspect '{}'", target.display()))?
            .is_dir()
        {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        result.io_context(|| format!("failed to remove '{}'", target.display()))?;
    }
    Ok(())
}
