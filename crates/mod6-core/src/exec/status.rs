//! Classifies a finished engine run from its exit code and the status it wrote.

use crate::domain::{CaseError, ExecutionStatus, FindingSeverity, StatusFinding};
use crate::input::INPUT_FILE_NAME;
use crate::parsers::layouts::{EngineVersion, LogLayout};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

const LOG_PATTERNS: &[&str] = &["*.tp6", "tape6", "*.wrn", "warnings.txt"];
const BUNDLE_PATTERNS: &[&str] = &["*.json"];
const STDOUT_SOURCE: &str = "<stdout>";
const FAILURE_WORDS: &[&str] = &["fail", "failed", "failure", "error", "fatal", "aborted"];
const NEGATIONS: &[&str] = &["no", "without", "0"];

#[derive(Debug, Clone)]
pub struct StatusReconciler {
    version: EngineVersion,
    logs: GlobSet,
    bundles: GlobSet,
}

impl StatusReconciler {
    pub fn for_engine(version: EngineVersion) -> Result<Self, CaseError> {
        Ok(Self {
            version,
            logs: build_globset(LOG_PATTERNS)?,
            bundles: build_globset(BUNDLE_PATTERNS)?,
        })
    }

    /// A non-zero or missing exit code is always fatal; a clean exit is fatal
    /// too when any status source carries a fatal marker.
    pub fn reconcile(
        &self,
        dir: &Path,
        exit_code: Option<i32>,
        stdout: &str,
    ) -> Result<(ExecutionStatus, Vec<StatusFinding>), CaseError> {
        let log_layout = &self.version.layouts().log;
        let mut findings = scan_lines(STDOUT_SOURCE, stdout, log_layout);

        for path in self.status_files(dir)? {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if self.logs.is_match(name) {
                let text = read_lossy(&path)?;
                findings.extend(scan_lines(name, &text, log_layout));
            } else if self.bundles.is_match(name) && name != INPUT_FILE_NAME {
                let text = read_lossy(&path)?;
                findings.extend(bundle_findings(name, &text, self.version));
            }
        }

        let status = if exit_code != Some(0)
            || findings
                .iter()
                .any(|finding| finding.severity == FindingSeverity::Fatal)
        {
            ExecutionStatus::Fatal
        } else if findings.is_empty() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Warning
        };

        debug!(
            dir = %dir.display(),
            ?exit_code,
            status = status.as_str(),
            findings = findings.len(),
            "reconciled engine status"
        );
        Ok((status, findings))
    }

    fn status_files(&self, dir: &Path) -> Result<Vec<std::path::PathBuf>, CaseError> {
        let entries = fs::read_dir(dir).map_err(|source| {
            CaseError::io(format!("failed to list '{}'", dir.display()), source)
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                CaseError::io(format!("failed to list '{}'", dir.display()), source)
            })?;
            let path = entry.path();
            if path.is_file()
                && (self.logs.is_match(entry.file_name()) || self.bundles.is_match(entry.file_name()))
            {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet, CaseError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|error| {
            CaseError::Internal(format!("invalid status file pattern '{pattern}': {error}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|error| CaseError::Internal(format!("failed to build status patterns: {error}")))
}

fn read_lossy(path: &Path) -> Result<String, CaseError> {
    let bytes = fs::read(path).map_err(|source| {
        CaseError::io(format!("failed to read status file '{}'", path.display()), source)
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Markers are section headers, so they only count at the start of a line.
pub(crate) fn classify_line(line: &str, layout: &LogLayout) -> Option<FindingSeverity> {
    let line = line.trim_start();
    if layout
        .fatal_markers
        .iter()
        .any(|marker| line.starts_with(marker))
    {
        Some(FindingSeverity::Fatal)
    } else if layout
        .warning_markers
        .iter()
        .any(|marker| line.starts_with(marker))
    {
        Some(FindingSeverity::Warning)
    } else {
        None
    }
}

fn scan_lines(source: &str, text: &str, layout: &LogLayout) -> Vec<StatusFinding> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            classify_line(line, layout).map(|severity| StatusFinding {
                source: source.to_string(),
                line: index + 1,
                severity,
                text: line.trim().to_string(),
            })
        })
        .collect()
}

// Bundles the engine could not finish writing are left to the decoder to reject.
fn bundle_findings(source: &str, text: &str, version: EngineVersion) -> Vec<StatusFinding> {
    let Ok(document) = serde_json::from_str::<Value>(text) else {
        debug!(source, "status bundle is not valid JSON; skipping");
        return Vec::new();
    };
    let status_key = version.layouts().bundle.status_key;
    let Some(cases) = document.get("MODTRAN").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut findings = Vec::new();
    for status in cases.iter().filter_map(|case| case.get(status_key)) {
        if let Some(case_status) = status.get("CASE_STATUS").and_then(Value::as_str) {
            if reports_failure(case_status) {
                findings.push(StatusFinding {
                    source: source.to_string(),
                    line: 0,
                    severity: FindingSeverity::Fatal,
                    text: format!("CASE_STATUS: {}", case_status.trim()),
                });
            }
        }
        if let Some(warnings) = status.get("WARNINGS").and_then(Value::as_str)
            && !warnings.trim().is_empty()
        {
            findings.push(StatusFinding {
                source: source.to_string(),
                line: 0,
                severity: FindingSeverity::Warning,
                text: format!("WARNINGS: {}", warnings.trim()),
            });
        }
    }
    findings
}

/// True when a failure word appears in `CASE_STATUS` without a negation before it.
fn reports_failure(case_status: &str) -> bool {
    let lowered = case_status.to_ascii_lowercase();
    let words = lowered
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>();
    words.iter().enumerate().any(|(index, word)| {
        FAILURE_WORDS.contains(word)
            && !index
                .checked_sub(1)
                .is_some_and(|previous| NEGATIONS.contains(&words[previous]))
    })
}
