use super::json::parse_document;
use super::{CaseConfig, CaseRequest, INPUT_FILE_NAME};
use crate::common::fortran::write_text_artifact;
use crate::domain::{CaseError, CaseResultExt};
use crate::workspace::CaseDirectory;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pretty-printed input document. Keys are sorted, so equal configs give equal bytes.
pub fn render_config(config: &CaseConfig) -> Result<String, CaseError> {
    serde_json::to_string_pretty(&config.document())
        .map_err(|error| CaseError::Internal(format!("failed to render input document: {error}")))
}

/// Writes the case's input file into `dir`. Creates exactly one file and starts nothing.
pub fn serialize(config: &CaseConfig, dir: &CaseDirectory) -> Result<PathBuf, CaseError> {
    let path = dir.path().join(INPUT_FILE_NAME);
    let content = render_config(config)?;
    write_text_artifact(&path, &content)
        .io_context(|| format!("failed to write input file '{}'", path.display()))?;
    debug!(case = %config.id(), path = %path.display(), bytes = content.len(), "wrote input file");
    Ok(path)
}

pub fn read_config(path: &Path) -> Result<CaseConfig, CaseError> {
    let text = std::fs::read_to_string(path)
        .io_context(|| format!("failed to read input file '{}'", path.display()))?;
    let document = parse_document(&text, true)?;
    CaseRequest::from_document(document)?.validate()
}
