use super::layouts::EngineLayouts;
use crate::domain::{ArtifactKind, CaseError, ParsedRecord, SpectralAxis};
use std::path::Path;

/// What a decoder knows about the artifact besides its bytes.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext {
    pub kind: ArtifactKind,
    pub layouts: &'static EngineLayouts,
    /// Grid unit of plot artifacts, which carry no unit of their own.
    pub plot_axis: SpectralAxis,
}

pub trait ArtifactDecoder: Send + Sync {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError>;
}
