//! Decoders for engine artifacts, registered per artifact kind.

pub mod acd;
pub mod bundle;
pub mod csv;
pub mod layouts;
pub mod plot;
pub mod sli;
pub mod tape6;
pub mod tape7;
pub mod warnings;

mod traits;

pub use layouts::EngineVersion;
pub use traits::{ArtifactDecoder, DecodeContext};

use crate::discovery::{DiscoveredArtifact, OutputArtifactSet};
use crate::domain::{
    ArtifactKind, CaseError, Grid, OutputVariant, ParsedRecord, RecordShapeError, SpectralAxis,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Records decoded from one case, plus the artifacts no decoder claims.
#[derive(Debug, Clone, Default)]
pub struct ParsedArtifacts {
    pub records: BTreeMap<ArtifactKind, ParsedRecord>,
    pub unparsed: Vec<DiscoveredArtifact>,
}

#[derive(Clone)]
pub struct DecoderRegistry {
    version: EngineVersion,
    decoders: BTreeMap<ArtifactKind, Arc<dyn ArtifactDecoder>>,
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("version", &self.version)
            .field("kinds", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DecoderRegistry {
    /// An empty registry; every artifact is reported as unparsed.
    pub fn empty(version: EngineVersion) -> Self {
        Self {
            version,
            decoders: BTreeMap::new(),
        }
    }

    pub fn for_engine(version: EngineVersion) -> Self {
        let mut registry = Self::empty(version);
        registry.register(ArtifactKind::Log, tape6::LogDecoder);
        registry.register(ArtifactKind::Warnings, warnings::WarningsDecoder);

        let tape7 = Arc::new(tape7::Tape7TextDecoder);
        registry.register_shared(ArtifactKind::SpectralTable, tape7.clone());
        registry.register_shared(ArtifactKind::ScanTable, tape7);
        registry.register(ArtifactKind::SpectralTableBinary, tape7::Tape7BinaryDecoder);

        registry.register(ArtifactKind::BandTable, acd::AcdTextDecoder);
        registry.register(ArtifactKind::BandTableBinary, acd::AcdBinaryDecoder);

        let plot = Arc::new(plot::PlotDecoder);
        registry.register_shared(ArtifactKind::PlotTable, plot.clone());
        registry.register_shared(ArtifactKind::ScanPlotTable, plot);

        let csv = Arc::new(csv::CsvDecoder);
        let sli = Arc::new(sli::SliDecoder);
        for variant in OutputVariant::ALL {
            registry.register_shared(ArtifactKind::CsvTable(variant), csv.clone());
            registry.register_shared(ArtifactKind::SpectralLibrary(variant), sli.clone());
        }
        registry.register(ArtifactKind::Bundle, bundle::BundleDecoder);
        registry
    }

    pub fn version(&self) -> EngineVersion {
        self.version
    }

    pub fn register<D>(&mut self, kind: ArtifactKind, decoder: D)
    where
        D: ArtifactDecoder + 'static,
    {
        self.decoders.insert(kind, Arc::new(decoder));
    }

    pub fn register_shared(&mut self, kind: ArtifactKind, decoder: Arc<dyn ArtifactDecoder>) {
        self.decoders.insert(kind, decoder);
    }

    pub fn decoder(&self, kind: ArtifactKind) -> Option<&dyn ArtifactDecoder> {
        self.decoders.get(&kind).map(Arc::as_ref)
    }

    pub fn context(&self, kind: ArtifactKind, plot_axis: SpectralAxis) -> DecodeContext {
        DecodeContext {
            kind,
            layouts: self.version.layouts(),
            plot_axis,
        }
    }

    /// Decodes every artifact that has a decoder. The first malformed artifact
    /// fails the whole set.
    pub fn parse_all(
        &self,
        set: &OutputArtifactSet,
        plot_axis: SpectralAxis,
    ) -> Result<ParsedArtifacts, CaseError> {
        let mut parsed = ParsedArtifacts::default();
        for artifact in set.artifacts() {
            let Some(decoder) = self.decoder(artifact.kind) else {
                debug!(artifact = %artifact.kind, path = %artifact.path.display(), "no decoder; listed as unparsed");
                parsed.unparsed.push(artifact.clone());
                continue;
            };
            let record = decoder.decode(&artifact.path, &self.context(artifact.kind, plot_axis))?;
            debug!(
                artifact = %artifact.kind,
                rows = record.row_count(),
                columns = record.columns().len(),
                "decoded artifact"
            );
            parsed.records.insert(artifact.kind, record);
        }
        Ok(parsed)
    }
}

pub(crate) fn read_text(path: &Path, kind: ArtifactKind) -> Result<String, CaseError> {
    let bytes = read_bytes(path)?;
    String::from_utf8(bytes)
        .map_err(|error| CaseError::malformed(kind, path, format!("not valid UTF-8: {error}")))
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, CaseError> {
    std::fs::read(path)
        .map_err(|source| CaseError::io(format!("failed to read artifact '{}'", path.display()), source))
}

pub(crate) fn shape_error(kind: ArtifactKind, path: &Path, error: RecordShapeError) -> CaseError {
    CaseError::malformed(kind, path, error.to_string())
}

pub(crate) fn build_record(
    context: &DecodeContext,
    path: &Path,
    grid: Option<(SpectralAxis, Vec<f64>)>,
    columns: Vec<(String, Vec<f64>)>,
) -> Result<ParsedRecord, CaseError> {
    let grid = grid
        .map(|(axis, values)| Grid::new(axis, values))
        .transpose()
        .map_err(|error| shape_error(context.kind, path, error))?;
    ParsedRecord::new(context.kind, grid, columns).map_err(|error| shape_error(context.kind, path, error))
}

/// Little-endian 32-bit words of a binary artifact.
pub(crate) struct Words<'a> {
    bytes: &'a [u8],
}

impl<'a> Words<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn raw(&self, index: usize) -> Option<[u8; 4]> {
        let start = index.checked_mul(4)?;
        self.bytes.get(start..start + 4)?.try_into().ok()
    }

    pub(crate) fn u32(&self, index: usize) -> Option<u32> {
        self.raw(index).map(u32::from_le_bytes)
    }

    pub(crate) fn i32(&self, index: usize) -> Option<i32> {
        self.raw(index).map(i32::from_le_bytes)
    }

    pub(crate) fn f32(&self, index: usize) -> Option<f32> {
        self.raw(index).map(f32::from_le_bytes)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Writers for artifact fixtures, so column boundaries in tests are exact.

    use crate::common::fortran::{format_fixed_f64, format_fortran_exp};

    pub fn tape7_row(grid: f64, quantities: &[f64]) -> String {
        let mut row = format_fixed_f64(grid, 10, 2);
        for value in quantities {
            row.push_str(&format_fortran_exp(*value, 11, 4));
        }
        row
    }

    pub fn push_f32(buffer: &mut Vec<u8>, value: f32) {
        buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_u32(buffer: &mut Vec<u8>, value: u32) {
        buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_i32(buffer: &mut Vec<u8>, value: i32) {
        buffer.extend_from_slice(&value.to_le_bytes());
    }
}
