use super::{
    ArtifactKind, CaseError, CaseId, CaseWarning, ExecutionResult, Grid, GridFamily, ParsedRecord,
};
use crate::common::bandmodel::{check_k_int, combine_by_k_int};
use crate::common::fortran::{format_fixed_f64, format_fortran_exp};
use crate::discovery::{DiscoveredArtifact, OutputArtifactSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything produced by one case: the execution outcome, every decoded record
/// and the grid each family was reconciled on.
#[derive(Debug, Clone)]
pub struct CaseResult {
    case_id: CaseId,
    directory: PathBuf,
    execution: ExecutionResult,
    artifacts: OutputArtifactSet,
    records: BTreeMap<ArtifactKind, ParsedRecord>,
    grids: BTreeMap<GridFamily, Grid>,
    unparsed: Vec<DiscoveredArtifact>,
    warnings: Vec<CaseWarning>,
}

impl CaseResult {
    pub(crate) fn new(
        artifacts: OutputArtifactSet,
        execution: ExecutionResult,
        records: BTreeMap<ArtifactKind, ParsedRecord>,
        grids: BTreeMap<GridFamily, Grid>,
        unparsed: Vec<DiscoveredArtifact>,
    ) -> Self {
        let warnings = artifacts.warnings().to_vec();
        Self {
            case_id: artifacts.case_id().clone(),
            directory: artifacts.directory().to_path_buf(),
            execution,
            artifacts,
            records,
            grids,
            unparsed,
            warnings,
        }
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    /// Location the case ran in. May no longer exist under a removing retention policy.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn execution(&self) -> &ExecutionResult {
        &self.execution
    }

    pub fn artifacts(&self) -> &OutputArtifactSet {
        &self.artifacts
    }

    pub fn records(&self) -> &BTreeMap<ArtifactKind, ParsedRecord> {
        &self.records
    }

    pub fn record(&self, kind: ArtifactKind) -> Option<&ParsedRecord> {
        self.records.get(&kind)
    }

    pub fn quantity(&self, kind: ArtifactKind, name: &str) -> Option<&[f64]> {
        self.records.get(&kind).and_then(|record| record.column(name))
    }

    pub fn grid(&self, family: GridFamily) -> Option<&Grid> {
        self.grids.get(&family)
    }

    pub fn unparsed(&self) -> &[DiscoveredArtifact] {
        &self.unparsed
    }

    pub fn warnings(&self) -> &[CaseWarning] {
        &self.warnings
    }

    pub(crate) fn push_warning(&mut self, warning: CaseWarning) {
        self.warnings.push(warning);
    }

    /// Sums a band-model column over the correlated-k sub-intervals of each band.
    pub fn combined_band_column(&self, kind: ArtifactKind, name: &str) -> Option<Vec<f64>> {
        let record = self.records.get(&kind)?;
        let values = record.column(name)?;
        let k_int = record
            .column("k_int")?
            .iter()
            .map(|value| *value as i64)
            .collect::<Vec<_>>();
        if !check_k_int(&k_int) {
            return None;
        }
        Some(combine_by_k_int(values, &k_int))
    }

    /// Renders one gridded record as a fixed-column text table.
    pub fn render_table(&self, kind: ArtifactKind) -> Option<String> {
        let record = self.records.get(&kind)?;
        let grid = record.grid()?;

        let mut output = format!("{:>14}", format!("GRID({})", grid.axis().unit()));
        for (name, _) in record.columns() {
            output.push_str(&format!(" {:>14}", truncate_label(name, 14)));
        }
        output.push('\n');

        for (row, grid_value) in grid.values().iter().enumerate() {
            output.push_str(&format_fixed_f64(*grid_value, 14, 5));
            for (_, values) in record.columns() {
                output.push(' ');
                output.push_str(&format_fortran_exp(values[row], 14, 6));
            }
            output.push('\n');
        }
        Some(output)
    }
}

fn truncate_label(label: &str, width: usize) -> String {
    label.chars().take(width).collect()
}

/// One submitted case's slot in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub label: String,
    pub outcome: Result<CaseResult, CaseError>,
}

/// Per-case outcomes in submission order.
#[derive(Debug, Default)]
pub struct BatchResult {
    entries: Vec<BatchEntry>,
}

impl BatchResult {
    pub(crate) fn from_entries(mut entries: Vec<BatchEntry>) -> Self {
        entries.sort_by_key(|entry| entry.index);
        Self { entries }
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.is_ok())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}
