//! Merges one case's decoded records and checks that records written on the
//! same grid actually agree on it.

use crate::discovery::OutputArtifactSet;
use crate::domain::{
    ArtifactKind, CaseError, CaseResult, CaseWarning, ExecutionResult, FindingSeverity, Grid,
    GridFamily, ParsedRecord,
};
use crate::parsers::ParsedArtifacts;
use std::collections::BTreeMap;
use tracing::debug;

/// Two grid points agree when they are within `absolute` cm-1 of each other,
/// or within `relative` of the larger magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTolerance {
    pub absolute: f64,
    pub relative: f64,
}

impl Default for GridTolerance {
    fn default() -> Self {
        Self {
            absolute: 1e-3,
            relative: 1e-5,
        }
    }
}

impl GridTolerance {
    pub fn agrees(&self, first: f64, second: f64) -> bool {
        let difference = (first - second).abs();
        difference <= self.absolute || difference <= self.relative * first.abs().max(second.abs())
    }
}

pub fn aggregate(
    artifacts: OutputArtifactSet,
    parsed: ParsedArtifacts,
    execution: ExecutionResult,
    tolerance: GridTolerance,
) -> Result<CaseResult, CaseError> {
    let grids = reconcile_grids(&parsed.records, tolerance)?;
    debug!(
        case = %artifacts.case_id(),
        records = parsed.records.len(),
        families = grids.len(),
        unparsed = parsed.unparsed.len(),
        "aggregated case records"
    );

    let mut result = CaseResult::new(
        artifacts,
        execution.clone(),
        parsed.records,
        grids,
        parsed.unparsed,
    );
    for finding in execution
        .findings
        .into_iter()
        .filter(|finding| finding.severity == FindingSeverity::Warning)
    {
        result.push_warning(CaseWarning::EngineWarning {
            source: finding.source,
            line: finding.line,
            text: finding.text,
        });
    }
    Ok(result)
}

/// The first gridded record of each family, in kind order, defines the family
/// grid; every later one must match it point for point once both are in cm-1.
fn reconcile_grids(
    records: &BTreeMap<ArtifactKind, ParsedRecord>,
    tolerance: GridTolerance,
) -> Result<BTreeMap<GridFamily, Grid>, CaseError> {
    let mut reference: BTreeMap<GridFamily, (ArtifactKind, &Grid, Vec<f64>)> = BTreeMap::new();

    for (kind, record) in records {
        let (Some(family), Some(grid)) = (kind.grid_family(), record.grid()) else {
            continue;
        };
        let wavenumbers = grid.ascending_wavenumbers();
        let Some((first, _, expected)) = reference.get(&family) else {
            reference.insert(family, (*kind, grid, wavenumbers));
            continue;
        };

        let mismatch = |detail: String| CaseError::GridMismatch {
            family,
            first: *first,
            second: *kind,
            detail,
        };
        if expected.len() != wavenumbers.len() {
            return Err(mismatch(format!(
                "{} points against {}",
                expected.len(),
                wavenumbers.len()
            )));
        }
        if let Some((index, (a, b))) = expected
            .iter()
            .zip(&wavenumbers)
            .enumerate()
            .find(|(_, (a, b))| !tolerance.agrees(**a, **b))
        {
            return Err(mismatch(format!("point {index}: {a} cm-1 against {b} cm-1")));
        }
    }

    Ok(reference
        .into_iter()
        .map(|(family, (_, grid, _))| (family, grid.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{GridTolerance, aggregate};
    use crate::discovery::{OutputArtifactSet, discover};
    use crate::domain::{
        ArtifactKind, CaseError, CaseId, CaseWarning, ExecutionResult, ExecutionStatus,
        FindingSeverity, Grid, GridFamily, OutputVariant, ParsedRecord, SpectralAxis,
        StatusFinding,
    };
    use crate::input::CaseRequest;
    use crate::parsers::ParsedArtifacts;
    use crate::workspace::CaseWorkspace;
    use std::time::Duration;
    use tempfile::TempDir;

    fn execution(findings: Vec<StatusFinding>) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::from_millis(1),
            status: if findings.is_empty() {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Warning
            },
            findings,
        }
    }

    fn empty_set(temp: &TempDir) -> OutputArtifactSet {
        let config = CaseRequest::new("case")
            .set("FILEOPTIONS", "NOFILE", "FC_NOFILES")
            .set("FILEOPTIONS", "JSONOPT", "WRT_NONE")
            .validate()
            .expect("config should validate");
        let dir = CaseWorkspace::new(temp.path())
            .prepare(&CaseId::parse("case").expect("id"))
            .expect("directory should be prepared");
        discover(&config, &dir, &execution(Vec::new()))
    }

    fn record(kind: ArtifactKind, axis: SpectralAxis, grid: Vec<f64>) -> ParsedRecord {
        let values = vec![0.5; grid.len()];
        ParsedRecord::new(
            kind,
            Some(Grid::new(axis, grid).expect("grid should be valid")),
            vec![("value".to_string(), values)],
        )
        .expect("record should be valid")
    }

    fn parsed(records: Vec<ParsedRecord>) -> ParsedArtifacts {
        ParsedArtifacts {
            records: records.into_iter().map(|record| (record.kind(), record)).collect(),
            unparsed: Vec::new(),
        }
    }

    #[test]
    fn grids_within_tolerance_agree_across_units() {
        let temp = TempDir::new().expect("tempdir should be created");
        let table = record(ArtifactKind::SpectralTable, SpectralAxis::Wavenumber, vec![4000.0, 5000.0]);
        let csv = record(
            ArtifactKind::CsvTable(OutputVariant::Main),
            SpectralAxis::WavelengthMicrons,
            vec![2.0, 2.500001],
        );
        let plot = record(ArtifactKind::PlotTable, SpectralAxis::Wavenumber, vec![1.0, 2.0, 3.0]);

        let result = aggregate(
            empty_set(&temp),
            parsed(vec![table, csv, plot]),
            execution(Vec::new()),
            GridTolerance::default(),
        )
        .expect("grids should agree");
        assert_eq!(
            result.grid(GridFamily::Spectral).expect("spectral grid").values(),
            &[4000.0, 5000.0]
        );
        assert_eq!(result.grid(GridFamily::Plot).expect("plot grid").len(), 3);
        assert_eq!(
            result.quantity(ArtifactKind::CsvTable(OutputVariant::Main), "value"),
            Some(&[0.5, 0.5][..])
        );
    }

    #[test]
    fn grid_point_outside_tolerance_is_a_mismatch() {
        let temp = TempDir::new().expect("tempdir should be created");
        let table = record(ArtifactKind::SpectralTable, SpectralAxis::Wavenumber, vec![4000.0, 5000.0]);
        let bundle = record(ArtifactKind::Bundle, SpectralAxis::Wavenumber, vec![4000.0, 5000.5]);

        let error = aggregate(
            empty_set(&temp),
            parsed(vec![table, bundle]),
            execution(Vec::new()),
            GridTolerance::default(),
        )
        .expect_err("disagreeing grids should fail");
        match &error {
            CaseError::GridMismatch {
                family,
                first,
                second,
                ..
            } => {
                assert_eq!(*family, GridFamily::Spectral);
                assert_eq!(*first, ArtifactKind::SpectralTable);
                assert_eq!(*second, ArtifactKind::Bundle);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(error.placeholder(), "RUN.GRID_MISMATCH");
    }

    #[test]
    fn length_mismatch_is_reported_and_engine_warnings_are_kept() {
        let temp = TempDir::new().expect("tempdir should be created");
        let table = record(ArtifactKind::ScanTable, SpectralAxis::Wavenumber, vec![1.0, 2.0]);
        let csv = record(
            ArtifactKind::CsvTable(OutputVariant::Scan),
            SpectralAxis::Wavenumber,
            vec![1.0, 2.0, 3.0],
        );
        let error = aggregate(
            empty_set(&temp),
            parsed(vec![table.clone(), csv]),
            execution(Vec::new()),
            GridTolerance::default(),
        )
        .expect_err("different lengths should fail");
        assert!(error.to_string().contains("2 points against 3"), "{error}");

        let warning = StatusFinding {
            source: "case.wrn".to_string(),
            line: 1,
            severity: FindingSeverity::Warning,
            text: "WARNING: DV coarsened".to_string(),
        };
        let result = aggregate(
            empty_set(&temp),
            parsed(vec![table]),
            execution(vec![warning]),
            GridTolerance::default(),
        )
        .expect("single record should aggregate");
        assert!(matches!(
            result.warnings(),
            [CaseWarning::EngineWarning { line: 1, .. }]
        ));
    }

    #[test]
    fn tolerance_is_absolute_or_relative() {
        let tolerance = GridTolerance::default();
        assert!(tolerance.agrees(10.0, 10.0009));
        assert!(tolerance.agrees(20000.0, 20000.15));
        assert!(!tolerance.agrees(20000.0, 20000.5));
    }
}
