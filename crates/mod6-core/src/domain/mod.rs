pub mod errors;
pub mod record;
pub mod result;

pub use errors::{CaseError, CaseResultExt, CaseWarning, ConfigProblem, ErrorCategory};
pub use record::{Grid, GridOrdering, MetaValue, ParsedRecord, RecordShapeError};
pub use result::{BatchEntry, BatchResult, CaseResult};

use crate::common::units::{SiPrefix, SpectralValue};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

pub type CaseOutcome<T> = Result<T, CaseError>;

const CASE_ID_MAX_LEN: usize = 64;

/// Identifier of one case. Doubles as a directory name and a legacy file root,
/// so it is restricted to a portable character set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CaseId(String);

impl CaseId {
    pub fn parse(value: &str) -> Result<Self, String> {
        if value.is_empty() {
            return Err("case id must not be empty".to_string());
        }
        if value.len() > CASE_ID_MAX_LEN {
            return Err(format!(
                "case id '{value}' exceeds {CASE_ID_MAX_LEN} characters"
            ));
        }
        if value == "." || value == ".." {
            return Err(format!("case id '{value}' is reserved"));
        }
        if let Some(invalid) = value
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')))
        {
            return Err(format!(
                "case id '{value}' contains unsupported character '{invalid}'"
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CaseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secondary outputs that share a file-name root with the main spectral output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OutputVariant {
    Main,
    Flux,
    Scan,
    HighRes,
}

impl OutputVariant {
    pub const ALL: [Self; 4] = [Self::Main, Self::Flux, Self::Scan, Self::HighRes];

    pub const fn tail(self) -> &'static str {
        match self {
            Self::Main => "",
            Self::Flux => "_flux",
            Self::Scan => "_scan",
            Self::HighRes => "_highres",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ArtifactKind {
    Log,
    Warnings,
    SpectralTable,
    SpectralTableBinary,
    ScanTable,
    BandTable,
    BandTableBinary,
    PlotTable,
    PlotTableBinary,
    ScanPlotTable,
    PathData,
    CorrkTransmittance,
    CorrkTransmittanceBinary,
    CorrkRadiance,
    CorrkRadianceBinary,
    SpectralLibrary(OutputVariant),
    CsvTable(OutputVariant),
    Bundle,
}

impl ArtifactKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Warnings => "warnings",
            Self::SpectralTable => "spectral_table",
            Self::SpectralTableBinary => "spectral_table_binary",
            Self::ScanTable => "scan_table",
            Self::BandTable => "band_table",
            Self::BandTableBinary => "band_table_binary",
            Self::PlotTable => "plot_table",
            Self::PlotTableBinary => "plot_table_binary",
            Self::ScanPlotTable => "scan_plot_table",
            Self::PathData => "path_data",
            Self::CorrkTransmittance => "corrk_transmittance",
            Self::CorrkTransmittanceBinary => "corrk_transmittance_binary",
            Self::CorrkRadiance => "corrk_radiance",
            Self::CorrkRadianceBinary => "corrk_radiance_binary",
            Self::SpectralLibrary(OutputVariant::Main) => "sli",
            Self::SpectralLibrary(OutputVariant::Flux) => "sli_flux",
            Self::SpectralLibrary(OutputVariant::Scan) => "sli_scan",
            Self::SpectralLibrary(OutputVariant::HighRes) => "sli_highres",
            Self::CsvTable(OutputVariant::Main) => "csv",
            Self::CsvTable(OutputVariant::Flux) => "csv_flux",
            Self::CsvTable(OutputVariant::Scan) => "csv_scan",
            Self::CsvTable(OutputVariant::HighRes) => "csv_highres",
            Self::Bundle => "bundle",
        }
    }

    /// Records of kinds in the same family are written on the same spectral grid.
    pub const fn grid_family(self) -> Option<GridFamily> {
        match self {
            Self::SpectralTable
            | Self::SpectralTableBinary
            | Self::Bundle
            | Self::SpectralLibrary(OutputVariant::Main | OutputVariant::Flux)
            | Self::CsvTable(OutputVariant::Main | OutputVariant::Flux) => {
                Some(GridFamily::Spectral)
            }
            Self::ScanTable
            | Self::SpectralLibrary(OutputVariant::Scan)
            | Self::CsvTable(OutputVariant::Scan) => Some(GridFamily::Scan),
            Self::SpectralLibrary(OutputVariant::HighRes)
            | Self::CsvTable(OutputVariant::HighRes) => Some(GridFamily::HighRes),
            Self::BandTable | Self::BandTableBinary => Some(GridFamily::Band),
            Self::PlotTable | Self::PlotTableBinary => Some(GridFamily::Plot),
            Self::ScanPlotTable => Some(GridFamily::ScanPlot),
            Self::Log
            | Self::Warnings
            | Self::PathData
            | Self::CorrkTransmittance
            | Self::CorrkTransmittanceBinary
            | Self::CorrkRadiance
            | Self::CorrkRadianceBinary => None,
        }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GridFamily {
    Spectral,
    Scan,
    HighRes,
    Band,
    Plot,
    ScanPlot,
}

impl GridFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spectral => "spectral",
            Self::Scan => "scan",
            Self::HighRes => "highres",
            Self::Band => "band",
            Self::Plot => "plot",
            Self::ScanPlot => "scan_plot",
        }
    }
}

impl Display for GridFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Physical coordinate of a record's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpectralAxis {
    Wavenumber,
    WavelengthMicrons,
    WavelengthNanometers,
}

impl SpectralAxis {
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Wavenumber => "cm-1",
            Self::WavelengthMicrons => "um",
            Self::WavelengthNanometers => "nm",
        }
    }

    pub fn to_wavenumber(self, value: f64) -> f64 {
        match self {
            Self::Wavenumber => value,
            Self::WavelengthMicrons => {
                SpectralValue::wavelength(value, SiPrefix::Micro).as_wavenumber(SiPrefix::Centi)
            }
            Self::WavelengthNanometers => {
                SpectralValue::wavelength(value, SiPrefix::Nano).as_wavenumber(SiPrefix::Centi)
            }
        }
    }

    /// Maps the engine's `SPECTRAL.XFLAG` unit flag.
    pub fn from_xflag(flag: &str) -> Option<Self> {
        match flag.trim().to_ascii_uppercase().as_str() {
            "" | "W" => Some(Self::Wavenumber),
            "M" => Some(Self::WavelengthMicrons),
            "N" => Some(Self::WavelengthNanometers),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutionStatus {
    Success,
    Warning,
    Fatal,
}

impl ExecutionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FindingSeverity {
    Warning,
    Fatal,
}

/// One status line picked up from the engine's log, warning file, bundle status or streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusFinding {
    pub source: String,
    pub line: usize,
    pub severity: FindingSeverity,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
    pub status: ExecutionStatus,
    pub findings: Vec<StatusFinding>,
}

impl ExecutionResult {
    pub fn is_fatal(&self) -> bool {
        self.status == ExecutionStatus::Fatal
    }

    /// First fatal finding, or the exit code when the process itself failed.
    pub fn fatal_summary(&self) -> String {
        if let Some(finding) = self
            .findings
            .iter()
            .find(|finding| finding.severity == FindingSeverity::Fatal)
        {
            return format!("{}:{}: {}", finding.source, finding.line, finding.text);
        }
        match self.exit_code {
            Some(code) => format!("engine exited with code {code}"),
            None => "engine terminated by signal".to_string(),
        }
    }
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u128(duration.as_millis())
}

/// When a case directory is removed after its pipeline finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetentionPolicy {
    Always,
    OnSuccess,
    #[default]
    Never,
}

impl RetentionPolicy {
    pub const fn removes(self, succeeded: bool) -> bool {
        match self {
            Self::Always => true,
            Self::OnSuccess => succeeded,
            Self::Never => false,
        }
    }
}

impl FromStr for RetentionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "on-success" | "on_success" => Ok(Self::OnSuccess),
            "never" => Ok(Self::Never),
            other => Err(format!(
                "unknown retention policy '{other}', expected always, on-success or never"
            )),
        }
    }
}
