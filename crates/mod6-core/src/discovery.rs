//! Which files a case was asked to write, and which of them it actually wrote.

use crate::domain::{ArtifactKind, CaseId, CaseWarning, ExecutionResult, OutputVariant};
use crate::input::{CaseConfig, FileSelection, NoFileMode};
use crate::workspace::CaseDirectory;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// An output the configuration asks for. Optional outputs depend on engine
/// settings that are not visible from the input alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub required: bool,
}

impl ExpectedArtifact {
    fn required(kind: ArtifactKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            required: true,
        }
    }

    fn optional(kind: ArtifactKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            required: false,
        }
    }

    /// Spectral libraries are a header plus a data file; both must exist.
    fn is_present(&self) -> bool {
        match self.kind {
            ArtifactKind::SpectralLibrary(_) => {
                self.path.is_file() && self.path.with_extension("sli").is_file()
            }
            _ => self.path.is_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifactSet {
    case_id: CaseId,
    directory: PathBuf,
    artifacts: Vec<DiscoveredArtifact>,
    warnings: Vec<CaseWarning>,
}

impl OutputArtifactSet {
    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn artifacts(&self) -> &[DiscoveredArtifact] {
        &self.artifacts
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&DiscoveredArtifact> {
        self.artifacts.iter().find(|artifact| artifact.kind == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ArtifactKind> + '_ {
        self.artifacts.iter().map(|artifact| artifact.kind)
    }

    pub fn warnings(&self) -> &[CaseWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

struct LegacyName {
    kind: ArtifactKind,
    tail: &'static str,
    fixed_name: &'static str,
}

const fn legacy(kind: ArtifactKind, tail: &'static str, fixed_name: &'static str) -> LegacyName {
    LegacyName {
        kind,
        tail,
        fixed_name,
    }
}

const LOG: LegacyName = legacy(ArtifactKind::Log, ".tp6", "tape6");
const WARNINGS: LegacyName = legacy(ArtifactKind::Warnings, ".wrn", "warnings.txt");
const SPECTRAL: LegacyName = legacy(ArtifactKind::SpectralTable, ".tp7", "tape7");
const SPECTRAL_BINARY: LegacyName = legacy(ArtifactKind::SpectralTableBinary, "_b.tp7", "tap7bin");
const SCAN: LegacyName = legacy(ArtifactKind::ScanTable, ".7sc", "tape7.scn");
const BAND: LegacyName = legacy(ArtifactKind::BandTable, ".acd", "atmcor.asc");
const BAND_BINARY: LegacyName = legacy(ArtifactKind::BandTableBinary, "_b.acd", "atmcor.bin");
const PLOT: LegacyName = legacy(ArtifactKind::PlotTable, ".plt", "pltout.asc");
const PLOT_BINARY: LegacyName = legacy(ArtifactKind::PlotTableBinary, "_b.plt", "pltout.bin");
const SCAN_PLOT: LegacyName = legacy(ArtifactKind::ScanPlotTable, ".psc", "pltout.scn");
const PATH_DATA: LegacyName = legacy(ArtifactKind::PathData, "._pth", "rfract._pth");
const CORRK_TRANS: LegacyName = legacy(ArtifactKind::CorrkTransmittance, ".t_k", "t_kdis.dat");
const CORRK_TRANS_BINARY: LegacyName =
    legacy(ArtifactKind::CorrkTransmittanceBinary, "_b.t_k", "t_kdis.bin");
const CORRK_RAD: LegacyName = legacy(ArtifactKind::CorrkRadiance, ".r_k", "r_kdis.dat");
const CORRK_RAD_BINARY: LegacyName =
    legacy(ArtifactKind::CorrkRadianceBinary, "_b.r_k", "r_kdis.bin");

/// Legacy outputs are named `<root><tail>`; a blank root selects the engine's fixed names.
fn legacy_path(dir: &Path, root: &str, name: &LegacyName) -> PathBuf {
    if root.is_empty() {
        dir.join(name.fixed_name)
    } else {
        dir.join(format!("{root}{}", name.tail))
    }
}

/// `<stem><tail><suffix>`, with `.txt` when the requested name has no suffix.
pub fn csv_path(dir: &Path, root: &str, variant: OutputVariant) -> PathBuf {
    let base = dir.join(root);
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = base
        .extension()
        .map(|extension| extension.to_string_lossy().into_owned())
        .unwrap_or_else(|| "txt".to_string());
    base.with_file_name(format!("{stem}{}.{suffix}", variant.tail()))
}

/// Header path of an ENVI spectral library pair.
pub fn sli_header_path(dir: &Path, root: &str, variant: OutputVariant) -> PathBuf {
    dir.join(format!("{root}{}.hdr", variant.tail()))
}

pub fn bundle_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name).with_extension("json")
}

/// Every artifact `files` asks the engine to write into `dir`, in a stable order.
pub fn expected_artifacts(files: &FileSelection, dir: &Path) -> Vec<ExpectedArtifact> {
    let root = files.legacy_root.as_str();
    let path = |name: &LegacyName| legacy_path(dir, root, name);
    let mut expected = Vec::new();

    match files.nofile {
        NoFileMode::AllowAll => {
            expected.push(ExpectedArtifact::required(LOG.kind, path(&LOG)));
            expected.push(ExpectedArtifact::required(SPECTRAL.kind, path(&SPECTRAL)));
            if files.binary {
                expected.push(ExpectedArtifact::required(
                    SPECTRAL_BINARY.kind,
                    path(&SPECTRAL_BINARY),
                ));
            }
            expected.push(ExpectedArtifact::optional(SCAN.kind, path(&SCAN)));
            let (band, plot) = if files.binary {
                (&BAND_BINARY, &PLOT_BINARY)
            } else {
                (&BAND, &PLOT)
            };
            expected.push(ExpectedArtifact::required(band.kind, path(band)));
            expected.push(ExpectedArtifact::required(plot.kind, path(plot)));
            expected.push(ExpectedArtifact::optional(SCAN_PLOT.kind, path(&SCAN_PLOT)));
            expected.push(ExpectedArtifact::optional(PATH_DATA.kind, path(&PATH_DATA)));
            if files.corrk {
                let dumps = if files.binary {
                    [&CORRK_TRANS_BINARY, &CORRK_RAD_BINARY]
                } else {
                    [&CORRK_TRANS, &CORRK_RAD]
                };
                for dump in dumps {
                    expected.push(ExpectedArtifact::required(dump.kind, path(dump)));
                }
            }
        }
        NoFileMode::Tape6Only => {
            expected.push(ExpectedArtifact::required(LOG.kind, path(&LOG)));
        }
        NoFileMode::NoFiles => {}
    }
    expected.push(ExpectedArtifact::optional(WARNINGS.kind, path(&WARNINGS)));

    if let Some(root) = files.sli.as_deref() {
        for variant in OutputVariant::ALL {
            let required = match variant {
                OutputVariant::Main => true,
                OutputVariant::Flux => !files.transmittance_only,
                OutputVariant::Scan | OutputVariant::HighRes => false,
            };
            expected.push(ExpectedArtifact {
                kind: ArtifactKind::SpectralLibrary(variant),
                path: sli_header_path(dir, root, variant),
                required,
            });
        }
    }

    if let Some(root) = files.csv.as_deref() {
        for variant in OutputVariant::ALL {
            expected.push(ExpectedArtifact {
                kind: ArtifactKind::CsvTable(variant),
                path: csv_path(dir, root, variant),
                required: variant == OutputVariant::Main,
            });
        }
    }

    if let Some(name) = files.bundle.as_deref() {
        expected.push(ExpectedArtifact::required(
            ArtifactKind::Bundle,
            bundle_path(dir, name),
        ));
    }

    expected
}

/// Lists the artifacts a finished case wrote. A fatal run yields an empty set,
/// since partial outputs of a failed run are never handed to parsers.
pub fn discover(
    config: &CaseConfig,
    dir: &CaseDirectory,
    execution: &ExecutionResult,
) -> OutputArtifactSet {
    let mut set = OutputArtifactSet {
        case_id: config.id().clone(),
        directory: dir.path().to_path_buf(),
        artifacts: Vec::new(),
        warnings: Vec::new(),
    };
    if execution.is_fatal() {
        debug!(case = %config.id(), "fatal run; no artifacts discovered");
        return set;
    }

    for expected in expected_artifacts(config.files(), dir.path()) {
        if expected.is_present() {
            set.artifacts.push(DiscoveredArtifact {
                kind: expected.kind,
                path: expected.path,
            });
        } else if expected.required {
            warn!(
                case = %config.id(),
                artifact = %expected.kind,
                path = %expected.path.display(),
                "expected artifact was not written"
            );
            set.warnings.push(CaseWarning::MissingArtifact {
                artifact: expected.kind,
                path: expected.path,
            });
        }
    }

    debug!(case = %config.id(), found = set.len(), missing = set.warnings.len(), "discovered artifacts");
    set
}

#[cfg(test)]
mod tests {
    use super::{csv_path, discover, expected_artifacts};
    use crate::domain::{
        ArtifactKind, CaseId, CaseWarning, ExecutionResult, ExecutionStatus, OutputVariant,
    };
    use crate::input::CaseRequest;
    use crate::workspace::CaseWorkspace;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn execution(status: ExecutionStatus) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::from_millis(5),
            status,
            findings: Vec::new(),
        }
    }

    fn names(files: &crate::input::FileSelection) -> Vec<String> {
        expected_artifacts(files, Path::new(""))
            .into_iter()
            .map(|expected| expected.path.display().to_string())
            .collect()
    }

    #[test]
    fn legacy_names_follow_root_and_binary_flag() {
        let config = CaseRequest::new("case")
            .set("FILEOPTIONS", "NOFILE", "FC_ALLOWALL")
            .set("FILEOPTIONS", "BINARY", true)
            .set("FILEOPTIONS", "CKPRNT", true)
            .set("FILEOPTIONS", "JSONOPT", "WRT_NONE")
            .validate()
            .expect("config should validate");
        assert_eq!(
            names(config.files()),
            vec![
                "case.tp6",
                "case.tp7",
                "case_b.tp7",
                "case.7sc",
                "case_b.acd",
                "case_b.plt",
                "case.psc",
                "case._pth",
                "case_b.t_k",
                "case_b.r_k",
                "case.wrn",
            ]
        );

        let blank = CaseRequest::new("case")
            .set("FILEOPTIONS", "FLROOT", " ")
            .set("FILEOPTIONS", "NOFILE", 1)
            .set("FILEOPTIONS", "JSONPRNT", "out.txt")
            .validate()
            .expect("config should validate");
        assert_eq!(names(blank.files()), vec!["tape6", "warnings.txt", "out.json"]);
    }

    #[test]
    fn csv_and_library_variants_share_a_root() {
        let dir = Path::new("runs");
        assert_eq!(
            csv_path(dir, "table.csv", OutputVariant::Flux),
            Path::new("runs/table_flux.csv")
        );
        assert_eq!(
            csv_path(dir, "table", OutputVariant::Main),
            Path::new("runs/table.txt")
        );

        let config = CaseRequest::new("case")
            .set("FILEOPTIONS", "SLIPRNT", "lib")
            .set("FILEOPTIONS", "JSONOPT", 0)
            .set("RTOPTIONS", "IEMSCT", "RT_TRANSMITTANCE")
            .validate()
            .expect("config should validate");
        let expected = expected_artifacts(config.files(), dir);
        let required = expected
            .iter()
            .filter(|artifact| artifact.required)
            .map(|artifact| artifact.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            required,
            vec![ArtifactKind::SpectralLibrary(OutputVariant::Main)]
        );
    }

    #[test]
    fn discovery_reports_exactly_what_exists() {
        let temp = TempDir::new().expect("tempdir should be created");
        let workspace = CaseWorkspace::new(temp.path());
        let config = CaseRequest::new("case")
            .set("FILEOPTIONS", "CSVPRNT", "case.csv")
            .set("FILEOPTIONS", "SLIPRNT", "case")
            .validate()
            .expect("config should validate");
        let dir = workspace
            .prepare(&CaseId::parse("case").expect("id"))
            .expect("directory should be prepared");
        for name in ["case.csv", "case_scan.csv", "case.json", "case.hdr", "case.sli", "case_flux.hdr", "stray.tp7"] {
            fs::write(dir.path().join(name), "").expect("file should be written");
        }

        let set = discover(&config, &dir, &execution(ExecutionStatus::Success));
        let kinds = set.kinds().collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ArtifactKind::SpectralLibrary(OutputVariant::Main),
                ArtifactKind::CsvTable(OutputVariant::Main),
                ArtifactKind::CsvTable(OutputVariant::Scan),
                ArtifactKind::Bundle,
            ]
        );
        assert_eq!(set.warnings().len(), 1);
        assert!(matches!(
            &set.warnings()[0],
            CaseWarning::MissingArtifact { artifact: ArtifactKind::SpectralLibrary(OutputVariant::Flux), .. }
        ));

        let fatal = discover(&config, &dir, &execution(ExecutionStatus::Fatal));
        assert!(fatal.is_empty());
        assert!(fatal.warnings().is_empty());
    }
}
