use super::schema::{self, JSON_PRINT_OPTIONS, NOFILE_CODES};
use super::INPUT_FILE_NAME;
use crate::domain::{CaseError, CaseId, ConfigProblem, SpectralAxis};
use serde_json::{Map, Value, json};
use std::path::Path;

pub const DEFAULT_EXECUTION_MODE: &str = "RT_SOLAR_AND_THERMAL";
const DEFAULT_NOFILE: &str = "FC_NOFILES";
const DEFAULT_JSONOPT: &str = "WRT_STAT_INPUT";
const DEFAULT_XFLAG: &str = "W";
const LEGACY_FALLBACK_ROOT: &str = "mod6";

/// An unvalidated case under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseRequest {
    input: Map<String, Value>,
}

impl CaseRequest {
    pub fn new(name: impl Into<String>) -> Self {
        let mut input = Map::new();
        input.insert("NAME".to_string(), Value::String(name.into()));
        Self { input }
    }

    pub fn from_input(input: Map<String, Value>) -> Self {
        Self { input }
    }

    /// Accepts either a full `{"MODTRAN": [{"MODTRANINPUT": ...}]}` document or
    /// a bare case object. Documents must hold exactly one case.
    pub fn from_document(document: Value) -> Result<Self, CaseError> {
        let invalid = |detail: &str| CaseError::InvalidConfig {
            problems: vec![ConfigProblem::new("MODTRAN", detail)],
        };

        let Value::Object(mut root) = document else {
            return Err(invalid("expected a JSON object"));
        };
        let Some(cases) = root.remove("MODTRAN") else {
            return Ok(Self { input: root });
        };
        if !root.is_empty() {
            return Err(CaseError::InvalidConfig {
                problems: root
                    .keys()
                    .map(|key| ConfigProblem::new(key.as_str(), "unrecognized document key"))
                    .collect(),
            });
        }

        let Value::Array(mut cases) = cases else {
            return Err(invalid("expected a list of cases"));
        };
        if cases.len() != 1 {
            return Err(invalid(&format!(
                "expected exactly one case per document, found {}",
                cases.len()
            )));
        }
        let Value::Object(mut case) = cases.remove(0) else {
            return Err(invalid("expected the case to be an object"));
        };
        match case.remove("MODTRANINPUT") {
            Some(Value::Object(input)) => Ok(Self { input }),
            _ => Err(invalid("case has no MODTRANINPUT object")),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.input.get("NAME").and_then(Value::as_str)
    }

    pub fn input(&self) -> &Map<String, Value> {
        &self.input
    }

    pub fn set_top(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.input.insert(key.to_string(), value.into());
        self
    }

    pub fn set(mut self, section: &str, option: &str, value: impl Into<Value>) -> Self {
        let mut options = self.take_section(section);
        options.insert(option.to_string(), value.into());
        self.input.insert(section.to_string(), Value::Object(options));
        self
    }

    /// Sets an option by `SECTION__OPTION` key; keys without `__` are top-level.
    pub fn set_key(self, key: &str, value: impl Into<Value>) -> Self {
        match key.split_once("__") {
            Some((section, option)) => self.set(section, option, value),
            None => self.set_top(key, value),
        }
    }

    /// Merges a case fragment. Options already present are only replaced when
    /// `allow_override` is set; otherwise each clash is reported.
    pub fn merge(mut self, fragment: &Value, allow_override: bool) -> Result<Self, CaseError> {
        let Some(fragment) = fragment.as_object() else {
            return Err(CaseError::InvalidConfig {
                problems: vec![ConfigProblem::new("<fragment>", "expected a JSON object")],
            });
        };

        let mut problems = Vec::new();
        for (key, value) in fragment {
            match (schema::section(key), value.as_object()) {
                (Some(_), Some(options)) => {
                    let mut target = self.take_section(key);
                    for (option, option_value) in options {
                        if target.contains_key(option) && !allow_override {
                            problems.push(ConfigProblem::new(
                                format!("{key}.{option}"),
                                "multiple definitions; pass allow_override to keep the last",
                            ));
                            continue;
                        }
                        target.insert(option.clone(), option_value.clone());
                    }
                    self.input.insert(key.clone(), Value::Object(target));
                }
                _ => {
                    if self.input.contains_key(key) && !allow_override {
                        problems.push(ConfigProblem::new(
                            key.as_str(),
                            "multiple definitions; pass allow_override to keep the last",
                        ));
                        continue;
                    }
                    self.input.insert(key.clone(), value.clone());
                }
            }
        }

        if problems.is_empty() {
            Ok(self)
        } else {
            Err(CaseError::InvalidConfig { problems })
        }
    }

    pub fn validate(self) -> Result<CaseConfig, CaseError> {
        CaseConfig::from_request(self)
    }

    /// Removes `section` for editing; anything that is not an object starts over empty.
    fn take_section(&mut self, section: &str) -> Map<String, Value> {
        match self.input.remove(section) {
            Some(Value::Object(options)) => options,
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoFileMode {
    AllowAll,
    Tape6Only,
    NoFiles,
}

/// Output-file selection derived from `FILEOPTIONS` and the execution mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    /// File-name root of the legacy outputs; empty selects the fixed legacy names.
    pub legacy_root: String,
    pub nofile: NoFileMode,
    pub binary: bool,
    pub corrk: bool,
    pub csv: Option<String>,
    pub sli: Option<String>,
    pub bundle: Option<String>,
    pub json_option: usize,
    pub transmittance_only: bool,
}

/// A validated case: every option is recognized and every option that output
/// discovery reads has been filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseConfig {
    id: CaseId,
    input: Map<String, Value>,
    files: FileSelection,
    plot_axis: SpectralAxis,
}

impl CaseConfig {
    pub fn from_request(request: CaseRequest) -> Result<Self, CaseError> {
        let mut input = request.input;
        let mut problems = schema::check_case(&input);

        let id = match input.get("NAME").and_then(Value::as_str) {
            Some(name) => CaseId::parse(name.trim())
                .map_err(|detail| problems.push(ConfigProblem::new("NAME", detail)))
                .ok(),
            None => {
                if !input.contains_key("NAME") {
                    problems.push(ConfigProblem::new("NAME", "a case name is required"));
                }
                None
            }
        };

        check_spectral_range(&input, &mut problems);
        check_bundle_name(&input, &mut problems);

        let Some(id) = id.filter(|_| problems.is_empty()) else {
            return Err(CaseError::InvalidConfig { problems });
        };

        apply_defaults(&mut input, &id);
        let files = file_selection(&input);
        let plot_axis = option(&input, "SPECTRAL", "XFLAG")
            .and_then(Value::as_str)
            .and_then(SpectralAxis::from_xflag)
            .unwrap_or(SpectralAxis::Wavenumber);

        Ok(Self {
            id,
            input,
            files,
            plot_axis,
        })
    }

    pub fn id(&self) -> &CaseId {
        &self.id
    }

    pub fn input(&self) -> &Map<String, Value> {
        &self.input
    }

    pub fn option(&self, section: &str, name: &str) -> Option<&Value> {
        option(&self.input, section, name)
    }

    pub fn files(&self) -> &FileSelection {
        &self.files
    }

    pub fn plot_axis(&self) -> SpectralAxis {
        self.plot_axis
    }

    /// The complete engine input document for this case.
    pub fn document(&self) -> Value {
        json!({ "MODTRAN": [{ "MODTRANINPUT": Value::Object(self.input.clone()) }] })
    }

    /// The same case under another name, with name-derived defaults recomputed.
    pub fn renamed(&self, name: &str) -> Result<Self, CaseError> {
        let mut input = self.input.clone();
        input.insert("NAME".to_string(), Value::String(name.to_string()));
        if let Some(Value::Object(files)) = input.get_mut("FILEOPTIONS") {
            let old = self.id.as_str();
            if files.get("FLROOT").and_then(Value::as_str) == Some(old) {
                files.remove("FLROOT");
            }
            let old_bundle = format!("{old}.json");
            if files.get("JSONPRNT").and_then(Value::as_str) == Some(old_bundle.as_str()) {
                files.remove("JSONPRNT");
            }
        }
        Self::from_request(CaseRequest::from_input(input))
    }
}

impl TryFrom<CaseRequest> for CaseConfig {
    type Error = CaseError;

    fn try_from(request: CaseRequest) -> Result<Self, Self::Error> {
        Self::from_request(request)
    }
}

fn option<'a>(input: &'a Map<String, Value>, section: &str, name: &str) -> Option<&'a Value> {
    input.get(section)?.as_object()?.get(name)
}

fn check_spectral_range(input: &Map<String, Value>, problems: &mut Vec<ConfigProblem>) {
    let v1 = option(input, "SPECTRAL", "V1").and_then(Value::as_f64);
    let v2 = option(input, "SPECTRAL", "V2").and_then(Value::as_f64);
    if let (Some(v1), Some(v2)) = (v1, v2)
        && v1 > 0.0
        && v2 > 0.0
        && v1 >= v2
    {
        problems.push(ConfigProblem::new(
            "SPECTRAL.V2",
            format!("upper bound {v2} must exceed lower bound {v1}"),
        ));
    }
}

fn check_bundle_name(input: &Map<String, Value>, problems: &mut Vec<ConfigProblem>) {
    let Some(name) = option(input, "FILEOPTIONS", "JSONPRNT").and_then(Value::as_str) else {
        return;
    };
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    if Path::new(name).with_extension("json") == Path::new(INPUT_FILE_NAME) {
        problems.push(ConfigProblem::new(
            "FILEOPTIONS.JSONPRNT",
            format!("would overwrite the engine input file '{INPUT_FILE_NAME}'"),
        ));
    }
}

fn apply_defaults(input: &mut Map<String, Value>, id: &CaseId) {
    input.insert("NAME".to_string(), Value::String(id.to_string()));
    input.insert("CASE".to_string(), json!(0));

    let defaults: [(&str, &str, Value); 8] = [
        ("FILEOPTIONS", "FLROOT", json!(id.as_str())),
        ("FILEOPTIONS", "NOFILE", json!(DEFAULT_NOFILE)),
        ("FILEOPTIONS", "BINARY", json!(false)),
        ("FILEOPTIONS", "CKPRNT", json!(false)),
        ("FILEOPTIONS", "JSONPRNT", json!(format!("{id}.json"))),
        ("FILEOPTIONS", "JSONOPT", json!(DEFAULT_JSONOPT)),
        ("RTOPTIONS", "IEMSCT", json!(DEFAULT_EXECUTION_MODE)),
        ("SPECTRAL", "XFLAG", json!(DEFAULT_XFLAG)),
    ];
    for (section, name, value) in defaults {
        let entry = input
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(options) = entry {
            options.entry(name.to_string()).or_insert(value);
        }
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn file_selection(input: &Map<String, Value>) -> FileSelection {
    let files = |name: &str| option(input, "FILEOPTIONS", name);

    let legacy_root = match files("FLROOT").and_then(Value::as_str) {
        Some(root) => root.trim().to_string(),
        None => non_blank(input.get("NAME")).unwrap_or_else(|| LEGACY_FALLBACK_ROOT.to_string()),
    };
    let nofile = match files("NOFILE").and_then(|value| schema::coded_index(NOFILE_CODES, value)) {
        Some(0) => NoFileMode::AllowAll,
        Some(1) => NoFileMode::Tape6Only,
        _ => NoFileMode::NoFiles,
    };
    let json_option = files("JSONOPT")
        .and_then(|value| schema::coded_index(JSON_PRINT_OPTIONS, value))
        .unwrap_or(0);
    let bundle = if json_option == 0 {
        None
    } else {
        non_blank(files("JSONPRNT"))
    };
    let transmittance_only = option(input, "RTOPTIONS", "IEMSCT").and_then(Value::as_str)
        == Some("RT_TRANSMITTANCE");

    FileSelection {
        legacy_root,
        nofile,
        binary: files("BINARY").and_then(Value::as_bool).unwrap_or(false),
        corrk: files("CKPRNT").and_then(Value::as_bool).unwrap_or(false),
        csv: non_blank(files("CSVPRNT")),
        sli: non_blank(files("SLIPRNT")),
        bundle,
        json_option,
        transmittance_only,
    }
}
