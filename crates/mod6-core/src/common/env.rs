//! Engine environment: where the executable and its data directory live.

use crate::domain::{CaseError, CaseResultExt};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const EXE_VAR: &str = "MODTRAN_EXE";
pub const DATA_VAR: &str = "MODTRAN_DATA";
const VAR_PREFIX: &str = "MODTRAN";

// Simple `NAME=value` / `export NAME="value"` lines of a Bourne shell file.
static EXPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[\t ]*(?:export[\t ]+)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)=(?P<quote>['"]?)(?P<value>.*?)(?P<close>['"]?)[\t ]*$"#,
    )
    .expect("export pattern should compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEnv {
    exe: PathBuf,
    data: PathBuf,
    extra: BTreeMap<String, String>,
}

impl EngineEnv {
    pub fn new(exe: impl Into<PathBuf>, data: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            data: data.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn from_environ() -> Result<Self, CaseError> {
        Self::from_map(std::env::vars())
    }

    /// Picks the engine variables out of an arbitrary variable listing.
    pub fn from_map<I, K, V>(vars: I) -> Result<Self, CaseError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut engine_vars = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .filter(|(key, _)| key.starts_with(VAR_PREFIX))
            .collect::<BTreeMap<_, _>>();

        let exe = engine_vars
            .remove(EXE_VAR)
            .ok_or_else(|| CaseError::Environment(format!("{EXE_VAR} not set in environment")))?;
        let data = engine_vars
            .remove(DATA_VAR)
            .ok_or_else(|| CaseError::Environment(format!("{DATA_VAR} not set in environment")))?;

        Ok(Self {
            exe: PathBuf::from(exe),
            data: PathBuf::from(data),
            extra: engine_vars,
        })
    }

    pub fn from_shell_file(path: &Path) -> Result<Self, CaseError> {
        let text = std::fs::read_to_string(path)
            .io_context(|| format!("failed to read environment file '{}'", path.display()))?;
        Self::from_map(parse_exports(&text))
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    pub fn data(&self) -> &Path {
        &self.data
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Variables handed to the engine process on top of the inherited environment.
    pub fn to_environ(&self) -> BTreeMap<String, String> {
        let mut vars = self.extra.clone();
        vars.insert(EXE_VAR.to_string(), self.exe.display().to_string());
        vars.insert(DATA_VAR.to_string(), self.data.display().to_string());
        vars
    }
}

fn parse_exports(text: &str) -> Vec<(String, String)> {
    EXPORT_LINE
        .captures_iter(text)
        .filter_map(|captures| {
            let name = captures.name("name")?.as_str().to_string();
            let quote = captures.name("quote").map_or("", |m| m.as_str());
            let close = captures.name("close").map_or("", |m| m.as_str());
            let mut value = captures.name("value")?.as_str().to_string();
            // An unbalanced closing quote belongs to the value.
            if quote != close {
                value.push_str(close);
            }
            Some((name, value))
        })
        .collect()
}
