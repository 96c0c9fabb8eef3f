//! Default option values published in the engine's keyword catalogue.

use super::CaseRequest;
use super::schema;
use crate::domain::{CaseError, CaseResultExt, ConfigProblem};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

pub const KEYWORDS_FILE_NAME: &str = "keywords.json";

/// Reads `keywords.json` from the engine data directory and builds a request
/// holding every catalogued default.
pub fn load_input_defaults(data_dir: &Path) -> Result<CaseRequest, CaseError> {
    let path = data_dir.join(KEYWORDS_FILE_NAME);
    let text = std::fs::read_to_string(&path)
        .io_context(|| format!("failed to read keyword catalogue '{}'", path.display()))?;
    let catalogue: Value = serde_json::from_str(&text).map_err(|error| {
        CaseError::Environment(format!(
            "keyword catalogue '{}' is not valid JSON: {error}",
            path.display()
        ))
    })?;
    input_defaults(&catalogue)
}

pub fn input_defaults(catalogue: &Value) -> Result<CaseRequest, CaseError> {
    let Some(Value::Object(entries)) = catalogue.pointer("/VALID_MODTRAN/MODTRANINPUT") else {
        return Err(CaseError::InvalidConfig {
            problems: vec![ConfigProblem::new(
                "VALID_MODTRAN.MODTRANINPUT",
                "keyword catalogue has no input description",
            )],
        });
    };

    let mut input = Map::new();
    for (key, entry) in entries {
        if let Some(default) = leaf_default(entry) {
            if schema::TOP_LEVEL.iter().any(|spec| spec.name == key) {
                input.insert(key.clone(), default);
            }
            continue;
        }
        let (Some(section), Some(options)) = (schema::section(key), entry.as_object()) else {
            continue;
        };
        let mut defaults = Map::new();
        collect_defaults(options, &mut defaults);
        defaults.retain(|option, _| section.option(option).is_some());
        if !defaults.is_empty() {
            input.insert(key.clone(), Value::Object(defaults));
        }
    }

    debug!(sections = input.len(), "loaded keyword defaults");
    Ok(CaseRequest::from_input(input))
}

/// A catalogue leaf is an object carrying `DEFAULT`, optionally with `ENUM`.
fn leaf_default(entry: &Value) -> Option<Value> {
    let entry = entry.as_object()?;
    let default = entry.get("DEFAULT")?;
    if let Some(Value::Array(names)) = entry.get("ENUM")
        && let Some(index) = default.as_u64().and_then(|code| usize::try_from(code).ok())
        && let Some(name) = names.get(index).filter(|name| name.is_string())
    {
        return Some(name.clone());
    }
    Some(default.clone())
}

// Nested groups are flattened into their section.
fn collect_defaults(options: &Map<String, Value>, into: &mut Map<String, Value>) {
    for (name, entry) in options {
        match leaf_default(entry) {
            Some(default) => {
                into.insert(name.clone(), default);
            }
            None => {
                if let Some(nested) = entry.as_object() {
                    collect_defaults(nested, into);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{input_defaults, load_input_defaults};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn catalogue() -> serde_json::Value {
        json!({
            "VALID_MODTRAN": {
                "MODTRANINPUT": {
                    "CASE": {"DEFAULT": 0},
                    "RTOPTIONS": {
                        "IEMSCT": {"ENUM": ["RT_TRANSMITTANCE", "RT_THERMAL_ONLY", "RT_SOLAR_AND_THERMAL"], "DEFAULT": 2},
                        "DISALB": {"DEFAULT": false},
                        "UNKNOWN": {"DEFAULT": 1}
                    },
                    "SPECTRAL": {
                        "BOUNDS": {
                            "V1": {"DEFAULT": 4000.0},
                            "V2": {"DEFAULT": 4100.0}
                        }
                    },
                    "NOT_A_SECTION": {"X": {"DEFAULT": 1}}
                }
            }
        })
    }

    #[test]
    fn enumerated_defaults_resolve_to_names_and_groups_flatten() {
        let request = input_defaults(&catalogue()).expect("catalogue should load");
        let input = request.input();
        assert_eq!(input["CASE"], json!(0));
        assert_eq!(input["RTOPTIONS"]["IEMSCT"], json!("RT_SOLAR_AND_THERMAL"));
        assert_eq!(input["RTOPTIONS"]["DISALB"], json!(false));
        assert!(input["RTOPTIONS"].get("UNKNOWN").is_none());
        assert_eq!(input["SPECTRAL"]["V2"], json!(4100.0));
        assert!(input.get("NOT_A_SECTION").is_none());

        let config = request
            .set_top("NAME", "defaults")
            .validate()
            .expect("defaults should validate");
        assert_eq!(config.id().as_str(), "defaults");
    }

    #[test]
    fn catalogue_is_read_from_the_data_directory() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(temp.path().join("keywords.json"), catalogue().to_string())
            .expect("catalogue should be written");
        let request = load_input_defaults(temp.path()).expect("catalogue should load");
        assert!(request.input().contains_key("SPECTRAL"));

        let missing = load_input_defaults(&temp.path().join("nowhere"))
            .expect_err("missing catalogue should fail");
        assert_eq!(missing.exit_code(), 3);
    }
}
