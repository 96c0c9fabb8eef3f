use super::layouts::BundleLayout;
use super::{ArtifactDecoder, DecodeContext, build_record, read_text};
use crate::domain::{CaseError, MetaValue, ParsedRecord, SpectralAxis};
use serde_json::{Map, Value};
use std::path::Path;

/// The engine's JSON output. Status fields and scalar spectra members become
/// metadata; numeric arrays become `group.member` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleDecoder;

type Columns = Vec<(String, Vec<f64>)>;

impl ArtifactDecoder for BundleDecoder {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let text = read_text(path, context.kind)?;
        let layout = &context.layouts.bundle;
        let malformed = |detail: String| CaseError::malformed(context.kind, path, detail);

        let document = serde_json::from_str::<Value>(&text)
            .map_err(|error| malformed(format!("invalid JSON: {error}")))?;
        let cases = document
            .get("MODTRAN")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("missing 'MODTRAN' case array".to_string()))?;
        let Some(case) = cases.first() else {
            return Err(malformed("'MODTRAN' case array is empty".to_string()));
        };

        let mut metadata = Vec::new();
        if let Some(status) = case.get(layout.status_key).and_then(Value::as_object) {
            for (key, value) in status {
                if let Some(value) = scalar(value) {
                    metadata.push((format!("status.{key}"), value));
                }
            }
        }

        let spectra = case
            .get(layout.output_key)
            .and_then(|output| output.get(layout.spectra_key));
        let (grid, columns) = match spectra {
            Some(Value::Object(groups)) => {
                spectra_columns(groups, layout, &mut metadata).map_err(malformed)?
            }
            Some(other) => {
                return Err(malformed(format!(
                    "'{}' is {}, expected an object",
                    layout.spectra_key,
                    type_name(other)
                )));
            }
            None => (None, Vec::new()),
        };

        let mut record = if grid.is_none() && columns.is_empty() {
            ParsedRecord::metadata_only(context.kind)
        } else {
            build_record(context, path, grid, columns)?
        };
        record.insert_meta("cases", MetaValue::Integer(cases.len() as i64));
        for (key, value) in metadata {
            record.insert_meta(key, value);
        }
        Ok(record)
    }
}

fn spectra_columns(
    groups: &Map<String, Value>,
    layout: &BundleLayout,
    metadata: &mut Vec<(String, MetaValue)>,
) -> Result<(Option<(SpectralAxis, Vec<f64>)>, Columns), String> {
    let mut grid: Option<(SpectralAxis, Vec<f64>)> = None;
    let mut columns = Vec::new();

    for group_name in layout.spectra_groups {
        let Some(group) = groups.get(*group_name) else {
            continue;
        };
        let Some(members) = group.as_object() else {
            return Err(format!("spectra group '{group_name}' is not an object"));
        };
        let prefix = group_name.to_ascii_lowercase();

        for (key, value) in members {
            let name = format!("{prefix}.{key}");
            if let Some(array) = value.as_array() {
                let values = numbers(array).map_err(|detail| format!("{name}: {detail}"))?;
                let Some((_, axis)) = layout.grid_keys.iter().find(|(label, _)| label == key)
                else {
                    columns.push((name, values));
                    continue;
                };
                if let Some((seen_axis, seen)) = &grid
                    && (seen_axis != axis || *seen != values)
                {
                    return Err(format!("{name} disagrees with the grid of an earlier group"));
                }
                if grid.is_none() {
                    grid = Some((*axis, values));
                }
            } else if let Some(value) = scalar(value) {
                metadata.push((name, value));
            }
        }
    }
    Ok((grid, columns))
}

fn numbers(array: &[Value]) -> Result<Vec<f64>, String> {
    array
        .iter()
        .enumerate()
        .map(|(index, value)| {
            value
                .as_f64()
                .ok_or_else(|| format!("element {index} is {}, expected a number", type_name(value)))
        })
        .collect()
}

fn scalar(value: &Value) -> Option<MetaValue> {
    match value {
        Value::String(text) => Some(MetaValue::Text(text.clone())),
        Value::Bool(flag) => Some(MetaValue::Flag(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Some(MetaValue::Integer(integer)),
            None => number.as_f64().map(MetaValue::Number),
        },
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::BundleDecoder;
    use crate::domain::{ArtifactKind, MetaValue, SpectralAxis};
    use crate::parsers::layouts::EngineVersion;
    use crate::parsers::{ArtifactDecoder, DecodeContext};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> DecodeContext {
        DecodeContext {
            kind: ArtifactKind::Bundle,
            layouts: EngineVersion::V6.layouts(),
            plot_axis: SpectralAxis::Wavenumber,
        }
    }

    #[test]
    fn spectra_groups_share_one_grid() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("case.json");
        let bundle = json!({"MODTRAN": [{
            "MODTRANSTATUS": {"VERSION": "6.0.2.5", "NAME": "case", "CASE_STATUS": "Success", "WARNINGS": ""},
            "MODTRANINPUT": {"NAME": "case"},
            "MODTRANOUTPUT": {"SPECTRA": {
                "TRANSMITTANCE": {"FREQ": [4000.0, 4001.0], "TOT_TRANS": [0.5, 0.6]},
                "RADIANCE": {"FREQ": [4000.0, 4001.0], "TOTAL_RAD": [1.0e-6, 2.0e-6], "UNITS": "W/cm2/sr/cm-1"}
            }}
        }]});
        fs::write(&path, bundle.to_string()).expect("bundle should be written");

        let record = BundleDecoder.decode(&path, &context()).expect("bundle should decode");
        assert_eq!(record.grid().expect("grid").values(), &[4000.0, 4001.0]);
        assert_eq!(record.column("transmittance.TOT_TRANS"), Some(&[0.5, 0.6][..]));
        assert_eq!(record.column("radiance.TOTAL_RAD"), Some(&[1.0e-6, 2.0e-6][..]));
        assert_eq!(
            record.meta("status.CASE_STATUS"),
            Some(&MetaValue::Text("Success".to_string()))
        );
        assert_eq!(
            record.meta("radiance.UNITS"),
            Some(&MetaValue::Text("W/cm2/sr/cm-1".to_string()))
        );
    }

    #[test]
    fn status_only_bundle_is_metadata() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("case.json");
        let bundle = json!({"MODTRAN": [{"MODTRANSTATUS": {"VERSION": "6.0.2.5", "CASE_STATUS": "Success"}}]});
        fs::write(&path, bundle.to_string()).expect("bundle should be written");

        let record = BundleDecoder.decode(&path, &context()).expect("bundle should decode");
        assert!(record.grid().is_none());
        assert_eq!(record.row_count(), 0);
        assert_eq!(record.meta("cases"), Some(&MetaValue::Integer(1)));
    }

    #[test]
    fn truncated_or_inconsistent_bundles_are_malformed() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("case.json");

        fs::write(&path, "{\"MODTRAN\": [{\"MODTRANSTATUS\": ").expect("bundle should be written");
        let error = BundleDecoder.decode(&path, &context()).expect_err("truncated JSON should fail");
        assert_eq!(error.placeholder(), "RUN.MALFORMED_ARTIFACT");

        let mismatched = json!({"MODTRAN": [{"MODTRANOUTPUT": {"SPECTRA": {
            "TRANSMITTANCE": {"FREQ": [4000.0, 4001.0], "TOT_TRANS": [0.5]}
        }}}]});
        fs::write(&path, mismatched.to_string()).expect("bundle should be written");
        let error = BundleDecoder.decode(&path, &context()).expect_err("short column should fail");
        assert!(error.to_string().contains("transmittance.TOT_TRANS"), "{error}");

        let mixed = json!({"MODTRAN": [{"MODTRANOUTPUT": {"SPECTRA": {
            "TRANSMITTANCE": {"FREQ": [4000.0, "x"]}
        }}}]});
        fs::write(&path, mixed.to_string()).expect("bundle should be written");
        let error = BundleDecoder.decode(&path, &context()).expect_err("string element should fail");
        assert!(error.to_string().contains("element 1"), "{error}");
    }
}
