use super::CliError;
use anyhow::Context;
use mod6_core::domain::{BatchResult, CaseResult, ParsedRecord};
use mod6_core::input::BaseCase;
use mod6_core::input::json::parse_document;
use mod6_core::input::keywords::load_input_defaults;
use mod6_core::{CaseRequest, EngineEnv};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

pub(super) enum EngineSource {
    Environment,
    ShellFile(PathBuf),
    Explicit { exe: PathBuf, data: PathBuf },
}

/// Where a case document's options are layered on top of.
pub(super) enum CaseTemplate {
    Document,
    Base(BaseCase),
    KeywordDefaults,
}

pub(super) fn load_engine_env(source: &EngineSource) -> Result<EngineEnv, CliError> {
    let env = match source {
        EngineSource::Environment => EngineEnv::from_environ()?,
        EngineSource::ShellFile(path) => EngineEnv::from_shell_file(path)?,
        EngineSource::Explicit { exe, data } => EngineEnv::new(exe, data),
    };
    Ok(env)
}

pub(super) fn build_runtime() -> Result<Runtime, CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    Ok(runtime)
}

/// Reads one case document and layers it over `template`, then applies the
/// `--set` overrides. A document without `NAME` is named after its file.
pub(super) fn load_request(
    path: &Path,
    template: &CaseTemplate,
    sets: &[String],
    data_dir: Option<&Path>,
) -> Result<CaseRequest, CliError> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read case document '{}'", path.display()))?;
    let document = CaseRequest::from_document(parse_document(&text, true)?)?;
    let name = document
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| file_stem(path));
    let fragment = Value::Object(document.input().clone());

    let mut request = match template {
        CaseTemplate::Document => document.set_top("NAME", name),
        CaseTemplate::Base(base) => base.request(&name).merge(&fragment, true)?,
        CaseTemplate::KeywordDefaults => {
            let data_dir = data_dir.ok_or_else(|| {
                CliError::Usage("--keyword-defaults needs an engine data directory".to_string())
            })?;
            load_input_defaults(data_dir)?
                .set_top("NAME", name)
                .merge(&fragment, true)?
        }
    };

    for set in sets {
        let (key, value) = parse_set(set)?;
        request = request.set_key(key, value);
    }
    Ok(request)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Splits `KEY=VALUE`; the value is JSON when it parses and a plain string otherwise.
pub(super) fn parse_set(set: &str) -> Result<(&str, Value), CliError> {
    let Some((key, raw)) = set.split_once('=') else {
        return Err(CliError::Usage(format!(
            "Invalid --set '{set}'; expected SECTION__OPTION=VALUE."
        )));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::Usage(format!("Invalid --set '{set}'; the key is empty.")));
    }
    let value =
        serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key, value))
}

pub(super) fn render_human_summary(result: &CaseResult) -> String {
    let execution = result.execution();
    let mut output = format!(
        "case {}: {} in '{}' ({} record(s), {} warning(s), {:.1}s)\n",
        result.case_id(),
        execution.status.as_str(),
        result.directory().display(),
        result.records().len(),
        result.warnings().len(),
        execution.duration.as_secs_f64()
    );
    for (kind, record) in result.records() {
        output.push_str(&format!("  {kind}: {}\n", describe_record(record)));
    }
    for artifact in result.unparsed() {
        output.push_str(&format!(
            "  {}: not decoded ({})\n",
            artifact.kind,
            artifact.path.display()
        ));
    }
    for warning in result.warnings() {
        output.push_str(&format!("  warning: {warning}\n"));
    }
    output
}

fn describe_record(record: &ParsedRecord) -> String {
    let names = record.column_names().collect::<Vec<_>>();
    match record.grid() {
        Some(grid) => format!(
            "{} row(s) on {} grid, {} column(s)",
            grid.len(),
            grid.axis().unit(),
            names.len()
        ),
        None if names.is_empty() => format!("{} metadata entries", record.metadata().len()),
        None => format!("{} row(s), {} column(s)", record.row_count(), names.len()),
    }
}

pub(super) fn render_record_table(result: &CaseResult, label: &str) -> Result<String, CliError> {
    let Some(kind) = result
        .records()
        .keys()
        .copied()
        .find(|kind| kind.label().eq_ignore_ascii_case(label))
    else {
        return Err(CliError::Usage(format!(
            "Case '{}' has no decoded '{label}' artifact.",
            result.case_id()
        )));
    };
    result.render_table(kind).ok_or_else(|| {
        CliError::Usage(format!("The '{label}' artifact has no spectral grid to tabulate."))
    })
}

pub(super) fn result_summary(result: &CaseResult) -> Value {
    let execution = result.execution();
    let records = result
        .records()
        .iter()
        .map(|(kind, record)| {
            let summary = json!({
                "rows": record.row_count(),
                "grid_unit": record.grid().map(|grid| grid.axis().unit()),
                "columns": record.column_names().collect::<Vec<_>>(),
                "metadata": record.metadata(),
            });
            (kind.label().to_string(), summary)
        })
        .collect::<Map<_, _>>();
    let grids = result
        .records()
        .keys()
        .filter_map(|kind| kind.grid_family())
        .filter_map(|family| {
            let grid = result.grid(family)?;
            Some((
                family.as_str().to_string(),
                json!({"unit": grid.axis().unit(), "points": grid.len()}),
            ))
        })
        .collect::<Map<_, _>>();

    let unparsed = result
        .unparsed()
        .iter()
        .map(|artifact| {
            json!({
                "kind": artifact.kind.label(),
                "path": artifact.path.display().to_string(),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "case": result.case_id(),
        "directory": result.directory().display().to_string(),
        "status": execution.status.as_str(),
        "exit_code": execution.exit_code,
        "duration_ms": execution.duration.as_millis() as u64,
        "records": records,
        "grids": grids,
        "unparsed": unparsed,
        "warnings": result.warnings(),
    })
}

pub(super) fn batch_summary(batch: &BatchResult) -> Value {
    let cases = batch
        .entries()
        .iter()
        .map(|entry| match &entry.outcome {
            Ok(result) => json!({
                "index": entry.index,
                "label": entry.label,
                "result": result_summary(result),
            }),
            Err(error) => json!({
                "index": entry.index,
                "label": entry.label,
                "error": {
                    "code": error.placeholder(),
                    "category": error.category().as_str(),
                    "message": error.to_string(),
                },
            }),
        })
        .collect::<Vec<_>>();
    json!({
        "succeeded": batch.succeeded(),
        "failed": batch.failed(),
        "cases": cases,
    })
}

pub(super) fn render_json(value: &Value) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .context("failed to render JSON summary")
        .map_err(CliError::from)
}

#[cfg(test)]
mod tests {
    use super::{CaseTemplate, load_request, parse_set};
    use mod6_core::input::BaseCase;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn set_values_are_json_when_they_parse() {
        let (key, value) = parse_set("SPECTRAL__V1=4000").expect("numeric set should parse");
        assert_eq!(key, "SPECTRAL__V1");
        assert_eq!(value, json!(4000));

        let (_, value) =
            parse_set("RTOPTIONS__IEMSCT=RT_TRANSMITTANCE").expect("text set should parse");
        assert_eq!(value, json!("RT_TRANSMITTANCE"));

        assert!(parse_set("SPECTRAL__V1").is_err());
        assert!(parse_set("=1").is_err());
    }

    #[test]
    fn documents_layer_over_base_cases_and_take_their_file_name() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("swir_scene.json");
        fs::write(
            &path,
            "{\"MODTRAN\": [{\"MODTRANINPUT\": {\n  \"SPECTRAL\": {\"DV\": 5.0} # coarser\n}}]}\n",
        )
        .expect("document should be written");

        let request = load_request(
            &path,
            &CaseTemplate::Base(BaseCase::Swir),
            &["SPECTRAL__FWHM=10".to_string()],
            None,
        )
        .expect("request should load");
        assert_eq!(request.name(), Some("swir_scene"));
        assert_eq!(request.input()["SPECTRAL"]["DV"], json!(5.0));
        assert_eq!(request.input()["SPECTRAL"]["FWHM"], json!(10));

        let config = request.validate().expect("layered request should validate");
        assert_eq!(config.id().as_str(), "swir_scene");
    }

    #[test]
    fn keyword_defaults_need_a_data_directory() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("case.json");
        fs::write(&path, "{\"NAME\": \"case\"}").expect("document should be written");
        let error = load_request(&path, &CaseTemplate::KeywordDefaults, &[], None)
            .expect_err("keyword defaults without data should fail");
        assert!(error.to_string().contains("--keyword-defaults"));
    }
}
