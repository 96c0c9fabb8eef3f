use super::{ArtifactDecoder, DecodeContext, read_bytes};
use crate::common::fortran::parse_fortran_f64;
use crate::domain::{CaseError, FindingSeverity, MetaValue, ParsedRecord};
use crate::exec::status::classify_line;
use std::path::Path;

/// The `.tp6` run log. Integrated quantities reported as `key = value unit`
/// lines are kept as metadata, first occurrence wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDecoder;

impl ArtifactDecoder for LogDecoder {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let bytes = read_bytes(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let layout = &context.layouts.log;
        let summary = &*layout.summary;

        let mut record = ParsedRecord::metadata_only(context.kind);
        let (mut lines, mut fatal, mut warnings) = (0_i64, 0_i64, 0_i64);
        for line in text.lines() {
            lines += 1;
            match classify_line(line, layout) {
                Some(FindingSeverity::Fatal) => fatal += 1,
                Some(FindingSeverity::Warning) => warnings += 1,
                None => {}
            }

            let Some(captures) = summary.captures(line) else {
                continue;
            };
            let (Some(key), Some(value)) = (captures.name("key"), captures.name("value")) else {
                continue;
            };
            let key = key.as_str().trim().to_string();
            if record.meta(&key).is_some() {
                continue;
            }
            let Ok(value) = parse_fortran_f64(value.as_str()) else {
                continue;
            };
            if let Some(unit) = captures
                .name("unit")
                .map(|unit| unit.as_str().trim())
                .filter(|unit| !unit.is_empty())
            {
                record.insert_meta(format!("{key} [unit]"), MetaValue::Text(unit.to_string()));
            }
            record.insert_meta(key, MetaValue::Number(value));
        }

        Ok(record
            .with_meta("log.lines", MetaValue::Integer(lines))
            .with_meta("log.fatal_markers", MetaValue::Integer(fatal))
            .with_meta("log.warning_markers", MetaValue::Integer(warnings)))
    }
}

#[cfg(test)]
mod tests {
    use super::LogDecoder;
    use crate::domain::{ArtifactKind, MetaValue, SpectralAxis};
    use crate::parsers::layouts::EngineVersion;
    use crate::parsers::{ArtifactDecoder, DecodeContext};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn summary_lines_and_markers_are_counted() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("case.tp6");
        fs::write(
            &path,
            "  MODTRAN(R) 6.0.2.5\n \
             INTEGRATED RADIANCE = 1.2345E-03 W/cm2/sr\n \
             *** WARNING  surface albedo clipped\n \
             INTEGRATED RADIANCE = 9.9E-01 W/cm2/sr\n \
             BOUNDARY TEMPERATURE = 294.2 K\n",
        )
        .expect("log should be written");

        let context = DecodeContext {
            kind: ArtifactKind::Log,
            layouts: EngineVersion::V6.layouts(),
            plot_axis: SpectralAxis::Wavenumber,
        };
        let record = LogDecoder.decode(&path, &context).expect("log should decode");

        assert_eq!(record.meta("INTEGRATED RADIANCE"), Some(&MetaValue::Number(1.2345e-3)));
        assert_eq!(
            record.meta("INTEGRATED RADIANCE [unit]"),
            Some(&MetaValue::Text("W/cm2/sr".to_string()))
        );
        assert_eq!(record.meta("BOUNDARY TEMPERATURE"), Some(&MetaValue::Number(294.2)));
        assert_eq!(record.meta("log.lines"), Some(&MetaValue::Integer(5)));
        assert_eq!(record.meta("log.warning_markers"), Some(&MetaValue::Integer(1)));
        assert_eq!(record.meta("log.fatal_markers"), Some(&MetaValue::Integer(0)));
        assert_eq!(record.row_count(), 0);
    }
}
