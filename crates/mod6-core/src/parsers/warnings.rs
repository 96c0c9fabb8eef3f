use super::{ArtifactDecoder, DecodeContext, read_bytes};
use crate::domain::{CaseError, MetaValue, ParsedRecord};
use std::path::Path;

/// The `.wrn` file: one engine warning per non-blank line.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarningsDecoder;

impl ArtifactDecoder for WarningsDecoder {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let bytes = read_bytes(path)?;
        let warnings = String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        Ok(ParsedRecord::metadata_only(context.kind)
            .with_meta("count", MetaValue::Integer(warnings.len() as i64))
            .with_meta("warnings", MetaValue::Lines(warnings)))
    }
}

#[cfg(test)]
mod tests {
    use super::WarningsDecoder;
    use crate::domain::{ArtifactKind, MetaValue, SpectralAxis};
    use crate::parsers::layouts::EngineVersion;
    use crate::parsers::{ArtifactDecoder, DecodeContext};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn blank_lines_are_not_warnings() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("case.wrn");
        fs::write(&path, "\n WARNING: H2O scaled \n\nWARNING: DV coarsened\n").expect("file should be written");

        let context = DecodeContext {
            kind: ArtifactKind::Warnings,
            layouts: EngineVersion::V6.layouts(),
            plot_axis: SpectralAxis::Wavenumber,
        };
        let record = WarningsDecoder.decode(&path, &context).expect("warnings should decode");
        assert_eq!(record.meta("count"), Some(&MetaValue::Integer(2)));
        assert_eq!(
            record.meta("warnings"),
            Some(&MetaValue::Lines(vec![
                "WARNING: H2O scaled".to_string(),
                "WARNING: DV coarsened".to_string()
            ]))
        );
    }
}
