use super::{ArtifactDecoder, DecodeContext, build_record, read_text};
use crate::common::fortran::{parse_fortran_f64, split_fixed_fields};
use crate::domain::{CaseError, MetaValue, ParsedRecord};
use std::path::Path;

/// Two-column `.plt`/`.psc` tables. The file carries no unit, so the grid
/// takes the axis the case requested through `XFLAG`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotDecoder;

impl ArtifactDecoder for PlotDecoder {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let text = read_text(path, context.kind)?;
        let layout = &context.layouts.plot;
        let malformed = |detail: String| CaseError::malformed(context.kind, path, detail);

        let mut grid = Vec::new();
        let mut values = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = index + 1;
            let fields = split_fixed_fields(line, layout.widths)
                .map_err(|detail| malformed(format!("line {row}: {detail}")))?;
            let mut parsed = fields.iter().map(|field| parse_fortran_f64(field));
            let (Some(x), Some(y)) = (parsed.next(), parsed.next()) else {
                return Err(malformed(format!("line {row}: expected two fields")));
            };
            grid.push(x.map_err(|detail| malformed(format!("line {row}: {detail}")))?);
            values.push(y.map_err(|detail| malformed(format!("line {row}: {detail}")))?);
        }
        if grid.is_empty() {
            return Err(malformed("no data rows".to_string()));
        }

        Ok(build_record(
            context,
            path,
            Some((context.plot_axis, grid)),
            vec![(layout.value_column.to_string(), values)],
        )?
        .with_meta(
            "axis_unit",
            MetaValue::Text(context.plot_axis.unit().to_string()),
        ))
    }
}
