use super::{ArtifactDecoder, DecodeContext, build_record, read_text};
use crate::common::fortran::parse_fortran_f64;
use crate::domain::{CaseError, ParsedRecord};
use std::path::Path;

/// Comma-delimited tables whose first header label names the grid and its unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDecoder;

impl ArtifactDecoder for CsvDecoder {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let text = read_text(path, context.kind)?;
        let layout = &context.layouts.csv;
        let malformed = |detail: String| CaseError::malformed(context.kind, path, detail);

        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let Some((_, header)) = lines.next() else {
            return Err(malformed("empty table".to_string()));
        };
        let labels = split_row(header, layout.delimiter);
        let grid_label = labels.first().copied().unwrap_or_default();
        let axis = layout
            .grid_labels
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(grid_label))
            .map(|(_, axis)| *axis)
            .ok_or_else(|| malformed(format!("unrecognized grid label '{grid_label}'")))?;
        if labels.len() < 2 {
            return Err(malformed("header names no quantity columns".to_string()));
        }

        let mut grid = Vec::new();
        let mut columns = labels[1..]
            .iter()
            .map(|label| (label.to_string(), Vec::new()))
            .collect::<Vec<_>>();
        for (index, line) in lines {
            let row = index + 1;
            let fields = split_row(line, layout.delimiter);
            if fields.len() != labels.len() {
                return Err(malformed(format!(
                    "line {row}: {} fields, header has {}",
                    fields.len(),
                    labels.len()
                )));
            }
            let mut values = fields.iter().map(|field| {
                parse_fortran_f64(field).map_err(|detail| malformed(format!("line {row}: {detail}")))
            });
            if let Some(value) = values.next() {
                grid.push(value?);
            }
            for (column, value) in columns.iter_mut().zip(values) {
                column.1.push(value?);
            }
        }
        if grid.is_empty() {
            return Err(malformed("no data rows".to_string()));
        }

        build_record(context, path, Some((axis, grid)), columns)
    }
}

fn split_row(line: &str, delimiter: char) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_suffix(delimiter).unwrap_or(line);
    line.split(delimiter).map(str::trim).collect()
}
