//! Spectral tables: the fixed-column text `tp7`/`7sc` files and the binary `_b.tp7`.

use super::layouts::{BinaryRowLayout, QuantitySet, Tape7BinaryLayout, Tape7Layout};
use super::{ArtifactDecoder, DecodeContext, Words, build_record, read_bytes, read_text};
use crate::common::fortran::{parse_fortran_f64, split_fixed_fields};
use crate::domain::{CaseError, MetaValue, ParsedRecord, SpectralAxis};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct Tape7TextDecoder;

impl ArtifactDecoder for Tape7TextDecoder {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let text = read_text(path, context.kind)?;
        let layout = &context.layouts.tape7;
        let malformed = |detail: String| CaseError::malformed(context.kind, path, detail);

        let mut lines = text.lines().enumerate();
        let mut header = Vec::new();
        let axis = loop {
            let Some((_, line)) = lines.next() else {
                return Err(malformed("no column-label line before the data".to_string()));
            };
            if let Some(axis) = label_axis(line, layout) {
                break axis;
            }
            header.push(line.trim_end().to_string());
        };

        let mut set: Option<&'static QuantitySet> = None;
        let mut grid = Vec::new();
        let mut quantities: Vec<Vec<f64>> = Vec::new();
        let mut terminated = false;
        for (index, line) in lines {
            let row = index + 1;
            let trimmed = line.trim();
            if trimmed == layout.terminator {
                terminated = true;
                break;
            }
            if trimmed.is_empty() {
                continue;
            }

            let set = match set {
                Some(set) => set,
                None => {
                    let chosen = quantity_set_for(line, layout)
                        .map_err(|detail| malformed(format!("line {row}: {detail}")))?;
                    quantities = vec![Vec::new(); chosen.columns.len()];
                    set = Some(chosen);
                    chosen
                }
            };
            let widths = std::iter::once(layout.grid_width)
                .chain(std::iter::repeat_n(layout.quantity_width, set.columns.len()))
                .collect::<Vec<_>>();
            let fields = split_fixed_fields(line, &widths)
                .map_err(|detail| malformed(format!("line {row}: {detail}")))?;
            let mut values = fields.iter().map(|field| parse_fortran_f64(field));

            grid.push(
                values
                    .next()
                    .transpose()
                    .map_err(|detail| malformed(format!("line {row}: {detail}")))?
                    .unwrap_or_default(),
            );
            for (column, value) in quantities.iter_mut().zip(values) {
                column.push(value.map_err(|detail| malformed(format!("line {row}: {detail}")))?);
            }
        }

        if !terminated {
            return Err(malformed(format!(
                "missing '{}' terminator line",
                layout.terminator
            )));
        }
        let Some(set) = set else {
            return Err(malformed("no data rows".to_string()));
        };

        let columns = set
            .columns
            .iter()
            .map(|name| name.to_string())
            .zip(quantities)
            .collect();
        Ok(build_record(context, path, Some((axis, grid)), columns)?
            .with_meta("quantity_set", MetaValue::Text(set.name.to_string()))
            .with_meta("header", MetaValue::Lines(header)))
    }
}

fn label_axis(line: &str, layout: &Tape7Layout) -> Option<SpectralAxis> {
    let first = line.split_whitespace().next()?;
    layout
        .grid_labels
        .iter()
        .find(|(label, _)| first.eq_ignore_ascii_case(label))
        .map(|(_, axis)| *axis)
}

fn quantity_set_for(line: &str, layout: &Tape7Layout) -> Result<&'static QuantitySet, String> {
    let width = line.trim_end().len();
    let quantity_chars = width
        .checked_sub(layout.grid_width)
        .filter(|chars| *chars > 0 && chars % layout.quantity_width == 0)
        .ok_or_else(|| format!("row width {width} does not fit the column layout"))?;
    let count = quantity_chars / layout.quantity_width;
    layout
        .quantity_set(count)
        .ok_or_else(|| format!("no quantity set has {count} columns"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tape7BinaryDecoder;

impl ArtifactDecoder for Tape7BinaryDecoder {
    /// The first row's marker selects the row layout; every row must repeat it.
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let bytes = read_bytes(path)?;
        let layout = &context.layouts.tape7_binary;
        let malformed = |detail: String| CaseError::malformed(context.kind, path, detail);

        let body = bytes
            .get(layout.header_len..)
            .filter(|body| body.len() >= 4)
            .ok_or_else(|| {
                malformed(format!(
                    "{} bytes is shorter than the {}-byte header plus one row marker",
                    bytes.len(),
                    layout.header_len
                ))
            })?;
        let marker = Words::new(body).u32(0).unwrap_or_default();
        let row = layout
            .row_layout(marker)
            .ok_or_else(|| malformed(format!("unknown row marker 0x{marker:X}")))?;
        let record_len = row.record_len();
        if body.len() % record_len != 0 {
            return Err(malformed(format!(
                "{} data bytes is not a whole number of {record_len}-byte rows",
                body.len()
            )));
        }

        let mut grid = Vec::new();
        let mut quantities = vec![Vec::new(); row.quantities.columns.len()];
        for (index, record) in body.chunks_exact(record_len).enumerate() {
            decode_row(record, row, layout, &mut grid, &mut quantities)
                .map_err(|detail| malformed(format!("row {}: {detail}", index + 1)))?;
        }

        let columns = row
            .quantities
            .columns
            .iter()
            .map(|name| name.to_string())
            .zip(quantities)
            .collect();
        Ok(
            build_record(context, path, Some((SpectralAxis::Wavenumber, grid)), columns)?
                .with_meta("quantity_set", MetaValue::Text(row.quantities.name.to_string()))
                .with_meta("row_marker", MetaValue::Integer(i64::from(marker))),
        )
    }
}

fn decode_row(
    record: &[u8],
    row: &BinaryRowLayout,
    layout: &Tape7BinaryLayout,
    grid: &mut Vec<f64>,
    quantities: &mut [Vec<f64>],
) -> Result<(), String> {
    let words = Words::new(record);
    let last = record.len() / 4 - 1;
    let (leading, trailing) = (words.u32(0), words.u32(last));
    if leading != Some(row.marker) || trailing != Some(row.marker) {
        return Err(format!(
            "record markers {leading:?}/{trailing:?} do not match 0x{:X}",
            row.marker
        ));
    }

    let read = |index: usize| {
        words
            .f32(index)
            .map(f64::from)
            .ok_or_else(|| format!("word {index} is out of range"))
    };
    grid.push(read(1)?);
    for (offset, column) in quantities.iter_mut().enumerate() {
        column.push(read(2 + offset)?);
    }

    if let Some(zeros) = row.trailer_zero_words {
        let filler_index = 2 + row.quantities.columns.len() + zeros;
        if words.f32(filler_index) != Some(layout.filler) {
            return Err(format!("missing {} filler word", layout.filler));
        }
    }
    Ok(())
}
