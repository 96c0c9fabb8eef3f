//! Atmospheric-correction band data, `.acd` text and `_b.acd` binary.

use super::layouts::{AcdField, AcdLayout};
use super::{ArtifactDecoder, DecodeContext, Words, build_record, read_bytes, read_text};
use crate::common::fortran::{parse_fortran_f64, split_fixed_fields};
use crate::domain::{CaseError, Grid, MetaValue, ParsedRecord, SpectralAxis};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct AcdTextDecoder;

impl ArtifactDecoder for AcdTextDecoder {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let text = read_text(path, context.kind)?;
        let layout = &context.layouts.acd;
        let malformed = |detail: String| CaseError::malformed(context.kind, path, detail);

        let lines = text.lines().collect::<Vec<_>>();
        if lines.len() < layout.text_header_lines {
            return Err(malformed(format!(
                "{} lines is shorter than the {}-line header",
                lines.len(),
                layout.text_header_lines
            )));
        }

        let mut columns = empty_columns(layout);
        for (index, line) in lines.iter().enumerate().skip(layout.text_header_lines) {
            if line.trim().is_empty() {
                continue;
            }
            let row = index + 1;
            let fields = split_fixed_fields(line, layout.text_widths)
                .map_err(|detail| malformed(format!("line {row}: {detail}")))?;
            for ((field, (name, kind)), column) in
                fields.iter().zip(layout.columns).zip(columns.iter_mut())
            {
                let value = parse_fortran_f64(field)
                    .and_then(|value| check_field(value, *kind))
                    .map_err(|detail| malformed(format!("line {row}, {name}: {detail}")))?;
                column.1.push(value);
            }
        }
        if columns[0].1.is_empty() {
            return Err(malformed("no data rows".to_string()));
        }

        let header = lines[..layout.text_header_lines]
            .iter()
            .map(|line| line.trim_end().to_string())
            .collect();
        Ok(band_record(context, path, columns)?.with_meta("header", MetaValue::Lines(header)))
    }
}

fn check_field(value: f64, kind: AcdField) -> Result<f64, String> {
    match kind {
        AcdField::Integer if value.fract() != 0.0 => {
            Err(format!("expected an integer, found {value}"))
        }
        _ => Ok(value),
    }
}

fn empty_columns(layout: &AcdLayout) -> Vec<(String, Vec<f64>)> {
    layout
        .columns
        .iter()
        .map(|(name, _)| (name.to_string(), Vec::new()))
        .collect()
}

/// Band frequencies repeat across lines of sight and k sub-intervals, so the
/// record carries a grid only when they happen to be strictly monotonic.
fn band_record(
    context: &DecodeContext,
    path: &Path,
    columns: Vec<(String, Vec<f64>)>,
) -> Result<ParsedRecord, CaseError> {
    let grid = columns
        .first()
        .filter(|(_, freq)| Grid::new(SpectralAxis::Wavenumber, freq.clone()).is_ok())
        .map(|(_, freq)| (SpectralAxis::Wavenumber, freq.clone()));
    build_record(context, path, grid, columns)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcdBinaryDecoder;

impl ArtifactDecoder for AcdBinaryDecoder {
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let bytes = read_bytes(path)?;
        let layout = &context.layouts.acd;
        let malformed = |detail: String| CaseError::malformed(context.kind, path, detail);

        if bytes.len() < layout.record_len * 2 {
            return Err(malformed(format!(
                "{} bytes holds no data record after the header",
                bytes.len()
            )));
        }
        if bytes.len() % layout.record_len != 0 {
            return Err(malformed(format!(
                "{} bytes is not a whole number of {}-byte records",
                bytes.len(),
                layout.record_len
            )));
        }

        let (header, body) = bytes.split_at(layout.record_len);
        let code = check_header(header, layout)
            .map_err(|detail| malformed(format!("bad header: {detail}")))?;

        let mut columns = empty_columns(layout);
        for (index, record) in body.chunks_exact(layout.record_len).enumerate() {
            decode_record(record, layout, &mut columns)
                .map_err(|detail| malformed(format!("record {}: {detail}", index + 1)))?;
        }

        let k_int = columns
            .iter()
            .find(|(name, _)| name == "k_int")
            .map(|(_, values)| values.iter().map(|value| *value as i64).collect::<Vec<_>>())
            .unwrap_or_default();
        check_k_progression(&k_int, code).map_err(malformed)?;

        let algorithm = layout.algorithm(code).unwrap_or_default();
        Ok(band_record(context, path, columns)?
            .with_meta("band_model_code", MetaValue::Integer(i64::from(code)))
            .with_meta("algorithm", MetaValue::Text(algorithm.to_string())))
    }
}

/// Returns the band-model code once every fixed header word checks out.
fn check_header(header: &[u8], layout: &AcdLayout) -> Result<i32, String> {
    let words = Words::new(header);
    let last = layout.record_len / 4 - 1;
    if words.i32(0) != Some(layout.record_marker) || words.i32(last) != Some(layout.record_marker) {
        return Err(format!(
            "expected 0x{:X} in the first and last words",
            layout.record_marker
        ));
    }
    if words.f32(1) != Some(layout.header_sentinel) {
        return Err(format!("expected {} sentinel in the second word", layout.header_sentinel));
    }
    if words.i32(2) != Some(0) {
        return Err("expected the third word to be 0".to_string());
    }
    let code = words.i32(3).unwrap_or_default();
    if layout.algorithm(code).is_none() {
        return Err(format!("unknown band-model code {code}"));
    }
    if (4..last - 1).any(|index| words.i32(index) != Some(0)) {
        return Err(format!("expected words 4 through {} to be zero", last - 2));
    }
    Ok(code)
}

fn decode_record(
    record: &[u8],
    layout: &AcdLayout,
    columns: &mut [(String, Vec<f64>)],
) -> Result<(), String> {
    let words = Words::new(record);
    let last = layout.record_len / 4 - 1;
    let (leading, trailing) = (words.i32(0), words.i32(last));
    if leading != Some(layout.record_marker) || trailing != Some(layout.record_marker) {
        return Err(format!(
            "record markers {leading:?}/{trailing:?} do not match 0x{:X}",
            layout.record_marker
        ));
    }
    for (offset, ((_, kind), (_, column))) in layout.columns.iter().zip(columns.iter_mut()).enumerate() {
        let index = offset + 1;
        let value = match kind {
            AcdField::Float => words.f32(index).map(f64::from),
            AcdField::Integer => words.i32(index).map(f64::from),
        };
        column.push(value.ok_or_else(|| format!("word {index} is out of range"))?);
    }
    Ok(())
}

/// A correlated-k file must open and close with a full `1..=code` progression.
fn check_k_progression(k_int: &[i64], code: i32) -> Result<(), String> {
    let Ok(count) = usize::try_from(code) else {
        return Err(format!("band-model code {code} is negative"));
    };
    if count <= 1 {
        return Ok(());
    }
    let expected = (1..=code as i64).collect::<Vec<_>>();
    let leading = &k_int[..count.min(k_int.len())];
    let trailing = &k_int[k_int.len().saturating_sub(count)..];
    if leading != expected.as_slice() || trailing != expected.as_slice() {
        return Err(format!(
            "unexpected k_int progression for code {code}: starts {:?}, ends {:?}",
            &leading[..leading.len().min(4)],
            &trailing[trailing.len().saturating_sub(4)..]
        ));
    }
    Ok(())
}
