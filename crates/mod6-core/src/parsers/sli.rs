//! ENVI spectral libraries: a `key = value` text header beside a raw matrix of
//! one spectrum per line.

use super::{ArtifactDecoder, DecodeContext, build_record, read_bytes, read_text};
use crate::common::fortran::parse_fortran_f64;
use crate::domain::{CaseError, MetaValue, ParsedRecord};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct SliDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ArtifactDecoder for SliDecoder {
    /// `path` is the `.hdr` file; the matrix is read from its `.sli` sibling.
    fn decode(&self, path: &Path, context: &DecodeContext) -> Result<ParsedRecord, CaseError> {
        let text = read_text(path, context.kind)?;
        let layout = &context.layouts.sli;
        let malformed = |detail: String| CaseError::malformed(context.kind, path, detail);

        let fields = parse_header(&text, layout.magic).map_err(malformed)?;
        let count = |key: &str| -> Result<usize, CaseError> {
            let value = fields
                .get(key)
                .ok_or_else(|| malformed(format!("header is missing '{key}'")))?;
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| malformed(format!("'{key}' is not a count: '{}'", value.trim())))
        };
        let optional_count = |key: &str| -> Result<usize, CaseError> {
            if fields.contains_key(key) { count(key) } else { Ok(0) }
        };

        let samples = count("samples")?;
        let spectra = count("lines")?;
        let offset = optional_count("header offset")?;
        let data_type = count("data type")?;
        let sample_size = u32::try_from(data_type)
            .ok()
            .and_then(|code| layout.sample_size(code))
            .ok_or_else(|| malformed(format!("unsupported data type {data_type}")))?;
        let byte_order = match optional_count("byte order")? {
            0 => ByteOrder::Little,
            1 => ByteOrder::Big,
            other => return Err(malformed(format!("unsupported byte order {other}"))),
        };
        if samples == 0 || spectra == 0 {
            return Err(malformed("library holds no samples".to_string()));
        }

        let names = list(fields.get("spectra names").map(String::as_str).unwrap_or_default());
        if names.len() != spectra {
            return Err(malformed(format!(
                "{} spectra names for {spectra} lines",
                names.len()
            )));
        }
        let wavelengths = list(fields.get("wavelength").map(String::as_str).unwrap_or_default())
            .iter()
            .map(|value| parse_fortran_f64(value))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|detail| malformed(format!("wavelength list: {detail}")))?;
        if wavelengths.len() != samples {
            return Err(malformed(format!(
                "{} wavelengths for {samples} samples",
                wavelengths.len()
            )));
        }
        let units = fields
            .get("wavelength units")
            .map(String::as_str)
            .unwrap_or("Micrometers");
        let axis = layout
            .axis(units)
            .ok_or_else(|| malformed(format!("unsupported wavelength units '{}'", units.trim())))?;

        let data_path = path.with_extension("sli");
        let bytes = read_bytes(&data_path)?;
        let spectrum_bytes = samples
            .checked_mul(sample_size)
            .ok_or_else(|| malformed(format!("{samples} samples overflow the matrix size")))?;
        let expected = spectrum_bytes
            .checked_mul(spectra)
            .and_then(|matrix| matrix.checked_add(offset))
            .ok_or_else(|| {
                malformed(format!(
                    "{spectra}x{samples} samples at offset {offset} overflow the matrix size"
                ))
            })?;
        if bytes.len() != expected {
            return Err(CaseError::malformed(
                context.kind,
                &data_path,
                format!(
                    "{} bytes, expected {expected} for {spectra}x{samples} samples of {sample_size} bytes",
                    bytes.len()
                ),
            ));
        }

        let matrix = &bytes[offset..];
        let columns = names
            .iter()
            .enumerate()
            .map(|(line, name)| {
                let start = line * spectrum_bytes;
                let values = matrix[start..start + spectrum_bytes]
                    .chunks_exact(sample_size)
                    .map(|sample| decode_sample(sample, byte_order))
                    .collect();
                (name.to_string(), values)
            })
            .collect();

        let mut record = build_record(context, path, Some((axis, wavelengths)), columns)?;
        for key in ["description", "file type"] {
            if let Some(value) = fields.get(key) {
                record.insert_meta(key, MetaValue::Text(value.trim().to_string()));
            }
        }
        Ok(record)
    }
}

/// Splits the header into lowercase keys and raw values. Braced values may
/// span lines and keep their braces stripped.
fn parse_header(text: &str, magic: &str) -> Result<BTreeMap<String, String>, String> {
    let mut lines = text.lines();
    match lines.next() {
        Some(first) if first.trim() == magic => {}
        _ => return Err(format!("header does not start with '{magic}'")),
    }

    let mut fields = BTreeMap::new();
    let mut pending: Option<(String, String)> = None;
    for line in lines {
        if let Some((key, mut value)) = pending.take() {
            value.push('\n');
            value.push_str(line);
            match value.find('}') {
                Some(end) => {
                    value.truncate(end);
                    fields.insert(key, value);
                }
                None => pending = Some((key, value)),
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(format!("header line '{}' has no '='", line.trim()));
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        match value.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => {
                    fields.insert(key, braced[..end].to_string());
                }
                None => pending = Some((key, braced.to_string())),
            },
            None => {
                fields.insert(key, value.to_string());
            }
        }
    }
    if let Some((key, _)) = pending {
        return Err(format!("unterminated '{{' in '{key}'"));
    }
    Ok(fields)
}

fn list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

fn decode_sample(sample: &[u8], order: ByteOrder) -> f64 {
    match (sample.len(), order) {
        (4, ByteOrder::Little) => {
            f64::from(f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]))
        }
        (4, ByteOrder::Big) => {
            f64::from(f32::from_be_bytes([sample[0], sample[1], sample[2], sample[3]]))
        }
        (_, order) => {
            let mut raw = [0_u8; 8];
            raw.copy_from_slice(&sample[..8]);
            match order {
                ByteOrder::Little => f64::from_le_bytes(raw),
                ByteOrder::Big => f64::from_be_bytes(raw),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SliDecoder, parse_header};
    use crate::domain::{ArtifactKind, MetaValue, OutputVariant, SpectralAxis};
    use crate::parsers::layouts::EngineVersion;
    use crate::parsers::{ArtifactDecoder, DecodeContext};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn context() -> DecodeContext {
        DecodeContext {
            kind: ArtifactKind::SpectralLibrary(OutputVariant::Main),
            layouts: EngineVersion::V6.layouts(),
            plot_axis: SpectralAxis::Wavenumber,
        }
    }

    const HEADER: &str = "ENVI\ndescription = {\n  MODTRAN case}\nsamples = 3\nlines = 2\nbands = 1\nheader offset = 0\nfile type = ENVI Spectral Library\ndata type = 4\ninterleave = bsq\nbyte order = BYTE_ORDER\nwavelength units = Micrometers\nspectra names = {\n  path radiance,\n  total transmittance}\nwavelength = {\n 0.400000, 0.500000,\n 0.600000}\n";

    fn write_library(dir: &Path, byte_order: u8, values: &[f32]) -> std::path::PathBuf {
        let header = dir.join("case.hdr");
        fs::write(&header, HEADER.replace("BYTE_ORDER", &byte_order.to_string()))
            .expect("header should be written");
        let bytes = values
            .iter()
            .flat_map(|value| match byte_order {
                0 => value.to_le_bytes(),
                _ => value.to_be_bytes(),
            })
            .collect::<Vec<_>>();
        fs::write(dir.join("case.sli"), bytes).expect("matrix should be written");
        header
    }

    #[test]
    fn braced_values_span_lines() {
        let fields = parse_header(&HEADER.replace("BYTE_ORDER", "0"), "ENVI")
            .expect("header should parse");
        assert_eq!(fields["samples"], "3");
        assert!(fields["spectra names"].contains("total transmittance"));
        assert!(parse_header("NOT ENVI\n", "ENVI").is_err());
        assert!(parse_header("ENVI\nwavelength = {1, 2\n", "ENVI").is_err());
    }

    #[test]
    fn library_spectra_become_named_columns() {
        let temp = TempDir::new().expect("tempdir should be created");
        for byte_order in [0, 1] {
            let header = write_library(temp.path(), byte_order, &[1.0, 2.0, 3.0, 0.5, 0.25, 0.125]);
            let record = SliDecoder
                .decode(&header, &context())
                .expect("library should decode");
            let grid = record.grid().expect("grid");
            assert_eq!(grid.axis(), SpectralAxis::WavelengthMicrons);
            assert_eq!(grid.values(), &[0.4, 0.5, 0.6]);
            assert_eq!(record.column("path radiance"), Some(&[1.0, 2.0, 3.0][..]));
            assert_eq!(
                record.column("total transmittance"),
                Some(&[0.5, 0.25, 0.125][..])
            );
            assert_eq!(
                record.meta("file type"),
                Some(&MetaValue::Text("ENVI Spectral Library".to_string()))
            );
        }
    }

    #[test]
    fn matrix_size_must_match_the_header_exactly() {
        let temp = TempDir::new().expect("tempdir should be created");
        let header = write_library(temp.path(), 0, &[1.0, 2.0, 3.0, 0.5, 0.25]);
        let error = SliDecoder
            .decode(&header, &context())
            .expect_err("short matrix should fail");
        assert_eq!(error.placeholder(), "RUN.MALFORMED_ARTIFACT");
        assert!(error.to_string().contains("expected 24"), "{error}");
    }

    #[test]
    fn mismatched_name_count_is_malformed() {
        let temp = TempDir::new().expect("tempdir should be created");
        let header = write_library(temp.path(), 0, &[0.0; 6]);
        let text = fs::read_to_string(&header).expect("header should be readable");
        fs::write(&header, text.replace("lines = 2", "lines = 3")).expect("header should be written");

        let error = SliDecoder
            .decode(&header, &context())
            .expect_err("name count should fail");
        assert!(error.to_string().contains("2 spectra names for 3 lines"), "{error}");
    }

    #[test]
    fn oversized_header_offset_is_malformed() {
        let temp = TempDir::new().expect("tempdir should be created");
        let header = write_library(temp.path(), 0, &[0.0; 6]);
        let text = fs::read_to_string(&header).expect("header should be readable");
        fs::write(
            &header,
            text.replace("header offset = 0", &format!("header offset = {}", usize::MAX)),
        )
        .expect("header should be written");

        let error = SliDecoder
            .decode(&header, &context())
            .expect_err("overflowing size should fail");
        assert_eq!(error.placeholder(), "RUN.MALFORMED_ARTIFACT");
        assert!(error.to_string().contains("overflow"), "{error}");
    }
}
