//! Fixed-format numeric fields as the engine reads and writes them.

use std::fs;
use std::path::Path;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

/// Formats like a Fortran `1PEw.d` edit descriptor: one leading digit and a
/// signed two digit exponent, right aligned in `width`.
pub fn format_fortran_exp(value: f64, width: usize, precision: usize) -> String {
    let rendered = format!("{value:.precision$E}", precision = precision);
    let (mantissa, exponent) = rendered
        .split_once('E')
        .unwrap_or((rendered.as_str(), "0"));
    let exponent = exponent.parse::<i32>().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!(
        "{:>width$}",
        format!("{mantissa}E{sign}{:02}", exponent.abs()),
        width = width
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Parses one numeric field. Accepts `D` exponents and the exponent-without-`E`
/// form (`1.234-105`) that wide exponents produce; asterisk overflow fields are rejected.
pub fn parse_fortran_f64(field: &str) -> Result<f64, String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Err("empty numeric field".to_string());
    }
    if trimmed.contains('*') {
        return Err(format!("overflowed numeric field '{trimmed}'"));
    }

    let mut normalized = trimmed.replace(['D', 'd'], "E");
    if !normalized.contains(['E', 'e'])
        && let Some(position) = normalized
            .char_indices()
            .skip(1)
            .find(|(_, ch)| *ch == '+' || *ch == '-')
            .map(|(position, _)| position)
    {
        normalized.insert(position, 'E');
    }

    normalized
        .parse::<f64>()
        .map_err(|_| format!("invalid numeric field '{trimmed}'"))
}

/// Splits `line` at the declared column boundaries. The line must be exactly as
/// wide as the sum of `widths` once trailing blanks are removed.
pub fn split_fixed_fields<'a>(line: &'a str, widths: &[usize]) -> Result<Vec<&'a str>, String> {
    let content = line.trim_end();
    let expected = widths.iter().sum::<usize>();
    if !content.is_ascii() {
        return Err("row contains non-ASCII characters".to_string());
    }
    if content.len() != expected {
        return Err(format!(
            "row is {} characters wide, expected {expected}",
            content.len()
        ));
    }

    let mut fields = Vec::with_capacity(widths.len());
    let mut start = 0;
    for width in widths {
        fields.push(&content[start..start + width]);
        start += width;
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::{
        format_fixed_f64, format_fortran_exp, normalize_text_artifact, parse_fortran_f64,
        split_fixed_fields, write_text_artifact,
    };
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn fixed_width_float_formatting_is_deterministic() {
        assert_eq!(format_fixed_f64(1.23, 13, 5), "      1.23000");
        assert_eq!(format_fortran_exp(0.0125, 11, 4), " 1.2500E-02");
        assert_eq!(format_fortran_exp(-123.45, 11, 4), "-1.2345E+02");
        assert_eq!(format_fortran_exp(0.0, 11, 4), " 0.0000E+00");
    }

    #[test]
    fn fortran_numbers_accept_legacy_exponents() {
        assert_eq!(parse_fortran_f64(" 1.5D+02 "), Ok(150.0));
        assert_eq!(parse_fortran_f64("1.0-105"), Ok(1.0e-105));
        assert_eq!(parse_fortran_f64("-2.5+03"), Ok(-2500.0));
        assert_eq!(parse_fortran_f64("-9999."), Ok(-9999.0));
        assert!(parse_fortran_f64("*******").is_err());
        assert!(parse_fortran_f64("   ").is_err());
        assert!(parse_fortran_f64("1.2.3").is_err());
    }

    #[test]
    fn abutting_fields_split_on_declared_boundaries() {
        let line = "   400.00-1.2345E-02 9.8765E-01";
        let fields = split_fixed_fields(line, &[9, 11, 11]).expect("row should split");
        assert_eq!(fields, vec!["   400.00", "-1.2345E-02", " 9.8765E-01"]);

        let shifted = " 400.00-1.2345E-02 9.8765E-01";
        assert!(split_fixed_fields(shifted, &[9, 11, 11]).is_err());
    }

    #[test]
    fn repeated_text_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("artifact.dat");
        let input = "line 1\r\nline 2\rline 3";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");
        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"line 1\nline 2\nline 3\n");
        assert_eq!(normalize_text_artifact(""), "");
    }
}
