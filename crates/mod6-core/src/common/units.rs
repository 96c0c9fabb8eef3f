//! Conversions between frequency, wavelength and wavenumber.

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiPrefix {
    Peta,
    Tera,
    Giga,
    Mega,
    Kilo,
    Unit,
    Centi,
    Milli,
    Micro,
    Nano,
    Pico,
}

impl SiPrefix {
    pub const fn scale(self) -> f64 {
        match self {
            Self::Peta => 1e15,
            Self::Tera => 1e12,
            Self::Giga => 1e9,
            Self::Mega => 1e6,
            Self::Kilo => 1e3,
            Self::Unit => 1e0,
            Self::Centi => 1e-2,
            Self::Milli => 1e-3,
            Self::Micro => 1e-6,
            Self::Nano => 1e-9,
            Self::Pico => 1e-12,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "P" => Self::Peta,
            "T" => Self::Tera,
            "G" => Self::Giga,
            "M" => Self::Mega,
            "k" => Self::Kilo,
            "" | "-" => Self::Unit,
            "c" => Self::Centi,
            "m" => Self::Milli,
            "u" => Self::Micro,
            "n" => Self::Nano,
            "p" => Self::Pico,
            _ => return None,
        })
    }
}

/// A spectral coordinate held in SI base units and converted on demand.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum SpectralValue {
    /// Hz
    Frequency(f64),
    /// m
    Wavelength(f64),
    /// m-1
    Wavenumber(f64),
}

impl SpectralValue {
    pub fn frequency(value: f64, prefix: SiPrefix) -> Self {
        Self::Frequency(value * prefix.scale())
    }

    pub fn wavelength(value: f64, prefix: SiPrefix) -> Self {
        Self::Wavelength(value * prefix.scale())
    }

    pub fn wavenumber(value: f64, prefix: SiPrefix) -> Self {
        Self::Wavenumber(value / prefix.scale())
    }

    /// Parses a unit such as `THz`, `um` or `cm-1` and builds the matching value.
    pub fn with_unit(value: f64, unit: &str) -> Option<Self> {
        if let Some(prefix) = unit.strip_suffix("m-1") {
            return SiPrefix::from_symbol(prefix).map(|prefix| Self::wavenumber(value, prefix));
        }
        if let Some(prefix) = unit.strip_suffix("Hz") {
            return SiPrefix::from_symbol(prefix).map(|prefix| Self::frequency(value, prefix));
        }
        if let Some(prefix) = unit.strip_suffix('m') {
            return SiPrefix::from_symbol(prefix).map(|prefix| Self::wavelength(value, prefix));
        }
        None
    }

    pub fn as_frequency(self, prefix: SiPrefix) -> f64 {
        let hz = match self {
            Self::Frequency(hz) => hz,
            Self::Wavelength(m) => SPEED_OF_LIGHT / m,
            Self::Wavenumber(per_m) => SPEED_OF_LIGHT * per_m,
        };
        hz / prefix.scale()
    }

    pub fn as_wavelength(self, prefix: SiPrefix) -> f64 {
        let m = match self {
            Self::Frequency(hz) => SPEED_OF_LIGHT / hz,
            Self::Wavelength(m) => m,
            Self::Wavenumber(per_m) => 1.0 / per_m,
        };
        m / prefix.scale()
    }

    pub fn as_wavenumber(self, prefix: SiPrefix) -> f64 {
        let per_m = match self {
            Self::Frequency(hz) => hz / SPEED_OF_LIGHT,
            Self::Wavelength(m) => 1.0 / m,
            Self::Wavenumber(per_m) => per_m,
        };
        per_m * prefix.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::{SiPrefix, SpectralValue};

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn frequency_converts_to_wavelength_and_wavenumber() {
        let value = SpectralValue::frequency(120.0, SiPrefix::Tera);
        assert_close(value.as_wavelength(SiPrefix::Micro), 2.5, 0.01);
        assert_close(value.as_wavenumber(SiPrefix::Centi), 4000.0, 10.0);

        let microwave = SpectralValue::frequency(2.4, SiPrefix::Giga);
        assert_close(microwave.as_wavelength(SiPrefix::Centi), 12.5, 0.05);
        assert_close(
            SpectralValue::frequency(1.25, SiPrefix::Mega).as_frequency(SiPrefix::Kilo),
            1250.0,
            1e-9,
        );
    }

    #[test]
    fn wavelength_and_wavenumber_are_reciprocal() {
        let wavelength = SpectralValue::wavelength(2.5, SiPrefix::Micro);
        assert_close(wavelength.as_wavenumber(SiPrefix::Centi), 4000.0, 1e-9);

        let wavenumber = SpectralValue::wavenumber(4000.0, SiPrefix::Centi);
        assert_close(wavenumber.as_wavelength(SiPrefix::Micro), 2.5, 1e-12);
        assert_close(wavenumber.as_wavenumber(SiPrefix::Milli), 400.0, 1e-9);
        assert_close(
            SpectralValue::wavelength(4000.0, SiPrefix::Nano).as_wavelength(SiPrefix::Micro),
            4.0,
            1e-12,
        );
    }

    #[test]
    fn unit_strings_select_quantity_and_prefix() {
        let value = SpectralValue::with_unit(4000.0, "cm-1").expect("cm-1 should parse");
        assert_close(value.as_wavelength(SiPrefix::Micro), 2.5, 1e-12);
        let value = SpectralValue::with_unit(1400.0, "nm").expect("nm should parse");
        assert_close(value.as_wavenumber(SiPrefix::Centi), 7142.857142857143, 1e-6);
        assert!(SpectralValue::with_unit(1.0, "furlong").is_none());
        assert!(matches!(
            SpectralValue::with_unit(1.0, "GHz"),
            Some(SpectralValue::Frequency(_))
        ));
    }
}
