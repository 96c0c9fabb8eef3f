//! Ready-made starting cases for common spectral regions.

use super::CaseRequest;
use crate::common::units::{SiPrefix, SpectralValue};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseCase {
    Base,
    Vnir,
    Swir,
    VnirSwir,
    Lwir,
}

impl BaseCase {
    pub const ALL: [Self; 5] = [
        Self::Base,
        Self::Vnir,
        Self::Swir,
        Self::VnirSwir,
        Self::Lwir,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "base" => Some(Self::Base),
            "vnir" => Some(Self::Vnir),
            "swir" => Some(Self::Swir),
            "vnir_swir" => Some(Self::VnirSwir),
            "lwir" => Some(Self::Lwir),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Vnir => "vnir",
            Self::Swir => "swir",
            Self::VnirSwir => "vnir_swir",
            Self::Lwir => "lwir",
        }
    }

    /// Spectral bounds in cm-1, lower first. `Base` leaves them unset.
    pub fn bounds(self) -> Option<(f64, f64)> {
        let nm = |value: f64| wavenumber(value, SiPrefix::Nano);
        let um = |value: f64| wavenumber(value, SiPrefix::Micro);
        match self {
            Self::Base => None,
            Self::Vnir => Some((nm(1400.0), nm(400.0))),
            Self::Swir => Some((nm(2500.0), nm(1400.0))),
            Self::VnirSwir => Some((nm(2500.0), nm(400.0))),
            Self::Lwir => Some((um(14.0), um(8.0))),
        }
    }

    /// The case fragment, suitable for [`CaseRequest::merge`].
    pub fn fragment(self) -> Value {
        let mut fragment = json!({
            "RTOPTIONS": {
                "IEMSCT": "RT_SOLAR_AND_THERMAL",
                "MODTRN": "RT_MODTRAN",
                "IMULT": "RT_DISORT",
                "DISALB": true,
            },
            "SURFACE": {
                "SURFTYPE": "REFL_CONSTANT",
                "SURREF": 1.0,
            },
            "SPECTRAL": {
                "DV": 1.0,
                "FWHM": 2.0,
                "LBMNAM": "T",
                "BMNAME": "01_2013",
            },
        });
        if let Some((v1, v2)) = self.bounds() {
            fragment["SPECTRAL"]["V1"] = json!(v1);
            fragment["SPECTRAL"]["V2"] = json!(v2);
        }
        fragment
    }

    pub fn request(self, name: &str) -> CaseRequest {
        let mut request = CaseRequest::new(name);
        if let Value::Object(sections) = self.fragment() {
            for (section, options) in sections {
                if let Value::Object(options) = options {
                    for (option, value) in options {
                        request = request.set(&section, &option, value);
                    }
                }
            }
        }
        request
    }
}

// Rounded to 1e-4 cm-1 so the bound survives a JSON round trip unchanged.
fn wavenumber(wavelength: f64, prefix: SiPrefix) -> f64 {
    let value = SpectralValue::wavelength(wavelength, prefix).as_wavenumber(SiPrefix::Centi);
    (value * 1.0e4).round() / 1.0e4
}
