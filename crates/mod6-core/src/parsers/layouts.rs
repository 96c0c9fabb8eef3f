//! Artifact layouts, declared once per supported engine release.

use crate::domain::SpectralAxis;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

static RELEASE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)").expect("release pattern should compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineVersion {
    #[default]
    V6,
}

impl EngineVersion {
    pub const ALL: [Self; 1] = [Self::V6];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V6 => "6",
        }
    }

    /// Picks the release out of `-version` output such as `MODTRAN(R) 6.0.2.5`.
    pub fn parse(version_text: &str) -> Option<Self> {
        let captures = RELEASE_NUMBER.captures(version_text)?;
        match captures.name("major")?.as_str() {
            "6" => Some(Self::V6),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches(['v', 'V']) {
            "6" => Some(Self::V6),
            _ => None,
        }
    }

    pub fn layouts(self) -> &'static EngineLayouts {
        match self {
            Self::V6 => &V6_LAYOUTS,
        }
    }
}

impl Display for EngineVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.as_str())
    }
}

#[derive(Debug)]
pub struct EngineLayouts {
    pub log: LogLayout,
    pub tape7: Tape7Layout,
    pub tape7_binary: Tape7BinaryLayout,
    pub acd: AcdLayout,
    pub plot: PlotLayout,
    pub csv: CsvLayout,
    pub sli: SliLayout,
    pub bundle: BundleLayout,
}

#[derive(Debug)]
pub struct LogLayout {
    pub fatal_markers: &'static [&'static str],
    pub warning_markers: &'static [&'static str],
    /// `key = value` lines reporting integrated quantities.
    pub summary: LazyLock<Regex>,
}

/// Quantity columns written for one execution mode.
#[derive(Debug)]
pub struct QuantitySet {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

#[derive(Debug)]
pub struct Tape7Layout {
    /// Column-label prefixes that end the header block, with the grid unit each announces.
    pub grid_labels: &'static [(&'static str, SpectralAxis)],
    pub grid_width: usize,
    pub quantity_width: usize,
    pub terminator: &'static str,
    pub quantity_sets: &'static [&'static QuantitySet],
}

impl Tape7Layout {
    pub fn quantity_set(&self, count: usize) -> Option<&'static QuantitySet> {
        self.quantity_sets
            .iter()
            .copied()
            .find(|set| set.columns.len() == count)
    }
}

/// One binary row: marker word, grid value, quantities, optional trailer, marker word.
#[derive(Debug)]
pub struct BinaryRowLayout {
    pub marker: u32,
    pub quantities: &'static QuantitySet,
    /// Zero words before the `99.0` filler and its closing zero word.
    pub trailer_zero_words: Option<usize>,
}

impl BinaryRowLayout {
    /// Payload bytes between the two marker words.
    pub const fn payload_len(&self) -> usize {
        let values = (1 + self.quantities.columns.len()) * 4;
        match self.trailer_zero_words {
            Some(zeros) => values + zeros * 4 + 8,
            None => values,
        }
    }

    pub const fn record_len(&self) -> usize {
        self.payload_len() + 8
    }
}

#[derive(Debug)]
pub struct Tape7BinaryLayout {
    pub header_len: usize,
    pub rows: &'static [BinaryRowLayout],
    pub filler: f32,
}

impl Tape7BinaryLayout {
    pub fn row_layout(&self, marker: u32) -> Option<&BinaryRowLayout> {
        self.rows.iter().find(|row| row.marker == marker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcdField {
    Float,
    Integer,
}

#[derive(Debug)]
pub struct AcdLayout {
    pub text_header_lines: usize,
    pub text_widths: &'static [usize],
    pub columns: &'static [(&'static str, AcdField)],
    pub record_len: usize,
    pub record_marker: i32,
    pub header_sentinel: f32,
    /// Band-model code in the header, with the algorithm it identifies.
    pub algorithms: &'static [(i32, &'static str)],
}

impl AcdLayout {
    pub fn algorithm(&self, code: i32) -> Option<&'static str> {
        self.algorithms
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, name)| *name)
    }
}

#[derive(Debug)]
pub struct PlotLayout {
    pub widths: &'static [usize],
    pub value_column: &'static str,
}

#[derive(Debug)]
pub struct CsvLayout {
    pub delimiter: char,
    pub grid_labels: &'static [(&'static str, SpectralAxis)],
}

#[derive(Debug)]
pub struct SliLayout {
    pub magic: &'static str,
    pub float_types: &'static [(u32, usize)],
    pub wavelength_units: &'static [(&'static str, SpectralAxis)],
}

impl SliLayout {
    pub fn sample_size(&self, data_type: u32) -> Option<usize> {
        self.float_types
            .iter()
            .find(|(code, _)| *code == data_type)
            .map(|(_, size)| *size)
    }

    pub fn axis(&self, units: &str) -> Option<SpectralAxis> {
        let units = units.trim();
        self.wavelength_units
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(units))
            .map(|(_, axis)| *axis)
    }
}

#[derive(Debug)]
pub struct BundleLayout {
    pub status_key: &'static str,
    pub output_key: &'static str,
    pub spectra_key: &'static str,
    pub spectra_groups: &'static [&'static str],
    pub grid_keys: &'static [(&'static str, SpectralAxis)],
}

pub static TRANSMITTANCE: QuantitySet = QuantitySet {
    name: "transmittance",
    columns: &[
        "combin trans",
        "H2O trans",
        "umix trans",
        "O3 trans",
        "trace trans",
        "N2 trans",
        "H2Ocnt trans",
        "molec scat",
        "aercld trans",
        "HNO3 trans",
        "aercld abtrns",
        "-log combin",
        "CO2 trans",
        "CO trans",
        "CH4 trans",
        "N2O trans",
        "O2 trans",
        "NH3 trans",
        "NO trans",
        "NO2 trans",
        "SO2 trans",
        "cloud trans",
        "F11 trans",
        "F12 trans",
        "CCl3F trans",
        "CF4 trans",
        "F22 trans",
        "F113 trans",
        "F114 trans",
        "F115 trans",
        "ClONO2 trans",
        "HNO4 trans",
        "CHCl2F trans",
        "CCl4 trans",
        "N2O5 trans",
        "H2-H2 trans",
        "H2-He trans",
        "H2-CH4 trans",
        "CH4-CH4 trans",
    ],
};

pub static RADIANCE: QuantitySet = QuantitySet {
    name: "radiance",
    columns: &[
        "total transmittance",
        "path emission",
        "path thermal scat",
        "surface emission",
        "path multiple scat",
        "path single scat",
        "ground reflect",
        "direct reflect",
        "total radiance",
        "reference irradiance",
        "irradiance at observer",
        "- nat log path trans",
        "directional emissivity",
        "top-of-atmosphere irradiance",
        "brightness temp",
    ],
};

pub static THERMAL_RADIANCE: QuantitySet = QuantitySet {
    name: "thermal_radiance",
    columns: &[
        "total transmittance",
        "path emission",
        "path thermal scat",
        "surface emission",
        "ground reflect",
        "total radiance",
        "- nat log path trans",
        "directional emissivity",
        "brightness temp",
    ],
};

const GRID_LABELS: &[(&str, SpectralAxis)] = &[
    ("FREQ", SpectralAxis::Wavenumber),
    ("WAVLEN_UM", SpectralAxis::WavelengthMicrons),
    ("WAVLEN_NM", SpectralAxis::WavelengthNanometers),
];

static V6_LAYOUTS: EngineLayouts = EngineLayouts {
    log: LogLayout {
        fatal_markers: &["*** ERROR", "*** FATAL", "FATAL ERROR", "Error:"],
        warning_markers: &["*** WARNING", "WARNING:", "Warning:"],
        summary: LazyLock::new(|| {
            Regex::new(
                r"^\s*(?P<key>[A-Za-z][A-Za-z0-9 _()/.,-]*?)\s*=\s*(?P<value>[-+]?(?:\d+\.?\d*|\.\d+)(?:[EeDd][-+]?\d+)?)\s*(?P<unit>[A-Za-z/\-0-9^ ]*?)\s*$",
            )
            .expect("log summary pattern should compile")
        }),
    },
    tape7: Tape7Layout {
        grid_labels: GRID_LABELS,
        grid_width: 10,
        quantity_width: 11,
        terminator: "-9999.",
        quantity_sets: &[&TRANSMITTANCE, &RADIANCE, &THERMAL_RADIANCE],
    },
    tape7_binary: Tape7BinaryLayout {
        header_len: 0x6F,
        rows: &[
            BinaryRowLayout {
                marker: 0x48,
                quantities: &THERMAL_RADIANCE,
                trailer_zero_words: Some(6),
            },
            BinaryRowLayout {
                marker: 0x74,
                quantities: &RADIANCE,
                trailer_zero_words: Some(11),
            },
            BinaryRowLayout {
                marker: 0xA0,
                quantities: &TRANSMITTANCE,
                trailer_zero_words: None,
            },
        ],
        filler: 99.0,
    },
    acd: AcdLayout {
        text_header_lines: 5,
        text_widths: &[10, 5, 5, 10, 10, 10, 10, 10, 10],
        columns: &[
            ("freq", AcdField::Float),
            ("los", AcdField::Integer),
            ("k_int", AcdField::Integer),
            ("k_weight", AcdField::Float),
            ("sun_gnd_diffuse_transm", AcdField::Float),
            ("sun_gnd_obs_direct_transm", AcdField::Float),
            ("obs_gnd_embedded_dif_transm", AcdField::Float),
            ("obs_gnd_direct_transm", AcdField::Float),
            ("spherical_albedo", AcdField::Float),
        ],
        record_len: 44,
        record_marker: 0x24,
        header_sentinel: -9999.0,
        algorithms: &[
            (1, "RT_MODTRAN"),
            (17, "RT_CORRK_FAST"),
            (33, "RT_CORRK_SLOW"),
            (100, "RT_LINE_BY_LINE"),
        ],
    },
    plot: PlotLayout {
        widths: &[12, 14],
        value_column: "value",
    },
    csv: CsvLayout {
        delimiter: ',',
        grid_labels: &[
            ("Freq (cm-1)", SpectralAxis::Wavenumber),
            ("Wavlen (um)", SpectralAxis::WavelengthMicrons),
            ("Wavlen (nm)", SpectralAxis::WavelengthNanometers),
        ],
    },
    sli: SliLayout {
        magic: "ENVI",
        float_types: &[(4, 4), (5, 8)],
        wavelength_units: &[
            ("Micrometers", SpectralAxis::WavelengthMicrons),
            ("um", SpectralAxis::WavelengthMicrons),
            ("Nanometers", SpectralAxis::WavelengthNanometers),
            ("nm", SpectralAxis::WavelengthNanometers),
            ("Wavenumber", SpectralAxis::Wavenumber),
            ("cm-1", SpectralAxis::Wavenumber),
        ],
    },
    bundle: BundleLayout {
        status_key: "MODTRANSTATUS",
        output_key: "MODTRANOUTPUT",
        spectra_key: "SPECTRA",
        spectra_groups: &["TRANSMITTANCE", "RADIANCE", "IRRADIANCE"],
        grid_keys: GRID_LABELS,
    },
};

#[cfg(test)]
mod tests {
    use super::EngineVersion;

    #[test]
    fn binary_row_lengths_match_their_markers() {
        let layout = &EngineVersion::V6.layouts().tape7_binary;
        for row in layout.rows {
            assert_eq!(row.payload_len(), row.marker as usize);
        }
    }

    #[test]
    fn text_layouts_are_selected_by_quantity_count() {
        let tape7 = &EngineVersion::V6.layouts().tape7;
        assert_eq!(tape7.quantity_set(39).map(|set| set.name), Some("transmittance"));
        assert_eq!(tape7.quantity_set(15).map(|set| set.name), Some("radiance"));
        assert_eq!(tape7.quantity_set(9).map(|set| set.name), Some("thermal_radiance"));
        assert!(tape7.quantity_set(12).is_none());

        let acd = &EngineVersion::V6.layouts().acd;
        assert_eq!(acd.text_widths.len(), acd.columns.len());
        assert_eq!(acd.record_len, (acd.columns.len() + 2) * 4);
    }

    #[test]
    fn releases_parse_from_version_output() {
        assert_eq!(EngineVersion::parse("MODTRAN(R) 6.0.2.5"), Some(EngineVersion::V6));
        assert_eq!(EngineVersion::parse("MODTRAN(R) 5.3.2"), None);
        assert_eq!(EngineVersion::parse("unknown"), None);
        assert_eq!(EngineVersion::from_name("v6"), Some(EngineVersion::V6));
    }
}
