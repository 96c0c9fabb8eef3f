//! Options the engine recognizes, per section, with the value kind each accepts.

use crate::domain::ConfigProblem;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Float,
    Text,
    FloatList,
    /// One of a closed set of strings.
    Choice(&'static [&'static str]),
    /// One of a closed set of integers.
    IntChoice(&'static [i64]),
    /// Either a name from the list or its position in the list.
    Coded(&'static [&'static str]),
    /// Nested structure forwarded untouched.
    Json,
}

impl OptionKind {
    pub fn check(self, value: &Value) -> Result<(), String> {
        match self {
            Self::Bool => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| format!("expected a boolean, found {}", describe(value))),
            Self::Int => value
                .as_i64()
                .map(|_| ())
                .ok_or_else(|| format!("expected an integer, found {}", describe(value))),
            Self::Float => value
                .as_f64()
                .map(|_| ())
                .ok_or_else(|| format!("expected a number, found {}", describe(value))),
            Self::Text => value
                .as_str()
                .map(|_| ())
                .ok_or_else(|| format!("expected a string, found {}", describe(value))),
            Self::FloatList => match value.as_array() {
                Some(items) if items.iter().all(Value::is_number) => Ok(()),
                _ => Err(format!(
                    "expected a list of numbers, found {}",
                    describe(value)
                )),
            },
            Self::Choice(names) => match value.as_str() {
                Some(name) if names.contains(&name) => Ok(()),
                _ => Err(format!(
                    "expected one of [{}], found {}",
                    quote_all(names),
                    describe(value)
                )),
            },
            Self::IntChoice(codes) => match value.as_i64() {
                Some(code) if codes.contains(&code) => Ok(()),
                _ => Err(format!(
                    "expected one of {codes:?}, found {}",
                    describe(value)
                )),
            },
            Self::Coded(names) => match coded_index(names, value) {
                Some(_) => Ok(()),
                None => Err(format!(
                    "expected one of [{}] or 0..{}, found {}",
                    quote_all(names),
                    names.len() - 1,
                    describe(value)
                )),
            },
            Self::Json => Ok(()),
        }
    }
}

/// Position of a coded option's value, given either by name or number.
pub fn coded_index(names: &[&str], value: &Value) -> Option<usize> {
    if let Some(name) = value.as_str() {
        return names.iter().position(|candidate| *candidate == name);
    }
    value
        .as_u64()
        .and_then(|code| usize::try_from(code).ok())
        .filter(|code| *code < names.len())
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => format!("boolean {flag}"),
        Value::Number(number) => format!("number {number}"),
        Value::String(text) => format!("string \"{text}\""),
        Value::Array(_) => "a list".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

fn quote_all(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
}

const fn opt(name: &'static str, kind: OptionKind) -> OptionSpec {
    OptionSpec { name, kind }
}

#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub name: &'static str,
    pub options: &'static [OptionSpec],
}

impl SectionSpec {
    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|option| option.name == name)
    }
}

use OptionKind::{Bool, Choice, Coded, Float, FloatList, Int, IntChoice, Json, Text};

pub const EXECUTION_MODES: &[&str] = &[
    "RT_TRANSMITTANCE",
    "RT_THERMAL_ONLY",
    "RT_SOLAR_AND_THERMAL",
    "RT_SOLAR_IRRADIANCE",
    "RT_LUNAR_AND_THERMAL",
    "RT_LUNAR_IRRADIANCE",
];

pub const ALGORITHMS: &[&str] = &[
    "RT_MODTRAN",
    "RT_CORRK_SLOW",
    "RT_CORRK_FAST",
    "RT_MODTRAN_POLAR",
    "RT_LINE_BY_LINE",
];

const MULTIPLE_SCATTERING: &[&str] = &[
    "RT_NO_MULTIPLE_SCATTER",
    "RT_DISORT",
    "RT_DISORT_AT_OBS",
    "RT_ISAACS_2STREAM",
    "RT_ISAACS_2STREAM_AT_OBS",
    "RT_ISAACS_SCALED",
    "RT_ISAACS_SCALED_AT_OBS",
];

const ATMOSPHERE_MODELS: &[&str] = &[
    "ATM_CONSTANT",
    "ATM_TROPICAL",
    "ATM_MIDLAT_SUMMER",
    "ATM_MIDLAT_WINTER",
    "ATM_SUBARC_SUMMER",
    "ATM_SUBARC_WINTER",
    "ATM_US_STANDARD_1976",
    "ATM_USER_ALT_PROFILE",
    "ATM_USER_PRESS_PROFILE",
];

const HAZE_MODELS: &[&str] = &[
    "AER_NONE",
    "AER_RURAL",
    "AER_RURAL_DENSE",
    "AER_MARITIME_NAVY",
    "AER_MARITIME",
    "AER_URBAN",
    "AER_TROPOSPHERIC",
    "AER_USER_DEFINED",
    "AER_FOG_ADVECTIVE",
    "AER_FOG_RADIATIVE",
    "AER_DESERT",
];

const SEASONS: &[&str] = &["SEASN_AUTO", "SEASN_SPRING_SUMMER", "SEASN_FALL_WINTER"];

const STRATOSPHERIC: &[&str] = &[
    "STRATO_BACKGROUND",
    "STRATO_MODERATE_VOLCANIC_AGED",
    "STRATO_HIGH_VOLCANIC_FRESH",
    "STRATO_HIGH_VOLCANIC_AGED",
    "STRATO_MODERATE_VOLCANIC_FRESH",
    "STRATO_MODERATE_VOLCANIC_BACKGROUND",
    "STRATO_HIGH_VOLCANIC_BACKGROUND",
    "STRATO_EXTREME_VOLCANIC_FRESH",
];

const CLOUDS: &[&str] = &[
    "CLOUD_NONE",
    "CLOUD_CUMULUS",
    "CLOUD_ALTOSTRATUS",
    "CLOUD_STRATUS",
    "CLOUD_STRATOCUMULUS",
    "CLOUD_NIMBOSTRATUS",
    "CLOUD_RAIN_DRIZZLE",
    "CLOUD_RAIN_LIGHT",
    "CLOUD_RAIN_MODERATE",
    "CLOUD_RAIN_HEAVY",
    "CLOUD_RAIN_EXTREME",
    "CLOUD_USER_DEFINED",
    "CLOUD_CIRRUS",
    "CLOUD_CIRRUS_THIN",
];

const SURFACE_TYPES: &[&str] = &["REFL_CONSTANT", "REFL_LAMBER_MODEL", "REFL_RBDF"];

pub const NOFILE_CODES: &[&str] = &["FC_ALLOWALL", "FC_TAPE6ONLY", "FC_NOFILES"];

const MESSAGE_LEVELS: &[&str] = &["MSG_NONE", "MSG_ERROR", "MSG_WARN", "MSG_INFO", "MSG_DEBUG"];

pub const JSON_PRINT_OPTIONS: &[&str] = &[
    "WRT_NONE",
    "WRT_STATUS",
    "WRT_INPUT",
    "WRT_STAT_INPUT",
    "WRT_OUTPUT",
    "WRT_STAT_OUTPUT",
    "WRT_INPUT_OUTPUT",
    "WRT_ALL",
];

const RTOPTIONS: &[OptionSpec] = &[
    opt("IEMSCT", Choice(EXECUTION_MODES)),
    opt("MODTRN", Choice(ALGORITHMS)),
    opt("LYMOLC", Bool),
    opt("T_BEST", Bool),
    opt("IMULT", Choice(MULTIPLE_SCATTERING)),
    opt("DISALB", Bool),
    opt("NSTR", Int),
    opt("NLBL", Int),
    opt("SOLCON", Float),
];

const ATMOSPHERE: &[OptionSpec] = &[
    opt("MODEL", Choice(ATMOSPHERE_MODELS)),
    opt("M1", Choice(ATMOSPHERE_MODELS)),
    opt("M2", Choice(ATMOSPHERE_MODELS)),
    opt("M3", Choice(ATMOSPHERE_MODELS)),
    opt("M4", Choice(ATMOSPHERE_MODELS)),
    opt("M5", Choice(ATMOSPHERE_MODELS)),
    opt("M6", Choice(ATMOSPHERE_MODELS)),
    opt("M2_RHC", Bool),
    opt("MDEF", IntChoice(&[0, 1, 2])),
    opt("HMODEL", Text),
    opt("NLAYERS", Int),
    opt("NPROF", Int),
    opt("PROFILES", Json),
    opt("CO2MX", Float),
    opt("H2OSTR", Float),
    opt("H2OUNIT", Choice(&[" ", "+", "g", "a", "G", "A"])),
    opt("H2OOPT", Choice(&[" "])),
    opt("O3STR", Float),
    opt("O3UNIT", Choice(&[" ", "g", "a", "G", "A"])),
    opt("C_PROF", IntChoice(&[0, 1, 2, 3, 4, 5, 6, 7])),
    opt("S_UMIX", FloatList),
    opt("S_XSEC", FloatList),
    opt("S_TRAC", FloatList),
    opt("AERRH", Float),
    opt("AYRANG", Bool),
    opt("AYRANGFL", Text),
    opt("E_MASS", Float),
    opt("AIRMWT", Float),
    opt("ATMPROFILE", Json),
];

const AEROSOLS: &[OptionSpec] = &[
    opt("IHAZE", Choice(HAZE_MODELS)),
    opt("VIS", Float),
    opt("WSS", Float),
    opt("WHH", Float),
    opt("ICSTL", IntChoice(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10])),
    opt("ISEASN", Choice(SEASONS)),
    opt("IVULCN", Choice(STRATOSPHERIC)),
    opt("ICLD", Choice(CLOUDS)),
    opt("RAINRT", Float),
    opt("IPH", IntChoice(&[0, 1, 2])),
    opt("HGPF", Float),
    opt("H2OAER", Bool),
    opt("CNOVAM", Bool),
    opt("ARUSS", Choice(&["USS", "SAP", "DEFAULT", "   ", "default"])),
    opt("SAPFILE", Text),
    opt("IVSA", Bool),
    opt("ZCVSA", Float),
    opt("ZTVSA", Float),
    opt("ZINVSA", Float),
    opt("ASTMX", Float),
    opt("CDASTM", Choice(&[" ", "b", "B", "t", "T", "d", "D", "f"])),
    opt("ASTMC", Float),
    opt("ASTMO", Float),
    opt("SSALB", Json),
    opt("APLUS", Choice(&["", "  ", "A+"])),
    opt("REGALT", Json),
    opt("PHASEFN", Json),
    opt("IREGSPC", Json),
    opt("REGSPC", Json),
    opt("CTHIK", Float),
    opt("CALT", Float),
    opt("CWAVLN", Float),
    opt("CEXT", Float),
    opt("CCOLWD", Float),
    opt("CCOLIP", Float),
    opt("CHUMID", Float),
    opt("ASYMWD", Float),
    opt("ASYMIP", Float),
    opt("CLDALT", Json),
    opt("CLDSPC", Json),
];

const GEOMETRY: &[OptionSpec] = &[
    opt("ITYPE", IntChoice(&[1, 2, 3, 4, -8, -11, -15, -63])),
    opt("H1ALT", Float),
    opt("H2ALT", Float),
    opt("OBSZEN", Float),
    opt("HRANGE", Float),
    opt("BETA", Float),
    opt("LENN", IntChoice(&[0, 1])),
    opt("BCKZEN", Float),
    opt("NLOS", Json),
    opt("MLOS", Json),
    opt("BENDING", Float),
    opt("NSEG", Int),
    opt("SURF_DIST", Float),
    opt("SEG_ALT", Float),
    opt("SEG_ZEN", Float),
    opt("SEG_LEN", Float),
    opt("RAD_E", Float),
    opt("CKRANG", Float),
    opt("IDAY", Int),
    opt("IPARM", IntChoice(&[0, 1, 2, 10, 11, 12])),
    opt("PARM1", Float),
    opt("PARM2", Float),
    opt("PARM3", Float),
    opt("PARM4", Float),
    opt("GMTIME", Float),
    opt("TRUEAZ", Float),
    opt("ANGLEM", Float),
    opt("REFPATH", Json),
    opt("LOSGEOMETRY", Json),
];

const SURFACE: &[OptionSpec] = &[
    opt("SURFTYPE", Choice(SURFACE_TYPES)),
    opt("SURREF", Float),
    opt("NSURF", IntChoice(&[1, 2])),
    opt("TPTEMP", Float),
    opt("AATEMP", Float),
    opt("WIDERP", Bool),
    opt("GNDALT", Float),
    opt("DH2O", Float),
    opt("MLTRFL", Bool),
    opt("SALBFL", Text),
    opt("SURFP", Json),
    opt("SURFA", Json),
    opt("SURFNLOS", Int),
    opt("SURFLOS", Json),
    opt("SURFACEPARAM", Json),
];

const SPECTRAL: &[OptionSpec] = &[
    opt("V1", Float),
    opt("V2", Float),
    opt("DV", Float),
    opt("FWHM", Float),
    opt("YFLAG", Choice(&[" ", "T", "R", "t", "r"])),
    opt("XFLAG", Choice(&[" ", "W", "M", "N", "w", "m", "n"])),
    opt("DLIMIT", Text),
    opt("FLAGS", Json),
    opt("MLFLX", Int),
    opt("VRFRAC", Float),
    opt("SFWHM", Float),
    opt("LSUNFL", Json),
    opt("LBMNAM", Choice(&[" ", "f", "F", "t", "T", "4"])),
    opt("USRSUN", Text),
    opt("BMNAME", Text),
    opt("FILTNM", Text),
    opt("CH2OCM", Choice(&[" ", "1"])),
];

const FILEOPTIONS: &[OptionSpec] = &[
    opt("NOFILE", Coded(NOFILE_CODES)),
    opt("BINARY", Bool),
    opt("CKPRNT", Bool),
    opt("NOPRNT", IntChoice(&[0, 1, 2, 3, -1, -2])),
    opt("MSGPRNT", Coded(MESSAGE_LEVELS)),
    opt("DATDIR", Text),
    opt("FLROOT", Text),
    opt("CSVPRNT", Text),
    opt("SLIPRNT", Text),
    opt("JSONPRNT", Text),
    opt("JSONOPT", Coded(JSON_PRINT_OPTIONS)),
];

pub const SECTIONS: &[SectionSpec] = &[
    SectionSpec {
        name: "RTOPTIONS",
        options: RTOPTIONS,
    },
    SectionSpec {
        name: "ATMOSPHERE",
        options: ATMOSPHERE,
    },
    SectionSpec {
        name: "AEROSOLS",
        options: AEROSOLS,
    },
    SectionSpec {
        name: "GEOMETRY",
        options: GEOMETRY,
    },
    SectionSpec {
        name: "SURFACE",
        options: SURFACE,
    },
    SectionSpec {
        name: "SPECTRAL",
        options: SPECTRAL,
    },
    SectionSpec {
        name: "FILEOPTIONS",
        options: FILEOPTIONS,
    },
];

/// Scalar options that sit directly in the case object.
pub const TOP_LEVEL: &[OptionSpec] = &[
    opt("NAME", Text),
    opt("DESCRIPTION", Text),
    opt("CASE", Int),
    opt("CASE TEMPLATE", Int),
    opt("TOOLBOX", Json),
];

pub fn section(name: &str) -> Option<&'static SectionSpec> {
    SECTIONS.iter().find(|section| section.name == name)
}

/// Checks every key of one case object, collecting all problems.
pub fn check_case(case: &serde_json::Map<String, Value>) -> Vec<ConfigProblem> {
    let mut problems = Vec::new();

    for (key, value) in case {
        if let Some(spec) = TOP_LEVEL.iter().find(|spec| spec.name == key) {
            if let Err(detail) = spec.kind.check(value) {
                problems.push(ConfigProblem::new(key.as_str(), detail));
            }
            continue;
        }

        let Some(section) = section(key) else {
            problems.push(ConfigProblem::new(key.as_str(), "unrecognized section"));
            continue;
        };
        let Some(options) = value.as_object() else {
            problems.push(ConfigProblem::new(
                key.as_str(),
                format!("expected an object, found {}", describe(value)),
            ));
            continue;
        };

        for (option, option_value) in options {
            let path = format!("{}.{}", section.name, option);
            match section.option(option) {
                Some(spec) => {
                    if let Err(detail) = spec.kind.check(option_value) {
                        problems.push(ConfigProblem::new(path, detail));
                    }
                }
                None => problems.push(ConfigProblem::new(path, "unrecognized option")),
            }
        }
    }

    problems
}
