pub mod basecases;
pub mod config;
pub mod json;
pub mod keywords;
pub mod schema;
pub mod serializer;

pub use basecases::BaseCase;
pub use config::{CaseConfig, CaseRequest, FileSelection, NoFileMode};
pub use serializer::{read_config, render_config, serialize};

/// Name of the configuration file written into every case directory.
pub const INPUT_FILE_NAME: &str = "mod6_input.json";
