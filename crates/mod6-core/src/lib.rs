pub mod aggregate;
pub mod batch;
pub mod common;
pub mod discovery;
pub mod domain;
pub mod exec;
pub mod input;
pub mod parsers;
pub mod pipeline;
pub mod workspace;

pub use aggregate::GridTolerance;
pub use batch::{BatchOptions, StopHandle, run_batch, run_batch_with_stop};
pub use common::env::EngineEnv;
pub use domain::{CaseError, CaseResult};
pub use input::{CaseConfig, CaseRequest};
pub use pipeline::{CaseRunner, PipelineOptions, run_case};
