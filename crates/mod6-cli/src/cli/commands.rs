use super::CliError;
use super::helpers::*;
use mod6_core::domain::RetentionPolicy;
use mod6_core::exec::{ExecutionController, detect_version};
use mod6_core::input::{BaseCase, render_config};
use mod6_core::parsers::EngineVersion;
use mod6_core::{BatchOptions, GridTolerance, PipelineOptions, run_batch, run_case};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(clap::Args)]
pub(super) struct EngineArgs {
    /// Shell file exporting MODTRAN_EXE and MODTRAN_DATA
    #[arg(long, conflicts_with = "exe")]
    env_file: Option<PathBuf>,

    /// Engine executable; overrides the environment
    #[arg(long, requires = "data")]
    exe: Option<PathBuf>,

    /// Engine data directory
    #[arg(long, requires = "exe")]
    data: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct CaseArgs {
    /// Start from a base case (base, vnir, swir, vnir_swir, lwir)
    #[arg(long, value_parser = parse_base_case, conflicts_with = "keyword_defaults")]
    base: Option<BaseCase>,

    /// Start from the defaults in the engine's keyword catalogue
    #[arg(long)]
    keyword_defaults: bool,

    /// Override an option as SECTION__OPTION=VALUE; VALUE is read as JSON when it parses
    #[arg(long = "set", value_name = "KEY=VALUE")]
    sets: Vec<String>,
}

#[derive(clap::Args)]
pub(super) struct RunnerArgs {
    /// Directory that receives one subdirectory per case
    #[arg(long, default_value = "mod6-runs")]
    root: PathBuf,

    /// Per-case engine deadline in seconds
    #[arg(long, default_value_t = 3600)]
    timeout: u64,

    /// When case directories are removed: always, on-success or never
    #[arg(long, default_value = "never")]
    retention: RetentionPolicy,

    /// Clear and reuse case directories that already hold files
    #[arg(long)]
    overwrite: bool,

    /// Engine release whose artifact layouts to use, or `auto` to ask the engine
    #[arg(long)]
    release: Option<String>,

    /// Absolute grid agreement in cm-1
    #[arg(long)]
    grid_absolute: Option<f64>,

    /// Relative grid agreement
    #[arg(long)]
    grid_relative: Option<f64>,

    /// Print a JSON summary instead of text
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Case document (JSON, `#` comments allowed)
    input: PathBuf,

    /// Also print the decoded table of this artifact, e.g. `csv` or `spectral_table`
    #[arg(long, value_name = "ARTIFACT")]
    table: Option<String>,

    #[command(flatten)]
    case: CaseArgs,

    #[command(flatten)]
    runner: RunnerArgs,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(clap::Args)]
pub(super) struct BatchArgs {
    /// Case documents, one case each
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Maximum concurrent engine processes; defaults to the number of CPUs
    #[arg(long)]
    jobs: Option<usize>,

    #[command(flatten)]
    case: CaseArgs,

    #[command(flatten)]
    runner: RunnerArgs,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(clap::Args)]
pub(super) struct ValidateArgs {
    /// Case documents to check
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Print the engine input that would be written for each valid case
    #[arg(long)]
    render: bool,

    #[command(flatten)]
    case: CaseArgs,

    #[command(flatten)]
    engine: EngineArgs,
}

impl EngineArgs {
    fn source(&self) -> EngineSource {
        match (&self.env_file, &self.exe, &self.data) {
            (Some(path), _, _) => EngineSource::ShellFile(path.clone()),
            (None, Some(exe), Some(data)) => EngineSource::Explicit {
                exe: exe.clone(),
                data: data.clone(),
            },
            _ => EngineSource::Environment,
        }
    }
}

impl CaseArgs {
    fn template(&self) -> CaseTemplate {
        if self.keyword_defaults {
            CaseTemplate::KeywordDefaults
        } else if let Some(base) = self.base {
            CaseTemplate::Base(base)
        } else {
            CaseTemplate::Document
        }
    }
}

impl RunnerArgs {
    async fn pipeline_options(
        &self,
        controller: &ExecutionController,
    ) -> Result<PipelineOptions, CliError> {
        let engine_version = match self.release.as_deref() {
            None => EngineVersion::default(),
            Some("auto") => detect_version(controller).await?,
            Some(name) => EngineVersion::from_name(name).ok_or_else(|| {
                CliError::Usage(format!("Unknown engine release '{name}'; expected 6 or auto."))
            })?,
        };

        let defaults = GridTolerance::default();
        Ok(PipelineOptions {
            timeout: Duration::from_secs(self.timeout),
            retention: self.retention,
            overwrite: self.overwrite,
            tolerance: GridTolerance {
                absolute: self.grid_absolute.unwrap_or(defaults.absolute),
                relative: self.grid_relative.unwrap_or(defaults.relative),
            },
            engine_version,
        })
    }
}

pub(super) fn run_run_command(args: RunArgs) -> Result<i32, CliError> {
    let env = load_engine_env(&args.engine.source())?;
    let request = load_request(
        &args.input,
        &args.case.template(),
        &args.case.sets,
        Some(env.data()),
    )?;
    debug!(input = %args.input.display(), exe = %env.exe().display(), "loaded case document");
    let runtime = build_runtime()?;

    let result = runtime.block_on(async {
        let controller = ExecutionController::new(env.clone())?;
        let options = args.runner.pipeline_options(&controller).await?;
        run_case(env, &args.runner.root, request, options)
            .await
            .map_err(CliError::from)
    })?;

    if args.runner.json {
        println!("{}", render_json(&result_summary(&result))?);
    } else {
        print!("{}", render_human_summary(&result));
    }
    if let Some(label) = args.table.as_deref() {
        print!("{}", render_record_table(&result, label)?);
    }
    Ok(0)
}

pub(super) fn run_batch_command(args: BatchArgs) -> Result<i32, CliError> {
    let env = load_engine_env(&args.engine.source())?;
    let template = args.case.template();
    let requests = args
        .inputs
        .iter()
        .map(|input| load_request(input, &template, &args.case.sets, Some(env.data())))
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        cases = requests.len(),
        root = %args.runner.root.display(),
        "submitting batch"
    );
    let runtime = build_runtime()?;

    let batch = runtime.block_on(async {
        let controller = ExecutionController::new(env.clone())?;
        let options = BatchOptions {
            pipeline: args.runner.pipeline_options(&controller).await?,
            max_concurrency: args.jobs,
        };
        run_batch(env, &args.runner.root, requests, options)
            .await
            .map_err(CliError::from)
    })?;

    if args.runner.json {
        println!("{}", render_json(&batch_summary(&batch))?);
    } else {
        for entry in batch.entries() {
            match &entry.outcome {
                Ok(result) => print!("[{}] {}", entry.index, render_human_summary(result)),
                Err(error) => println!(
                    "[{}] {}: {}",
                    entry.index,
                    entry.label,
                    error.diagnostic_line()
                ),
            }
        }
        println!("{} of {} case(s) succeeded.", batch.succeeded(), batch.len());
    }

    Ok(batch
        .entries()
        .iter()
        .find_map(|entry| entry.outcome.as_ref().err())
        .map_or(0, |error| error.exit_code()))
}

pub(super) fn run_validate_command(args: ValidateArgs) -> Result<i32, CliError> {
    let template = args.case.template();
    let env = match template {
        CaseTemplate::KeywordDefaults => Some(load_engine_env(&args.engine.source())?),
        CaseTemplate::Base(_) | CaseTemplate::Document => None,
    };

    let mut exit_code = 0;
    for input in &args.inputs {
        let data_dir = env.as_ref().map(|env| env.data());
        let request = load_request(input, &template, &args.case.sets, data_dir);
        match request.and_then(|request| request.validate().map_err(CliError::from)) {
            Ok(config) => {
                println!("{}: ok ({})", input.display(), config.id());
                if args.render {
                    println!("{}", render_config(&config)?);
                }
            }
            Err(error) => {
                println!("{}: {}", input.display(), error.diagnostic_line());
                if exit_code == 0 {
                    exit_code = error.exit_code();
                }
            }
        }
    }
    Ok(exit_code)
}

pub(super) fn run_version_command(args: EngineArgs) -> Result<i32, CliError> {
    let controller = ExecutionController::new(load_engine_env(&args.source())?)?;
    let runtime = build_runtime()?;
    let text = runtime.block_on(controller.version())?;
    println!("{text}");
    match EngineVersion::parse(&text) {
        Some(version) => println!("artifact layouts: {version}"),
        None => println!("artifact layouts: unsupported release"),
    }
    Ok(0)
}

pub(super) fn run_license_command(args: EngineArgs) -> Result<i32, CliError> {
    let controller = ExecutionController::new(load_engine_env(&args.source())?)?;
    let runtime = build_runtime()?;
    println!("{}", runtime.block_on(controller.license_status())?);
    Ok(0)
}

fn parse_base_case(value: &str) -> Result<BaseCase, String> {
    BaseCase::from_name(value).ok_or_else(|| {
        let names = BaseCase::ALL
            .iter()
            .map(|case| case.name())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown base case '{value}', expected one of {names}")
    })
}
