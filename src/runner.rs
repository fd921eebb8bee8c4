//! The command line runner: loads a world from a configuration file, advances it for the
//! configured number of steps and writes snapshots and the counts report along the way.
//!
//! ```text
//! seir-markov-lockdown [OPTIONS] <CONFIG>
//! ```
use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, Parser};

use crate::config::RunConfig;
use crate::error::SimError;
use crate::load::load_world;
use crate::log::{info, set_log_level, set_module_filters, LevelFilter};
#[cfg(feature = "progress_bar")]
use crate::progress::{finish_step_progress, increment_step_progress, init_step_progress_bar};
use crate::random::rng_from_seed;
use crate::report::CountsReport;
use crate::snapshot::{restore_world, snapshot_file_name, write_snapshot};
use crate::world::World;

/// Command line arguments of the runner.
#[derive(Parser, Debug)]
#[command(name = "seir-markov-lockdown", version, about)]
pub struct Args {
    /// Path to the JSON run configuration
    pub config: PathBuf,

    /// Random seed; overrides the seed of the configuration
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Number of steps; overrides the steps of the configuration
    #[arg(long)]
    pub steps: Option<usize>,

    /// Start from this snapshot instead of the initial states of the person table
    #[arg(long, value_name = "SNAPSHOT")]
    pub restore: Option<PathBuf>,

    /// Directory for the per-step snapshots; overrides `dir_snapshots`
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// A log level (off, error, warn, info, debug, trace) and/or comma-separated
    /// `module=level` filters, e.g. `debug,seir_markov_lockdown::person=trace`
    #[arg(long)]
    pub log_level: Option<String>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Do not draw the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// The parsed form of `--log-level`: an optional global level plus module filters.
#[derive(Debug, Default, PartialEq)]
pub struct LogLevels {
    pub global: Option<LevelFilter>,
    pub modules: Vec<(String, LevelFilter)>,
}

impl FromStr for LogLevels {
    type Err = SimError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let parse_level = |text: &str| {
            LevelFilter::from_str(text.trim()).map_err(|_| {
                SimError::ParseError(format!("'{}' is not a log level", text.trim()))
            })
        };

        let mut levels = LogLevels::default();
        for item in spec.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            match item.split_once('=') {
                Some((module, level)) => {
                    levels
                        .modules
                        .push((module.trim().to_string(), parse_level(level)?));
                }
                None => levels.global = Some(parse_level(item)?),
            }
        }
        Ok(levels)
    }
}

fn verbosity_level(verbose: u8) -> Option<LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    }
}

/// Installs the logger for the given flags. An explicit `--log-level` wins over `-v`.
pub fn configure_logging(log_level: Option<&str>, verbose: u8) -> Result<(), SimError> {
    let levels = match log_level {
        Some(spec) => spec.parse::<LogLevels>()?,
        None => LogLevels::default(),
    };
    if let Some(level) = levels.global.or_else(|| verbosity_level(verbose)) {
        set_log_level(level);
    }
    if !levels.modules.is_empty() {
        let filters: Vec<(&str, LevelFilter)> = levels
            .modules
            .iter()
            .map(|(module, level)| (module.as_str(), *level))
            .collect();
        set_module_filters(&filters);
    }
    Ok(())
}

/// Options of a run that do not come from the configuration file.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Snapshot to apply to the freshly loaded world before the first step.
    pub restore: Option<PathBuf>,
    pub show_progress: bool,
}

/// Runs the simulation described by `config` and returns the world after the last step.
///
/// Snapshot 0 and report step 0 describe the world before the first step; after step `i`
/// snapshot `i` and the report rows of step `i` are written.
pub fn run_with_config(config: &RunConfig, options: &RunOptions) -> Result<World, SimError> {
    let (mut world, _) = load_world(&config.input_files(), config.infection_policy())?;
    if let Some(snapshot) = options.restore.as_deref() {
        restore_world(&mut world, snapshot)?;
    }

    let mut rng = rng_from_seed(config.seed);
    let mut report = match config.file_report.as_deref() {
        Some(path) => Some(CountsReport::create(path)?),
        None => None,
    };
    let mut record = |world: &World, step: usize| -> Result<(), SimError> {
        if let Some(dir) = config.dir_snapshots.as_deref() {
            write_snapshot(world, &dir.join(snapshot_file_name(step, config.steps)))?;
        }
        if let Some(report) = report.as_mut() {
            report.record(world)?;
        }
        Ok(())
    };

    info!(
        "running {} steps with seed {}: {}",
        config.steps,
        config.seed,
        world.total_counts()
    );
    record(&world, 0)?;

    #[cfg(feature = "progress_bar")]
    if options.show_progress {
        init_step_progress_bar(config.steps);
    }
    for step in 1..=config.steps {
        world.update(&mut rng);
        record(&world, step)?;
        #[cfg(feature = "progress_bar")]
        if options.show_progress {
            increment_step_progress();
        }
    }
    #[cfg(feature = "progress_bar")]
    if options.show_progress {
        finish_step_progress();
    }

    info!(
        "finished {} steps: {}",
        config.steps,
        world.total_counts()
    );
    Ok(world)
}

/// Applies the command line overrides to the configuration at `args.config` and runs it.
pub fn run(args: Args) -> Result<World, SimError> {
    configure_logging(args.log_level.as_deref(), args.verbose)?;

    let mut config = RunConfig::from_path(&args.config)?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(steps) = args.steps {
        config.steps = steps;
    }
    if let Some(dir) = args.output_dir {
        config.dir_snapshots = Some(dir);
    }

    let options = RunOptions {
        restore: args.restore,
        show_progress: !args.no_progress,
    };
    run_with_config(&config, &options)
}

/// Parses the process arguments and runs. Exits with a usage message on bad arguments.
pub fn run_from_command_line() -> Result<World, SimError> {
    run(Args::parse())
}
