use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use log::{debug, warn};

use crate::core::cli::{Args, Commands};
use crate::core::cmds;
use crate::core::corpus::{Fuzzer, Mode};
use crate::core::harness::Harness;
use crate::core::logging::init_logging;
use crate::types::config::{CliOverrides, config, init_with_overrides};
use crate::types::{AppError, AppResult};

fn parse_fuzzer(name: &str) -> AppResult<Fuzzer> {
    Fuzzer::from_str(name).map_err(|_| {
        AppError::Config(format!(
            "unknown fuzzer {name:?} (expected one of: {})",
            Fuzzer::names().join(", ")
        ))
    })
}

pub fn run_main() -> AppResult<()> {
    let args = Args::parse();

    // Handle global arguments
    if let Some(cwd_arg) = args.cwd.as_ref() {
        let cwd = PathBuf::from(cwd_arg).canonicalize()?;
        env::set_current_dir(&cwd)?;
    }

    // Build CLI overrides for config precedence
    let cli_overrides = CliOverrides {
        config: args.config.clone(),
        log_level: args.log_level.clone(),
        log_color: args.log_color.clone(),
        cores: args.cores,
        progress: args.progress,
    };

    // Initialize configuration (file, then CLI overrides)
    init_with_overrides(&cli_overrides);

    // Initialize logging after config so level/color are applied
    init_logging();
    debug!("Current working directory: {}", env::current_dir()?.display());

    // Setup running flag to handle signals from ctrl-c
    let running = Arc::new(AtomicBool::new(true));
    let running_ctrlc = Arc::clone(&running);

    ctrlc::set_handler(move || {
        warn!("Received Ctrl-C, letting running jobs finish..");
        running_ctrlc.store(false, Ordering::SeqCst);
    })
    .map_err(|e| AppError::Config(format!("failed to install Ctrl-C handler: {e}")))?;

    let harness = Harness::from_config(config(), Arc::clone(&running));
    debug!(
        "{} analysis workers, {} fuzzing workers",
        harness.cores(),
        harness.fuzz_cores()
    );

    // Dispatch to appropriate command
    match args.command {
        Commands::CrashTime(args) => cmds::execute_crash_time(
            &harness,
            cmds::crash_time::CrashTimeOptions {
                corpus: args.corpus,
                targets: args.targets,
                output_json: args.output_json,
                include_non_crashing_inputs: args.include_non_crashing_inputs,
                exclude_unknown_crashes: args.exclude_unknown_crashes,
            },
        )?,
        Commands::Executions(args) => cmds::execute_executions(
            &harness,
            cmds::executions::ExecutionsOptions {
                output: args.output,
                summary: args.summary,
                corpus: args.corpus,
                targets: args.targets,
            },
        )?,
        Commands::PlotData(args) => cmds::execute_plot_data(
            &harness,
            cmds::plot_data::PlotDataOptions {
                output: args.output,
                plot: args.plot,
                corpus: args.corpus,
                targets: args.targets,
                config_name: args.config_name,
                root: args.root,
                no_basic_block_filter: args.no_basic_block_filter,
                only_coverage: args.only_coverage,
                filter_bugs: args.filter_bugs,
            },
        )?,
        Commands::CoverageList(args) => cmds::execute_coverage_list(
            &harness,
            cmds::coverage_list::CoverageListOptions {
                corpus: args.corpus,
                targets: args.targets,
                output: args.output,
                config_name: args.config_name,
                no_basic_block_filter: args.no_basic_block_filter,
                filter_bugs: args.filter_bugs,
            },
        )?,
        Commands::Coverage(args) => cmds::execute_coverage(
            &harness,
            cmds::coverage::CoverageOptions {
                output: args.output,
                corpus: args.corpus,
                targets: args.targets,
                fuzzer: args.fuzzer,
                no_basic_block_filter: args.no_basic_block_filter,
                filter_bugs: args.filter_bugs,
            },
        )?,
        Commands::MergeGroup(args) => cmds::execute_merge_group(
            &harness,
            cmds::merge_group::MergeGroupOptions {
                corpus: args.corpus,
                output_dir: args.output_dir,
                group: args.group,
                targets: args.targets,
            },
        )?,
        Commands::Reproducers(args) => cmds::execute_reproducers(
            &harness,
            cmds::reproducers::ReproducersOptions {
                output: args.output,
                corpus: args.corpus,
                targets: args.targets,
            },
        )?,
        Commands::BugCombinations(args) => cmds::execute_bug_combinations(
            &harness,
            cmds::bug_combinations::BugCombinationsOptions {
                corpus: args.corpus,
                output: args.output,
                targets: args.targets,
            },
        )?,
        Commands::Fuzz(args) => cmds::execute_fuzz(
            &harness,
            &cmds::fuzz::FuzzOptions {
                corpus: args.corpus,
                target: args.target,
                fuzzer: parse_fuzzer(&args.fuzzer)?,
                mode: Mode {
                    models: args.models,
                    fuzzware: args.fuzzware,
                },
                statistics: !args.no_statistics,
                duration: args.duration,
                run: args.run,
                overwrite: args.overwrite,
                trace: args.trace,
                log: args.log,
            },
        )?,
        Commands::FuzzLocal(args) => cmds::execute_fuzz_local(
            &harness,
            cmds::fuzz_local::FuzzLocalOptions {
                targets: args.targets,
                runs: args.runs,
                run_list: args.run_list,
                fuzzers: args
                    .fuzzers
                    .iter()
                    .map(|name| parse_fuzzer(name))
                    .collect::<AppResult<_>>()?,
                modes: args
                    .modes
                    .iter()
                    .map(|mode| Mode::parse(mode))
                    .collect::<AppResult<_>>()?,
                duration: args.duration,
                name: args.name,
                trace: args.trace,
                log: args.log,
            },
        )?,
    }

    // Interrupted runs exit with a distinct code
    if !running.load(Ordering::SeqCst) {
        std::process::exit(2);
    }

    Ok(())
}
