use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};

use crate::core::cmds::fuzz::{FuzzOptions, execute_fuzz};
use crate::core::corpus::{Fuzzer, Mode, parse_duration, unique_targets};
use crate::core::harness::Harness;
use crate::core::pool::{Admission, Pgrep};
use crate::core::queue::WorkQueue;
use crate::types::{AppError, AppResult};

/// Process name counted for admission control
const FUZZER_PROCESS: &str = "hoedur";
const ADMISSION_BACKOFF: Duration = Duration::from_secs(30);
const WORKER_STAGGER: Duration = Duration::from_secs(1);

pub struct FuzzLocalOptions {
    pub targets: Vec<String>,
    pub runs: u32,
    /// Explicit run ids; takes precedence over `runs`
    pub run_list: Vec<u32>,
    pub fuzzers: Vec<Fuzzer>,
    pub modes: Vec<Mode>,
    pub duration: String,
    pub name: String,
    pub trace: bool,
    pub log: bool,
}

impl FuzzLocalOptions {
    fn run_ids(&self) -> Vec<u32> {
        if self.run_list.is_empty() {
            (1..=self.runs).collect()
        } else {
            self.run_list.clone()
        }
    }
}

/// Every (fuzzer, target, mode, run) combination, in that nesting order.
pub fn plan_runs(options: &FuzzLocalOptions) -> Vec<FuzzOptions> {
    let runs = options.run_ids();
    let targets = unique_targets(&options.targets);
    let mut planned = Vec::new();
    for fuzzer in &options.fuzzers {
        let corpus = PathBuf::from("corpus").join(format!("{}-{fuzzer}", options.name));
        for target in &targets {
            for mode in &options.modes {
                for run in &runs {
                    planned.push(FuzzOptions {
                        corpus: corpus.clone(),
                        target: target.clone(),
                        fuzzer: *fuzzer,
                        mode: *mode,
                        statistics: true,
                        duration: options.duration.clone(),
                        run: *run,
                        overwrite: false,
                        trace: options.trace,
                        log: options.log,
                    });
                }
            }
        }
    }
    planned
}

/// Run a local fuzzing campaign on one worker per physical core.
///
/// Workers only start a run while fewer fuzzer processes than workers are
/// alive on the host. Runs whose corpus already exists are skipped.
pub fn execute_fuzz_local(harness: &Harness, options: FuzzLocalOptions) -> AppResult<()> {
    parse_duration(&options.duration)?;

    let planned = plan_runs(&options);
    if planned.is_empty() {
        return Err(AppError::Config("no fuzzing runs selected".to_string()));
    }

    let cores = harness.fuzz_cores();
    info!("{} fuzzing runs on {cores} cores", planned.len());

    let queue = WorkQueue::new(planned);
    let done = harness
        .pool_with(cores)
        .with_admission(Admission::new(
            Pgrep::new(FUZZER_PROCESS),
            cores,
            ADMISSION_BACKOFF,
        ))
        .with_stagger(WORKER_STAGGER)
        .run(&queue, |run, _| {
            match execute_fuzz(harness, run) {
                Err(AppError::OutputExists(path)) => {
                    warn!("skipping {run}: corpus already exists: {}", path.display())
                }
                result => result?,
            }
            info!("done {run}");
            Ok(())
        });

    info!("{}/{} fuzzing runs finished", done.len(), queue.total());
    Ok(())
}
