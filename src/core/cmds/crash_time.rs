use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use log::{info, warn};

use crate::core::corpus::discover_jobs;
use crate::core::harness::Harness;
use crate::core::process::{Capture, Invocation};
use crate::core::queue::WorkQueue;
use crate::core::writers::{write_json, write_timing_lines};
use crate::types::{
    AppError, AppResult, RunGroupTimings, TimingMatrix, parse_crash_timings, run_group_timings,
};

pub const CRASH_TOOL: &str = "hoedur-eval-crash";

pub struct CrashTimeOptions {
    pub corpus: PathBuf,
    pub targets: Vec<String>,
    pub output_json: Option<PathBuf>,
    pub include_non_crashing_inputs: bool,
    pub exclude_unknown_crashes: bool,
}

/// Run the crash-timing tool on every report and build the per-target
/// timing matrix.
///
/// Reports whose tool run fails or whose output cannot be read contribute
/// an empty run-group. An unknown crash classification aborts the whole
/// collection before anything is written.
pub fn collect_crash_times(harness: &Harness, options: &CrashTimeOptions) -> AppResult<TimingMatrix> {
    let jobs = discover_jobs(&options.corpus, &options.targets)?;
    let tool = harness.tool(CRASH_TOOL)?;

    // run-group count per target, fixed by discovery
    let mut groups: BTreeMap<String, Vec<RunGroupTimings>> = options
        .targets
        .iter()
        .map(|target| (target.clone(), Vec::new()))
        .collect();
    for job in &jobs {
        if let Some(slots) = groups.get_mut(&job.target) {
            slots.push(RunGroupTimings::new());
        }
    }

    let queue = WorkQueue::new(jobs);
    let outputs = harness.pool().run(&queue, |job, _| {
        let mut invocation = Invocation::new(&tool).arg("--yaml");
        if options.include_non_crashing_inputs {
            invocation = invocation.arg("--include-non-crashing-inputs");
        }
        let invocation = invocation.arg(&job.artifact);

        let output = harness.run_checked(&invocation, Capture::Stdout)?;
        Ok(output.stdout_lossy())
    });

    // Merge after the join: slot positions come from discovery order only
    for (job, stdout) in outputs {
        let records = match parse_crash_timings(&stdout) {
            Ok(records) => records,
            Err(e @ AppError::UnknownCrashTag(_)) => return Err(e),
            Err(e) => {
                warn!("ignoring unreadable crash timings of {job}: {e}");
                continue;
            }
        };

        if let Some(slot) = groups
            .get_mut(&job.target)
            .and_then(|slots| slots.get_mut(job.ordinal))
        {
            *slot = run_group_timings(records, options.exclude_unknown_crashes);
        }
    }

    let mut matrix = TimingMatrix::new();
    for (target, run_groups) in &groups {
        matrix.insert_target(target.clone(), run_groups);
        info!("done {target}");
    }
    Ok(matrix)
}

pub fn execute_crash_time(harness: &Harness, options: CrashTimeOptions) -> AppResult<()> {
    let matrix = collect_crash_times(harness, &options)?;

    let stdout = io::stdout();
    write_timing_lines(&matrix, &mut stdout.lock())?;

    if let Some(path) = &options.output_json {
        write_json(path, &matrix)?;
        info!("wrote crash timings to {}", path.display());
    }
    Ok(())
}
