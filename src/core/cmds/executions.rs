use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::core::corpus::{
    corpus_archive, discover_jobs, run_name, target_filename, unique_targets,
};
use crate::core::harness::Harness;
use crate::core::process::{Capture, Invocation};
use crate::core::queue::WorkQueue;
use crate::core::writers::write_throughput_lines;
use crate::types::{AppError, AppResult, ThroughputSummary};

pub const EXECUTIONS_TOOL: &str = "hoedur-eval-executions";

pub struct ExecutionsOptions {
    pub output: PathBuf,
    pub summary: PathBuf,
    pub corpus: PathBuf,
    pub targets: Vec<String>,
}

/// Export per-report execution statistics into `output`, then write one
/// `target\trate` line per target to the summary file.
pub fn execute_executions(harness: &Harness, options: ExecutionsOptions) -> AppResult<()> {
    let jobs = discover_jobs(&options.corpus, &options.targets)?;
    let tool = harness.tool(EXECUTIONS_TOOL)?;
    fs::create_dir_all(&options.output)?;

    let queue = WorkQueue::new(jobs);
    harness.pool().run(&queue, |job, _| {
        let stats = options
            .output
            .join(format!("{}.txt", run_name(&job.artifact)));
        let invocation = Invocation::new(&tool)
            .arg(&stats)
            .arg(corpus_archive(&job.artifact));
        harness.run_checked(&invocation, Capture::Inherit)?;
        Ok(())
    });

    let targets = unique_targets(&options.targets);
    let mut summaries = Vec::with_capacity(targets.len());
    for target in targets {
        let summary = summarize_target(&options.output, &target)?;
        info!(
            "{target}: {} executions in {}s",
            summary.executions, summary.duration
        );
        summaries.push((target, summary));
    }

    let mut out = BufWriter::new(File::create(&options.summary)?);
    write_throughput_lines(&summaries, &mut out)?;
    info!("wrote execution summary to {}", options.summary.display());
    Ok(())
}

/// Sum every exported statistics file of `target` found in `output`.
///
/// Unreadable or malformed files are skipped with a warning.
pub fn summarize_target(output: &Path, target: &str) -> AppResult<ThroughputSummary> {
    let pattern = output.join(format!("TARGET-{}-*.txt", target_filename(target)));
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| AppError::Config(format!("invalid glob pattern '{pattern}': {e}")))?;

    let mut files: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
    files.sort();

    let mut total = ThroughputSummary::default();
    for path in files {
        let parsed = fs::read_to_string(&path)
            .map_err(AppError::from)
            .and_then(|content| ThroughputSummary::parse(&content));
        match parsed {
            Ok(summary) => total += summary,
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }
    Ok(total)
}
