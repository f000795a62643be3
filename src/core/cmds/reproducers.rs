use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::core::corpus::{corpus_archive, discover_jobs, run_suffix};
use crate::core::harness::Harness;
use crate::core::process::{Capture, Invocation};
use crate::core::queue::WorkQueue;
use crate::types::{AppResult, Job};

pub const REPRODUCER_TOOL: &str = "hoedur-reproducer";

pub struct ReproducersOptions {
    pub output: PathBuf,
    pub corpus: PathBuf,
    pub targets: Vec<String>,
}

/// `<output>/<target>/<run suffix>`
pub fn reproducer_dir(output: &Path, job: &Job) -> PathBuf {
    output
        .join(&job.target)
        .join(run_suffix(&job.artifact, &job.target))
}

pub fn execute_reproducers(harness: &Harness, options: ReproducersOptions) -> AppResult<()> {
    let jobs = discover_jobs(&options.corpus, &options.targets)?;
    let tool = harness.tool(REPRODUCER_TOOL)?;

    let queue = WorkQueue::new(jobs);
    let done = harness.pool().run(&queue, |job, _| {
        let dir = reproducer_dir(&options.output, job);
        fs::create_dir_all(&dir)?;

        let invocation = Invocation::new(&tool)
            .arg(&dir)
            .arg("--corpus-archive")
            .arg(corpus_archive(&job.artifact))
            .arg("--report")
            .arg(&job.artifact);
        harness.run_checked(&invocation, Capture::Inherit)?;
        Ok(())
    });

    info!("extracted reproducers of {}/{} reports", done.len(), queue.total());
    Ok(())
}
