use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::core::corpus::{REPORT_SUFFIX, discover_reports, target_filename, unique_targets};
use crate::core::harness::Harness;
use crate::core::process::{Capture, Invocation};
use crate::core::queue::WorkQueue;
use crate::types::{AppError, AppResult};

pub const MERGE_TOOL: &str = "hoedur-merge-report";
pub const DEFAULT_GROUP_SIZE: usize = 4;

pub struct MergeGroupOptions {
    pub corpus: PathBuf,
    pub output_dir: PathBuf,
    pub group: usize,
    pub targets: Vec<String>,
}

/// All reports of one target, merged group by group.
struct MergeJob {
    target: String,
}

impl fmt::Display for MergeJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)
    }
}

/// One merged output: its run name, output report and the reports it combines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportGroup {
    pub name: String,
    pub output: PathBuf,
    pub reports: Vec<PathBuf>,
}

/// Split sorted `reports` into full groups of `size`; trailing reports that
/// do not fill a group are left out.
pub fn report_groups(
    target: &str,
    reports: &[PathBuf],
    size: usize,
    output_dir: &Path,
) -> Vec<ReportGroup> {
    reports
        .chunks_exact(size)
        .enumerate()
        .map(|(index, chunk)| {
            let name = format!("TARGET-{}-RUN-{:02}", target_filename(target), index + 1);
            ReportGroup {
                output: output_dir.join(format!("{name}{REPORT_SUFFIX}")),
                name,
                reports: chunk.to_vec(),
            }
        })
        .collect()
}

pub fn execute_merge_group(harness: &Harness, options: MergeGroupOptions) -> AppResult<()> {
    if options.group == 0 {
        return Err(AppError::Config("group size must be at least 1".to_string()));
    }
    if !options.corpus.exists() {
        return Err(AppError::CorpusNotFound(options.corpus));
    }
    fs::create_dir_all(&options.output_dir)?;
    let tool = harness.tool(MERGE_TOOL)?;

    let queue = WorkQueue::new(
        unique_targets(&options.targets)
            .into_iter()
            .map(|target| MergeJob { target }),
    );
    harness.pool().run(&queue, |job, _| {
        let reports = discover_reports(&options.corpus, &job.target)?;
        let remainder = reports.len() % options.group;
        if remainder != 0 {
            warn!(
                "{}: {} reports is not a multiple of {} ({remainder} left over)",
                job.target,
                reports.len(),
                options.group
            );
        }

        for group in report_groups(&job.target, &reports, options.group, &options.output_dir) {
            let invocation = Invocation::new(&tool)
                .arg("--name")
                .arg(&group.name)
                .arg("--output")
                .arg(&group.output)
                .args(&group.reports);
            if let Err(e) = harness.run_checked(&invocation, Capture::Inherit) {
                error!("merging {} failed: {e}", group.name);
            }
        }

        info!("done {}", job.target);
        Ok(())
    });
    Ok(())
}
