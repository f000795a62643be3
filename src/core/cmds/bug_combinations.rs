use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::core::cmds::crash_time::CRASH_TOOL;
use crate::core::corpus::{discover_jobs, unique_targets};
use crate::core::harness::Harness;
use crate::core::process::{Capture, Invocation};
use crate::core::queue::WorkQueue;
use crate::types::{AppError, AppResult, Job};

pub struct BugCombinationsOptions {
    pub corpus: PathBuf,
    pub output: PathBuf,
    pub targets: Vec<String>,
}

/// `<output>/<target>/bug-combinations-run-NN.yml`, numbered by discovery order
pub fn combinations_file(output: &Path, job: &Job) -> PathBuf {
    output
        .join(&job.target)
        .join(format!("bug-combinations-run-{:02}.yml", job.run_number()))
}

/// Store the raw crash-timing output of every report, one file per run.
pub fn execute_bug_combinations(
    harness: &Harness,
    options: BugCombinationsOptions,
) -> AppResult<()> {
    let jobs = discover_jobs(&options.corpus, &options.targets)?;
    for target in unique_targets(&options.targets) {
        fs::create_dir_all(options.output.join(target))?;
    }
    let tool = harness.tool(CRASH_TOOL)?;

    let queue = WorkQueue::new(jobs);
    harness.pool().run(&queue, |job, _| {
        let invocation = Invocation::new(&tool).arg("--yaml").arg(&job.artifact);
        let output = harness.run(&invocation, Capture::Stdout, None)?;

        let path = combinations_file(&options.output, job);
        fs::write(&path, &output.stdout)?;
        if !output.success() {
            return Err(AppError::ToolFailed {
                tool: CRASH_TOOL.to_string(),
                code: output.code,
            });
        }

        info!("done {}", path.display());
        Ok(())
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn files_are_numbered_from_one() {
        let job = Job::new(PathBuf::from("corpus/TARGET-A-RUN.report.bin.zst"), "P2IM/CNC", 0);
        assert_eq!(
            combinations_file(Path::new("out"), &job),
            PathBuf::from("out/P2IM/CNC/bug-combinations-run-01.yml")
        );
    }
}
