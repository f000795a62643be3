use std::fs;
use std::path::PathBuf;

use log::info;

use crate::core::cmds::plot_data::{bug_filter_args, dir_name};
use crate::core::corpus::{discover_jobs, run_name};
use crate::core::harness::Harness;
use crate::core::process::{Capture, Invocation};
use crate::core::queue::WorkQueue;
use crate::types::AppResult;

pub const COVERAGE_TOOL: &str = "hoedur-coverage-list";

pub struct CoverageListOptions {
    pub corpus: PathBuf,
    pub targets: Vec<String>,
    pub output: Option<PathBuf>,
    pub config_name: Option<String>,
    pub no_basic_block_filter: bool,
    pub filter_bugs: Vec<String>,
}

/// Where the per-report coverage details and supersets go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageLayout {
    pub details: PathBuf,
    pub summary: PathBuf,
}

impl CoverageListOptions {
    /// Without an explicit output everything lands in `<corpus>/_bb`, ungrouped;
    /// with one, results are grouped under the config name.
    pub fn layout(&self) -> CoverageLayout {
        let (output, config_name) = match &self.output {
            Some(output) => (
                output.clone(),
                Some(
                    self.config_name
                        .clone()
                        .unwrap_or_else(|| dir_name(&self.corpus)),
                ),
            ),
            None => (self.corpus.join("_bb"), None),
        };

        let mut details = output.join("details");
        let mut summary = output.join("summary");
        if let Some(name) = config_name {
            details.push(&name);
            summary.push(&name);
        }
        CoverageLayout { details, summary }
    }
}

pub fn execute_coverage_list(harness: &Harness, options: CoverageListOptions) -> AppResult<()> {
    let jobs = discover_jobs(&options.corpus, &options.targets)?;
    let tool = harness.tool(COVERAGE_TOOL)?;

    let layout = options.layout();
    let bug_filter = bug_filter_args(&options.filter_bugs);

    let queue = WorkQueue::new(jobs);
    let done = harness.pool().run(&queue, |job, _| {
        fs::create_dir_all(&layout.details)?;
        fs::create_dir_all(&layout.summary)?;

        let base = run_name(&job.artifact);
        let mut invocation = Invocation::new(&tool)
            .arg("--output-superset")
            .arg(layout.summary.join(format!("{base}.txt")))
            .arg("--output")
            .arg(layout.details.join(format!("{base}.coverage.tar.zst")));
        if !options.no_basic_block_filter {
            invocation = invocation
                .arg("--valid-basic-blocks")
                .arg(harness.tools().valid_basic_blocks(&job.target));
        }
        let invocation = invocation.args(&bug_filter).arg(&job.artifact);

        harness.run_checked(&invocation, Capture::Inherit)?;
        Ok(())
    });

    info!(
        "coverage lists for {}/{} reports in {}",
        done.len(),
        queue.total(),
        layout.summary.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options(output: Option<&str>, config_name: Option<&str>) -> CoverageListOptions {
        CoverageListOptions {
            corpus: PathBuf::from("corpus/run-hoedur"),
            targets: vec!["P2IM/CNC".to_string()],
            output: output.map(PathBuf::from),
            config_name: config_name.map(str::to_string),
            no_basic_block_filter: false,
            filter_bugs: vec![],
        }
    }

    #[test]
    fn default_layout_lives_in_the_corpus() {
        assert_eq!(
            options(None, Some("ignored")).layout(),
            CoverageLayout {
                details: PathBuf::from("corpus/run-hoedur/_bb/details"),
                summary: PathBuf::from("corpus/run-hoedur/_bb/summary"),
            }
        );
    }

    #[test]
    fn explicit_output_is_grouped_by_config_name() {
        assert_eq!(
            options(Some("out"), None).layout(),
            CoverageLayout {
                details: PathBuf::from("out/details/run-hoedur"),
                summary: PathBuf::from("out/summary/run-hoedur"),
            }
        );
        assert_eq!(
            options(Some("out"), Some("hoedur")).layout().summary,
            PathBuf::from("out/summary/hoedur")
        );
    }
}
