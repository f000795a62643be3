use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::{Map, Value, json};

use crate::core::corpus::{corpus_archive, discover_jobs, run_name, run_suffix};
use crate::core::harness::Harness;
use crate::core::process::{Capture, Invocation};
use crate::core::queue::WorkQueue;
use crate::core::writers::write_json;
use crate::types::{AppResult, insert_path, merge_tree};

pub const PLOT_TOOL: &str = "hoedur-plot-data";

pub struct PlotDataOptions {
    pub output: PathBuf,
    pub plot: PathBuf,
    pub corpus: PathBuf,
    pub targets: Vec<String>,
    pub config_name: Option<String>,
    pub root: Option<PathBuf>,
    pub no_basic_block_filter: bool,
    pub only_coverage: bool,
    pub filter_bugs: Vec<String>,
}

impl PlotDataOptions {
    /// Explicit config name, else the corpus directory name
    pub fn config_name(&self) -> String {
        self.config_name.clone().unwrap_or_else(|| dir_name(&self.corpus))
    }
}

pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// `--filter-bug <bug>` once per bug
pub(crate) fn bug_filter_args(bugs: &[String]) -> Vec<String> {
    bugs.iter()
        .flat_map(|bug| ["--filter-bug".to_string(), bug.clone()])
        .collect()
}

/// Export plot data for every report and merge the produced entries into the
/// plot overview file.
pub fn execute_plot_data(harness: &Harness, options: PlotDataOptions) -> AppResult<()> {
    let previous = load_overview_data(&options.plot)?;
    let jobs = discover_jobs(&options.corpus, &options.targets)?;
    let tool = harness.tool(PLOT_TOOL)?;

    let config_name = options.config_name();
    let plot_dir = options.output.join(&config_name);
    let bug_filter = bug_filter_args(&options.filter_bugs);

    let queue = WorkQueue::new(jobs);
    let exported = harness.pool().run(&queue, |job, _| {
        fs::create_dir_all(&plot_dir)?;
        let plot_data = plot_dir.join(format!("{}.json.zst", run_name(&job.artifact)));

        let mut invocation = Invocation::new(&tool);
        if !options.no_basic_block_filter {
            invocation = invocation
                .arg("--valid-basic-blocks")
                .arg(harness.tools().valid_basic_blocks(&job.target));
        }
        invocation = invocation
            .args(&bug_filter)
            .arg(&plot_data)
            .arg("--report")
            .arg(&job.artifact);
        if !options.only_coverage {
            invocation = invocation
                .arg("--corpus-archive")
                .arg(corpus_archive(&job.artifact));
        }
        harness.run_checked(&invocation, Capture::Inherit)?;

        let shown = match &options.root {
            Some(root) => plot_data
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| {
                    warn!("{} is not below {}", plot_data.display(), root.display());
                    plot_data.clone()
                }),
            None => plot_data.clone(),
        };
        Ok((
            run_suffix(&job.artifact, &job.target),
            shown.to_string_lossy().into_owned(),
        ))
    });

    let mut fresh = Map::new();
    for (job, (suffix, path)) in exported {
        insert_path(
            &mut fresh,
            &[config_name.as_str(), job.target.as_str(), suffix.as_str()],
            Value::String(path),
        );
    }

    let overview = build_overview(previous, fresh);
    write_json(&options.plot, &overview)?;
    info!("wrote plot overview to {}", options.plot.display());
    Ok(())
}

/// The `data` tree of an existing overview file, or an empty tree.
pub fn load_overview_data(path: &Path) -> AppResult<Map<String, Value>> {
    if !path.is_file() {
        return Ok(Map::new());
    }
    let old: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    match old {
        Value::Object(mut old) => match old.remove("data") {
            Some(Value::Object(data)) => Ok(data),
            _ => Ok(Map::new()),
        },
        _ => {
            warn!("ignoring plot overview {} without an object root", path.display());
            Ok(Map::new())
        }
    }
}

/// Overview document with `fresh` merged over `previous`; plots are reset.
pub fn build_overview(mut previous: Map<String, Value>, fresh: Map<String, Value>) -> Value {
    merge_tree(&mut previous, fresh);
    json!({
        "data": Value::Object(previous),
        "plots": {},
    })
}
