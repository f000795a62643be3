use std::fs;
use std::path::PathBuf;

use log::info;

use crate::core::cmds::coverage_list::{CoverageListOptions, execute_coverage_list};
use crate::core::cmds::plot_data::{PlotDataOptions, dir_name, execute_plot_data};
use crate::core::harness::Harness;
use crate::types::AppResult;

pub struct CoverageOptions {
    pub output: PathBuf,
    pub corpus: PathBuf,
    pub targets: Vec<String>,
    pub fuzzer: Option<String>,
    pub no_basic_block_filter: bool,
    pub filter_bugs: Vec<String>,
}

/// Coverage-only plot data under `<output>/charts` plus coverage lists,
/// both filed under the fuzzer (or corpus directory) name.
pub fn execute_coverage(harness: &Harness, options: CoverageOptions) -> AppResult<()> {
    let name = options
        .fuzzer
        .clone()
        .unwrap_or_else(|| dir_name(&options.corpus));

    let charts = options.output.join("charts");
    fs::create_dir_all(&charts)?;
    let plots = options.output.join("plots.json");

    execute_plot_data(
        harness,
        PlotDataOptions {
            output: charts,
            plot: plots.clone(),
            corpus: options.corpus.clone(),
            targets: options.targets.clone(),
            config_name: Some(name.clone()),
            root: Some(options.output.clone()),
            no_basic_block_filter: options.no_basic_block_filter,
            only_coverage: true,
            filter_bugs: options.filter_bugs.clone(),
        },
    )?;
    info!("plot overview: {}", plots.display());

    execute_coverage_list(
        harness,
        CoverageListOptions {
            corpus: options.corpus,
            targets: options.targets,
            output: Some(options.output),
            config_name: Some(name),
            no_basic_block_filter: options.no_basic_block_filter,
            filter_bugs: options.filter_bugs,
        },
    )
}
