use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// All relative paths will be interpreted relative to this directory.
    /// All child processes will be run in this directory.
    #[arg(long, global = true)]
    pub cwd: Option<String>,

    /// Configuration file to use instead of the nearest fuzzeval.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Logging level (overrides config). One of: trace, debug, info, warn, error
    #[arg(long = "log.level", global = true)]
    pub log_level: Option<String>,

    /// Logging color control: "on" to force colors, "off" to disable; omit for auto
    #[arg(long = "log.color", global = true)]
    pub log_color: Option<String>,

    /// Number of workers (defaults to the host's core count)
    #[arg(long, global = true)]
    pub cores: Option<usize>,

    /// Show a progress bar while jobs are processed
    #[arg(long, global = true)]
    pub progress: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect per-bug crash timings across run-groups
    CrashTime(CrashTimeArgs),

    /// Export execution statistics and summarize executions per second
    Executions(ExecutionsArgs),

    /// Create plot data and update the plot overview
    PlotData(PlotDataArgs),

    /// Create coverage lists and supersets per report
    CoverageList(CoverageListArgs),

    /// Collect coverage plot data and coverage lists into one output tree
    Coverage(CoverageArgs),

    /// Merge consecutive reports of each target into groups
    MergeGroup(MergeGroupArgs),

    /// Extract bug reproducers per report
    Reproducers(ReproducersArgs),

    /// Collect bug combinations per (crashing) corpus input
    BugCombinations(BugCombinationsArgs),

    /// Run one fuzzing campaign followed by coverage collection
    Fuzz(FuzzArgs),

    /// Run a fuzzing campaign on the local host
    FuzzLocal(FuzzLocalArgs),
}

/// Arguments for the crash-time command
#[derive(Parser, Debug)]
pub struct CrashTimeArgs {
    /// Corpus directory containing the reports
    pub corpus: PathBuf,

    /// Targets to evaluate, e.g. P2IM/CNC
    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,

    /// Also write the timing matrix as JSON
    #[arg(long)]
    pub output_json: Option<PathBuf>,

    /// Pass --include-non-crashing-inputs to the crash tool
    #[arg(long)]
    pub include_non_crashing_inputs: bool,

    /// Only keep explicitly named bugs
    #[arg(long)]
    pub exclude_unknown_crashes: bool,
}

/// Arguments for the executions command
#[derive(Parser, Debug)]
pub struct ExecutionsArgs {
    /// Output directory for per-report statistics
    pub output: PathBuf,

    /// Summary file (`target\trate` per line)
    pub summary: PathBuf,

    /// Corpus directory containing the reports
    pub corpus: PathBuf,

    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,
}

/// Arguments for the plot-data command
#[derive(Parser, Debug)]
pub struct PlotDataArgs {
    /// Output directory for plot data
    pub output: PathBuf,

    /// Plot overview file (JSON)
    pub plot: PathBuf,

    /// Corpus directory containing the reports
    pub corpus: PathBuf,

    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,

    /// Name the data is filed under (defaults to the corpus directory name)
    #[arg(long, alias = "config_name")]
    pub config_name: Option<String>,

    /// Store plot data paths relative to this directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    #[arg(long)]
    pub no_basic_block_filter: bool,

    /// Skip the corpus archive and only plot coverage
    #[arg(long)]
    pub only_coverage: bool,

    #[arg(long, num_args = 1..)]
    pub filter_bugs: Vec<String>,
}

/// Arguments for the coverage-list command
#[derive(Parser, Debug)]
pub struct CoverageListArgs {
    /// Corpus directory containing the reports
    pub corpus: PathBuf,

    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,

    /// Output directory (defaults to `<corpus>/_bb`)
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, alias = "config_name")]
    pub config_name: Option<String>,

    #[arg(long)]
    pub no_basic_block_filter: bool,

    #[arg(long, num_args = 1..)]
    pub filter_bugs: Vec<String>,
}

/// Arguments for the coverage command
#[derive(Parser, Debug)]
pub struct CoverageArgs {
    /// Output directory
    pub output: PathBuf,

    /// Corpus directory containing the reports
    pub corpus: PathBuf,

    /// Fuzzer name (defaults to the corpus directory name)
    #[arg(long)]
    pub fuzzer: Option<String>,

    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,

    #[arg(long)]
    pub no_basic_block_filter: bool,

    #[arg(long, num_args = 1..)]
    pub filter_bugs: Vec<String>,
}

/// Arguments for the merge-group command
#[derive(Parser, Debug)]
pub struct MergeGroupArgs {
    /// Corpus directory containing the reports
    pub corpus: PathBuf,

    #[arg(long, required = true)]
    pub output_dir: PathBuf,

    /// Number of reports merged into one
    #[arg(long, default_value_t = 4)]
    pub group: usize,

    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,
}

/// Arguments for the reproducers command
#[derive(Parser, Debug)]
pub struct ReproducersArgs {
    /// Output directory
    pub output: PathBuf,

    /// Corpus directory containing the reports
    pub corpus: PathBuf,

    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,
}

/// Arguments for the bug-combinations command
#[derive(Parser, Debug)]
pub struct BugCombinationsArgs {
    /// Corpus directory containing the reports
    pub corpus: PathBuf,

    /// Output base directory; results go to <output>/<target>/bug-combinations-run-*.yml
    #[arg(long, required = true)]
    pub output: PathBuf,

    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,
}

/// Arguments for the fuzz command
#[derive(Parser, Debug)]
pub struct FuzzArgs {
    /// Target name, e.g. P2IM/CNC
    pub target: String,

    #[arg(long, default_value = "corpus")]
    pub corpus: PathBuf,

    /// One of: hoedur, hoedur-single-stream, hoedur-dict, hoedur-single-stream-dict
    #[arg(long, default_value = "hoedur")]
    pub fuzzer: String,

    #[arg(long)]
    pub models: bool,

    #[arg(long)]
    pub fuzzware: bool,

    #[arg(long)]
    pub no_statistics: bool,

    /// Fuzzing duration, e.g. 30m, 24h or 7d
    #[arg(long, default_value = "24h")]
    pub duration: String,

    #[arg(long, default_value_t = 1)]
    pub run: u32,

    /// Replace an existing corpus of the same run
    #[arg(long)]
    pub overwrite: bool,

    /// Write an execution trace while collecting coverage
    #[arg(long)]
    pub trace: bool,

    /// Keep fuzzer output in log files next to the corpus
    #[arg(long)]
    pub log: bool,
}

/// Arguments for the fuzz-local command
#[derive(Parser, Debug)]
pub struct FuzzLocalArgs {
    #[arg(long, num_args = 1.., required = true)]
    pub targets: Vec<String>,

    /// Number of runs per combination
    #[arg(long, default_value_t = 4)]
    pub runs: u32,

    /// Explicit run ids (replaces --runs)
    #[arg(long, num_args = 1..)]
    pub run_list: Vec<u32>,

    #[arg(long, num_args = 1.., default_value = "hoedur")]
    pub fuzzers: Vec<String>,

    /// Modes: plain, models, fuzzware or a dash-joined combination
    #[arg(long, num_args = 1.., default_value = "fuzzware")]
    pub modes: Vec<String>,

    #[arg(long, default_value = "24h")]
    pub duration: String,

    #[arg(long)]
    pub trace: bool,

    #[arg(long)]
    pub log: bool,

    /// Campaign name; corpora go to corpus/<name>-<fuzzer>
    #[arg(long, default_value = "run")]
    pub name: String,
}
