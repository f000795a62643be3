use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::core::corpus::{
    CORPUS_SUFFIX, Fuzzer, Mode, REPORT_SUFFIX, RunName, parse_duration, target_filename,
};
use crate::core::harness::Harness;
use crate::core::process::{Capture, Invocation};
use crate::types::{AppError, AppResult};

/// One fuzzing run of one fuzzer against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzOptions {
    /// Directory the run's archives are written to
    pub corpus: PathBuf,
    pub target: String,
    pub fuzzer: Fuzzer,
    pub mode: Mode,
    pub statistics: bool,
    pub duration: String,
    pub run: u32,
    pub overwrite: bool,
    pub trace: bool,
    /// Keep fuzzer output in `<run>.log` / `<run>.cov.log` instead of discarding it
    pub log: bool,
}

impl FuzzOptions {
    pub fn run_name(&self) -> RunName {
        RunName::new(
            &self.target,
            self.fuzzer,
            self.run,
            &self.duration,
            self.mode,
        )
    }

    /// Path prefix shared by every artifact of this run
    pub fn corpus_prefix(&self) -> PathBuf {
        self.corpus.join(self.run_name().to_string())
    }
}

impl fmt::Display for FuzzOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} mode={} run={} duration={}",
            self.fuzzer, self.target, self.mode, self.run, self.duration
        )
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn capture_for(log: bool, logfile: PathBuf) -> Capture {
    if log { Capture::Logfile(logfile) } else { Capture::Discard }
}

/// Fail with [`AppError::OutputExists`] if a previous run left its corpus behind.
pub fn check_fresh_output(prefix: &Path, overwrite: bool) -> AppResult<()> {
    if overwrite {
        return Ok(());
    }
    if prefix.is_dir() {
        return Err(AppError::OutputExists(prefix.to_path_buf()));
    }
    let archive = with_suffix(prefix, CORPUS_SUFFIX);
    if archive.is_file() {
        return Err(AppError::OutputExists(archive));
    }
    Ok(())
}

/// Fuzzer binaries load the emulator library from the binary directory.
fn fuzzer_invocation(harness: &Harness, binary: &Path) -> Invocation {
    let invocation = Invocation::new(binary);
    if env::var_os("LD_LIBRARY_PATH").is_none() {
        invocation.env("LD_LIBRARY_PATH", harness.tools().bin_dir())
    } else {
        invocation
    }
}

/// Fuzz for the configured duration, then replay the corpus to collect coverage.
pub fn execute_fuzz(harness: &Harness, options: &FuzzOptions) -> AppResult<()> {
    let timeout = Duration::from_secs(parse_duration(&options.duration)?);
    let tools = harness.tools();
    let name = options.run_name().to_string();
    let target_dir = tools.target_dir(&options.target);
    let prefix = options.corpus_prefix();

    debug!("name = {name}");
    debug!("corpus = {}", prefix.display());
    debug!("target_dir = {}", target_dir.display());

    fs::create_dir_all(&options.corpus)?;
    check_fresh_output(&prefix, options.overwrite)?;

    let binary = harness.tool(&options.fuzzer.binary(tools.arch()))?;
    let mut invocation = fuzzer_invocation(harness, &binary)
        .arg("--name")
        .arg(&name)
        .arg("--config")
        .arg(target_dir.join(tools.fuzzer_config()));
    if options.mode.models {
        invocation = invocation
            .arg("--models")
            .arg(target_dir.join(tools.models_file()));
    }
    if options.mode.fuzzware {
        let model_share = options
            .corpus
            .join(format!("model-share-{}", target_filename(&options.target)));
        fs::create_dir_all(&model_share)?;
        invocation = invocation
            .arg("--fuzzware")
            .arg("--model-share")
            .arg(model_share);
    }
    invocation = invocation
        .arg("fuzz")
        .arg("--archive-dir")
        .arg(&options.corpus);
    if options.statistics {
        invocation = invocation.arg("--statistics");
    }

    info!(
        "running fuzzer {} for {} with run id {} ...",
        options.fuzzer, options.duration, options.run
    );
    match harness.run(
        &invocation,
        capture_for(options.log, with_suffix(&prefix, ".log")),
        Some(timeout),
    ) {
        Ok(output) => debug!("fuzzer exited with status {}", output.code),
        // The archive written so far is still replayed for coverage
        Err(e @ AppError::Unterminated { .. }) => error!("fuzzer run {name}: {e}"),
        Err(e) => return Err(e),
    }
    info!("fuzzer run done");

    run_coverage(harness, options, &binary, &name, &prefix)
}

fn run_coverage(
    harness: &Harness,
    options: &FuzzOptions,
    binary: &Path,
    name: &str,
    prefix: &Path,
) -> AppResult<()> {
    let archive = with_suffix(prefix, CORPUS_SUFFIX);
    let mut invocation = fuzzer_invocation(harness, binary)
        .arg("--name")
        .arg(name)
        .arg("--import-config")
        .arg(&archive)
        .arg("--debug")
        .arg("--trace");
    if options.trace {
        invocation = invocation
            .arg("--trace-file")
            .arg(with_suffix(prefix, ".trace.bin.zst"));
    }
    for hook in hook_scripts(&harness.tools().target_dir(&options.target))? {
        invocation = invocation.arg("--hook").arg(hook);
    }
    invocation = invocation
        .arg("run-cov")
        .arg(with_suffix(prefix, REPORT_SUFFIX))
        .arg(&archive);

    info!("collecting coverage ...");
    let output = harness.run(
        &invocation,
        capture_for(options.log, with_suffix(prefix, ".cov.log")),
        None,
    )?;
    if !output.success() {
        warn!("coverage collection for {name} exited with status {}", output.code);
    }
    Ok(())
}

/// `hook*.rn` scripts shipped with a target, sorted
pub fn hook_scripts(target_dir: &Path) -> AppResult<Vec<PathBuf>> {
    let pattern = target_dir.join("hook*.rn");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| AppError::Config(format!("invalid glob pattern '{pattern}': {e}")))?;
    let mut hooks: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
    hooks.sort();
    Ok(hooks)
}
