use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::types::{AppError, AppResult, Job};

pub const REPORT_SUFFIX: &str = ".report.bin.zst";
pub const CORPUS_SUFFIX: &str = ".corpus.tar.zst";

/// Target name as used in file names (`P2IM/CNC` -> `P2IM-CNC`)
pub fn target_filename(target: &str) -> String {
    target.replace('/', "-")
}

/// Artifact name without its report suffix
pub fn run_name(report: &Path) -> String {
    let name = report
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(REPORT_SUFFIX)
        .map(str::to_string)
        .unwrap_or(name)
}

/// Corpus archive that belongs to `report`
pub fn corpus_archive(report: &Path) -> PathBuf {
    report.with_file_name(format!("{}{CORPUS_SUFFIX}", run_name(report)))
}

/// Run identifier of a report relative to its target: everything after
/// `TARGET-<target>-`, e.g. `FUZZER-hoedur-RUN-01-DURATION-1h-MODE-plain`.
pub fn run_suffix(report: &Path, target: &str) -> String {
    let name = run_name(report);
    let prefix = format!("TARGET-{}-", target_filename(target));
    match name.strip_prefix(&prefix) {
        Some(rest) => rest.to_string(),
        None => name[name.find("FUZZER").unwrap_or(0)..].to_string(),
    }
}

/// Sorted reports of `target` in `corpus`
pub fn discover_reports(corpus: &Path, target: &str) -> AppResult<Vec<PathBuf>> {
    let pattern = corpus.join(format!("TARGET-{}-*{REPORT_SUFFIX}", target_filename(target)));
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| AppError::Config(format!("invalid glob pattern '{pattern}': {e}")))?;

    let mut reports = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => reports.push(path),
            Err(e) => warn!("Skipping unreadable corpus entry: {e}"),
        }
    }
    reports.sort();
    Ok(reports)
}

/// Targets without repeats, in first-seen order
pub fn unique_targets(targets: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    targets
        .iter()
        .filter(|target| seen.insert(target.as_str()))
        .cloned()
        .collect()
}

/// Jobs for every report of every target, targets in first-seen order and
/// reports sorted within each target. A target listed twice is discovered once.
pub fn discover_jobs(corpus: &Path, targets: &[String]) -> AppResult<Vec<Job>> {
    if !corpus.exists() {
        return Err(AppError::CorpusNotFound(corpus.to_path_buf()));
    }

    let mut jobs = Vec::new();
    for target in unique_targets(targets) {
        let reports = discover_reports(corpus, &target)?;
        if reports.is_empty() {
            warn!("no reports found for target {target} in {}", corpus.display());
        }
        jobs.extend(
            reports
                .into_iter()
                .enumerate()
                .map(|(ordinal, report)| Job::new(report, target.clone(), ordinal)),
        );
    }
    Ok(jobs)
}

/// Parse `30s`, `15m`, `24h` or `7d` into seconds.
pub fn parse_duration(value: &str) -> AppResult<u64> {
    let value = value.trim();
    let unknown = || AppError::UnknownDurationUnit(value.to_string());

    let (digits, multiplier) = match value.chars().last() {
        Some('s') => (&value[..value.len() - 1], 1),
        Some('m') => (&value[..value.len() - 1], 60),
        Some('h') => (&value[..value.len() - 1], 60 * 60),
        Some('d') => (&value[..value.len() - 1], 60 * 60 * 24),
        _ => return Err(unknown()),
    };
    let amount: u64 = digits.parse().map_err(|_| unknown())?;
    amount.checked_mul(multiplier).ok_or_else(unknown)
}

/// Fuzzer build variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "kebab-case")]
pub enum Fuzzer {
    Hoedur,
    HoedurSingleStream,
    HoedurDict,
    HoedurSingleStreamDict,
}

impl Fuzzer {
    /// Binary name for `arch`, e.g. `hoedur-single-stream-arm`
    pub fn binary(&self, arch: &str) -> String {
        format!("{self}-{arch}")
    }

    pub fn names() -> Vec<String> {
        Fuzzer::iter().map(|fuzzer| fuzzer.to_string()).collect()
    }
}

/// Emulator modelling mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Mode {
    pub models: bool,
    pub fuzzware: bool,
}

impl Mode {
    /// Parse `plain`, `models`, `fuzzware` or a dash-joined combination
    pub fn parse(value: &str) -> AppResult<Self> {
        if value == "plain" {
            return Ok(Self::default());
        }

        let mut mode = Self::default();
        for part in value.split('-') {
            match part {
                "models" if !mode.models => mode.models = true,
                "fuzzware" if !mode.fuzzware => mode.fuzzware = true,
                _ => return Err(AppError::Config(format!("unknown mode(s): {value}"))),
            }
        }
        Ok(mode)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.models, self.fuzzware) {
            (false, false) => f.write_str("plain"),
            (true, false) => f.write_str("models"),
            (false, true) => f.write_str("fuzzware"),
            (true, true) => f.write_str("models-fuzzware"),
        }
    }
}

static RUN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^TARGET-(?P<target>.+)-FUZZER-(?P<fuzzer>.+)-RUN-(?P<run>\d+)-DURATION-(?P<duration>[^-]+)-MODE-(?P<mode>.+)$",
    )
    .expect("run name pattern is valid")
});

/// Structured form of an artifact base name:
/// `TARGET-<target>-FUZZER-<fuzzer>-RUN-<NN>-DURATION-<d>-MODE-<mode>`, with
/// slashes in the target name replaced by dashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunName {
    /// Target with slashes already replaced by dashes
    pub target: String,
    pub fuzzer: String,
    pub run: u32,
    pub duration: String,
    pub mode: String,
}

impl RunName {
    pub fn new(target: &str, fuzzer: Fuzzer, run: u32, duration: &str, mode: Mode) -> Self {
        Self {
            target: target_filename(target),
            fuzzer: fuzzer.to_string(),
            run,
            duration: duration.to_string(),
            mode: mode.to_string(),
        }
    }

    /// Parse a base name (report/archive suffixes are stripped first)
    pub fn parse(name: &str) -> Option<Self> {
        let name = name
            .strip_suffix(REPORT_SUFFIX)
            .or_else(|| name.strip_suffix(CORPUS_SUFFIX))
            .unwrap_or(name);
        let captures = RUN_NAME.captures(name)?;
        Some(Self {
            target: captures["target"].to_string(),
            fuzzer: captures["fuzzer"].to_string(),
            run: captures["run"].parse().ok()?,
            duration: captures["duration"].to_string(),
            mode: captures["mode"].to_string(),
        })
    }
}

impl fmt::Display for RunName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TARGET-{}-FUZZER-{}-RUN-{:02}-DURATION-{}-MODE-{}",
            self.target, self.fuzzer, self.run, self.duration, self.mode
        )
    }
}
