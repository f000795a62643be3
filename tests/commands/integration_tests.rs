use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fuzzeval::core::cmds::bug_combinations::{BugCombinationsOptions, execute_bug_combinations};
use fuzzeval::core::cmds::crash_time::{CrashTimeOptions, collect_crash_times};
use fuzzeval::core::cmds::executions::{ExecutionsOptions, execute_executions};
use fuzzeval::core::cmds::fuzz::{FuzzOptions, execute_fuzz};
use fuzzeval::core::corpus::{Fuzzer, Mode};
use fuzzeval::core::cmds::plot_data::{PlotDataOptions, execute_plot_data};
use fuzzeval::core::writers::write_timing_lines;
use fuzzeval::types::AppError;
use fuzzeval::types::config::ToolsConfig;
use fuzzeval::{Harness, ProcessRunner};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

const RUN_01: &str = "TARGET-A-FUZZER-hoedur-RUN-01-DURATION-1h-MODE-plain";
const RUN_02: &str = "TARGET-A-FUZZER-hoedur-RUN-02-DURATION-1h-MODE-plain";

/// Temporary bin dir with fake tools plus a corpus directory.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            dir: tempdir().unwrap(),
        };
        fs::create_dir_all(fixture.bin_dir()).unwrap();
        fs::create_dir_all(fixture.corpus()).unwrap();
        fixture
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn bin_dir(&self) -> PathBuf {
        self.path().join("bin")
    }

    fn corpus(&self) -> PathBuf {
        self.path().join("corpus")
    }

    /// Shell script tool; `--help` always succeeds so no build is attempted
    fn tool(&self, name: &str, body: &str) {
        let path = self.bin_dir().join(name);
        fs::write(
            &path,
            format!("#!/bin/sh\n[ \"$1\" = \"--help\" ] && exit 0\n{body}\n"),
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn report(&self, run: &str) -> PathBuf {
        let report = self.corpus().join(format!("{run}.report.bin.zst"));
        fs::write(&report, b"").unwrap();
        fs::write(self.corpus().join(format!("{run}.corpus.tar.zst")), b"").unwrap();
        report
    }

    fn harness(&self) -> Harness {
        let tools = ToolsConfig {
            bin_dir: Some(self.bin_dir()),
            ..Default::default()
        };
        Harness::new(tools, ProcessRunner::new(), 2)
    }
}

/// The crash tool prints `<report>.yml`, failing when it does not exist.
fn crash_tool(fixture: &Fixture) {
    fixture.tool(
        "hoedur-eval-crash",
        "eval \"last=\\${$#}\"\ncat \"$last.yml\"",
    );
}

fn crash_options(fixture: &Fixture, exclude_unknown_crashes: bool) -> CrashTimeOptions {
    CrashTimeOptions {
        corpus: fixture.corpus(),
        targets: vec!["A".to_string()],
        output_json: None,
        include_non_crashing_inputs: false,
        exclude_unknown_crashes,
    }
}

#[test]
fn crash_times_leave_gaps_for_quiet_run_groups() {
    let fixture = Fixture::new();
    crash_tool(&fixture);
    let first = fixture.report(RUN_01);
    let second = fixture.report(RUN_02);
    fs::write(
        format!("{}.yml", first.display()),
        "- - Bug: Bug1\n  - time: 10\n- - Crash:\n      pc: 16\n      ra: 32\n  - time: 3\n",
    )
    .unwrap();
    fs::write(format!("{}.yml", second.display()), "[]\n").unwrap();

    let matrix = collect_crash_times(&fixture.harness(), &crash_options(&fixture, false)).unwrap();
    assert_eq!(matrix.row("A", "Bug1"), Some(&[Some(10), None][..]));

    let mut out = Vec::new();
    write_timing_lines(&matrix, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "A Bug1 10 -\nA crash_pc-00000010_ra-00000020 3 -\n"
    );

    let named = collect_crash_times(&fixture.harness(), &crash_options(&fixture, true)).unwrap();
    assert_eq!(named.row("A", "crash_pc-00000010_ra-00000020"), None);
    assert_eq!(named.row("A", "Bug1"), Some(&[Some(10), None][..]));
}

#[test]
fn repeated_target_keeps_one_slot_per_run_group() {
    let fixture = Fixture::new();
    crash_tool(&fixture);
    let first = fixture.report(RUN_01);
    let second = fixture.report(RUN_02);
    fs::write(
        format!("{}.yml", first.display()),
        "- - Bug: Bug1\n  - time: 10\n",
    )
    .unwrap();
    fs::write(format!("{}.yml", second.display()), "[]\n").unwrap();

    let mut options = crash_options(&fixture, false);
    options.targets = vec!["A".to_string(), "A".to_string()];
    let matrix = collect_crash_times(&fixture.harness(), &options).unwrap();
    assert_eq!(matrix.row("A", "Bug1"), Some(&[Some(10), None][..]));
}

#[test]
fn failed_tool_run_contributes_an_empty_run_group() {
    let fixture = Fixture::new();
    crash_tool(&fixture);
    fixture.report(RUN_01);
    let second = fixture.report(RUN_02);
    // no output for RUN-01: the tool exits non-zero
    fs::write(
        format!("{}.yml", second.display()),
        "- - Bug: Bug2\n  - time: 8\n",
    )
    .unwrap();

    let matrix = collect_crash_times(&fixture.harness(), &crash_options(&fixture, false)).unwrap();
    assert_eq!(matrix.row("A", "Bug2"), Some(&[None, Some(8)][..]));
}

#[test]
fn unknown_crash_tag_aborts_collection() {
    let fixture = Fixture::new();
    crash_tool(&fixture);
    let report = fixture.report(RUN_01);
    fs::write(
        format!("{}.yml", report.display()),
        "- - Hang:\n      pc: 1\n  - time: 4\n",
    )
    .unwrap();

    let result = collect_crash_times(&fixture.harness(), &crash_options(&fixture, false));
    assert!(matches!(result, Err(AppError::UnknownCrashTag(tag)) if tag == "Hang"));
}

#[test]
fn missing_corpus_is_fatal() {
    let fixture = Fixture::new();
    crash_tool(&fixture);
    let mut options = crash_options(&fixture, false);
    options.corpus = fixture.path().join("missing");

    let result = collect_crash_times(&fixture.harness(), &options);
    assert!(matches!(result, Err(AppError::CorpusNotFound(_))));
}

#[test]
fn executions_summary_combines_all_reports() {
    let fixture = Fixture::new();
    fixture.tool(
        "hoedur-eval-executions",
        "printf '# duration\\texecutions\\trate\\n100\\t50\\t0.5\\n' > \"$1\"",
    );
    fixture.report(RUN_01);
    fixture.report(RUN_02);

    let output = fixture.path().join("executions");
    let summary = fixture.path().join("summary.txt");
    execute_executions(
        &fixture.harness(),
        ExecutionsOptions {
            output: output.clone(),
            summary: summary.clone(),
            corpus: fixture.corpus(),
            targets: vec!["A".to_string(), "B".to_string()],
        },
    )
    .unwrap();

    assert!(output.join(format!("{RUN_01}.txt")).is_file());
    assert_eq!(fs::read_to_string(&summary).unwrap(), "A\t0.5\nB\t0\n");
}

#[test]
fn plot_overview_merges_with_previous_data() {
    let fixture = Fixture::new();
    let calls = fixture.path().join("calls.log");
    fixture.tool(
        "hoedur-plot-data",
        &format!("echo \"$@\" >> '{}'", calls.display()),
    );
    fixture.report(RUN_01);

    let plot = fixture.path().join("plots.json");
    fs::write(
        &plot,
        r#"{"data": {"fuzzware": {"A": {"FUZZER-fuzzware-RUN-01": "old.json.zst"}}}, "plots": {"stale": true}}"#,
    )
    .unwrap();

    execute_plot_data(
        &fixture.harness(),
        PlotDataOptions {
            output: fixture.path().join("charts"),
            plot: plot.clone(),
            corpus: fixture.corpus(),
            targets: vec!["A".to_string()],
            config_name: Some("hoedur".to_string()),
            root: Some(fixture.path().to_path_buf()),
            no_basic_block_filter: true,
            only_coverage: true,
            filter_bugs: vec!["Bug1".to_string()],
        },
    )
    .unwrap();

    let overview: Value = serde_json::from_str(&fs::read_to_string(&plot).unwrap()).unwrap();
    assert_eq!(
        overview,
        json!({
            "data": {
                "fuzzware": {"A": {"FUZZER-fuzzware-RUN-01": "old.json.zst"}},
                "hoedur": {"A": {
                    "FUZZER-hoedur-RUN-01-DURATION-1h-MODE-plain":
                        format!("charts/hoedur/{RUN_01}.json.zst"),
                }},
            },
            "plots": {},
        })
    );

    let call = fs::read_to_string(&calls).unwrap();
    assert!(call.starts_with("--filter-bug Bug1 "));
    assert!(call.contains("--report"));
    assert!(!call.contains("--corpus-archive"));
}

#[test]
fn bug_combinations_are_stored_per_run() {
    let fixture = Fixture::new();
    crash_tool(&fixture);
    let first = fixture.report(RUN_01);
    fixture.report(RUN_02);
    fs::write(
        format!("{}.yml", first.display()),
        "- - Bug: Bug1\n  - time: 10\n",
    )
    .unwrap();

    let output = fixture.path().join("combinations");
    execute_bug_combinations(
        &fixture.harness(),
        BugCombinationsOptions {
            corpus: fixture.corpus(),
            output: output.clone(),
            targets: vec!["A".to_string()],
        },
    )
    .unwrap();

    assert_eq!(
        fs::read_to_string(output.join("A/bug-combinations-run-01.yml")).unwrap(),
        "- - Bug: Bug1\n  - time: 10\n"
    );
    // the tool failed for the second run, its (empty) output is still kept
    assert_eq!(
        fs::read_to_string(output.join("A/bug-combinations-run-02.yml")).unwrap(),
        ""
    );
}

#[test]
fn coverage_is_collected_after_a_killed_fuzzer() {
    let fixture = Fixture::new();
    let calls = fixture.path().join("calls.log");
    // Replays the corpus when asked to, otherwise fuzzes forever and ignores SIGTERM
    fixture.tool(
        "hoedur-arm",
        &format!(
            "for arg in \"$@\"; do [ \"$arg\" = run-cov ] && echo \"$*\" >> {calls} && exit 0; done\n\
             trap '' TERM\nwhile true; do sleep 0.1; done",
            calls = calls.display()
        ),
    );

    let tools = ToolsConfig {
        bin_dir: Some(fixture.bin_dir()),
        targets_dir: Some(fixture.path().join("targets")),
        ..Default::default()
    };
    let harness = Harness::new(tools, ProcessRunner::with_grace(Duration::from_millis(200)), 1);
    let options = FuzzOptions {
        corpus: fixture.corpus(),
        target: "A".to_string(),
        fuzzer: Fuzzer::Hoedur,
        mode: Mode::default(),
        statistics: true,
        duration: "1s".to_string(),
        run: 1,
        overwrite: false,
        trace: false,
        log: false,
    };

    execute_fuzz(&harness, &options).unwrap();

    let replayed = fs::read_to_string(&calls).unwrap();
    let report = fixture
        .corpus()
        .join("TARGET-A-FUZZER-hoedur-RUN-01-DURATION-1s-MODE-plain.report.bin.zst");
    assert!(replayed.contains(&format!("run-cov {}", report.display())));
}
