use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::types::{AppResult, ThroughputSummary, TimingMatrix};

/// One line per (target, bug): target, bug key, then one field per
/// run-group (`-` where the bug was not observed).
pub fn write_timing_lines<W: Write>(matrix: &TimingMatrix, out: &mut W) -> io::Result<()> {
    for (target, bug, slots) in matrix.rows() {
        write!(out, "{target} {bug}")?;
        for slot in slots {
            match slot {
                Some(time) => write!(out, " {time}")?,
                None => write!(out, " -")?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// `target\trate` per target, in the order given.
pub fn write_throughput_lines<W: Write>(
    summaries: &[(String, ThroughputSummary)],
    out: &mut W,
) -> io::Result<()> {
    for (target, summary) in summaries {
        writeln!(out, "{target}\t{}", summary.rate_text())?;
    }
    Ok(())
}

/// Pretty JSON with four-space indentation.
///
/// Maps are `serde_json::Map`/`BTreeMap` backed, so keys come out sorted and
/// identical inputs give byte-identical files.
pub fn to_json_string<T: Serialize + ?Sized>(value: &T) -> AppResult<String> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_json_string(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CrashReason, CrashRecord, run_group_timings};
    use pretty_assertions::assert_eq;

    fn matrix() -> TimingMatrix {
        let record = |name: &str, time| CrashRecord {
            reason: CrashReason::Bug {
                name: name.to_string(),
            },
            time: Some(time),
            source: None,
        };
        let mut matrix = TimingMatrix::new();
        matrix.insert_target(
            "B",
            &[run_group_timings(vec![record("Bug2", 7), record("Bug1", 0)], false)],
        );
        matrix.insert_target(
            "A",
            &[
                run_group_timings(vec![record("Bug1", 10)], false),
                run_group_timings(vec![], false),
            ],
        );
        matrix
    }

    #[test]
    fn lines_are_sorted_with_gap_markers() {
        let mut out = Vec::new();
        write_timing_lines(&matrix(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "A Bug1 10 -\nB Bug1 0\nB Bug2 7\n"
        );
    }

    #[test]
    fn throughput_lines_keep_target_order() {
        let summaries = vec![
            ("P2IM/CNC".to_string(), ThroughputSummary::new(100, 50)),
            ("A".to_string(), ThroughputSummary::default()),
        ];
        let mut out = Vec::new();
        write_throughput_lines(&summaries, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "P2IM/CNC\t0.5\nA\t0\n");
    }

    #[test]
    fn json_keys_are_sorted_and_absent_is_null() {
        let json = to_json_string(&matrix()).unwrap();
        assert_eq!(
            json,
            "{\n    \"A\": {\n        \"Bug1\": [\n            10,\n            null\n        ]\n    },\n    \"B\": {\n        \"Bug1\": [\n            0\n        ],\n        \"Bug2\": [\n            7\n        ]\n    }\n}\n"
        );
    }
}
