use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::types::{AppError, AppResult};

/// Why an input crashed, as reported by the crash-timing tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum CrashReason {
    /// A named bug detected by a bug hook
    Bug { name: String },
    /// Generic fault at a program-counter / return-address pair
    Crash { pc: u64, ra: u64 },
    /// Attempt to execute non-executable memory
    NonExecutable { pc: u64 },
    /// Write into a read-only memory region
    RomWrite { pc: u64, addr: u64 },
}

impl CrashReason {
    /// Stable identity used to correlate the same fault across run-groups
    pub fn bug_key(&self) -> String {
        match self {
            CrashReason::Bug { name } => name.clone(),
            CrashReason::Crash { pc, ra } => format!("crash_pc-{pc:08x}_ra-{ra:08x}"),
            CrashReason::NonExecutable { pc } => format!("non-exec_pc-{pc:08x}"),
            CrashReason::RomWrite { pc, addr } => {
                format!("rom-write_pc-{pc:08x}_addr-{addr:08x}")
            }
        }
    }

    /// True for every class except explicitly named bugs
    pub fn is_generic(&self) -> bool {
        !matches!(self, CrashReason::Bug { .. })
    }

    fn decode(tag: &str, body: &Value) -> AppResult<Self> {
        let field = |name: &str| -> AppResult<u64> {
            body.get(name).and_then(Value::as_u64).ok_or_else(|| {
                AppError::MalformedRecord(format!("{tag} record without numeric `{name}`"))
            })
        };

        match tag {
            "Bug" => {
                let name = match body {
                    Value::String(name) => name.clone(),
                    other => other
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            AppError::MalformedRecord("Bug record without a name".to_string())
                        })?,
                };
                Ok(CrashReason::Bug { name })
            }
            "Crash" => Ok(CrashReason::Crash {
                pc: field("pc")?,
                ra: field("ra")?,
            }),
            "NonExecutable" => Ok(CrashReason::NonExecutable { pc: field("pc")? }),
            "RomWrite" => Ok(CrashReason::RomWrite {
                pc: field("pc")?,
                addr: field("addr")?,
            }),
            other => Err(AppError::UnknownCrashTag(other.to_string())),
        }
    }

    /// Decode an externally tagged reason, either as a single-entry map
    /// (`{Crash: {pc, ra}}`) or as a YAML tag (`!Crash {pc, ra}`).
    pub fn from_yaml(value: &Value) -> AppResult<Self> {
        match value {
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                Self::decode(tag.trim_start_matches('!'), &tagged.value)
            }
            Value::Mapping(map) if map.len() == 1 => {
                let (tag, body) = single_entry(map)?;
                Self::decode(tag, body)
            }
            Value::String(tag) => Err(AppError::UnknownCrashTag(tag.clone())),
            other => Err(AppError::MalformedRecord(format!(
                "unexpected crash reason: {other:?}"
            ))),
        }
    }
}

fn single_entry(map: &Mapping) -> AppResult<(&str, &Value)> {
    let (key, value) = map
        .iter()
        .next()
        .ok_or_else(|| AppError::MalformedRecord("empty crash reason".to_string()))?;
    let tag = key
        .as_str()
        .ok_or_else(|| AppError::MalformedRecord(format!("non-string crash tag: {key:?}")))?;
    Ok((tag, value))
}

impl fmt::Display for CrashReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bug_key())
    }
}

/// Which input first triggered a crash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashSource {
    pub input: Option<u64>,
    pub report: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct CrashTime {
    time: Option<u64>,
    source: Option<CrashSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashRecord {
    pub reason: CrashReason,
    /// Simulated elapsed time in seconds, if known
    pub time: Option<u64>,
    pub source: Option<CrashSource>,
}

impl CrashRecord {
    pub fn bug_key(&self) -> String {
        self.reason.bug_key()
    }
}

/// Parse the crash-timing tool's YAML output: a sequence of
/// `[reason, {time, source}]` pairs.
///
/// An empty document yields no records. A reason tag outside the known
/// classes is returned as [`AppError::UnknownCrashTag`] and must not be
/// treated as a per-job failure.
pub fn parse_crash_timings(input: &str) -> AppResult<Vec<CrashRecord>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: Value = serde_yaml::from_str(input)?;
    let entries = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(entries) => entries,
        other => {
            return Err(AppError::MalformedRecord(format!(
                "expected a sequence of crash timings, got {other:?}"
            )));
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let pair = match entry {
            Value::Sequence(pair) if pair.len() == 2 => pair,
            other => {
                return Err(AppError::MalformedRecord(format!(
                    "expected [reason, timing] pair, got {other:?}"
                )));
            }
        };

        let reason = CrashReason::from_yaml(&pair[0])?;
        let timing: CrashTime = serde_yaml::from_value(pair[1].clone())
            .map_err(|e| AppError::MalformedRecord(format!("invalid crash timing: {e}")))?;

        records.push(CrashRecord {
            reason,
            time: timing.time,
            source: timing.source,
        });
    }

    Ok(records)
}
