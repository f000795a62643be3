use std::ops::AddAssign;

use serde::Serialize;

use crate::types::{AppError, AppResult};

/// Accumulated fuzzing duration and execution count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThroughputSummary {
    /// Seconds
    pub duration: u64,
    pub executions: u64,
}

impl ThroughputSummary {
    pub fn new(duration: u64, executions: u64) -> Self {
        Self {
            duration,
            executions,
        }
    }

    /// Executions per second rounded to two decimals; 0 when no time elapsed.
    pub fn rate(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        let rate = self.executions as f64 / self.duration as f64;
        (rate * 100.0).round() / 100.0
    }

    /// Rate as written to summary files: `0` when no time elapsed, otherwise
    /// the shortest decimal form with at least one fractional digit
    /// (`0.5`, `3.33`, `200.0`).
    pub fn rate_text(&self) -> String {
        if self.duration == 0 {
            return "0".to_string();
        }
        let rate = self.rate();
        if rate.fract() == 0.0 {
            format!("{rate:.1}")
        } else {
            rate.to_string()
        }
    }

    /// Parse `duration \t count \t rate` lines written by the executions tool.
    ///
    /// Blank lines and `#` comments are skipped, as are lines that do not
    /// have exactly three fields.
    pub fn parse(input: &str) -> AppResult<Self> {
        let mut total = Self::default();
        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 3 {
                continue;
            }

            total += Self::new(parse_count(fields[0])?, parse_count(fields[1])?);
        }
        Ok(total)
    }
}

impl AddAssign for ThroughputSummary {
    fn add_assign(&mut self, other: Self) {
        self.duration += other.duration;
        self.executions += other.executions;
    }
}

impl std::iter::Sum for ThroughputSummary {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, item| {
            acc += item;
            acc
        })
    }
}

fn parse_count(field: &str) -> AppResult<u64> {
    field
        .trim()
        .parse::<u64>()
        .map_err(|e| AppError::MalformedRecord(format!("invalid sample field {field:?}: {e}")))
}
