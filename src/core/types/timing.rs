use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::types::CrashRecord;

/// First-occurrence records of one run-group, keyed by bug key.
pub type RunGroupTimings = BTreeMap<String, CrashRecord>;

/// Fold one run-group's parsed records into a bug-key mapping.
///
/// With `exclude_generic` only explicitly named bugs are kept. When the same
/// key occurs more than once the later record wins.
pub fn run_group_timings(records: Vec<CrashRecord>, exclude_generic: bool) -> RunGroupTimings {
    records
        .into_iter()
        .filter(|record| !(exclude_generic && record.reason.is_generic()))
        .map(|record| (record.bug_key(), record))
        .collect()
}

/// Per target: bug key -> one optional timestamp per run-group, in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TimingMatrix {
    targets: BTreeMap<String, BTreeMap<String, Vec<Option<u64>>>>,
}

impl TimingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target whose run-groups are given in discovery order.
    ///
    /// Every bug seen in any run-group gets exactly one slot per run-group;
    /// run-groups that did not report the bug get `None`.
    pub fn insert_target(&mut self, target: impl Into<String>, run_groups: &[RunGroupTimings]) {
        let bugs: BTreeSet<&String> = run_groups.iter().flat_map(|group| group.keys()).collect();

        let rows = bugs
            .into_iter()
            .map(|bug| {
                let slots = run_groups
                    .iter()
                    .map(|group| group.get(bug).and_then(|record| record.time))
                    .collect();
                (bug.clone(), slots)
            })
            .collect();

        self.targets.insert(target.into(), rows);
    }

    /// Row for `bug` of `target`, if the bug was ever observed
    pub fn row(&self, target: &str, bug: &str) -> Option<&[Option<u64>]> {
        self.targets
            .get(target)
            .and_then(|bugs| bugs.get(bug))
            .map(Vec::as_slice)
    }

    /// (target, bug, slots) in sorted order
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &[Option<u64>])> {
        self.targets.iter().flat_map(|(target, bugs)| {
            bugs.iter()
                .map(move |(bug, slots)| (target.as_str(), bug.as_str(), slots.as_slice()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CrashReason;

    fn bug(name: &str, time: Option<u64>) -> CrashRecord {
        CrashRecord {
            reason: CrashReason::Bug {
                name: name.to_string(),
            },
            time,
            source: None,
        }
    }

    #[test]
    fn absent_runs_get_explicit_gaps() {
        let groups = vec![
            run_group_timings(vec![bug("Bug1", Some(10))], false),
            run_group_timings(vec![], false),
            run_group_timings(vec![bug("Bug2", Some(3)), bug("Bug1", Some(40))], false),
        ];

        let mut matrix = TimingMatrix::new();
        matrix.insert_target("A", &groups);

        assert_eq!(matrix.row("A", "Bug1"), Some(&[Some(10), None, Some(40)][..]));
        assert_eq!(matrix.row("A", "Bug2"), Some(&[None, None, Some(3)][..]));
        for (_, _, slots) in matrix.rows() {
            assert_eq!(slots.len(), groups.len());
        }
    }

    #[test]
    fn excluding_generic_crashes_keeps_named_bugs() {
        let records = vec![
            bug("Bug1", Some(1)),
            CrashRecord {
                reason: CrashReason::Crash { pc: 1, ra: 2 },
                time: Some(2),
                source: None,
            },
        ];
        let all = run_group_timings(records.clone(), false);
        let named = run_group_timings(records, true);
        assert_eq!(all.len(), 2);
        assert_eq!(named.keys().collect::<Vec<_>>(), vec!["Bug1"]);
    }

    #[test]
    fn later_duplicate_wins() {
        let group = run_group_timings(vec![bug("Bug1", Some(5)), bug("Bug1", Some(9))], false);
        assert_eq!(group["Bug1"].time, Some(9));
    }
}
