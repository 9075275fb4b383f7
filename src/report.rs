//! Scoring and reporting.
//!
//! Every check produces one [`TestRecord`]. Records are sorted by their
//! dotted rubric number (numerically, component by component), summed per
//! top-level rubric item, printed as a summary table, and persisted as a
//! JSON array in a file named after the local time the run finished.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Timestamp layout used for result file names.
pub const RESULTS_FILE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// One scored check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Dotted rubric number, e.g. `"1.10"`.
    pub number: String,
    pub name: String,
    /// Free-form detail: `"PASS"`, a diff excerpt, a statistic.
    pub output: String,
    pub score: u32,
    pub max_score: u32,
}

impl TestRecord {
    /// A record that earned its full score.
    pub fn pass(
        number: impl Into<String>,
        name: impl Into<String>,
        output: impl Into<String>,
        max_score: u32,
    ) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            output: output.into(),
            score: max_score,
            max_score,
        }
    }

    /// A record that earned nothing.
    pub fn fail(
        number: impl Into<String>,
        name: impl Into<String>,
        output: impl Into<String>,
        max_score: u32,
    ) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            output: output.into(),
            score: 0,
            max_score,
        }
    }

    #[must_use]
    pub const fn passed(&self) -> bool {
        self.score == self.max_score
    }

    /// Parsed rubric number, if well formed.
    pub fn rubric(&self) -> Option<RubricNumber> {
        self.number.parse().ok()
    }
}

/// A dotted rubric identifier compared component-wise as integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RubricNumber(Vec<u32>);

impl RubricNumber {
    /// First dotted component: the rubric item this check rolls up into.
    pub fn item(&self) -> u32 {
        self.0.first().copied().unwrap_or_default()
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for RubricNumber {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts = s
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| format!("invalid rubric number `{s}`"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self(parts))
    }
}

impl fmt::Display for RubricNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_char('.')?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

/// Sort records by rubric number; malformed numbers go last, in input order.
pub fn sort_records(records: &mut [TestRecord]) {
    for record in records.iter() {
        if record.rubric().is_none() {
            tracing::warn!(number = %record.number, "unparseable rubric number");
        }
    }
    records.sort_by(|a, b| match (a.rubric(), b.rubric()) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Score totals for one top-level rubric item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemTotal {
    pub score: u32,
    pub max_score: u32,
}

/// Sum score and max score per top-level rubric item.
///
/// The item is the text before the first dot, parsed as an integer; records
/// whose number does not parse are left out.
pub fn aggregate(records: &[TestRecord]) -> BTreeMap<u32, ItemTotal> {
    let mut totals: BTreeMap<u32, ItemTotal> = BTreeMap::new();
    for record in records {
        let Some(rubric) = record.rubric() else {
            continue;
        };
        let entry = totals.entry(rubric.item()).or_default();
        entry.score += record.score;
        entry.max_score += record.max_score;
    }
    totals
}

/// Grand total across all items.
pub fn grand_total(totals: &BTreeMap<u32, ItemTotal>) -> ItemTotal {
    totals
        .values()
        .fold(ItemTotal::default(), |acc, item| ItemTotal {
            score: acc.score + item.score,
            max_score: acc.max_score + item.max_score,
        })
}

/// Render the results summary table.
pub fn render_summary(totals: &BTreeMap<u32, ItemTotal>) -> String {
    let mut out = String::from("Results Summary\n");
    for (item, total) in totals {
        let _ = writeln!(
            out,
            "  Rubric Item {item}: {}/{}",
            total.score, total.max_score
        );
    }
    let total = grand_total(totals);
    let _ = writeln!(
        out,
        "\n  Total Autograded Score: {}/{}",
        total.score, total.max_score
    );
    out
}

/// Path of the results file for a run that finished at `now`.
pub fn results_path(results_dir: &Path, now: &DateTime<Local>) -> PathBuf {
    results_dir.join(format!("{}.json", now.format(RESULTS_FILE_FORMAT)))
}

/// Write `records` as a JSON array under `results_dir`, named by `now`.
///
/// A second run within the same second overwrites the first file.
pub fn write_results(
    results_dir: &Path,
    now: &DateTime<Local>,
    records: &[TestRecord],
) -> Result<PathBuf> {
    std::fs::create_dir_all(results_dir).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!(
                "cannot create results directory {}: {err}",
                results_dir.display()
            ),
        )
    })?;
    let path = results_path(results_dir, now);
    let json = serde_json::to_string(records)?;
    std::fs::write(&path, json).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("cannot write results file {}: {err}", path.display()),
        )
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn record(number: &str, score: u32, max_score: u32) -> TestRecord {
        TestRecord {
            number: number.to_string(),
            name: format!("check {number}"),
            output: String::new(),
            score,
            max_score,
        }
    }

    fn total(score: u32, max_score: u32) -> ItemTotal {
        ItemTotal { score, max_score }
    }

    #[test]
    fn rubric_numbers_sort_numerically() {
        let mut records = vec![
            record("3.1", 1, 1),
            record("1.10", 2, 2),
            record("1.2", 0, 2),
        ];
        sort_records(&mut records);
        let order: Vec<_> = records.iter().map(|r| r.number.as_str()).collect();
        assert_eq!(order, vec!["1.2", "1.10", "3.1"]);
    }

    #[test]
    fn malformed_numbers_sort_last() {
        let mut records = vec![record("x", 0, 1), record("2.1", 5, 5)];
        sort_records(&mut records);
        assert_eq!(records[0].number, "2.1");
        assert_eq!(records[1].number, "x");
    }

    #[test]
    fn rubric_number_round_trips_display() {
        let parsed: RubricNumber = "2.10.3".parse().unwrap();
        assert_eq!(parsed.components(), &[2, 10, 3]);
        assert_eq!(parsed.item(), 2);
        assert_eq!(parsed.to_string(), "2.10.3");
        assert!("2..1".parse::<RubricNumber>().is_err());
    }

    #[test]
    fn aggregate_groups_by_top_level_item() {
        let records = vec![
            record("1.1", 2, 2),
            record("1.2", 0, 2),
            record("2.1", 5, 5),
            record("2.2", 0, 10),
            record("3.1", 1, 1),
        ];
        let totals = aggregate(&records);
        assert_eq!(totals[&1], total(2, 4));
        assert_eq!(totals[&2], total(5, 15));
        assert_eq!(totals[&3], total(1, 1));
        assert_eq!(grand_total(&totals), total(8, 20));

        let summary = render_summary(&totals);
        assert!(summary.contains("  Rubric Item 1: 2/4\n"));
        assert!(summary.contains("  Rubric Item 2: 5/15\n"));
        assert!(summary.contains("Total Autograded Score: 8/20"));
    }

    #[test]
    fn record_serializes_with_expected_keys() {
        let record = TestRecord::pass("1.1", "lru-1-1-1-t", "PASS", 2);
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "number": "1.1",
                "name": "lru-1-1-1-t",
                "output": "PASS",
                "score": 2,
                "max_score": 2,
            })
        );
    }

    #[test]
    fn results_file_is_named_by_timestamp() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("test_results");
        let now = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let records = vec![record("1.1", 2, 2)];
        let path = write_results(&dir, &now, &records).unwrap();
        assert_eq!(path, dir.join("2026-03-04-05-06-07.json"));

        let written: Vec<TestRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, records);
    }

    #[test]
    fn unwritable_results_dir_is_an_io_error_naming_the_path() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("test_results");
        std::fs::write(&blocker, "not a directory").unwrap();
        let now = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();

        let err = write_results(&blocker.join("nested"), &now, &[]).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "unexpected error: {err:?}");
        let message = err.to_string();
        assert!(message.contains("results directory"), "{message}");
        assert!(message.contains("test_results"), "{message}");
    }

    proptest! {
        #[test]
        fn sorted_order_matches_component_order(
            numbers in prop::collection::vec(prop::collection::vec(0u32..20, 1..4), 0..20)
        ) {
            let mut records: Vec<TestRecord> = numbers
                .iter()
                .map(|parts| {
                    let number = parts.iter().map(u32::to_string).collect::<Vec<_>>().join(".");
                    record(&number, 0, 1)
                })
                .collect();
            sort_records(&mut records);
            let parsed: Vec<Vec<u32>> = records
                .iter()
                .map(|r| r.rubric().unwrap().components().to_vec())
                .collect();
            let mut expected = numbers.clone();
            expected.sort();
            prop_assert_eq!(parsed, expected);
        }

        #[test]
        fn aggregate_equals_per_item_sums(
            entries in prop::collection::vec((1u32..5, 1u32..30, 0u32..11, 0u32..11), 0..40)
        ) {
            let records: Vec<TestRecord> = entries
                .iter()
                .map(|&(item, sub, a, b)| record(&format!("{item}.{sub}"), a.min(b), a.max(b)))
                .collect();
            let totals = aggregate(&records);
            for (item, total) in &totals {
                let score: u32 = records
                    .iter()
                    .filter(|r| r.rubric().unwrap().item() == *item)
                    .map(|r| r.score)
                    .sum();
                let max: u32 = records
                    .iter()
                    .filter(|r| r.rubric().unwrap().item() == *item)
                    .map(|r| r.max_score)
                    .sum();
                prop_assert_eq!(total.score, score);
                prop_assert_eq!(total.max_score, max);
            }
            let overall = grand_total(&totals);
            prop_assert_eq!(overall.score, records.iter().map(|r| r.score).sum::<u32>());
        }
    }
}
