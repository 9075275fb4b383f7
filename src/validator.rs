//! Statistical validation of randomized-policy samples.
//!
//! Three independent checks, each scored on its own so that a failure in
//! one never hides the others:
//!
//! | rubric | check        | max |
//! |--------|--------------|-----|
//! | 2.1    | completeness | 5   |
//! | 2.2    | mean         | 10  |
//! | 2.3    | normality    | 5   |
//!
//! The mean tolerance is calibrated for the full 500-trial run; reduced
//! trial counts fail spuriously and are not authoritative.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::report::TestRecord;
use crate::stats::{SHAPIRO_WILK_MIN_SAMPLES, mean, shapiro_wilk};
use crate::trials::TrialSet;

pub const COMPLETENESS_NUMBER: &str = "2.1";
pub const MEAN_NUMBER: &str = "2.2";
pub const NORMALITY_NUMBER: &str = "2.3";

pub const COMPLETENESS_MAX_SCORE: u32 = 5;
pub const MEAN_MAX_SCORE: u32 = 10;
pub const NORMALITY_MAX_SCORE: u32 = 5;

/// Mean reported when no samples were collected.
pub const EMPTY_MEAN_SENTINEL: f64 = -1.0;

/// Normality output when no sample was collected.
pub const NO_TRIAL_DATA: &str = "no trial data for Shapiro Wilk p-value test";

/// Widest histogram that is still drawn.
pub const MAX_HISTOGRAM_COLUMNS: i64 = 1000;

/// Acceptance thresholds for the randomized-policy checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticalCriteria {
    /// Theoretical hit ratio of the reference workload under uniform random eviction.
    pub reference_mean: f64,
    /// Strict upper bound on `|mean - reference_mean|`.
    pub epsilon: f64,
    /// Shapiro–Wilk significance level.
    pub alpha: f64,
}

impl Default for StatisticalCriteria {
    fn default() -> Self {
        Self {
            reference_mean: 0.99430,
            epsilon: 0.00001,
            alpha: 0.05,
        }
    }
}

/// Run all three checks against a finished trial set.
pub fn validate(trials: &TrialSet, criteria: &StatisticalCriteria) -> Vec<TestRecord> {
    let samples = trials.samples();
    vec![
        check_completeness(trials),
        check_mean(&samples, criteria),
        check_normality(&samples, criteria),
    ]
}

/// Pass iff every requested trial produced a sample.
pub fn check_completeness(trials: &TrialSet) -> TestRecord {
    let collected = trials.samples().len();
    if collected == trials.requested {
        return TestRecord::pass(
            COMPLETENESS_NUMBER,
            "random trials success",
            "PASS",
            COMPLETENESS_MAX_SCORE,
        );
    }

    let mut output = format!(
        "{collected} trials succeeded, expected {}",
        trials.requested
    );
    for (reason, count) in trials.drop_counts() {
        let _ = write!(output, "\n  {count} dropped: {}", reason.label());
    }
    TestRecord::fail(
        COMPLETENESS_NUMBER,
        "random trials failed",
        output,
        COMPLETENESS_MAX_SCORE,
    )
}

/// Pass iff the sample mean is strictly within `epsilon` of the reference.
pub fn check_mean(samples: &[f64], criteria: &StatisticalCriteria) -> TestRecord {
    let average = mean(samples).unwrap_or(EMPTY_MEAN_SENTINEL);
    let within =
        !samples.is_empty() && (criteria.reference_mean - average).abs() < criteria.epsilon;
    let name = "random trials average";
    if within {
        TestRecord::pass(
            MEAN_NUMBER,
            name,
            format!(
                "average {average} is within {} of {}",
                criteria.epsilon, criteria.reference_mean
            ),
            MEAN_MAX_SCORE,
        )
    } else {
        TestRecord::fail(
            MEAN_NUMBER,
            name,
            format!(
                "average {average} not within {} of {}",
                criteria.epsilon, criteria.reference_mean
            ),
            MEAN_MAX_SCORE,
        )
    }
}

/// Pass iff Shapiro–Wilk cannot reject normality at `alpha`.
///
/// The histogram is appended whenever at least one sample exists, pass or fail.
pub fn check_normality(samples: &[f64], criteria: &StatisticalCriteria) -> TestRecord {
    let name = "histogram is normal";
    let count = samples.len();
    let (passed, mut output) = if count == 0 {
        (false, NO_TRIAL_DATA.to_string())
    } else if count < SHAPIRO_WILK_MIN_SAMPLES {
        let needed = SHAPIRO_WILK_MIN_SAMPLES;
        (
            false,
            format!("{count} trials are too few for the Shapiro Wilk test (need {needed})"),
        )
    } else {
        match shapiro_wilk(samples) {
            Ok(result) => {
                let (p, alpha) = (result.p_value, criteria.alpha);
                if p >= alpha {
                    (true, format!("Shapiro Wilk p-value {p} >= {alpha}"))
                } else {
                    (false, format!("Shapiro Wilk p-value {p} < {alpha}"))
                }
            }
            Err(err) => (false, format!("Shapiro Wilk test failed: {err}")),
        }
    };

    if count > 0 {
        output.push_str("\n\n");
        output.push_str(&render_histogram(samples, criteria.epsilon));
    }

    if passed {
        TestRecord::pass(NORMALITY_NUMBER, name, output, NORMALITY_MAX_SCORE)
    } else {
        TestRecord::fail(NORMALITY_NUMBER, name, output, NORMALITY_MAX_SCORE)
    }
}

/// Column index of a sample: `floor(10 / (t * epsilon)) / 3`.
///
/// The constants spread hit ratios near 0.9943 over a few dozen columns at
/// epsilon = 1e-5; they must be re-derived if the reference point moves.
/// Returns `None` for samples that cannot be bucketed (t <= 0, non-finite).
pub fn histogram_bucket(t: f64, epsilon: f64) -> Option<i64> {
    if t.is_nan() || t <= 0.0 {
        return None;
    }
    let scaled = (10.0 / (t * epsilon)).floor();
    if !scaled.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let scaled = scaled as i64;
    Some(scaled.div_euclid(3))
}

/// Render an upright text histogram of `samples`, tallest bucket first.
pub fn render_histogram(samples: &[f64], epsilon: f64) -> String {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    let mut skipped = 0usize;
    for &t in samples {
        match histogram_bucket(t, epsilon) {
            Some(bucket) => *counts.entry(bucket).or_insert(0) += 1,
            None => skipped += 1,
        }
    }

    let mut out = String::new();
    if let (Some((&min_bucket, _)), Some((&max_bucket, _))) =
        (counts.first_key_value(), counts.last_key_value())
    {
        let span = max_bucket.saturating_sub(min_bucket).saturating_add(1);
        if span > MAX_HISTOGRAM_COLUMNS {
            let _ = writeln!(
                out,
                "    histogram omitted: samples spread over {span} columns"
            );
        } else {
            let tallest = counts.values().copied().max().unwrap_or(0);
            for row in (0..=tallest).rev() {
                out.push_str("    ");
                for col in min_bucket..=max_bucket {
                    let count = counts.get(&col).copied().unwrap_or(0);
                    out.push(if count >= row { '*' } else { ' ' });
                }
                out.push('\n');
            }
        }
    }
    if skipped > 0 {
        let _ = writeln!(out, "    ({skipped} non-positive samples not shown)");
    }
    out.push_str("    The above histogram should look somewhat like a normal distribution.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trials::{DropReason, TrialOutcome};
    use statrs::distribution::{ContinuousCDF, Normal};

    fn trial_set(requested: usize, outcomes: Vec<TrialOutcome>) -> TrialSet {
        TrialSet {
            requested,
            outcomes,
        }
    }

    /// Evenly spaced normal quantiles around the reference hit ratio.
    fn golden_samples(n: usize) -> Vec<f64> {
        let std_normal = Normal::new(0.0, 1.0).unwrap();
        (1..=n)
            .map(|i| {
                let p = (i as f64 - 0.375) / (n as f64 + 0.25);
                0.99430 + 0.0001 * std_normal.inverse_cdf(p)
            })
            .collect()
    }

    #[test]
    fn golden_path_passes_all_three() {
        let samples = golden_samples(500);
        let set = trial_set(500, samples.into_iter().map(TrialOutcome::Sample).collect());
        let records = validate(&set, &StatisticalCriteria::default());
        assert_eq!(records.len(), 3);
        for record in &records {
            assert!(record.passed(), "{}: {}", record.number, record.output);
        }
        assert_eq!(records[0].number, "2.1");
        assert_eq!(records[1].max_score, 10);
        assert!(records[2].output.contains("Shapiro Wilk p-value"));
        assert!(records[2].output.contains('*'));
    }

    #[test]
    fn zero_samples_fail_every_check_independently() {
        let set = trial_set(500, vec![TrialOutcome::Dropped(DropReason::NoOutput); 500]);
        let records = validate(&set, &StatisticalCriteria::default());

        let completeness = &records[0].output;
        assert_eq!((records[0].score, records[0].max_score), (0, 5));
        assert!(completeness.contains("0 trials succeeded, expected 500"));
        assert!(completeness.contains("500 dropped: no OUTPUT lines"));

        assert_eq!((records[1].score, records[1].max_score), (0, 10));
        assert!(records[1].output.contains("average -1 not within"));

        assert_eq!((records[2].score, records[2].max_score), (0, 5));
        assert_eq!(records[2].output, NO_TRIAL_DATA);
    }

    #[test]
    fn incomplete_run_still_checks_mean_and_normality() {
        let mut outcomes: Vec<_> = golden_samples(500)
            .into_iter()
            .map(TrialOutcome::Sample)
            .collect();
        outcomes[17] = TrialOutcome::Dropped(DropReason::NoHitRatio);
        outcomes[250] = TrialOutcome::Dropped(DropReason::MalformedHitRatio);
        let set = trial_set(500, outcomes);
        let records = validate(&set, &StatisticalCriteria::default());
        assert_eq!(records[0].score, 0);
        assert!(records[0].output.contains("498 trials succeeded"));
        assert!(records[0].output.contains("1 dropped: no HIT RATIO line"));
        assert!(records[2].output.starts_with("Shapiro Wilk p-value"));
    }

    #[test]
    fn mean_tolerance_is_strict() {
        let criteria = StatisticalCriteria {
            reference_mean: 0.5,
            epsilon: 0.25,
            alpha: 0.05,
        };
        assert!(check_mean(&[0.6], &criteria).passed());
        assert!(!check_mean(&[1.0], &criteria).passed());
        assert!(!check_mean(&[0.99], &StatisticalCriteria::default()).passed());
    }

    #[test]
    fn too_few_samples_fail_normality_with_histogram() {
        let record = check_normality(&[0.9943, 0.9944], &StatisticalCriteria::default());
        assert!(!record.passed());
        assert!(record.output.starts_with("2 trials are too few"));
        assert!(record.output.contains("like a normal distribution"));
    }

    #[test]
    fn non_normal_samples_fail_normality() {
        let mut samples = vec![0.98; 250];
        samples.extend(std::iter::repeat_n(0.999, 250));
        let record = check_normality(&samples, &StatisticalCriteria::default());
        assert!(!record.passed());
        assert!(record.output.contains("< 0.05"));
    }

    #[test]
    fn bucket_formula_matches_reference_point() {
        // 10 / (0.9943 * 1e-5) = 1005732.67..., floor / 3 = 335244
        assert_eq!(histogram_bucket(0.9943, 1e-5), Some(335_244));
        assert_eq!(histogram_bucket(0.0, 1e-5), None);
        assert_eq!(histogram_bucket(-0.5, 1e-5), None);
        assert_eq!(histogram_bucket(f64::NAN, 1e-5), None);
    }

    #[test]
    fn histogram_rows_run_from_tallest_to_zero() {
        // Two samples share a bucket, one sits two buckets away.
        let rendered = render_histogram(&[1.0, 1.0, 0.5], 1.0);
        // buckets: 10/1 = 10 -> 3; 10/0.5 = 20 -> 6
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "    *   ");
        assert_eq!(lines[1], "    *  *");
        assert_eq!(lines[2], "    ****");
        assert!(lines[3].contains("normal distribution"));
    }

    #[test]
    fn pathological_spread_is_not_drawn() {
        let rendered = render_histogram(&[0.99, 0.01], 1e-5);
        assert!(rendered.contains("histogram omitted"));
        assert!(rendered.lines().count() <= 2);
    }

    #[test]
    fn zero_samples_are_footnoted() {
        let rendered = render_histogram(&[1.0, 0.0], 1.0);
        assert!(rendered.contains("(1 non-positive samples not shown)"));
    }
}
