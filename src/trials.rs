//! Randomized-policy trial runner.
//!
//! The RAND policy has no golden output, so the same trace is replayed many
//! times and one hit ratio is pulled from each run. A trial that yields no
//! usable ratio is kept as an explicit [`TrialOutcome::Dropped`] so the
//! completeness check can say why samples are missing.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write as _};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;

use regex::Regex;

use crate::error::{Error, Result};
use crate::simulator::Simulator;

/// Width of the progress bar, in `#` characters.
pub const PROGRESS_WIDTH: usize = 50;

const HIT_RATIO_PREFIX: &str = "OUTPUT HIT RATIO";

static HIT_RATIO_REGEX: OnceLock<Regex> = OnceLock::new();

fn hit_ratio_regex() -> &'static Regex {
    HIT_RATIO_REGEX.get_or_init(|| {
        Regex::new(r"^OUTPUT HIT RATIO (\d+\.\d+)").expect("hit ratio regex")
    })
}

/// Why a trial contributed no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    /// The simulator printed no marker lines at all (usually a crash).
    NoOutput,
    /// Marker lines were printed but none reported a hit ratio.
    NoHitRatio,
    /// A hit-ratio line was printed but its value is not a decimal number.
    MalformedHitRatio,
}

impl DropReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoOutput => "no OUTPUT lines",
            Self::NoHitRatio => "no HIT RATIO line",
            Self::MalformedHitRatio => "malformed HIT RATIO value",
        }
    }
}

/// Result of one randomized trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialOutcome {
    Sample(f64),
    Dropped(DropReason),
}

/// Pull the hit ratio out of one run's marker lines.
///
/// The first line matching `OUTPUT HIT RATIO <digits>.<digits>` wins. A
/// hit-ratio line whose value does not have that shape is only reported as
/// malformed when no well-formed line follows it.
pub fn extract_hit_ratio<S: AsRef<str>>(lines: &[S]) -> TrialOutcome {
    if lines.is_empty() {
        return TrialOutcome::Dropped(DropReason::NoOutput);
    }
    let mut saw_label = false;
    for line in lines {
        let line = line.as_ref();
        if let Some(caps) = hit_ratio_regex().captures(line) {
            if let Ok(ratio) = caps[1].parse::<f64>() {
                return TrialOutcome::Sample(ratio);
            }
        }
        saw_label |= line.starts_with(HIT_RATIO_PREFIX);
    }
    if saw_label {
        TrialOutcome::Dropped(DropReason::MalformedHitRatio)
    } else {
        TrialOutcome::Dropped(DropReason::NoHitRatio)
    }
}

/// Every trial outcome of a randomized run, in trial order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSet {
    pub requested: usize,
    pub outcomes: Vec<TrialOutcome>,
}

impl TrialSet {
    /// Hit ratios from successful trials, in trial order.
    pub fn samples(&self) -> Vec<f64> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                TrialOutcome::Sample(ratio) => Some(*ratio),
                TrialOutcome::Dropped(_) => None,
            })
            .collect()
    }

    /// Count of dropped trials per reason.
    pub fn drop_counts(&self) -> BTreeMap<DropReason, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            if let TrialOutcome::Dropped(reason) = outcome {
                *counts.entry(*reason).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Fixed-width `#` progress bar advanced at an even cadence over `total` ticks.
#[derive(Debug)]
pub struct ProgressBar {
    total: usize,
    enabled: bool,
}

impl ProgressBar {
    /// Draws only when stdout is a terminal.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            enabled: std::io::stdout().is_terminal(),
        }
    }

    pub const fn hidden(total: usize) -> Self {
        Self {
            total,
            enabled: false,
        }
    }

    /// Whether finishing trial `index` should print a `#`.
    ///
    /// Uses a fractional step (`total / 50`) so short runs still fill the bar.
    #[allow(clippy::cast_precision_loss)]
    pub fn ticks_at(&self, index: usize) -> bool {
        let step = self.total as f64 / PROGRESS_WIDTH as f64;
        step > 0.0 && (index as f64) % step == 0.0
    }

    pub fn start(&self) {
        if self.enabled {
            let mut out = std::io::stdout().lock();
            let _ = write!(out, "    [{}]", " ".repeat(PROGRESS_WIDTH));
            let _ = write!(out, "{}", "\u{8}".repeat(PROGRESS_WIDTH + 1));
            let _ = out.flush();
        }
    }

    pub fn advance(&self, index: usize) {
        if self.enabled && self.ticks_at(index) {
            let mut out = std::io::stdout().lock();
            let _ = write!(out, "#");
            let _ = out.flush();
        }
    }

    pub fn finish(&self) {
        if self.enabled {
            println!("]");
        }
    }
}

/// Run `trials` randomized trials across `jobs` worker threads.
///
/// Outcomes are stored by trial index, so the returned order does not
/// depend on scheduling. Any simulator error aborts the whole run.
pub fn run_trials(
    simulator: &dyn Simulator,
    args: &[String],
    trace: &[u8],
    trials: usize,
    jobs: usize,
    progress: &ProgressBar,
) -> Result<TrialSet> {
    let jobs = jobs.clamp(1, trials.max(1));
    let slots: Vec<Mutex<Option<TrialOutcome>>> = (0..trials).map(|_| Mutex::new(None)).collect();
    let next = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let failure: Mutex<Option<Error>> = Mutex::new(None);

    progress.start();
    thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| {
                loop {
                    if failure.lock().map(|f| f.is_some()).unwrap_or(true) {
                        return;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    if index >= trials {
                        return;
                    }
                    match simulator.invoke(args, trace) {
                        Ok(lines) => {
                            let outcome = extract_hit_ratio(&lines);
                            if let TrialOutcome::Dropped(reason) = outcome {
                                tracing::debug!(
                                    trial = index,
                                    reason = reason.label(),
                                    "trial dropped"
                                );
                            }
                            if let Ok(mut slot) = slots[index].lock() {
                                *slot = Some(outcome);
                            }
                            let done = completed.fetch_add(1, Ordering::SeqCst);
                            progress.advance(done);
                        }
                        Err(err) => {
                            if let Ok(mut slot) = failure.lock() {
                                slot.get_or_insert(err);
                            }
                            return;
                        }
                    }
                }
            });
        }
    });
    progress.finish();

    if let Some(err) = failure
        .into_inner()
        .map_err(|_| Error::simulator("trial worker panicked"))?
    {
        return Err(err);
    }

    let outcomes = slots
        .into_iter()
        .map(|slot| {
            slot.into_inner()
                .ok()
                .flatten()
                .ok_or_else(|| Error::simulator("trial finished without an outcome"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TrialSet {
        requested: trials,
        outcomes,
    })
}
