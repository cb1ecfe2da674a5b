//! Rolling analysis statistics for the dashboard.
//!
//! [`TrendAggregator`] keeps the runs of the last `window_days` days in
//! arrival order and updates its counters incrementally as runs are recorded
//! and as old runs fall out of the window.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::quality_gate::RunStatus;
use crate::types::Timestamp;

/// Default rolling window in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// One recorded analysis run, reduced to what trends need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    pub recorded_at: Timestamp,
    pub status: RunStatus,
    /// `None` for `error` runs, which are never scored.
    pub overall_score: Option<f64>,
}

/// Point-in-time summary over the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSummary {
    pub window_days: u32,
    pub total_analyses: u64,
    pub passed: u64,
    pub failed: u64,
    pub errored: u64,
    /// Mean `overall_score` of scored runs; `None` when nothing was scored.
    pub average_overall_score: Option<f64>,
    /// `passed / (passed + failed)` as a percentage.
    pub pass_rate: Option<f64>,
}

/// One day of the trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub date: NaiveDate,
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub errored: u64,
    pub average_overall_score: Option<f64>,
}

impl TrendBucket {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total: 0,
            passed: 0,
            failed: 0,
            errored: 0,
            average_overall_score: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total: u64,
    passed: u64,
    failed: u64,
    errored: u64,
    score_sum: f64,
    scored: u64,
}

impl Counters {
    fn apply(&mut self, sample: &TrendSample, sign: i64) {
        let bump = |v: &mut u64| {
            *v = if sign > 0 { *v + 1 } else { v.saturating_sub(1) };
        };
        bump(&mut self.total);
        match sample.status {
            RunStatus::Pass => bump(&mut self.passed),
            RunStatus::Fail => bump(&mut self.failed),
            RunStatus::Error => bump(&mut self.errored),
        }
        if let Some(score) = sample.overall_score {
            bump(&mut self.scored);
            self.score_sum += sign as f64 * score;
        }
    }

    fn average(&self) -> Option<f64> {
        (self.scored > 0).then(|| round2(self.score_sum / self.scored as f64))
    }
}

/// Incrementally maintained rolling statistics.
#[derive(Debug, Clone)]
pub struct TrendAggregator {
    window_days: u32,
    samples: VecDeque<TrendSample>,
    counters: Counters,
}

impl TrendAggregator {
    pub fn new(window_days: u32) -> Self {
        Self {
            window_days: window_days.max(1),
            samples: VecDeque::new(),
            counters: Counters::default(),
        }
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    fn cutoff(&self, now: Timestamp) -> Timestamp {
        now - Duration::days(i64::from(self.window_days))
    }

    /// Record a newly inserted run.
    ///
    /// Samples usually arrive in time order; a late sample is inserted at its
    /// sorted position so eviction stays correct.
    pub fn record(&mut self, sample: TrendSample, now: Timestamp) {
        if sample.recorded_at < self.cutoff(now) {
            return;
        }
        self.counters.apply(&sample, 1);
        let pos = self
            .samples
            .iter()
            .rposition(|s| s.recorded_at <= sample.recorded_at)
            .map_or(0, |i| i + 1);
        self.samples.insert(pos, sample);
        self.evict(now);
    }

    /// Drop samples that fell out of the window.
    pub fn evict(&mut self, now: Timestamp) {
        let cutoff = self.cutoff(now);
        while let Some(front) = self.samples.front() {
            if front.recorded_at >= cutoff {
                break;
            }
            if let Some(old) = self.samples.pop_front() {
                self.counters.apply(&old, -1);
            }
        }
        if self.samples.is_empty() {
            self.counters = Counters::default();
        }
    }

    /// Summary over the whole window as of `now`.
    pub fn summary(&mut self, now: Timestamp) -> TrendSummary {
        self.evict(now);
        let c = &self.counters;
        let decided = c.passed + c.failed;
        TrendSummary {
            window_days: self.window_days,
            total_analyses: c.total,
            passed: c.passed,
            failed: c.failed,
            errored: c.errored,
            average_overall_score: c.average(),
            pass_rate: (decided > 0).then(|| round2(100.0 * c.passed as f64 / decided as f64)),
        }
    }

    /// Daily buckets for the last `days` days (clamped to the window), oldest
    /// first, including days without runs.
    pub fn series(&mut self, days: u32, now: Timestamp) -> Vec<TrendBucket> {
        self.evict(now);
        let days = days.clamp(1, self.window_days);
        let today = now.date_naive();
        let first = today - Duration::days(i64::from(days) - 1);

        let mut buckets: Vec<TrendBucket> = (0..days)
            .map(|i| TrendBucket::empty(first + Duration::days(i64::from(i))))
            .collect();
        let mut per_bucket = vec![Counters::default(); buckets.len()];

        for sample in &self.samples {
            let date = sample.recorded_at.date_naive();
            if date < first || date > today {
                continue;
            }
            let idx = (date - first).num_days() as usize;
            per_bucket[idx].apply(sample, 1);
        }

        for (bucket, c) in buckets.iter_mut().zip(per_bucket) {
            bucket.total = c.total;
            bucket.passed = c.passed;
            bucket.failed = c.failed;
            bucket.errored = c.errored;
            bucket.average_overall_score = c.average();
        }
        buckets
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
