//! Histogram child state and bucket generators.
//!
//! Bucket counts and the `sum` cell are independent atomics updated without
//! a shared lock, so a concurrent collection may observe `sum` and
//! `Σ counts` momentarily disagree — callers must tolerate approximate
//! concurrent reads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::cell::AtomicF64;
use crate::encoding::{write_bound, write_f64, write_u64};
use crate::error::{MetricsError, Result};
use crate::family::FamilyState;
use crate::label::LabelIdent;

use super::ChildOps;

/// The default bucket boundaries used when a histogram is created with no
/// explicit `buckets` override.
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Linearly spaced buckets: `[start, start+width, ..., start+(count-1)*width]`.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Result<Vec<f64>> {
    if count == 0 {
        return Err(MetricsError::invalid("linear bucket count must be positive"));
    }
    Ok((0..count).map(|i| start + width * i as f64).collect())
}

/// Exponentially spaced buckets: `[start, start*factor, start*factor^2, ...]`.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Result<Vec<f64>> {
    if count == 0 {
        return Err(MetricsError::invalid(
            "exponential bucket count must be positive",
        ));
    }
    if start <= 0.0 {
        return Err(MetricsError::invalid(
            "exponential bucket start must be positive",
        ));
    }
    if factor <= 1.0 {
        return Err(MetricsError::invalid(
            "exponential bucket factor must be greater than 1",
        ));
    }
    Ok((0..count).map(|i| start * factor.powi(i as i32)).collect())
}

/// Validates and appends `+Inf` (unless already present) to a caller-
/// supplied bucket list, defaulting to [`DEFAULT_BUCKETS`] when empty.
pub(crate) fn resolve_buckets(buckets: &[f64]) -> Result<Vec<f64>> {
    let source: Vec<f64> = if buckets.is_empty() {
        DEFAULT_BUCKETS.to_vec()
    } else {
        buckets.to_vec()
    };

    for pair in source.windows(2) {
        if !(pair[0] < pair[1]) {
            return Err(MetricsError::invalid(
                "histogram buckets must be strictly increasing",
            ));
        }
    }

    let mut resolved = source;
    if resolved.last().copied() != Some(f64::INFINITY) {
        resolved.push(f64::INFINITY);
    }
    Ok(resolved)
}

/// The per-label-tuple state backing one histogram instance.
#[derive(Debug)]
pub struct HistogramChild {
    upper_bounds: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum: AtomicF64,
    published: AtomicBool,
    ident: LabelIdent,
}

impl HistogramChild {
    pub(crate) fn new(upper_bounds: Vec<f64>, ident: LabelIdent, published: bool) -> Self {
        let counts = upper_bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            upper_bounds,
            counts,
            sum: AtomicF64::new(0.0),
            published: AtomicBool::new(published),
            ident,
        }
    }

    /// Records `count` occurrences of `value`. A NaN value is ignored.
    pub fn observe(&self, value: f64, count: u64) {
        if value.is_nan() {
            return;
        }
        if let Some(i) = self
            .upper_bounds
            .iter()
            .position(|&bound| value <= bound)
        {
            self.counts[i].fetch_add(count, Ordering::Relaxed);
        }
        self.sum.add(value * count as f64);
        self.published.store(true, Ordering::Relaxed);
    }

    /// The running sum of all observed values.
    pub fn sum(&self) -> f64 {
        self.sum.load()
    }

    /// The total observation count, i.e. the sum of every bucket count.
    pub fn count(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

impl ChildOps for HistogramChild {
    fn is_published(&self) -> bool {
        self.published.load(Ordering::Relaxed)
    }

    fn encode(&self, name: &str, out: &mut String) {
        out.push_str(name);
        out.push_str("_sum");
        out.push_str(self.ident.closed());
        out.push(' ');
        write_f64(out, self.sum());
        out.push('\n');

        out.push_str(name);
        out.push_str("_count");
        out.push_str(self.ident.closed());
        out.push(' ');
        write_u64(out, self.count());
        out.push('\n');

        let mut cumulative = 0u64;
        for (bound, count) in self.upper_bounds.iter().zip(self.counts.iter()) {
            cumulative += count.load(Ordering::Relaxed);
            out.push_str(name);
            out.push_str("_bucket");
            out.push_str(self.ident.open_prefix());
            out.push_str("le=\"");
            write_bound(out, *bound);
            out.push_str("\"} ");
            write_u64(out, cumulative);
            out.push('\n');
        }
    }
}

/// A registered histogram family: the front-door handle returned by
/// [`crate::factory::Factory::histogram`].
#[derive(Debug, Clone)]
pub struct Histogram {
    family: Arc<FamilyState<HistogramChild>>,
}

impl Histogram {
    pub(crate) fn new(family: Arc<FamilyState<HistogramChild>>) -> Self {
        Self { family }
    }

    /// Returns the child for `values`, creating it on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Arc<HistogramChild>> {
        let values: Vec<String> = values.iter().map(|s| s.to_string()).collect();
        self.family.get_or_create(&values)
    }

    /// Removes the child for `values`. Returns whether one existed.
    pub fn remove(&self, values: &[&str]) -> bool {
        let values: Vec<String> = values.iter().map(|s| s.to_string()).collect();
        self.family.remove(&values)
    }

    /// The label-value tuples of every currently registered child.
    pub fn all_label_values(&self) -> Vec<Vec<String>> {
        self.family.all_label_values()
    }

    /// Removes every child of this family.
    pub fn clear(&self) {
        self.family.clear();
    }

    fn unlabelled(&self) -> Result<Arc<HistogramChild>> {
        if !self.family.label_schema().is_empty() {
            return Err(MetricsError::invalid(format!(
                "histogram \"{}\" has a label schema; use with_label_values",
                self.family.name()
            )));
        }
        self.family.get_or_create(&[])
    }

    /// Records a single observation of `value`; only valid for an
    /// unlabelled family. See [`HistogramChild::observe`].
    pub fn observe(&self, value: f64) -> Result<()> {
        self.unlabelled()?.observe(value, 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_matches_scenario_s5() {
        let got = exponential_buckets(1.1, 2.4, 4).unwrap();
        let want = [1.1, 2.64, 6.336, 15.2064];
        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-9, "{g} != {w}");
        }
    }

    #[test]
    fn linear_matches_scenario_s5() {
        let got = linear_buckets(1.1, 2.4, 4).unwrap();
        assert_eq!(got, vec![1.1, 3.5, 5.9, 8.3]);
    }

    #[test]
    fn generators_reject_bad_arguments() {
        assert!(linear_buckets(0.0, 1.0, 0).is_err());
        assert!(exponential_buckets(0.0, 2.0, 4).is_err());
        assert!(exponential_buckets(-1.0, 2.0, 4).is_err());
        assert!(exponential_buckets(1.0, 1.0, 4).is_err());
        assert!(exponential_buckets(1.0, 0.5, 4).is_err());
    }

    #[test]
    fn resolve_buckets_appends_infinity() {
        let resolved = resolve_buckets(&[1.0, 2.0]).unwrap();
        assert_eq!(resolved, vec![1.0, 2.0, f64::INFINITY]);
    }

    #[test]
    fn resolve_buckets_uses_default_when_empty() {
        let resolved = resolve_buckets(&[]).unwrap();
        assert_eq!(resolved.len(), DEFAULT_BUCKETS.len() + 1);
        assert_eq!(*resolved.last().unwrap(), f64::INFINITY);
    }

    #[test]
    fn resolve_buckets_rejects_non_increasing() {
        assert!(resolve_buckets(&[1.0, 1.0]).is_err());
        assert!(resolve_buckets(&[2.0, 1.0]).is_err());
    }

    #[test]
    fn count_equals_sum_of_bucket_counts() {
        let bounds = resolve_buckets(&[1.0, 5.0, 10.0]).unwrap();
        let h = HistogramChild::new(bounds, LabelIdent::default(), true);
        for v in [0.5, 2.0, 7.0, 100.0] {
            h.observe(v, 1);
        }
        assert_eq!(h.count(), 4);
        assert_eq!(h.sum(), 0.5 + 2.0 + 7.0 + 100.0);
    }

    #[test]
    fn bucket_counts_are_cumulative_in_output() {
        let bounds = resolve_buckets(&[1.0, 5.0]).unwrap();
        let h = HistogramChild::new(bounds, LabelIdent::default(), true);
        h.observe(0.5, 1);
        h.observe(3.0, 1);
        h.observe(100.0, 1);

        let mut out = String::new();
        h.encode("req_duration", &mut out);
        assert!(out.contains("req_duration_bucket{le=\"1\"} 1\n"));
        assert!(out.contains("req_duration_bucket{le=\"5\"} 2\n"));
        assert!(out.contains("req_duration_bucket{le=\"+Inf\"} 3\n"));
    }

    #[test]
    fn nan_observation_is_ignored() {
        let bounds = resolve_buckets(&[1.0]).unwrap();
        let h = HistogramChild::new(bounds, LabelIdent::default(), true);
        h.observe(f64::NAN, 1);
        assert_eq!(h.count(), 0);
        assert_eq!(h.sum(), 0.0);
    }
}
