//! Concrete metric kinds: [`counter`], [`gauge`], [`histogram`], [`summary`].
//!
//! Each child type implements [`ChildOps`] so that [`crate::family::FamilyState`]
//! can drive serialization without virtual dispatch — the only tagged
//! dispatch in the crate lives one level up, in
//! [`crate::registry::RegisteredFamily`].

/// Monotonic counter child state and its family handle.
pub mod counter;
/// Bidirectional gauge child state and its family handle.
pub mod gauge;
/// Histogram child state, bucket generators, and its family handle.
pub mod histogram;
/// Streaming quantile summary child state and its family handle.
pub mod summary;

/// The four metric kinds a family may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonic, double-valued cumulative total.
    Counter,
    /// A freely mutable, double-valued instantaneous measurement.
    Gauge,
    /// Observation counts bucketed by a fixed, strictly increasing set of
    /// cumulative upper bounds, plus running `sum` and `count`.
    Histogram,
    /// A streaming estimate of selected φ-quantiles over a sliding age
    /// window, plus running `sum` and `count`.
    Summary,
}

impl MetricKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }

}

/// Implemented by every per-label-tuple child state. Drives serialization
/// from [`crate::family::FamilyState`] without needing a trait object: a
/// family is monomorphic over exactly one `ChildOps` implementor.
pub(crate) trait ChildOps: Send + Sync + 'static {
    /// Whether this child should appear in the current scrape. A child
    /// starts unpublished and flips to published on its first write.
    fn is_published(&self) -> bool;

    /// Appends this child's metric line(s) to `out`. `name` is the family
    /// name (without kind-specific suffix — each kind adds its own, e.g.
    /// `_bucket`/`_sum`/`_count`).
    fn encode(&self, name: &str, out: &mut String);
}
