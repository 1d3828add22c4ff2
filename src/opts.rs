//! Per-metric configuration, built with the same kind of fluent `Opts`
//! structs the wider Prometheus Rust ecosystem uses (see e.g. `HistogramOpts`
//! / `opts!` in `tikv/rust-prometheus`-style clients).

use std::time::Duration;

/// Options shared by every metric kind.
#[derive(Debug, Clone, Default)]
pub struct CommonOpts {
    pub(crate) label_names: Vec<String>,
    pub(crate) static_labels: Vec<(String, String)>,
    pub(crate) suppress_initial_value: bool,
}

impl CommonOpts {
    /// Declares the per-instance label schema, in serialization order.
    pub fn label_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches a label to every child of this family.
    pub fn static_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_labels.push((name.into(), value.into()));
        self
    }

    /// Omits unmodified children from output until their first mutation.
    pub fn suppress_initial_value(mut self, suppress: bool) -> Self {
        self.suppress_initial_value = suppress;
        self
    }
}

/// Configuration for `Factory::counter`/`Factory::gauge`.
pub type CounterOpts = CommonOpts;
/// Configuration for `Factory::gauge`.
pub type GaugeOpts = CommonOpts;

/// Configuration for `Factory::histogram`.
#[derive(Debug, Clone, Default)]
pub struct HistogramOpts {
    pub(crate) common: CommonOpts,
    pub(crate) buckets: Vec<f64>,
}

impl HistogramOpts {
    /// See [`CommonOpts::label_names`].
    pub fn label_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common = self.common.label_names(names);
        self
    }

    /// See [`CommonOpts::static_label`].
    pub fn static_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.common = self.common.static_label(name, value);
        self
    }

    /// See [`CommonOpts::suppress_initial_value`].
    pub fn suppress_initial_value(mut self, suppress: bool) -> Self {
        self.common = self.common.suppress_initial_value(suppress);
        self
    }

    /// Overrides the default bucket boundaries. An empty set keeps the
    /// default buckets; a non-empty set must be strictly increasing.
    pub fn buckets(mut self, buckets: impl IntoIterator<Item = f64>) -> Self {
        self.buckets = buckets.into_iter().collect();
        self
    }
}

/// Configuration for `Factory::summary`.
#[derive(Debug, Clone)]
pub struct SummaryOpts {
    pub(crate) common: CommonOpts,
    pub(crate) objectives: Vec<(f64, f64)>,
    pub(crate) max_age: Duration,
    pub(crate) age_buckets: u32,
    pub(crate) buffer_capacity: usize,
}

impl Default for SummaryOpts {
    fn default() -> Self {
        Self {
            common: CommonOpts::default(),
            objectives: Vec::new(),
            max_age: Duration::from_secs(10 * 60),
            age_buckets: 5,
            buffer_capacity: 500,
        }
    }
}

impl SummaryOpts {
    /// See [`CommonOpts::label_names`].
    pub fn label_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common = self.common.label_names(names);
        self
    }

    /// See [`CommonOpts::static_label`].
    pub fn static_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.common = self.common.static_label(name, value);
        self
    }

    /// See [`CommonOpts::suppress_initial_value`].
    pub fn suppress_initial_value(mut self, suppress: bool) -> Self {
        self.common = self.common.suppress_initial_value(suppress);
        self
    }

    /// `(quantile, epsilon)` pairs to emit. Defaults to none (sum/count
    /// only).
    pub fn objectives(mut self, objectives: impl IntoIterator<Item = (f64, f64)>) -> Self {
        self.objectives = objectives.into_iter().collect();
        self
    }

    /// Total age window over which observations remain visible. Defaults to
    /// 10 minutes.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Ring size used to bound the age window's granularity. Defaults to 5.
    pub fn age_buckets(mut self, age_buckets: u32) -> Self {
        self.age_buckets = age_buckets;
        self
    }

    /// Per-buffer sample capacity before a flush is forced. Defaults to 500.
    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }
}
