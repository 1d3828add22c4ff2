//! The metric factory: the front door applications call to create metrics.

use std::sync::Arc;

use crate::error::{MetricsError, Result};
use crate::metrics::counter::Counter;
use crate::metrics::gauge::Gauge;
use crate::metrics::histogram::{resolve_buckets, Histogram};
use crate::metrics::summary::Summary;
use crate::opts::{CommonOpts, HistogramOpts, SummaryOpts};
use crate::registry::Registry;
use crate::validation::{validate_label_name, validate_metric_name};

/// Validates a name, then a label schema against the reserved label (if
/// any) for the metric kind being created.
fn validate_schema(name: &str, label_names: &[String], reserved: Option<&str>) -> Result<()> {
    validate_metric_name(name)?;
    let mut seen = std::collections::HashSet::new();
    for label in label_names {
        validate_label_name(label, reserved)?;
        if !seen.insert(label.as_str()) {
            return Err(MetricsError::invalid(format!(
                "duplicate label name \"{label}\""
            )));
        }
    }
    Ok(())
}

/// Merges a metric's own static labels with the registry's, validating each
/// name against the same rules as the label schema (I1: regex, `__` prefix,
/// the kind's reserved label) and rejecting duplicate names between the two
/// sources.
fn merge_static_labels(
    metric_static: &[(String, String)],
    registry_static: &[(String, String)],
    reserved: Option<&str>,
) -> Result<Vec<(String, String)>> {
    let mut merged = Vec::with_capacity(metric_static.len() + registry_static.len());
    let mut seen = std::collections::HashSet::new();
    for (name, value) in metric_static.iter().chain(registry_static.iter()) {
        validate_label_name(name, reserved)?;
        if !seen.insert(name.clone()) {
            return Err(MetricsError::invalid(format!(
                "duplicate static label name \"{name}\""
            )));
        }
        merged.push((name.clone(), value.clone()));
    }
    Ok(merged)
}

/// Validates arguments, composes static labels, and performs get-or-create
/// against a [`Registry`]. One `Factory` is typically built over one
/// registry and handed to application code as the sole way to mint metrics.
#[derive(Debug, Clone)]
pub struct Factory {
    registry: Arc<Registry>,
}

impl Factory {
    /// Builds a factory fronting `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry this factory creates metrics against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Creates or retrieves a counter family.
    pub fn counter(&self, name: &str, help: &str, opts: CommonOpts) -> Result<Counter> {
        validate_schema(name, &opts.label_names, None)?;
        let static_labels =
            merge_static_labels(&opts.static_labels, &self.registry.static_labels(), None)?;
        let family = self.registry.get_or_add_counter(
            name,
            help,
            opts.label_names,
            static_labels,
            opts.suppress_initial_value,
        )?;
        Ok(Counter::new(family))
    }

    /// Creates or retrieves a gauge family.
    pub fn gauge(&self, name: &str, help: &str, opts: CommonOpts) -> Result<Gauge> {
        validate_schema(name, &opts.label_names, None)?;
        let static_labels =
            merge_static_labels(&opts.static_labels, &self.registry.static_labels(), None)?;
        let family = self.registry.get_or_add_gauge(
            name,
            help,
            opts.label_names,
            static_labels,
            opts.suppress_initial_value,
        )?;
        Ok(Gauge::new(family))
    }

    /// Creates or retrieves a histogram family.
    pub fn histogram(&self, name: &str, help: &str, opts: HistogramOpts) -> Result<Histogram> {
        validate_schema(name, &opts.common.label_names, Some("le"))?;
        let upper_bounds = resolve_buckets(&opts.buckets)?;
        let static_labels = merge_static_labels(
            &opts.common.static_labels,
            &self.registry.static_labels(),
            Some("le"),
        )?;
        let family = self.registry.get_or_add_histogram(
            name,
            help,
            opts.common.label_names,
            static_labels,
            opts.common.suppress_initial_value,
            upper_bounds,
        )?;
        Ok(Histogram::new(family))
    }

    /// Creates or retrieves a summary family.
    pub fn summary(&self, name: &str, help: &str, opts: SummaryOpts) -> Result<Summary> {
        validate_schema(name, &opts.common.label_names, Some("quantile"))?;
        for &(q, _eps) in &opts.objectives {
            if !(0.0..=1.0).contains(&q) {
                return Err(MetricsError::invalid(format!(
                    "summary objective quantile {q} is not in [0, 1]"
                )));
            }
        }
        if opts.age_buckets == 0 {
            return Err(MetricsError::invalid("summary age_buckets must be positive"));
        }
        let static_labels = merge_static_labels(
            &opts.common.static_labels,
            &self.registry.static_labels(),
            Some("quantile"),
        )?;
        let family = self.registry.get_or_add_summary(
            name,
            help,
            opts.common.label_names,
            static_labels,
            opts.common.suppress_initial_value,
            opts.objectives,
            opts.max_age,
            opts.age_buckets,
            opts.buffer_capacity,
        )?;
        Ok(Summary::new(family))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opts::CommonOpts;

    #[test]
    fn rejects_invalid_metric_name() {
        let factory = Factory::new(Arc::new(Registry::new()));
        assert!(factory
            .gauge("my-metric", "h", CommonOpts::default())
            .is_err());
    }

    #[test]
    fn rejects_duplicate_static_labels() {
        let factory = Factory::new(Arc::new(Registry::new()));
        let opts = CommonOpts::default()
            .static_label("region", "eu")
            .static_label("region", "us");
        assert!(factory.gauge("g", "h", opts).is_err());
    }

    #[test]
    fn rejects_invalid_static_label_name() {
        let factory = Factory::new(Arc::new(Registry::new()));
        let opts = CommonOpts::default().static_label("__reserved", "x");
        assert!(factory.gauge("g", "h", opts).is_err());
    }

    #[test]
    fn rejects_reserved_static_label_name_for_histogram() {
        let factory = Factory::new(Arc::new(Registry::new()));
        let opts = HistogramOpts::default().static_label("le", "1");
        assert!(factory.histogram("h", "help", opts).is_err());
    }

    #[test]
    fn schema_conflict_surfaces_from_factory() {
        let factory = Factory::new(Arc::new(Registry::new()));
        factory
            .gauge("Name1", "h", CommonOpts::default().label_names(["label1"]))
            .unwrap();
        let err = factory
            .counter("Name1", "h", CommonOpts::default().label_names(["label1"]))
            .unwrap_err();
        assert!(err.to_string().contains("different type"));
    }

    #[test]
    fn create_and_use_unlabelled_gauge() {
        let factory = Factory::new(Arc::new(Registry::new()));
        let g = factory.gauge("sb64v77", "a gauge", CommonOpts::default()).unwrap();
        g.set(64835.83).unwrap();
        assert_eq!(g.value().unwrap(), 64835.83);
    }

    #[test]
    fn histogram_rejects_non_increasing_buckets() {
        let factory = Factory::new(Arc::new(Registry::new()));
        let opts = HistogramOpts::default().buckets([1.0, 1.0]);
        assert!(factory.histogram("h", "help", opts).is_err());
    }

    #[test]
    fn summary_rejects_zero_age_buckets() {
        let factory = Factory::new(Arc::new(Registry::new()));
        let opts = SummaryOpts::default().age_buckets(0);
        assert!(factory.summary("s", "help", opts).is_err());
    }
}
