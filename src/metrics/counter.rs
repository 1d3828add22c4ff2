//! Monotonic counter child state.
//!
//! `inc` rejects negative deltas — a counter's value is non-decreasing
//! across its lifetime; `inc_to` is a monotone clamp upward.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cell::AtomicF64;
use crate::encoding::write_f64;
use crate::error::{MetricsError, Result};
use crate::family::FamilyState;
use crate::label::LabelIdent;

use super::ChildOps;

/// The per-label-tuple state backing one counter instance.
#[derive(Debug)]
pub struct CounterChild {
    value: AtomicF64,
    published: AtomicBool,
    ident: LabelIdent,
}

impl CounterChild {
    pub(crate) fn new(ident: LabelIdent, published: bool) -> Self {
        Self {
            value: AtomicF64::new(0.0),
            published: AtomicBool::new(published),
            ident,
        }
    }

    /// Increases the counter by `delta`. Fails if `delta` is negative;
    /// NaN is rejected as it can never compare non-negative.
    pub fn inc(&self, delta: f64) -> Result<()> {
        if !(delta >= 0.0) {
            return Err(MetricsError::invalid(
                "counter increment must not be negative",
            ));
        }
        self.value.add(delta);
        self.published.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Sets the value to `target` iff `target` is greater than the current
    /// value — a monotone clamp that can never decrease the counter.
    pub fn inc_to(&self, target: f64) {
        self.value.max_to(target);
        self.published.store(true, Ordering::Relaxed);
    }

    /// The current value.
    pub fn value(&self) -> f64 {
        self.value.load()
    }
}

impl ChildOps for CounterChild {
    fn is_published(&self) -> bool {
        self.published.load(Ordering::Relaxed)
    }

    fn encode(&self, name: &str, out: &mut String) {
        out.push_str(name);
        out.push_str(self.ident.closed());
        out.push(' ');
        write_f64(out, self.value());
        out.push('\n');
    }
}

/// A registered counter family: the front-door handle returned by
/// [`crate::factory::Factory::counter`].
#[derive(Debug, Clone)]
pub struct Counter {
    family: Arc<FamilyState<CounterChild>>,
}

impl Counter {
    pub(crate) fn new(family: Arc<FamilyState<CounterChild>>) -> Self {
        Self { family }
    }

    /// Returns the child for `values`, creating it on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Arc<CounterChild>> {
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

    fn unlabelled(&self) -> Result<Arc<CounterChild>> {
        if !self.family.label_schema().is_empty() {
            return Err(MetricsError::invalid(format!(
                "counter \"{}\" has a label schema; use with_label_values",
                self.family.name()
            )));
        }
        self.family.get_or_create(&[])
    }

    /// Increases the counter by `delta`; only valid for an unlabelled
    /// family. See [`CounterChild::inc`].
    pub fn inc(&self, delta: f64) -> Result<()> {
        self.unlabelled()?.inc(delta)
    }

    /// Sets the value to `target` iff greater than the current value; only
    /// valid for an unlabelled family. See [`CounterChild::inc_to`].
    pub fn inc_to(&self, target: f64) -> Result<()> {
        self.unlabelled()?.inc_to(target);
        Ok(())
    }

    /// The current value; only valid for an unlabelled family.
    pub fn value(&self) -> Result<f64> {
        Ok(self.unlabelled()?.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_rejects_negative_delta() {
        let c = CounterChild::new(LabelIdent::default(), true);
        assert!(c.inc(-1.0).is_err());
        assert_eq!(c.value(), 0.0);
    }

    #[test]
    fn inc_accumulates() {
        let c = CounterChild::new(LabelIdent::default(), true);
        c.inc(1.0).unwrap();
        c.inc(3.2).unwrap();
        assert_eq!(c.value(), 4.2);
    }

    #[test]
    fn inc_to_is_monotone_clamp() {
        let c = CounterChild::new(LabelIdent::default(), true);
        c.inc_to(100.0);
        assert_eq!(c.value(), 100.0);
        c.inc_to(100.0);
        assert_eq!(c.value(), 100.0);
        c.inc_to(10.0);
        assert_eq!(c.value(), 100.0);
    }

    #[test]
    fn unpublished_until_first_mutation() {
        let c = CounterChild::new(LabelIdent::default(), false);
        assert!(!c.is_published());
        c.inc(1.0).unwrap();
        assert!(c.is_published());
    }

    #[test]
    fn property_inc_sums_nonnegative_deltas() {
        fn prop(deltas: Vec<f64>) -> bool {
            let deltas: Vec<f64> = deltas
                .into_iter()
                .filter(|d| d.is_finite() && *d >= 0.0)
                .collect();
            let c = CounterChild::new(LabelIdent::default(), true);
            let expected: f64 = deltas.iter().sum();
            for d in &deltas {
                c.inc(*d).unwrap();
            }
            (c.value() - expected).abs() <= expected.abs() * 1e-9 + 1e-9
        }

        quickcheck::QuickCheck::new()
            .tests(50)
            .quickcheck(prop as fn(Vec<f64>) -> bool)
    }
}
