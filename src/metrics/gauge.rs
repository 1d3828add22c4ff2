//! Freely mutable gauge child state.
//!
//! `dec_to` never increases the value; `inc_to` never decreases it;
//! `dec(x)` is `inc(-x)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cell::AtomicF64;
use crate::encoding::write_f64;
use crate::error::{MetricsError, Result};
use crate::family::FamilyState;
use crate::label::LabelIdent;

use super::ChildOps;

/// The per-label-tuple state backing one gauge instance.
#[derive(Debug)]
pub struct GaugeChild {
    value: AtomicF64,
    published: AtomicBool,
    ident: LabelIdent,
}

impl GaugeChild {
    pub(crate) fn new(ident: LabelIdent, published: bool) -> Self {
        Self {
            value: AtomicF64::new(0.0),
            published: AtomicBool::new(published),
            ident,
        }
    }

    /// Sets the gauge to `v`.
    pub fn set(&self, v: f64) {
        self.value.store(v);
        self.publish();
    }

    /// Increases the gauge by `d`.
    pub fn inc(&self, d: f64) {
        self.value.add(d);
        self.publish();
    }

    /// Decreases the gauge by `d`. Equivalent to `inc(-d)`.
    pub fn dec(&self, d: f64) {
        self.inc(-d);
    }

    /// Sets the gauge to `v` iff `v` is greater than the current value.
    pub fn inc_to(&self, v: f64) {
        self.value.max_to(v);
        self.publish();
    }

    /// Sets the gauge to `v` iff `v` is less than the current value.
    pub fn dec_to(&self, v: f64) {
        self.value.min_to(v);
        self.publish();
    }

    /// The current value.
    pub fn value(&self) -> f64 {
        self.value.load()
    }

    fn publish(&self) {
        self.published.store(true, Ordering::Relaxed);
    }
}

impl ChildOps for GaugeChild {
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

/// A registered gauge family: the front-door handle returned by
/// [`crate::factory::Factory::gauge`].
///
/// Forwards zero-argument operations to the unlabelled child (valid only
/// when the family's label schema is empty).
#[derive(Debug, Clone)]
pub struct Gauge {
    family: Arc<FamilyState<GaugeChild>>,
}

impl Gauge {
    pub(crate) fn new(family: Arc<FamilyState<GaugeChild>>) -> Self {
        Self { family }
    }

    /// Returns the child for `values`, creating it on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Arc<GaugeChild>> {
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

    fn unlabelled(&self) -> Result<Arc<GaugeChild>> {
        if !self.family.label_schema().is_empty() {
            return Err(MetricsError::invalid(format!(
                "gauge \"{}\" has a label schema; use with_label_values",
                self.family.name()
            )));
        }
        self.family.get_or_create(&[])
    }

    /// See [`GaugeChild::set`]; only valid for an unlabelled family.
    pub fn set(&self, v: f64) -> Result<()> {
        self.unlabelled()?.set(v);
        Ok(())
    }

    /// See [`GaugeChild::inc`]; only valid for an unlabelled family.
    pub fn inc(&self, d: f64) -> Result<()> {
        self.unlabelled()?.inc(d);
        Ok(())
    }

    /// See [`GaugeChild::dec`]; only valid for an unlabelled family.
    pub fn dec(&self, d: f64) -> Result<()> {
        self.unlabelled()?.dec(d);
        Ok(())
    }

    /// See [`GaugeChild::inc_to`]; only valid for an unlabelled family.
    pub fn inc_to(&self, v: f64) -> Result<()> {
        self.unlabelled()?.inc_to(v);
        Ok(())
    }

    /// See [`GaugeChild::dec_to`]; only valid for an unlabelled family.
    pub fn dec_to(&self, v: f64) -> Result<()> {
        self.unlabelled()?.dec_to(v);
        Ok(())
    }

    /// See [`GaugeChild::value`]; only valid for an unlabelled family.
    pub fn value(&self) -> Result<f64> {
        Ok(self.unlabelled()?.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_inc_dec() {
        let g = GaugeChild::new(LabelIdent::default(), true);
        g.inc(1.0);
        assert_eq!(g.value(), 1.0);
        g.inc(3.2);
        assert_eq!(g.value(), 4.2);
        g.set(4.0);
        assert_eq!(g.value(), 4.0);
        g.dec(0.2);
        assert_eq!(g.value(), 3.8);
    }

    #[test]
    fn dec_to_never_increases() {
        let g = GaugeChild::new(LabelIdent::default(), true);
        g.set(999.0);
        g.dec_to(100.0);
        assert_eq!(g.value(), 100.0);
        g.dec_to(100.0);
        assert_eq!(g.value(), 100.0);
        g.dec_to(500.0);
        assert_eq!(g.value(), 100.0);
    }

    #[test]
    fn inc_to_never_decreases() {
        let g = GaugeChild::new(LabelIdent::default(), true);
        g.inc_to(100.0);
        assert_eq!(g.value(), 100.0);
        g.inc_to(10.0);
        assert_eq!(g.value(), 100.0);
        g.inc_to(200.0);
        assert_eq!(g.value(), 200.0);
    }
}
