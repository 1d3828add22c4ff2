//! Metric families: one name/help/kind triple fanning out into per-label-
//! tuple children. A family is monomorphic over exactly one [`ChildOps`]
//! implementor, so no child ever needs a trait object.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::encoding::text::write_family_header;
use crate::error::{MetricsError, Result};
use crate::label::LabelIdent;
use crate::metrics::{ChildOps, MetricKind};

/// Shared state behind every public family handle (`Counter`, `Gauge`,
/// `Histogram`, `Summary`). Cloning a handle clones this `Arc`, so every
/// clone observes the same children.
pub(crate) struct FamilyState<T: ChildOps> {
    name: String,
    help: String,
    kind: MetricKind,
    label_schema: Vec<String>,
    static_labels: Vec<(String, String)>,
    suppress_initial_value: bool,
    children: RwLock<IndexMap<Vec<String>, Arc<T>>>,
    constructor: Box<dyn Fn(LabelIdent, bool) -> T + Send + Sync>,
}

impl<T: ChildOps> FamilyState<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        help: String,
        kind: MetricKind,
        label_schema: Vec<String>,
        static_labels: Vec<(String, String)>,
        suppress_initial_value: bool,
        constructor: Box<dyn Fn(LabelIdent, bool) -> T + Send + Sync>,
    ) -> Self {
        Self {
            name,
            help,
            kind,
            label_schema,
            static_labels,
            suppress_initial_value,
            children: RwLock::new(IndexMap::new()),
            constructor,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kind(&self) -> MetricKind {
        self.kind
    }

    pub(crate) fn label_schema(&self) -> &[String] {
        &self.label_schema
    }

    /// Returns the child for `values`, creating it (unpublished if
    /// `suppress_initial_value` is set) if this is the first time this
    /// label tuple has been seen. `values` must be in schema order and the
    /// same length as the family's label schema.
    pub(crate) fn get_or_create(&self, values: &[String]) -> Result<Arc<T>> {
        if values.len() != self.label_schema.len() {
            return Err(MetricsError::invalid(format!(
                "family \"{}\" expects {} label value(s), got {}",
                self.name,
                self.label_schema.len(),
                values.len()
            )));
        }

        if let Some(child) = self.children.read().get(values) {
            return Ok(child.clone());
        }

        let mut children = self.children.write();
        if let Some(child) = children.get(values) {
            return Ok(child.clone());
        }

        let ident = LabelIdent::build(&self.label_schema, values, &self.static_labels);
        let published = !self.suppress_initial_value;
        let child = Arc::new((self.constructor)(ident, published));
        children.insert(values.to_vec(), child.clone());
        Ok(child)
    }

    /// Removes one child. Returns whether a child existed for `values`.
    pub(crate) fn remove(&self, values: &[String]) -> bool {
        self.children.write().shift_remove(values).is_some()
    }

    /// Removes every child of this family.
    pub(crate) fn clear(&self) {
        self.children.write().clear();
    }

    /// The label-value tuples of every currently registered child, in
    /// insertion order.
    pub(crate) fn all_label_values(&self) -> Vec<Vec<String>> {
        self.children.read().keys().cloned().collect()
    }

    /// Appends the `# HELP`/`# TYPE` header followed by every published
    /// child's line(s).
    pub(crate) fn encode(&self, out: &mut String) {
        write_family_header(out, &self.name, &self.help, self.kind.as_str());
        for child in self.children.read().values() {
            if child.is_published() {
                child.encode(&self.name, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::counter::CounterChild;

    fn test_family() -> FamilyState<CounterChild> {
        FamilyState::new(
            "requests".to_string(),
            "total requests".to_string(),
            MetricKind::Counter,
            vec!["method".to_string()],
            Vec::new(),
            false,
            Box::new(CounterChild::new),
        )
    }

    #[test]
    fn get_or_create_returns_the_same_child_for_the_same_labels() {
        let family = test_family();
        let get = vec!["GET".to_string()];
        let a = family.get_or_create(&get).unwrap();
        a.inc(1.0).unwrap();
        let b = family.get_or_create(&get).unwrap();
        assert_eq!(b.value(), 1.0);
        assert_eq!(family.all_label_values().len(), 1);
    }

    #[test]
    fn get_or_create_rejects_wrong_arity() {
        let family = test_family();
        assert!(family.get_or_create(&[]).is_err());
    }

    #[test]
    fn remove_and_clear() {
        let family = test_family();
        let get = vec!["GET".to_string()];
        let put = vec!["PUT".to_string()];
        family.get_or_create(&get).unwrap();
        family.get_or_create(&put).unwrap();
        assert!(family.remove(&get));
        assert!(!family.remove(&get));
        assert_eq!(family.all_label_values(), vec![put.clone()]);
        family.clear();
        assert!(family.all_label_values().is_empty());
    }

    #[test]
    fn encode_skips_unpublished_children() {
        let family = FamilyState::new(
            "requests".to_string(),
            "total requests".to_string(),
            MetricKind::Counter,
            vec!["method".to_string()],
            Vec::new(),
            true,
            Box::new(CounterChild::new),
        );
        family.get_or_create(&["GET".to_string()]).unwrap();
        let mut out = String::new();
        family.encode(&mut out);
        assert_eq!(out, "# HELP requests total requests\n# TYPE requests counter\n");
    }
}
