//! The collector-family registry.
//!
//! A [`Registry`] owns the full set of registered families (keyed by name),
//! the registry-wide static label set, and the `before_collect` callback
//! lists that run ahead of every scrape. It never removes a family once
//! registered; individual children may still be added or removed through
//! their family handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::error::{MetricsError, Result};
use crate::family::FamilyState;
use crate::metrics::counter::CounterChild;
use crate::metrics::gauge::GaugeChild;
use crate::metrics::histogram::HistogramChild;
use crate::metrics::summary::SummaryChild;
use crate::metrics::MetricKind;
use crate::validation::validate_label_name;

/// Applies spec §7's callback error policy: a scrape failure is the
/// explicit signal to abort the whole collection, but no other callback
/// error may prevent the remaining callbacks and families from being
/// collected.
fn tolerate_callback_error(result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err @ MetricsError::ScrapeFailure(_)) => Err(err),
        Err(err) => {
            tracing::warn!(error = %err, "before_collect callback failed, continuing collection");
            Ok(())
        }
    }
}

/// One registered family, tagged by kind. This is the single point in the
/// crate where metric kinds are dispatched dynamically; everywhere else,
/// code is monomorphic over one [`crate::metrics::ChildOps`] implementor.
#[derive(Clone)]
enum RegisteredFamily {
    Counter(Arc<FamilyState<CounterChild>>),
    Gauge(Arc<FamilyState<GaugeChild>>),
    Histogram(Arc<FamilyState<HistogramChild>>),
    Summary(Arc<FamilyState<SummaryChild>>),
}

impl RegisteredFamily {
    fn kind(&self) -> MetricKind {
        match self {
            RegisteredFamily::Counter(f) => f.kind(),
            RegisteredFamily::Gauge(f) => f.kind(),
            RegisteredFamily::Histogram(f) => f.kind(),
            RegisteredFamily::Summary(f) => f.kind(),
        }
    }

    fn label_schema(&self) -> &[String] {
        match self {
            RegisteredFamily::Counter(f) => f.label_schema(),
            RegisteredFamily::Gauge(f) => f.label_schema(),
            RegisteredFamily::Histogram(f) => f.label_schema(),
            RegisteredFamily::Summary(f) => f.label_schema(),
        }
    }

    fn encode(&self, out: &mut String) {
        match self {
            RegisteredFamily::Counter(f) => f.encode(out),
            RegisteredFamily::Gauge(f) => f.encode(out),
            RegisteredFamily::Histogram(f) => f.encode(out),
            RegisteredFamily::Summary(f) => f.encode(out),
        }
    }
}

// `Arc`, not `Box`: the sync callback list is snapshotted by cloning its
// entries out from under a brief lock, then run with the lock released
// (spec §5's "short critical sections around insert/iterate"; callbacks
// "may block arbitrarily").
type SyncCallback = Arc<dyn Fn() -> Result<()> + Send + Sync>;
type AsyncCallback = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Append-only container of metric families sharing a common set of static
/// labels and a common collection pipeline.
pub struct Registry {
    collectors: RwLock<IndexMap<String, RegisteredFamily>>,
    static_labels: RwLock<Vec<(String, String)>>,
    static_labels_set: AtomicBool,
    before_collect: Mutex<Vec<SyncCallback>>,
    before_collect_async: Mutex<Vec<AsyncCallback>>,
    before_first_collect: Mutex<Option<SyncCallback>>,
    has_collected: AtomicBool,
    first_collect_lock: Mutex<()>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("families", &self.collectors.read().len())
            .field("has_collected", &self.has_collected.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty, independent registry. Applications that want
    /// isolation (most tests) use this rather than [`crate::global`]'s
    /// process-wide default.
    pub fn new() -> Self {
        Self {
            collectors: RwLock::new(IndexMap::new()),
            static_labels: RwLock::new(Vec::new()),
            static_labels_set: AtomicBool::new(false),
            before_collect: Mutex::new(Vec::new()),
            before_collect_async: Mutex::new(Vec::new()),
            before_first_collect: Mutex::new(None),
            has_collected: AtomicBool::new(false),
            first_collect_lock: Mutex::new(()),
        }
    }

    pub(crate) fn static_labels(&self) -> Vec<(String, String)> {
        self.static_labels.read().clone()
    }

    /// Sets the registry's static labels. Fails once any family has been
    /// registered, any collection has occurred, or this method has already
    /// been called successfully once (I4: static labels are set at most
    /// once).
    pub fn set_static_labels(
        &self,
        labels: impl IntoIterator<Item = (String, String)>,
    ) -> Result<()> {
        if self.static_labels_set.load(Ordering::Relaxed) {
            return Err(MetricsError::StateViolation(
                "static labels have already been set".to_string(),
            ));
        }
        if !self.collectors.read().is_empty() {
            return Err(MetricsError::StateViolation(
                "cannot set static labels after a metric has been registered".to_string(),
            ));
        }
        if self.has_collected.load(Ordering::Relaxed) {
            return Err(MetricsError::StateViolation(
                "cannot set static labels after the first collection".to_string(),
            ));
        }
        let labels: Vec<(String, String)> = labels.into_iter().collect();
        for (name, _value) in &labels {
            validate_label_name(name, None)?;
        }
        *self.static_labels.write() = labels;
        self.static_labels_set.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Registers a synchronous callback run, in registration order, before
    /// every collection.
    pub fn register_before_collect(&self, callback: impl Fn() -> Result<()> + Send + Sync + 'static) {
        self.before_collect.lock().push(Arc::new(callback));
    }

    /// Registers an asynchronous callback run, concurrently with its
    /// siblings, before every collection.
    pub fn register_before_collect_async<F>(&self, callback: impl Fn() -> F + Send + Sync + 'static)
    where
        F: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.before_collect_async
            .lock()
            .push(Box::new(move || Box::pin(callback())));
    }

    /// Installs the hook run exactly once, before the very first
    /// collection. Used to lazily install default process/runtime metrics.
    pub fn set_before_first_collect(&self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) {
        *self.before_first_collect.lock() = Some(Arc::new(hook));
    }

    fn get_or_add(
        &self,
        name: &str,
        kind: MetricKind,
        label_schema: &[String],
        build: impl FnOnce() -> RegisteredFamily,
    ) -> Result<RegisteredFamily> {
        if let Some(existing) = self.collectors.read().get(name) {
            return Self::check_conflict(existing, kind, label_schema).map(|()| existing.clone());
        }

        let mut collectors = self.collectors.write();
        if let Some(existing) = collectors.get(name) {
            return Self::check_conflict(existing, kind, label_schema).map(|()| existing.clone());
        }

        let family = build();
        collectors.insert(name.to_string(), family.clone());
        Ok(family)
    }

    fn check_conflict(
        existing: &RegisteredFamily,
        kind: MetricKind,
        label_schema: &[String],
    ) -> Result<()> {
        if existing.kind() != kind {
            return Err(MetricsError::SchemaConflict(
                "Collector of a different type with the same name is already registered."
                    .to_string(),
            ));
        }
        if existing.label_schema() != label_schema {
            return Err(MetricsError::SchemaConflict(
                "Collector matches a previous registration but has a different set of label names."
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn get_or_add_counter(
        &self,
        name: &str,
        help: &str,
        label_schema: Vec<String>,
        static_labels: Vec<(String, String)>,
        suppress_initial_value: bool,
    ) -> Result<Arc<FamilyState<CounterChild>>> {
        let schema_for_check = label_schema.clone();
        let registered = self.get_or_add(name, MetricKind::Counter, &schema_for_check, || {
            RegisteredFamily::Counter(Arc::new(FamilyState::new(
                name.to_string(),
                help.to_string(),
                MetricKind::Counter,
                label_schema,
                static_labels,
                suppress_initial_value,
                Box::new(CounterChild::new),
            )))
        })?;
        match registered {
            RegisteredFamily::Counter(f) => Ok(f),
            _ => unreachable!("kind checked by get_or_add"),
        }
    }

    pub(crate) fn get_or_add_gauge(
        &self,
        name: &str,
        help: &str,
        label_schema: Vec<String>,
        static_labels: Vec<(String, String)>,
        suppress_initial_value: bool,
    ) -> Result<Arc<FamilyState<GaugeChild>>> {
        let schema_for_check = label_schema.clone();
        let registered = self.get_or_add(name, MetricKind::Gauge, &schema_for_check, || {
            RegisteredFamily::Gauge(Arc::new(FamilyState::new(
                name.to_string(),
                help.to_string(),
                MetricKind::Gauge,
                label_schema,
                static_labels,
                suppress_initial_value,
                Box::new(GaugeChild::new),
            )))
        })?;
        match registered {
            RegisteredFamily::Gauge(f) => Ok(f),
            _ => unreachable!("kind checked by get_or_add"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn get_or_add_histogram(
        &self,
        name: &str,
        help: &str,
        label_schema: Vec<String>,
        static_labels: Vec<(String, String)>,
        suppress_initial_value: bool,
        upper_bounds: Vec<f64>,
    ) -> Result<Arc<FamilyState<HistogramChild>>> {
        let schema_for_check = label_schema.clone();
        let registered = self.get_or_add(name, MetricKind::Histogram, &schema_for_check, || {
            let bounds = upper_bounds.clone();
            RegisteredFamily::Histogram(Arc::new(FamilyState::new(
                name.to_string(),
                help.to_string(),
                MetricKind::Histogram,
                label_schema,
                static_labels,
                suppress_initial_value,
                Box::new(move |ident, published| {
                    HistogramChild::new(bounds.clone(), ident, published)
                }),
            )))
        })?;
        match registered {
            RegisteredFamily::Histogram(f) => Ok(f),
            _ => unreachable!("kind checked by get_or_add"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn get_or_add_summary(
        &self,
        name: &str,
        help: &str,
        label_schema: Vec<String>,
        static_labels: Vec<(String, String)>,
        suppress_initial_value: bool,
        objectives: Vec<(f64, f64)>,
        max_age: std::time::Duration,
        age_buckets: u32,
        buffer_capacity: usize,
    ) -> Result<Arc<FamilyState<SummaryChild>>> {
        let schema_for_check = label_schema.clone();
        let registered = self.get_or_add(name, MetricKind::Summary, &schema_for_check, || {
            let objectives = objectives.clone();
            RegisteredFamily::Summary(Arc::new(FamilyState::new(
                name.to_string(),
                help.to_string(),
                MetricKind::Summary,
                label_schema,
                static_labels,
                suppress_initial_value,
                Box::new(move |ident, published| {
                    SummaryChild::new(
                        objectives.clone(),
                        max_age,
                        age_buckets,
                        buffer_capacity,
                        ident,
                        published,
                    )
                }),
            )))
        })?;
        match registered {
            RegisteredFamily::Summary(f) => Ok(f),
            _ => unreachable!("kind checked by get_or_add"),
        }
    }

    /// Runs the full collection pipeline and appends the Prometheus text
    /// v0.0.4 exposition to `out`: first-collect hook, synchronous
    /// `before_collect` callbacks, asynchronous callbacks run concurrently,
    /// then every family in registration order. A callback returning
    /// [`MetricsError::ScrapeFailure`] aborts the whole collection; any
    /// other error is logged and the remaining callbacks and families are
    /// still collected.
    pub fn collect_and_serialize(&self, out: &mut String) -> Result<()> {
        {
            let _guard = self.first_collect_lock.lock();
            if !self.has_collected.load(Ordering::Relaxed) {
                if let Some(hook) = self.before_first_collect.lock().as_ref() {
                    tolerate_callback_error(hook())?;
                }
                self.has_collected.store(true, Ordering::Relaxed);
            }
        }

        let sync_callbacks: Vec<SyncCallback> = self.before_collect.lock().iter().cloned().collect();
        for callback in sync_callbacks {
            tolerate_callback_error(callback())?;
        }

        let async_callbacks: Vec<_> = {
            let guard = self.before_collect_async.lock();
            guard.iter().map(|cb| cb()).collect()
        };
        if !async_callbacks.is_empty() {
            let results = futures::executor::block_on(futures::future::join_all(async_callbacks));
            for result in results {
                tolerate_callback_error(result)?;
            }
        }

        for (_, family) in self.collectors.read().iter() {
            family.encode(out);
        }
        Ok(())
    }
}
