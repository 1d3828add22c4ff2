//! Ad-hoc, computed-on-scrape collectors: a `Collector` is a
//! `before_collect` callback with state — register it once and its
//! `collect` method runs synchronously ahead of every collection,
//! refreshing whatever metrics it created through its own [`Factory`]
//! handle. This is how `prom-instrument-process-collector` obtains `/proc`
//! values on every scrape without maintaining live atomic state between
//! scrapes.

use std::sync::Arc;

use crate::error::Result;
use crate::registry::Registry;

/// Implemented by types that refresh a fixed set of metrics on every
/// scrape rather than updating them continuously from application code.
///
/// Register with [`install`] to run as part of a [`Registry`]'s
/// `before_collect` pass: a collector that returns an error aborts the
/// scrape as a scrape failure, exactly like any other `before_collect`
/// callback.
pub trait Collector: Send + Sync + 'static {
    /// Recomputes and publishes this collector's metrics. Called
    /// synchronously before every collection once registered.
    fn collect(&self) -> Result<()>;
}

/// Registers `collector` to run as a synchronous `before_collect`
/// callback on `registry`.
pub fn install(registry: &Registry, collector: Arc<dyn Collector>) {
    registry.register_before_collect(move || collector.collect());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Factory;
    use crate::opts::CommonOpts;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug)]
    struct Counting {
        factory: Factory,
        calls: AtomicU64,
    }

    impl Collector for Counting {
        fn collect(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            self.factory
                .gauge("calls", "collector invocation count", CommonOpts::default())?
                .set(n as f64)?;
            Ok(())
        }
    }

    #[test]
    fn installed_collector_runs_before_each_scrape() {
        let registry = Arc::new(Registry::new());
        let factory = Factory::new(registry.clone());
        let collector = Arc::new(Counting {
            factory: factory.clone(),
            calls: AtomicU64::new(0),
        });
        install(&registry, collector);

        let mut out = String::new();
        registry.collect_and_serialize(&mut out).unwrap();
        assert!(out.contains("calls 1"));

        let mut out = String::new();
        registry.collect_and_serialize(&mut out).unwrap();
        assert!(out.contains("calls 2"));
    }
}
