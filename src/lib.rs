#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]

//! A process-embedded metrics instrumentation library. Applications record
//! four kinds of numeric observations — monotonic counters, bidirectional
//! gauges, bucketed histograms, and quantile-estimating summaries — and
//! expose them in the Prometheus text exposition format (v0.0.4).
//!
//! The core of this crate is the in-process metric runtime: a
//! registry/factory/collector object graph ([`registry`], [`factory`])
//! that guarantees one child per label tuple ([`family`]), lock-free
//! numeric accumulators ([`cell`]) on the hot observe path, a streaming
//! quantile estimator behind [`metrics::summary`], and a text serializer
//! ([`encoding`]).
//!
//! The HTTP listener and Pushgateway client are thin, feature-gated
//! adapters (`http-listener`, `push-gateway`) around the same
//! [`registry::Registry::collect_and_serialize`] entry point; see
//! [`exporter`] and [`push`].
//!
//! # Examples
//!
//! ```
//! use prom_instrument::factory::Factory;
//! use prom_instrument::opts::CommonOpts;
//! use prom_instrument::registry::Registry;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::new());
//! let factory = Factory::new(registry.clone());
//!
//! let http_requests = factory
//!     .counter(
//!         "http_requests",
//!         "Number of HTTP requests received",
//!         CommonOpts::default().label_names(["method", "path"]),
//!     )
//!     .unwrap();
//!
//! http_requests
//!     .with_label_values(&["GET", "/metrics"])
//!     .unwrap()
//!     .inc(1.0)
//!     .unwrap();
//!
//! let mut buffer = String::new();
//! registry.collect_and_serialize(&mut buffer).unwrap();
//!
//! let expected = "# HELP http_requests Number of HTTP requests received\n".to_owned() +
//!                "# TYPE http_requests counter\n" +
//!                "http_requests{method=\"GET\",path=\"/metrics\"} 1\n";
//! assert_eq!(expected, buffer);
//! ```

pub(crate) mod cell;
/// Ad-hoc, computed-on-scrape collectors.
pub mod collector;
/// Prometheus text v0.0.4 exposition rendering.
pub mod encoding;
/// Error kinds raised by the registry/factory/collector object graph.
pub mod error;
/// The metric factory: validates arguments and mints metrics against a
/// registry.
pub mod factory;
pub(crate) mod family;
/// The process-wide default registry and factory.
pub mod global;
pub(crate) mod label;
/// The four concrete metric kinds: counter, gauge, histogram, summary.
pub mod metrics;
/// Per-metric configuration (`Opts` builders).
pub mod opts;
pub(crate) mod quantile;
/// The collector-family registry.
pub mod registry;
pub(crate) mod validation;

#[cfg(feature = "http-listener")]
/// The pull-mode HTTP exporter adapter.
pub mod exporter;
#[cfg(feature = "push-gateway")]
/// The push-mode Pushgateway client.
pub mod push;
