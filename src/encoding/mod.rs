//! Text exposition format implementation.
//!
//! This crate only emits Prometheus text v0.0.4 — no `# EOF` terminator, no
//! `# UNIT` line, no protobuf or OpenMetrics-only features (exemplars,
//! native histograms).

/// Low-level rendering helpers for metric names, numbers, and bounds.
pub mod text;

pub(crate) use text::{write_bound, write_f64, write_u64};
