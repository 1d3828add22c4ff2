//! Streaming φ-quantile summary child state.
//!
//! A summary spreads observations over a ring of [`crate::quantile::Stream`]s
//! ("age buckets") so that old data ages out of the reported quantiles. Every
//! flush path acquires the buffer lock, releases it, then acquires the state
//! lock — never the reverse — to avoid deadlock; that order is what
//! [`SummaryChild::flush`] follows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::encoding::{write_bound, write_f64, write_u64};
use crate::error::{MetricsError, Result};
use crate::family::FamilyState;
use crate::label::LabelIdent;
use crate::quantile::{Invariant, Stream};

use super::ChildOps;

/// The pending-sample buffer size inside each age bucket's quantile stream.
/// Fixed independent of the summary's configurable `buffer_capacity` option,
/// which instead sizes the hot/cold observation buffers below.
const STREAM_PENDING_CAPACITY: usize = 500;

struct BufferState {
    hot: Vec<f64>,
    hot_expiry: Instant,
}

struct CoreState {
    streams: Vec<Stream>,
    head_index: usize,
    head_stream_expiry: Instant,
    sum: f64,
    count: u64,
}

/// The per-label-tuple state backing one summary instance.
pub struct SummaryChild {
    buffer: Mutex<BufferState>,
    state: Mutex<CoreState>,
    stream_duration: Duration,
    objectives: Vec<(f64, f64)>,
    buffer_capacity: usize,
    published: AtomicBool,
    ident: LabelIdent,
}

impl SummaryChild {
    pub(crate) fn new(
        objectives: Vec<(f64, f64)>,
        max_age: Duration,
        age_buckets: u32,
        buffer_capacity: usize,
        ident: LabelIdent,
        published: bool,
    ) -> Self {
        let age_buckets = age_buckets.max(1);
        let stream_duration = max_age / age_buckets;
        let invariant = if objectives.is_empty() {
            Invariant::LowBiased(0.01)
        } else {
            Invariant::Targeted(objectives.clone())
        };
        let now = Instant::now();
        let streams = (0..age_buckets)
            .map(|_| Stream::new(invariant.clone(), STREAM_PENDING_CAPACITY))
            .collect();

        Self {
            buffer: Mutex::new(BufferState {
                hot: Vec::new(),
                hot_expiry: now + stream_duration,
            }),
            state: Mutex::new(CoreState {
                streams,
                head_index: 0,
                head_stream_expiry: now + stream_duration,
                sum: 0.0,
                count: 0,
            }),
            stream_duration,
            objectives,
            buffer_capacity: buffer_capacity.max(1),
            published: AtomicBool::new(published),
            ident,
        }
    }

    /// Records an observation. NaN is ignored, matching the histogram's
    /// "no update on NaN" rule.
    pub fn observe(&self, v: f64) {
        if v.is_nan() {
            return;
        }
        let now = Instant::now();
        if now > self.buffer.lock().hot_expiry {
            self.flush(now);
        }

        let full = {
            let mut buf = self.buffer.lock();
            buf.hot.push(v);
            buf.hot.len() >= self.buffer_capacity
        };
        if full {
            self.flush(now);
        }
        self.published.store(true, Ordering::Relaxed);
    }

    /// Swaps the hot buffer out, drains it into every age bucket's stream,
    /// then rotates the ring forward to the hot buffer's new expiry.
    /// Acquires the buffer lock, releases it, then acquires the state lock —
    /// never the reverse.
    fn flush(&self, now: Instant) {
        let (cold, hot_expiry) = {
            let mut buf = self.buffer.lock();
            let cold = std::mem::take(&mut buf.hot);
            while now > buf.hot_expiry {
                buf.hot_expiry += self.stream_duration;
            }
            (cold, buf.hot_expiry)
        };

        let mut state = self.state.lock();
        for v in &cold {
            for stream in state.streams.iter_mut() {
                stream.insert(*v);
            }
            state.sum += v;
            state.count += 1;
        }

        while hot_expiry != state.head_stream_expiry {
            let head = state.head_index;
            state.streams[head].reset();
            let n = state.streams.len();
            state.head_index = (head + 1) % n;
            state.head_stream_expiry += self.stream_duration;
        }
    }

    fn sync(&self) {
        let now = Instant::now();
        if now > self.buffer.lock().hot_expiry {
            self.flush(now);
        }
    }

    /// The running sum of all observed values.
    pub fn sum(&self) -> f64 {
        self.sync();
        self.state.lock().sum
    }

    /// The total observation count.
    pub fn count(&self) -> u64 {
        self.sync();
        self.state.lock().count
    }

    /// Estimates the value at quantile `q`, or NaN if no observation has
    /// landed in the current age window yet.
    pub fn query(&self, q: f64) -> f64 {
        self.sync();
        let state = self.state.lock();
        state.streams[state.head_index].query(q).unwrap_or(f64::NAN)
    }
}

impl ChildOps for SummaryChild {
    fn is_published(&self) -> bool {
        self.published.load(Ordering::Relaxed)
    }

    fn encode(&self, name: &str, out: &mut String) {
        out.push_str(name);
        out.push_str("_sum");
        out.push_str(self.ident.closed());
        out.push(' ');
        write_f64(out, self.sum());
        out.push('\n');

        out.push_str(name);
        out.push_str("_count");
        out.push_str(self.ident.closed());
        out.push(' ');
        write_u64(out, self.count());
        out.push('\n');

        for &(q, _eps) in &self.objectives {
            let value = self.query(q);
            out.push_str(name);
            out.push_str(self.ident.open_prefix());
            out.push_str("quantile=\"");
            write_bound(out, q);
            out.push_str("\"} ");
            write_f64(out, value);
            out.push('\n');
        }
    }
}

/// A registered summary family: the front-door handle returned by
/// [`crate::factory::Factory::summary`].
#[derive(Debug, Clone)]
pub struct Summary {
    family: Arc<FamilyState<SummaryChild>>,
}

impl Summary {
    pub(crate) fn new(family: Arc<FamilyState<SummaryChild>>) -> Self {
        Self { family }
    }

    /// Returns the child for `values`, creating it on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Arc<SummaryChild>> {
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

    fn unlabelled(&self) -> Result<Arc<SummaryChild>> {
        if !self.family.label_schema().is_empty() {
            return Err(MetricsError::invalid(format!(
                "summary \"{}\" has a label schema; use with_label_values",
                self.family.name()
            )));
        }
        self.family.get_or_create(&[])
    }

    /// Records a single observation; only valid for an unlabelled family.
    pub fn observe(&self, value: f64) -> Result<()> {
        self.unlabelled()?.observe(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_and_count_track_observations() {
        let s = SummaryChild::new(
            vec![(0.5, 0.01), (0.9, 0.01), (0.99, 0.01)],
            Duration::from_secs(600),
            5,
            500,
            LabelIdent::default(),
            true,
        );
        s.observe(1.0);
        s.observe(5.0);
        s.observe(10.0);

        assert_eq!(s.sum(), 16.0);
        assert_eq!(s.count(), 3);
    }

    #[test]
    fn quantiles_are_approximately_correct() {
        let s = SummaryChild::new(
            vec![(0.5, 0.01)],
            Duration::from_secs(600),
            5,
            500,
            LabelIdent::default(),
            true,
        );
        for i in 1..=1000 {
            s.observe(i as f64);
        }
        let median = s.query(0.5);
        assert!((median - 500.0).abs() < 50.0, "median = {median}");
    }

    #[test]
    fn empty_summary_reports_nan_quantile() {
        let s = SummaryChild::new(
            vec![(0.5, 0.01)],
            Duration::from_secs(600),
            5,
            500,
            LabelIdent::default(),
            true,
        );
        assert!(s.query(0.5).is_nan());
    }

    #[test]
    fn nan_observation_is_ignored() {
        let s = SummaryChild::new(
            vec![(0.5, 0.01)],
            Duration::from_secs(600),
            5,
            500,
            LabelIdent::default(),
            true,
        );
        s.observe(f64::NAN);
        assert_eq!(s.count(), 0);
        assert_eq!(s.sum(), 0.0);
    }

    #[test]
    fn old_observations_age_out_of_the_window() {
        let s = SummaryChild::new(
            vec![(0.5, 0.01)],
            Duration::from_millis(20),
            2,
            500,
            LabelIdent::default(),
            true,
        );
        s.observe(1.0);
        // Enough time for every age bucket to rotate out at least once.
        std::thread::sleep(Duration::from_millis(80));
        s.observe(2.0);
        // count/sum are lifetime totals and must survive rotation even
        // though the head stream's retained samples do not.
        assert_eq!(s.count(), 2);
        assert_eq!(s.sum(), 3.0);
    }
}
