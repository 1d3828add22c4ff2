//! Biased-sample quantile estimator (Cormode–Korn–Muthukrishnan–Srivastava).
//!
//! One [`Stream`] backs one age bucket of a
//! [`crate::metrics::summary::Summary`]; the summary owns a ring of these
//! and rotates which one is queried as time passes.

/// A single retained sample: `value` with `width` equal to the number of
/// ranks it represents and `delta`, the maximum rank uncertainty introduced
/// when it was inserted.
#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    width: u64,
    delta: u64,
}

/// The error-bound function `f(r, n)` selected at construction time.
#[derive(Debug, Clone)]
pub(crate) enum Invariant {
    /// `2·ε·r` — tighter bound near rank 0 (low quantiles).
    LowBiased(f64),
    /// `2·ε·(N−r)` — tighter bound near rank N (high quantiles).
    HighBiased(f64),
    /// `min` over configured `(q, ε)` targets.
    Targeted(Vec<(f64, f64)>),
}

impl Invariant {
    fn f(&self, r: f64, n: f64) -> f64 {
        match self {
            Invariant::LowBiased(eps) => 2.0 * eps * r,
            Invariant::HighBiased(eps) => 2.0 * eps * (n - r),
            Invariant::Targeted(targets) => targets
                .iter()
                .map(|&(q, eps)| {
                    if q * n <= r {
                        2.0 * eps * r / q
                    } else {
                        2.0 * eps * (n - r) / (1.0 - q)
                    }
                })
                .fold(f64::INFINITY, f64::min),
        }
    }
}

/// One age bucket's worth of CKMS state: a compressed list of retained
/// samples plus a pending insert buffer that is merged in once full.
#[derive(Debug, Clone)]
pub(crate) struct Stream {
    invariant: Invariant,
    buffer_capacity: usize,
    samples: Vec<Sample>,
    pending: Vec<f64>,
    n: u64,
}

impl Stream {
    pub(crate) fn new(invariant: Invariant, buffer_capacity: usize) -> Self {
        Self {
            invariant,
            buffer_capacity: buffer_capacity.max(1),
            samples: Vec::new(),
            pending: Vec::new(),
            n: 0,
        }
    }

    /// Clears all retained state, as if the stream were freshly constructed.
    /// Used when an age bucket rotates out of the window.
    pub(crate) fn reset(&mut self) {
        self.samples.clear();
        self.pending.clear();
        self.n = 0;
    }

    /// Appends a value, merging the pending buffer into the compressed list
    /// once it reaches capacity.
    pub(crate) fn insert(&mut self, value: f64) {
        self.pending.push(value);
        if self.pending.len() >= self.buffer_capacity {
            self.flush_pending();
        }
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut incoming = std::mem::take(&mut self.pending);
        incoming.sort_by(|a, b| a.partial_cmp(b).unwrap());
        self.merge(&incoming);
        self.compress();
    }

    /// Walks the main list in value order, inserting each incoming sample
    /// immediately before the first existing sample with a greater value.
    fn merge(&mut self, incoming: &[f64]) {
        let mut i = 0;
        let mut r: f64 = 0.0;

        for &value in incoming {
            while i < self.samples.len() && self.samples[i].value <= value {
                r += self.samples[i].width as f64;
                i += 1;
            }

            let delta = if i == 0 || i == self.samples.len() {
                0
            } else {
                let bound = self.invariant.f(r, self.n as f64).floor() - 1.0;
                bound.max(0.0) as u64
            };

            self.samples.insert(
                i,
                Sample {
                    value,
                    width: 1,
                    delta,
                },
            );
            self.n += 1;
            r += 1.0;
            i += 1;
        }
    }

    /// Scans from the right, merging each sample into its right neighbour
    /// when doing so would not exceed the invariant's error bound.
    fn compress(&mut self) {
        if self.samples.len() < 2 {
            return;
        }

        let n = self.n as f64;
        let mut i = self.samples.len() - 1;
        let mut r = n - 1.0 - self.samples[i].width as f64;

        while i > 0 {
            let left = i - 1;
            let mergeable = (self.samples[left].width + self.samples[i].width) as f64
                + self.samples[i].delta as f64
                <= self.invariant.f(r, n);

            if mergeable {
                let left_width = self.samples[left].width;
                self.samples[i].width += left_width;
                self.samples.remove(left);
                i -= 1;
            } else {
                r -= self.samples[left].width as f64;
                i -= 1;
            }
        }
    }

    /// Estimates the value at quantile `q` in `[0, 1]`.
    ///
    /// Before the first flush the pending buffer is used directly as a
    /// sorted sample array and indexed by `floor(q * len)`.
    pub(crate) fn query(&self, q: f64) -> Option<f64> {
        if self.samples.is_empty() {
            if self.pending.is_empty() {
                return None;
            }
            let mut sorted = self.pending.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let idx = ((q * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
            return Some(sorted[idx]);
        }

        let n = self.n as f64;
        let target = (q * n).ceil();
        let eps_term = self.invariant.f(target, n);
        let t = target + (eps_term / 2.0).ceil();

        let mut r = 0.0;
        for sample in &self.samples {
            r += sample.width as f64;
            if r + sample.delta as f64 > t {
                return Some(sample.value);
            }
        }
        self.samples.last().map(|s| s.value)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.pending.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len() + self.pending.len()
    }
}
