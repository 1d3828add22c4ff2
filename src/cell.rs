//! Lock-free numeric accumulators.
//!
//! `AtomicF64` bit-casts an IEEE-754 double into the backing `AtomicU64` and
//! updates it with a CAS loop; the crate's plain integer counters (histogram
//! bucket counts) use `std::sync::atomic::AtomicU64` directly and need no
//! wrapper.

use std::sync::atomic::{AtomicU64, Ordering};

/// A double stored inside a 64-bit integer atomic.
///
/// `add`, `max_to` and `min_to` suspend no threads: each is a
/// `compare_exchange_weak` loop over the bit pattern. A lock here would
/// serialize every observer on the hot instrumentation path.
#[derive(Debug, Default)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Adds `delta`, returning the new value.
    pub(crate) fn add(&self, delta: f64) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let new = f64::from_bits(current) + delta;
            match self.0.compare_exchange_weak(
                current,
                new.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return new,
                Err(actual) => current = actual,
            }
        }
    }

    /// Sets the value to `target` iff `target > current`.
    pub(crate) fn max_to(&self, target: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            if target <= f64::from_bits(current) {
                return;
            }
            match self.0.compare_exchange_weak(
                current,
                target.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Sets the value to `target` iff `target < current`.
    pub(crate) fn min_to(&self, target: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            if target >= f64::from_bits(current) {
                return;
            }
            match self.0.compare_exchange_weak(
                current,
                target.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::QuickCheck;

    #[test]
    fn add_accumulates() {
        let cell = AtomicF64::new(0.0);
        cell.add(1.5);
        cell.add(2.5);
        assert_eq!(cell.load(), 4.0);
    }

    #[test]
    fn max_to_never_decreases() {
        let cell = AtomicF64::new(10.0);
        cell.max_to(5.0);
        assert_eq!(cell.load(), 10.0);
        cell.max_to(20.0);
        assert_eq!(cell.load(), 20.0);
    }

    #[test]
    fn min_to_never_increases() {
        let cell = AtomicF64::new(10.0);
        cell.min_to(20.0);
        assert_eq!(cell.load(), 10.0);
        cell.min_to(5.0);
        assert_eq!(cell.load(), 5.0);
    }

    #[test]
    fn concurrent_add_sums_linearizably() {
        use std::sync::Arc;
        use std::thread;

        let cell = Arc::new(AtomicF64::new(0.0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = cell.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    cell.add(1.0);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cell.load(), 8000.0);
    }

    #[test]
    fn property_add_sums_finite_deltas() {
        fn prop(deltas: Vec<f64>) -> bool {
            let deltas: Vec<f64> = deltas.into_iter().filter(|d| d.is_finite()).collect();
            let cell = AtomicF64::new(0.0);
            let expected: f64 = deltas.iter().sum();
            for d in &deltas {
                cell.add(*d);
            }
            (cell.load() - expected).abs() <= expected.abs() * 1e-9 + 1e-9
        }

        QuickCheck::new().tests(50).quickcheck(prop as fn(Vec<f64>) -> bool)
    }
}
