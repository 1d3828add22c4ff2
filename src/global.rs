//! The process-wide default registry: lazily initialized shared state with
//! explicit init and teardown hooks, alongside the ordinary API for
//! building fully independent registries (used by tests and
//! isolation-seeking callers).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::factory::Factory;
use crate::registry::Registry;

static DEFAULT: Mutex<Option<Arc<Registry>>> = Mutex::new(None);

/// The lazily initialized, process-wide default registry.
///
/// The first call constructs it; every later call (and every call from any
/// thread) observes the same instance, until [`reset_default_registry`]
/// tears it down.
pub fn default_registry() -> Arc<Registry> {
    let mut slot = DEFAULT.lock();
    if let Some(registry) = slot.as_ref() {
        return registry.clone();
    }
    let registry = Arc::new(Registry::new());
    *slot = Some(registry.clone());
    registry
}

/// A [`Factory`] fronting the process-wide default registry. Most
/// applications only ever need this one factory.
pub fn default_factory() -> Factory {
    Factory::new(default_registry())
}

/// Explicitly installs `registry` as the process-wide default. Must be
/// called before [`default_registry`]/[`default_factory`] is ever used;
/// fails (returning the registry back) if the default has already been
/// initialized.
pub fn init_default_registry(registry: Arc<Registry>) -> std::result::Result<(), Arc<Registry>> {
    let mut slot = DEFAULT.lock();
    if slot.is_some() {
        return Err(registry);
    }
    *slot = Some(registry);
    Ok(())
}

/// Tears down the process-wide default registry, so the next call to
/// [`default_registry`]/[`default_factory`] lazily builds (or
/// [`init_default_registry`] installs) a fresh one.
///
/// Gated behind `test-util`: production code has no legitimate reason to
/// reset process-wide state out from under other callers, but tests that
/// exercise the global default want isolation from one another.
#[cfg(any(test, feature = "test-util"))]
pub fn reset_default_registry() {
    *DEFAULT.lock() = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_is_a_singleton() {
        reset_default_registry();
        let a = default_registry();
        let b = default_registry();
        assert!(Arc::ptr_eq(&a, &b));
        reset_default_registry();
    }

    #[test]
    fn reset_allows_a_fresh_default_to_be_built() {
        reset_default_registry();
        let a = default_registry();
        reset_default_registry();
        let b = default_registry();
        assert!(!Arc::ptr_eq(&a, &b));
        reset_default_registry();
    }

    #[test]
    fn init_fails_once_a_default_already_exists() {
        reset_default_registry();
        default_registry();
        assert!(init_default_registry(Arc::new(Registry::new())).is_err());
        reset_default_registry();
    }
}
