//! Hooks into an external draw-batch cache.
//!
//! Payloads that a viewer draws carry an optional [`BatchCacheHooks`] object.
//! The geometry layer notifies it when data changes; it never owns draw data.

use std::fmt;
use std::sync::Arc;

/// What changed since the last draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDirtyMode {
    /// Everything must be rebuilt.
    All,
    /// Only material and shading flags changed.
    Shading,
}

/// Strategy object injected by the embedding application.
pub trait BatchCacheHooks: Send + Sync {
    fn tag_dirty(&self, mode: BatchDirtyMode);
    fn free(&self);
}

/// Optional shared hooks stored on a payload.
#[derive(Clone, Default)]
pub struct BatchCache(Option<Arc<dyn BatchCacheHooks>>);

impl BatchCache {
    pub fn new(hooks: Arc<dyn BatchCacheHooks>) -> Self {
        Self(Some(hooks))
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn tag_dirty(&self, mode: BatchDirtyMode) {
        if let Some(hooks) = &self.0 {
            hooks.tag_dirty(mode);
        }
    }

    pub fn free(&self) {
        if let Some(hooks) = &self.0 {
            hooks.free();
        }
    }
}

impl fmt::Debug for BatchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_set() { "BatchCache(set)" } else { "BatchCache(none)" })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts notifications, for payload tests.
    #[derive(Default)]
    pub(crate) struct CountingHooks {
        pub dirty_all: AtomicUsize,
        pub dirty_shading: AtomicUsize,
        pub freed: AtomicUsize,
    }

    impl BatchCacheHooks for CountingHooks {
        fn tag_dirty(&self, mode: BatchDirtyMode) {
            let counter = match mode {
                BatchDirtyMode::All => &self.dirty_all,
                BatchDirtyMode::Shading => &self.dirty_shading,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }

        fn free(&self) {
            self.freed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_unset_is_noop() {
        let cache = BatchCache::default();
        cache.tag_dirty(BatchDirtyMode::All);
        cache.free();
        assert!(!cache.is_set());
    }

    #[test]
    fn test_forwards_to_hooks() {
        let hooks = Arc::new(CountingHooks::default());
        let cache = BatchCache::new(hooks.clone());
        cache.tag_dirty(BatchDirtyMode::Shading);
        cache.clone().free();
        assert_eq!(hooks.dirty_shading.load(Ordering::Relaxed), 1);
        assert_eq!(hooks.freed.load(Ordering::Relaxed), 1);
    }
}
