use tracing::debug;

/// A cache lookup outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// The key was already cached; the existing instance was returned.
    Hit {
        /// The cache key looked up.
        key: String,
    },
    /// The key was not cached; a new instance was created and stored.
    Miss {
        /// The cache key looked up.
        key: String,
    },
}

impl CacheEvent {
    /// The key this lookup was for.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Hit { key } | Self::Miss { key } => key,
        }
    }

    /// Returns true for a cache hit.
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }
}

/// Receives hit/miss notifications from a flyweight cache.
///
/// Observers run on the calling thread after the cache lock is released and
/// cannot influence the returned value.
pub trait CacheObserver: Send + Sync {
    /// Called once per lookup.
    fn on_event(&self, event: &CacheEvent);
}

/// Default observer: emits a `debug` event per lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCacheObserver;

impl CacheObserver for TracingCacheObserver {
    fn on_event(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Hit { key } => debug!(key = %key, "reusing existing flyweight"),
            CacheEvent::Miss { key } => {
                debug!(key = %key, "can't find a flyweight, creating new one");
            }
        }
    }
}
