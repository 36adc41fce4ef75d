use std::sync::Arc;

use crate::config::FlyweightConfig;

use super::observer::{CacheObserver, TracingCacheObserver};
use super::registry::FlyweightRegistry;
use super::state::{flyweight_key, SharedState};

/// Creates and shares [`SharedState`] instances keyed by their attributes.
///
/// A lookup either returns the cached instance for the attribute sequence or
/// creates, stores and returns a new one. Nothing is ever evicted.
#[derive(Debug)]
pub struct FlyweightFactory {
    registry: FlyweightRegistry<String, SharedState>,
}

impl Default for FlyweightFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FlyweightFactory {
    /// Create an empty factory that logs lookups through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingCacheObserver))
    }

    /// Create an empty factory reporting lookups to `observer`.
    #[must_use]
    pub fn with_observer(observer: Arc<dyn CacheObserver>) -> Self {
        Self {
            registry: FlyweightRegistry::with_observer(observer),
        }
    }

    /// Create a factory pre-populated with `states`.
    pub fn with_states<I, A, S>(states: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let factory = Self::new();
        factory.seed_all(states);
        factory
    }

    /// Create a factory seeded from configuration.
    #[must_use]
    pub fn from_config(config: &FlyweightConfig) -> Self {
        Self::with_states(config.seed.iter().map(|state| state.iter().map(String::as_str)))
    }

    /// Eagerly cache one state. Returns false if its key was already present.
    pub fn seed<A, S>(&self, attributes: A) -> bool
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = SharedState::new(attributes);
        self.registry.preload(state.key().to_string(), state)
    }

    /// Eagerly cache several states.
    pub fn seed_all<I, A, S>(&self, states: I)
    where
        I: IntoIterator<Item = A>,
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for state in states {
            self.seed(state);
        }
    }

    /// Return the shared state for `attributes`, creating it on first use.
    pub fn get<S: AsRef<str>>(&self, attributes: &[S]) -> Arc<SharedState> {
        let key = flyweight_key(attributes);
        self.registry.get_or_insert_with(key, || {
            SharedState::new(attributes.iter().map(|a| a.as_ref().to_string()))
        })
    }

    /// Number of distinct cached states.
    #[must_use]
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    /// Sorted list of cached keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys = self.registry.keys();
        keys.sort_unstable();
        keys
    }
}
