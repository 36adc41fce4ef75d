//! Flyweight caching.
//!
//! Intrinsic state is interned once and shared by reference; extrinsic state
//! stays with the caller. [`FlyweightFactory`] is the string-keyed cache for
//! attribute sequences, built on the generic [`FlyweightRegistry`].

/// String-keyed factory for attribute sequences.
pub mod factory;
/// Cache hit/miss observers.
pub mod observer;
/// Generic keyed registry.
pub mod registry;
/// Shared state value and key derivation.
pub mod state;

pub use factory::FlyweightFactory;
pub use observer::{CacheEvent, CacheObserver, TracingCacheObserver};
pub use registry::FlyweightRegistry;
pub use state::{flyweight_key, SharedState};
