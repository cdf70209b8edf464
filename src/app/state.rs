//! Process-wide application state.
//!
//! # Design Decisions
//! - Keyed by string, values are type-erased `Arc`s
//! - The map synchronizes per key; values carry no extra locking, so shared
//!   mutable values must bring their own (atomics, `Mutex`, channels)

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;

type Value = Arc<dyn Any + Send + Sync>;

/// Key/value store shared by every connection of an application.
#[derive(Debug, Default)]
pub struct State {
    values: DashMap<String, Value>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Returns true if a previous value was replaced.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> bool {
        self.values.insert(key.into(), Arc::new(value)).is_some()
    }

    /// Fetch `key` as `T`. `None` if missing or of another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.values.get(key)?.value().clone();
        value.downcast::<T>().ok()
    }

    /// Fetch `key`, inserting `init()` first if it is missing.
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let value = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(init()))
            .value()
            .clone();
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.iter().map(|entry| entry.key().clone()).collect()
    }
}
