//! Process-wide memoisation of expensive loads, keyed by function identity
//! and a SHA-256 digest of the input. Entries live for the process lifetime.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use sha2::{Digest, Sha256};

use crate::error::Result;

type Entry = Arc<dyn Any + Send + Sync>;

/// Cache key: a function identity plus the digest of its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoKey {
    function: &'static str,
    digest: [u8; 32],
}

impl MemoKey {
    pub fn new(function: &'static str, input: &[u8]) -> Self {
        Self { function, digest: Sha256::digest(input).into() }
    }

    #[inline] pub fn function(&self) -> &'static str { self.function }

    /// Short hex prefix of the digest, for logs.
    pub fn short_digest(&self) -> String { hex::encode(&self.digest[..6]) }
}

/// Memoisation cache. Values are computed outside the lock and published
/// afterwards; when two callers race, the first published value wins and
/// both get it.
#[derive(Default)]
pub struct MemoCache {
    entries: RwLock<HashMap<MemoKey, Entry>>,
}

impl std::fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache").field("len", &self.len()).finish()
    }
}

impl MemoCache {
    pub fn new() -> Self { Self::default() }

    /// The shared process-wide instance.
    pub fn global() -> Arc<MemoCache> {
        static GLOBAL: OnceLock<Arc<MemoCache>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(MemoCache::new())).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Cached value for `key`, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &MemoKey) -> Option<Arc<T>> {
        let entry = self.entries.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()?;
        entry.downcast::<T>().ok()
    }

    /// Return the cached value, or compute, publish and return it. Failed
    /// computations are not cached.
    pub fn get_or_try_insert<T, F>(&self, function: &'static str, input: &[u8], compute: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        let key = MemoKey::new(function, input);
        if let Some(hit) = self.get::<T>(&key) {
            log::debug!("[memo] hit {function} {}", key.short_digest());
            return Ok(hit);
        }

        log::debug!("[memo] miss {function} {}", key.short_digest());
        let value: Entry = Arc::new(compute()?);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let published = entries.entry(key).or_insert(value).clone();
        drop(entries);

        published.downcast::<T>().map_err(|_| crate::error::Error::Config(format!(
            "memo entry for {function} holds a different type"
        )))
    }
}
