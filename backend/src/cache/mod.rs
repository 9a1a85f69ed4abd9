//! Load cache - memoise parsed uploads
//!
//! Parsing is the expensive step of a load, so parsed tables are kept keyed
//! by the SHA-256 fingerprint of the raw bytes, the container format, the
//! load options and the owning session. Entries are never shared across sessions and are evicted
//! when their session is reset or dropped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::io::{FileFormat, LoadOptions, Loaded};

/// Identity of one parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadKey {
    pub fingerprint: String,
    pub format: FileFormat,
    pub options: LoadOptions,
    pub session: Uuid,
}

impl LoadKey {
    pub fn new(
        fingerprint: impl Into<String>,
        format: FileFormat,
        options: &LoadOptions,
        session: Uuid,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            format,
            options: options.clone(),
            session,
        }
    }
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Entries {
    loads: HashMap<LoadKey, Loaded>,
    hits: u64,
    misses: u64,
}

/// In-memory memo of parsed uploads
#[derive(Debug, Default)]
pub struct LoadCache {
    inner: Mutex<Entries>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock still guards a consistent map.
    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a parse, counting the hit or miss.
    pub fn get(&self, key: &LoadKey) -> Option<Loaded> {
        let mut entries = self.entries();
        match entries.loads.get(key).cloned() {
            Some(loaded) => {
                entries.hits += 1;
                Some(loaded)
            }
            None => {
                entries.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: LoadKey, loaded: Loaded) {
        self.entries().loads.insert(key, loaded);
    }

    /// Drop every entry owned by a session, returning how many were removed.
    pub fn evict_session(&self, session: Uuid) -> usize {
        let mut entries = self.entries();
        let before = entries.loads.len();
        entries.loads.retain(|key, _| key.session != session);
        let removed = before - entries.loads.len();
        if removed > 0 {
            tracing::debug!(%session, removed, "Evicted cached loads");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().loads.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries();
        CacheStats {
            hits: entries.hits,
            misses: entries.misses,
            entries: entries.loads.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load;

    fn loaded(csv: &str) -> Loaded {
        load(csv.as_bytes(), FileFormat::Csv, &LoadOptions::default()).unwrap()
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = LoadCache::new();
        let session = Uuid::new_v4();
        let key = LoadKey::new("abc", FileFormat::Csv, &LoadOptions::default(), session);

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), loaded("a\n1"));
        assert!(cache.get(&key).is_some());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_options_and_session_are_part_of_key() {
        let cache = LoadCache::new();
        let session = Uuid::new_v4();
        cache.insert(LoadKey::new("abc", FileFormat::Csv, &LoadOptions::default(), session), loaded("a\n1"));

        let no_header = LoadOptions {
            header: false,
            ..LoadOptions::default()
        };
        assert!(cache.get(&LoadKey::new("abc", FileFormat::Csv, &no_header, session)).is_none());
        assert!(cache
            .get(&LoadKey::new("abc", FileFormat::Csv, &LoadOptions::default(), Uuid::new_v4()))
            .is_none());
    }

    #[test]
    fn test_format_is_part_of_key() {
        let cache = LoadCache::new();
        let session = Uuid::new_v4();
        let options = LoadOptions::default();
        cache.insert(LoadKey::new("abc", FileFormat::Csv, &options, session), loaded("a\n1"));

        assert!(cache
            .get(&LoadKey::new("abc", FileFormat::Parquet, &options, session))
            .is_none());
        assert!(cache
            .get(&LoadKey::new("abc", FileFormat::Csv, &options, session))
            .is_some());
    }

    #[test]
    fn test_evict_session() {
        let cache = LoadCache::new();
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        cache.insert(LoadKey::new("a", FileFormat::Csv, &LoadOptions::default(), keep), loaded("a\n1"));
        cache.insert(LoadKey::new("a", FileFormat::Csv, &LoadOptions::default(), drop), loaded("a\n1"));
        cache.insert(LoadKey::new("b", FileFormat::Csv, &LoadOptions::default(), drop), loaded("b\n2"));

        assert_eq!(cache.evict_session(drop), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evict_session(drop), 0);
    }
}
