//! Program cache - reuse prepared patterns across jobs.
//!
//! Compiled programs hold no row state, so one prepared program can serve any
//! number of jobs concurrently. The cache is in-memory only and bounded; the
//! least recently used pattern is evicted when it is full.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::pattern::{compile, PreparedProgram};

/// Default number of patterns kept
pub const DEFAULT_CAPACITY: usize = 256;

/// A cached program with usage metadata
#[derive(Debug, Clone)]
pub struct CachedProgram {
    /// The prepared program
    pub program: Arc<PreparedProgram>,
    /// Creation timestamp
    pub created_at: String,
    /// Last time this program was served
    pub last_used: Option<String>,
    /// Number of times served from the cache
    pub use_count: u32,
    /// Recency counter for eviction
    tick: u64,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded, thread-safe cache of prepared programs keyed by pattern string
#[derive(Debug)]
pub struct ProgramCache {
    capacity: usize,
    entries: Mutex<HashMap<String, CachedProgram>>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProgramCache {
    /// Create a cache holding at most `capacity` patterns (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedProgram>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the prepared program for `pattern`, compiling it on a miss
    pub fn get_or_compile(&self, pattern: &str) -> Arc<PreparedProgram> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(pattern) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            entry.use_count += 1;
            entry.last_used = Some(chrono::Utc::now().to_rfc3339());
            entry.tick = tick;
            return Arc::clone(&entry.program);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let program = Arc::new(PreparedProgram::new(&compile(pattern)));

        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.tick)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                entries.remove(&key);
            }
        }

        entries.insert(
            pattern.to_string(),
            CachedProgram {
                program: Arc::clone(&program),
                created_at: chrono::Utc::now().to_rfc3339(),
                last_used: None,
                use_count: 0,
                tick,
            },
        );
        program
    }

    /// Get a cached entry without touching its statistics
    pub fn get(&self, pattern: &str) -> Option<CachedProgram> {
        self.lock().get(pattern).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached program
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::EvaluationContext;

    #[test]
    fn test_hit_returns_same_program() {
        let cache = ProgramCache::new(4);
        let a = cache.get_or_compile("$(0)");
        let b = cache.get_or_compile("$(0)");

        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
        assert_eq!(cache.get("$(0)").unwrap().use_count, 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ProgramCache::new(2);
        cache.get_or_compile("a");
        cache.get_or_compile("b");
        cache.get_or_compile("a");
        cache.get_or_compile("c");

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cached_program_renders() {
        let cache = ProgramCache::default();
        let program = cache.get_or_compile("@upper($(0))");
        let row = vec!["ada".to_string()];

        assert_eq!(program.evaluate(&EvaluationContext::new(&[], &row)), "ADA");
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(ProgramCache::new(8));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let program = cache.get_or_compile("<$(0)>");
                    let row = vec![i.to_string()];
                    program.evaluate(&EvaluationContext::new(&[], &row))
                })
            })
            .collect();

        let mut out: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        out.sort();
        assert_eq!(out, vec!["<0>", "<1>", "<2>", "<3>"]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = ProgramCache::new(2);
        cache.get_or_compile("x");
        cache.clear();
        assert!(cache.is_empty());
    }
}
