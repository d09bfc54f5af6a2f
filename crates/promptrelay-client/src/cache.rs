//! Response memoization for the non-streaming path

use dashmap::DashMap;

/// Cache key: the same prompt against a different model is a different entry.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CacheKey {
    model: String,
    prompt: String,
}

/// Process-lifetime memo of successful full responses.
///
/// Entries are never evicted or expired; only the non-streaming path
/// populates it, and only on success. Streamed responses are not cached
/// because a cache hit would misrepresent the delivery semantics.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<CacheKey, String>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, model: &str, prompt: &str) -> Option<String> {
        let key = CacheKey {
            model: model.to_string(),
            prompt: prompt.to_string(),
        };
        self.entries.get(&key).map(|entry| entry.clone())
    }

    pub fn insert(&self, model: &str, prompt: &str, response: String) {
        let key = CacheKey {
            model: model.to_string(),
            prompt: prompt.to_string(),
        };
        self.entries.insert(key, response);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
