//! Key/value caches for serialized intermediate results (stylesheet
//! lookups). Callers own the cache and pass it by reference.

use std::collections::HashMap;

use crate::error::Result;

pub trait Cache {
    fn load(&self, id: &str) -> Result<Option<String>>;
    fn test(&self, id: &str) -> Result<bool>;
    fn save(&mut self, id: &str, value: String) -> Result<()>;
    fn remove(&mut self, id: &str) -> Result<bool>;
}

/// Used when caching is disabled: never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl Cache for NullCache {
    fn load(&self, _id: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn test(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    fn save(&mut self, _id: &str, _value: String) -> Result<()> {
        Ok(())
    }

    fn remove(&mut self, _id: &str) -> Result<bool> {
        Ok(true)
    }
}

/// In-process cache, useful when rendering many documents with the same
/// stylesheet.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: HashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn load(&self, id: &str) -> Result<Option<String>> {
        Ok(self.entries.get(id).cloned())
    }

    fn test(&self, id: &str) -> Result<bool> {
        Ok(self.entries.contains_key(id))
    }

    fn save(&mut self, id: &str, value: String) -> Result<()> {
        self.entries.insert(id.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        Ok(self.entries.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_cache_forgets_everything() {
        let mut cache = NullCache;
        cache.save("a", "value".into()).unwrap();
        assert!(!cache.test("a").unwrap());
        assert_eq!(cache.load("a").unwrap(), None);
    }

    #[test]
    fn memory_cache_round_trip() {
        let mut cache = MemoryCache::new();
        cache.save("a", "value".into()).unwrap();
        assert!(cache.test("a").unwrap());
        assert_eq!(cache.load("a").unwrap().as_deref(), Some("value"));
        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
    }
}
