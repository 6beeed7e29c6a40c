//! In-process cache of `system_settings` rows.
//!
//! Owned by `AppState`; writers call `invalidate` after persisting so the
//! next read goes back to the database.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct SettingsCache {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    pub fn invalidate(&self, key: &str) {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        debug!(key, removed, "setting invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_invalidate() {
        let cache = SettingsCache::new();
        assert_eq!(cache.get("llm.model"), None);
        cache.set("llm.model", json!("deepseek-chat"));
        assert_eq!(cache.get("llm.model"), Some(json!("deepseek-chat")));

        cache.invalidate("llm.model");
        assert_eq!(cache.get("llm.model"), None);
        // invalidating an absent key is fine
        cache.invalidate("llm.model");
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = SettingsCache::new();
        let handle = cache.clone();
        handle.set("a", json!(1));
        assert_eq!(cache.get("a"), Some(json!(1)));
        cache.invalidate("a");
        assert_eq!(handle.get("a"), None);
    }
}
