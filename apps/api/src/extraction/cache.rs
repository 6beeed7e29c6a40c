//! Parse-result cache keyed by a hash of the resume text.
//!
//! Redis is optional: without a URL, or on any Redis error, lookups miss and
//! writes are skipped with a warning. Parsing works the same either way.

use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::extraction::models::CanonicalResume;

const KEY_PREFIX: &str = "resume_parse:";
const TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Clone)]
pub struct ParseCache {
    client: Option<redis::Client>,
}

impl ParseCache {
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, "failed to create redis client, parse cache disabled"))
                .ok()
        });
        Self { client }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn key_for(text: &str) -> String {
        format!("{KEY_PREFIX}{:x}", Sha256::digest(text.trim().as_bytes()))
    }

    pub async fn get(&self, text: &str) -> Option<CanonicalResume> {
        let client = self.client.as_ref()?;
        let key = Self::key_for(text);
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()?;
        let cached: Option<String> = conn
            .get(&key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()?;
        let resume = serde_json::from_str(&cached?)
            .inspect_err(|e| warn!(error = %e, key, "discarding unreadable cached parse"))
            .ok()?;
        debug!(key, "parse cache hit");
        Some(resume)
    }

    pub async fn put(&self, text: &str, resume: &CanonicalResume) -> bool {
        let Some(client) = &self.client else {
            return false;
        };
        // salvaged parses are not cached; a retry may do better
        if resume.partial.is_some() {
            return false;
        }
        let Ok(payload) = serde_json::to_string(resume) else {
            return false;
        };
        let key = Self::key_for(text);
        let Ok(mut conn) = client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
        else {
            return false;
        };
        conn.set_ex::<_, _, ()>(&key, payload, TTL_SECS)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SETEX failed"))
            .is_ok()
    }
}
