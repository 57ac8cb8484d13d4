use serde::{Deserialize, Serialize};

/// Margin before expiry after which a cached token is no longer handed out.
pub const TOKEN_SAFETY_MARGIN_MS: i64 = 30_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub value: String,
    pub exp: i64, // absolute, ms since epoch
}

/// Bearer token cache for the authenticated push. Single tenant, so there is
/// at most one entry.
#[derive(Debug, Default)]
pub struct TokenCache {
    pub entry: Option<CachedToken>,
}

impl TokenCache {
    /// Returns the cached token while `now < exp - 30s`.
    pub fn valid_token(&self, now_ms: i64) -> Option<&str> {
        self.entry
            .as_ref()
            .filter(|token| now_ms < token.exp - TOKEN_SAFETY_MARGIN_MS)
            .map(|token| token.value.as_str())
    }

    pub fn store(&mut self, value: String, exp: i64) {
        self.entry = Some(CachedToken { value, exp });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_has_no_token() {
        let cache = TokenCache::default();
        assert!(cache.valid_token(0).is_none());
    }

    #[test]
    fn token_is_reused_until_safety_margin() {
        let now = 1_700_000_000_000;
        let mut cache = TokenCache::default();
        cache.store("T1".to_string(), now + 3_600_000);

        assert_eq!(cache.valid_token(now + 10_000), Some("T1"));
        assert_eq!(cache.valid_token(now + 3_600_000 - 30_001), Some("T1"));
        assert!(cache.valid_token(now + 3_600_000 - 30_000).is_none());
        assert!(cache.valid_token(now + 3_600_000 - 20_000).is_none());
    }
}
