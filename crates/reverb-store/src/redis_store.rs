use async_trait::async_trait;
use redis::AsyncCommands;
use reverb_core::{ContentStore, ReverbError};

/// Content store backed by Redis (or a Valkey-compatible server).
///
/// Keys are `<prefix>:<id>`; values are the raw completion text. SET is
/// acknowledged by the server before `put` returns, which is the durability
/// the admission path relies on.
#[derive(Debug)]
pub struct RedisContentStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisContentStore {
    pub fn new(url: &str, key_prefix: Option<String>) -> Result<Self, ReverbError> {
        let client = redis::Client::open(url)
            .map_err(|e| ReverbError::Store(format!("invalid Redis URL: {e}")))?;

        Ok(Self {
            client,
            key_prefix: key_prefix.unwrap_or_else(|| "reverb:content".to_string()),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{id}", self.key_prefix)
    }
}

#[async_trait]
impl ContentStore for RedisContentStore {
    async fn get(&self, id: &str) -> Result<Option<String>, ReverbError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ReverbError::Store(format!("connection failed: {e}")))?;

        conn.get(self.key(id))
            .await
            .map_err(|e| ReverbError::Store(format!("GET failed: {e}")))
    }

    async fn put(&self, id: &str, content: &str) -> Result<(), ReverbError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ReverbError::Store(format!("connection failed: {e}")))?;

        conn.set(self.key(id), content)
            .await
            .map_err(|e| ReverbError::Store(format!("SET failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed() {
        let store = RedisContentStore::new("redis://127.0.0.1/", None).unwrap();
        assert_eq!(store.key("abc"), "reverb:content:abc");
    }

    #[test]
    fn custom_prefix_is_used() {
        let store =
            RedisContentStore::new("redis://127.0.0.1/", Some("cache".to_string())).unwrap();
        assert_eq!(store.key("abc"), "cache:abc");
    }

    #[test]
    fn invalid_url_is_a_store_error() {
        let err = RedisContentStore::new("not a url", None).unwrap_err();
        assert!(matches!(err, ReverbError::Store(_)));
    }
}
