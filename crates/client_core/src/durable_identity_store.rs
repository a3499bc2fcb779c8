use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use storage::Storage;

use crate::IdentityStore;

/// Identity store backed by the sqlite session-key store, so the anonymous
/// identifier survives process restarts the way localStorage survives page
/// reloads.
pub struct DurableIdentityStore {
    store: Storage,
}

impl DurableIdentityStore {
    pub async fn initialize(database_url: &str) -> Result<Arc<Self>> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize session storage at '{database_url}'"))?;
        Ok(Arc::new(Self { store }))
    }

    pub fn new(store: Storage) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

#[async_trait]
impl IdentityStore for DurableIdentityStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        self.store.load_value(key).await
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        self.store.store_value(key, value).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.store.clear_value(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ANONYMOUS_ID_KEY;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[tokio::test]
    async fn identifier_persists_across_store_restart() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let db_path = std::env::temp_dir().join(format!("funnel_identity_{unique}.sqlite3"));
        let database_url = format!("sqlite://{}", db_path.display());

        let first = DurableIdentityStore::initialize(&database_url)
            .await
            .expect("first store");
        first
            .store(ANONYMOUS_ID_KEY, "stable-id")
            .await
            .expect("store id");

        let second = DurableIdentityStore::initialize(&database_url)
            .await
            .expect("second store");
        assert_eq!(
            second.load(ANONYMOUS_ID_KEY).await.expect("load id"),
            Some("stable-id".to_string())
        );

        second.clear(ANONYMOUS_ID_KEY).await.expect("clear id");
        assert_eq!(second.load(ANONYMOUS_ID_KEY).await.expect("load cleared"), None);

        let _ = std::fs::remove_file(&db_path);
    }
}
