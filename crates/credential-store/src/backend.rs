//! Key-value persistence capability
//!
//! The session layer only needs get/set/remove on string keys. Batch
//! variants are used so a credential record is never observed half-written
//! or read back torn.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::Mutex;

use crate::error::Result;

/// Boxed future used by dyn-compatible async traits in this workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable string key-value store.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn KeyValueStore>`).
pub trait KeyValueStore: Send + Sync {
    /// Backend name for logging (e.g. "memory", "file")
    fn id(&self) -> &str;

    /// Read a single key. `Ok(None)` when the key is missing.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    /// Read every listed key from one consistent view, in order.
    fn get_many<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, Result<Vec<Option<String>>>>;

    /// Store every entry. Readers observe either none or all of them.
    fn set_many<'a>(&'a self, entries: Vec<(String, String)>) -> BoxFuture<'a, Result<()>>;

    /// Remove every listed key. Readers observe either none or all removed.
    fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, Result<()>>;
}

/// In-process store, used by tests and by hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. to simulate a previous page load.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Clone of the current contents.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().await.clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn id(&self) -> &str {
        "memory"
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn get_many<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, Result<Vec<Option<String>>>> {
        Box::pin(async move {
            let state = self.entries.lock().await;
            Ok(keys.iter().map(|k| state.get(*k).cloned()).collect())
        })
    }

    fn set_many<'a>(&'a self, entries: Vec<(String, String)>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.entries.lock().await;
            state.extend(entries);
            Ok(())
        })
    }

    fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.entries.lock().await;
            for key in keys {
                state.remove(*key);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("accessToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_many_then_remove_many() {
        let store = MemoryStore::new();
        store
            .set_many(vec![
                ("a".into(), "1".into()),
                ("b".into(), "2".into()),
                ("c".into(), "3".into()),
            ])
            .await
            .unwrap();
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));

        store.remove_many(&["a", "b"]).await.unwrap();
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("c").map(String::as_str), Some("3"));
    }

    #[tokio::test]
    async fn get_many_keeps_key_order() {
        let store = MemoryStore::with_entries([("a", "1"), ("c", "3")]);
        let values = store.get_many(&["c", "b", "a"]).await.unwrap();
        assert_eq!(values, vec![Some("3".to_string()), None, Some("1".to_string())]);
    }

    #[tokio::test]
    async fn seeded_entries_are_readable() {
        let store = MemoryStore::with_entries([("theme", "dark")]);
        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));
    }
}
