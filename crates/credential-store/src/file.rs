//! JSON file backend
//!
//! Keeps the whole key space as one flat JSON object. All writes use atomic
//! temp-file + rename so a crash mid-write never leaves a truncated file.
//! A tokio Mutex serializes writers; reads clone out of the in-memory copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{BoxFuture, KeyValueStore};
use crate::error::{Error, Result};

/// File-backed key-value store, the durable backend of the command-line host.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is created as `{}`. A file that exists but does not
    /// parse is treated as empty and replaced on the next write: losing a
    /// stale session is preferable to refusing to start.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            match serde_json::from_str::<HashMap<String, String>>(&contents) {
                Ok(entries) => {
                    info!(path = %path.display(), keys = entries.len(), "loaded session file");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "session file is malformed, starting empty");
                    HashMap::new()
                }
            }
        } else {
            info!(path = %path.display(), "session file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn id(&self) -> &str {
        "file"
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.state.lock().await.get(key).cloned()) })
    }

    fn get_many<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, Result<Vec<Option<String>>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(keys.iter().map(|k| state.get(*k).cloned()).collect())
        })
    }

    fn set_many<'a>(&'a self, entries: Vec<(String, String)>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let mut next = state.clone();
            next.extend(entries);
            write_atomic(&self.path, &next).await?;
            *state = next;
            Ok(())
        })
    }

    fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if !keys.iter().any(|k| state.contains_key(*k)) {
                return Ok(());
            }
            let mut next = state.clone();
            for key in keys {
                next.remove(*key);
            }
            write_atomic(&self.path, &next).await?;
            *state = next;
            Ok(())
        })
    }
}

/// Write the key space to disk atomically with 0600 permissions (unix).
///
/// The in-memory copy is only replaced after the rename succeeds, so memory
/// and disk never disagree after a failed write.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Serialize(format!("serializing session file: {e}")))?;

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), keys = data.len(), "persisted session file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cold_start_creates_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        assert!(!path.exists());
        let store = FileStore::open(path.clone()).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.get("accessToken").await.unwrap(), None);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::open(path.clone()).await.unwrap();
        store
            .set_many(vec![
                ("accessToken".into(), "at_1".into()),
                ("refreshToken".into(), "rt_1".into()),
            ])
            .await
            .unwrap();

        let reopened = FileStore::open(path).await.unwrap();
        assert_eq!(
            reopened.get("accessToken").await.unwrap().as_deref(),
            Some("at_1")
        );
        assert_eq!(
            reopened.get("refreshToken").await.unwrap().as_deref(),
            Some("rt_1")
        );
    }

    #[tokio::test]
    async fn remove_many_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::open(path.clone()).await.unwrap();
        store
            .set_many(vec![
                ("accessToken".into(), "at".into()),
                ("theme".into(), "dark".into()),
            ])
            .await
            .unwrap();
        store.remove_many(&["accessToken"]).await.unwrap();

        let reopened = FileStore::open(path).await.unwrap();
        assert_eq!(reopened.get("accessToken").await.unwrap(), None);
        assert_eq!(reopened.get("theme").await.unwrap().as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn malformed_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let store = FileStore::open(path).await.unwrap();
        assert_eq!(store.get("accessToken").await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::open(path.clone()).await.unwrap();
        store
            .set_many(vec![("accessToken".into(), "at".into())])
            .await
            .unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "session file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn concurrent_writes_dont_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = std::sync::Arc::new(FileStore::open(path.clone()).await.unwrap());

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_many(vec![(format!("key-{i}"), i.to_string())])
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 10);
    }
}
