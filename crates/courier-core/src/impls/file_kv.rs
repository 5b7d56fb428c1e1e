//! FileKvStore - JSON ファイル 1 つに保存する durable KV
//!
//! 複数プロセスから同じファイルを共有できます。操作ごとに隣の `.lock` ファイルを
//! flock し（読み取りは共有、書き込みは排他）、ディスクから読み直してから更新します。
//! 書き込みは一時ファイル + rename で置き換えるので、途中でクラッシュしても前回の内容が残ります。

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fs2::FileExt;

use crate::domain::CourierError;
use crate::ports::KeyValueStore;

type Entries = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct FileKvStore {
    paths: Arc<Paths>,
}

#[derive(Debug)]
struct Paths {
    data: PathBuf,
    lock: PathBuf,
    tmp: PathBuf,
}

impl FileKvStore {
    /// Open (or lazily create) the store at `path`. An unreadable file fails here.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CourierError> {
        let data = path.as_ref().to_path_buf();
        let store = Self {
            paths: Arc::new(Paths {
                lock: data.with_extension("lock"),
                tmp: data.with_extension("tmp"),
                data,
            }),
        };
        store.blocking(|paths| paths.read()).await?;
        Ok(store)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, CourierError>
    where
        T: Send + 'static,
        F: FnOnce(&Paths) -> Result<T, CourierError> + Send + 'static,
    {
        let paths = Arc::clone(&self.paths);
        tokio::task::spawn_blocking(move || op(&paths))
            .await
            .map_err(|e| CourierError::Store(format!("kv worker failed: {e}")))?
    }
}

impl Paths {
    fn lock_file(&self) -> Result<File, CourierError> {
        if let Some(parent) = self.data.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock)?)
    }

    fn load(&self) -> Result<Entries, CourierError> {
        match fs::read(&self.data) {
            Ok(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes)?),
            Ok(_) => Ok(Entries::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self) -> Result<Entries, CourierError> {
        let lock = self.lock_file()?;
        FileExt::lock_shared(&lock)?;
        let entries = self.load();
        FileExt::unlock(&lock)?;
        entries
    }

    /// Read-modify-write under the exclusive lock.
    fn update(&self, key: &str, value: Option<String>) -> Result<(), CourierError> {
        let lock = self.lock_file()?;
        FileExt::lock_exclusive(&lock)?;
        let result = self.load().and_then(|mut entries| {
            let changed = match value {
                Some(value) => entries.insert(key.to_string(), value.clone()).as_ref() != Some(&value),
                None => entries.remove(key).is_some(),
            };
            if changed {
                fs::write(&self.tmp, serde_json::to_vec_pretty(&entries)?)?;
                fs::rename(&self.tmp, &self.data)?;
            }
            Ok(())
        });
        FileExt::unlock(&lock)?;
        result
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        let key = key.to_string();
        self.blocking(move |paths| Ok(paths.read()?.remove(&key))).await
    }

    async fn set(&self, key: &str, value: Option<String>) -> Result<(), CourierError> {
        let key = key.to_string();
        self.blocking(move |paths| paths.update(&key, value)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("kv.json");

        let store = FileKvStore::open(&path).await.unwrap();
        store.set("token", Some("t1".into())).await.unwrap();
        store.set("lock", Some("123".into())).await.unwrap();
        store.set("lock", None).await.unwrap();
        drop(store);

        let reopened = FileKvStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("token").await.unwrap().as_deref(), Some("t1"));
        assert_eq!(reopened.get("lock").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(FileKvStore::open(&path).await.is_err());
    }

    #[tokio::test]
    async fn handles_on_one_file_see_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        let first = FileKvStore::open(&path).await.unwrap();
        let second = FileKvStore::open(&path).await.unwrap();

        first.set("token", Some("t1".into())).await.unwrap();
        second.set("task", Some("task_1".into())).await.unwrap();
        first.set("started", Some("42".into())).await.unwrap();

        assert_eq!(second.get("token").await.unwrap().as_deref(), Some("t1"));
        let reopened = FileKvStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("token").await.unwrap().as_deref(), Some("t1"));
        assert_eq!(reopened.get("task").await.unwrap().as_deref(), Some("task_1"));
        assert_eq!(reopened.get("started").await.unwrap().as_deref(), Some("42"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_do_not_lose_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");

        let mut joins = Vec::new();
        for writer in 0..4 {
            let store = FileKvStore::open(&path).await.unwrap();
            joins.push(tokio::spawn(async move {
                for n in 0..10 {
                    store.set(&format!("w{writer}.{n}"), Some(n.to_string())).await.unwrap();
                }
            }));
        }
        for join in joins {
            join.await.unwrap();
        }

        let reopened = FileKvStore::open(&path).await.unwrap();
        for writer in 0..4 {
            for n in 0..10 {
                let value = reopened.get(&format!("w{writer}.{n}")).await.unwrap();
                assert_eq!(value, Some(n.to_string()));
            }
        }
    }
}
