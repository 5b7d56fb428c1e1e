//! ローカルディレクトリへの保存
//!
//! - `DirFileArchive`: スナップショットをファイル名そのままで保存
//! - `DirArtifactStore`: 内容の blake3 ハッシュをファイル名にして保存（同じ内容は 1 ファイル）

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::CourierError;
use crate::ports::{ArtifactStore, FileArchive};

pub struct DirFileArchive {
    root: PathBuf,
}

impl DirFileArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Archive file names embed chain ids and hashes; keep them to one safe path segment.
fn sanitize(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[async_trait]
impl FileArchive for DirFileArchive {
    async fn save(&self, filename: &str, bytes: Vec<u8>) -> Result<(), CourierError> {
        let name = sanitize(filename);
        if name.is_empty() || name == "." || name == ".." {
            return Err(CourierError::Archive(format!("invalid file name: {filename:?}")));
        }
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), "archived file");
        Ok(())
    }
}

/// Content-addressed artifact store under one directory.
pub struct DirArtifactStore {
    root: PathBuf,
}

impl DirArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for DirArtifactStore {
    async fn put(&self, filename: &str, bytes: Vec<u8>) -> Result<Option<String>, CourierError> {
        let hash = blake3::hash(&bytes).to_hex().to_string();
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&hash);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(%hash, filename, "artifact already stored");
        } else {
            tokio::fs::write(&path, bytes).await?;
            tracing::debug!(%hash, filename, path = %path.display(), "stored artifact");
        }
        Ok(Some(hash))
    }

    fn provider(&self) -> &str {
        "local"
    }
}
