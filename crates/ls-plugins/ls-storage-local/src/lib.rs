//! # ls-storage-local
//!
//! Local filesystem implementation of `ImageStore`. Objects are written
//! verbatim under the configured root and served back through a static URL
//! prefix; the caller owns key construction (and therefore collision
//! behavior: re-using a key overwrites).

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use ls_core::traits::ImageStore;

pub struct LocalImageStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/static/uploads")
    url_prefix: String,
}

impl LocalImageStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix,
        }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<String> {
        let relative = Path::new(key);
        // Keys come from application code, but never let one escape the root.
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("invalid object key: {key}");
        }
        let target = self.root_path.join(relative);
        let parent = target
            .parent()
            .context("object key resolved to the storage root")?;
        fs::create_dir_all(parent).await?;
        fs::write(&target, &bytes).await?;
        debug!(key, size = bytes.len(), "stored upload");
        Ok(format!("{}/{key}", self.url_prefix))
    }
}
