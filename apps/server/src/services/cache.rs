// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk cache for patched models using cacache.

use crate::error::ApiError;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Content-addressable disk cache.
#[derive(Debug, Clone)]
pub struct DiskCache {
    cache_dir: PathBuf,
}

impl DiskCache {
    /// Create a new cache in the specified directory.
    pub async fn new(cache_dir: &str) -> Self {
        let path = PathBuf::from(cache_dir);

        if let Err(e) = tokio::fs::create_dir_all(&path).await {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "Failed to create cache directory"
            );
        }

        Self { cache_dir: path }
    }

    /// Cache key of a model version (SHA256 of `project/version`).
    pub fn model_key(project_id: &str, version_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(project_id.as_bytes());
        hasher.update(b"/");
        hasher.update(version_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn record_key(key: &str) -> String {
        format!("record:{}", key)
    }

    /// Get the JSON record stored next to a model.
    pub async fn get_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApiError> {
        match cacache::read(&self.cache_dir, Self::record_key(key)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(ApiError::Cache(e.to_string())),
        }
    }

    /// Store a JSON record next to a model.
    pub async fn set_record<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ApiError> {
        let data = serde_json::to_vec(value)?;
        cacache::write(&self.cache_dir, Self::record_key(key), &data).await?;
        Ok(())
    }

    /// Get a stored model.
    pub async fn get_model(&self, key: &str) -> Result<Option<Vec<u8>>, ApiError> {
        match cacache::read(&self.cache_dir, key).await {
            Ok(data) => Ok(Some(data)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(ApiError::Cache(e.to_string())),
        }
    }

    /// Store a model, replacing any earlier patch of the same version.
    pub async fn set_model(&self, key: &str, data: &[u8]) -> Result<(), ApiError> {
        cacache::write(&self.cache_dir, key, data).await?;
        tracing::debug!(key = %key, size = data.len(), "Cached patched model");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        elements: usize,
    }

    fn temp_dir(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("ifc-recolor-{}-{}", name, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn model_keys_are_stable_and_distinct() {
        let a = DiskCache::model_key("b.project", "urn:v?version=1");
        assert_eq!(a, DiskCache::model_key("b.project", "urn:v?version=1"));
        assert_ne!(a, DiskCache::model_key("b.project", "urn:v?version=2"));
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn stores_models_and_records() {
        let dir = temp_dir("cache");
        let cache = DiskCache::new(&dir).await;
        let key = DiskCache::model_key("p", "v");

        assert_eq!(cache.get_model(&key).await.unwrap(), None);
        cache.set_model(&key, b"ISO-10303-21;").await.unwrap();
        assert_eq!(
            cache.get_model(&key).await.unwrap().as_deref(),
            Some(&b"ISO-10303-21;"[..])
        );

        cache.set_record(&key, &Record { elements: 3 }).await.unwrap();
        assert_eq!(
            cache.get_record::<Record>(&key).await.unwrap(),
            Some(Record { elements: 3 })
        );

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
