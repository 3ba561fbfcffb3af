// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Autodesk Platform Services data management client.
//!
//! Covers the calls needed to fetch a model version and, optionally, to
//! store a patched copy as a new version of the same item. Every call is
//! made with the caller's bearer token.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, Url};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;

const JSON_API: &str = "application/vnd.api+json";

/// APS REST client.
#[derive(Debug, Clone)]
pub struct ApsClient {
    base_url: String,
    http: reqwest::Client,
}

/// The parts of a version resource the server reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Storage object href of the version's file.
    pub storage_href: String,
    /// Lineage item the version belongs to.
    pub item_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct VersionData {
    relationships: VersionRelationships,
}

#[derive(Debug, Deserialize)]
struct VersionRelationships {
    storage: StorageRelationship,
    #[serde(default)]
    item: Option<Linkage>,
}

#[derive(Debug, Deserialize)]
struct StorageRelationship {
    meta: StorageMeta,
}

#[derive(Debug, Deserialize)]
struct StorageMeta {
    link: Link,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct Linkage {
    data: ResourceId,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ItemData {
    relationships: ItemRelationships,
}

#[derive(Debug, Deserialize)]
struct ItemRelationships {
    parent: Linkage,
}

#[derive(Debug, Deserialize)]
struct StorageData {
    id: String,
    links: StorageLinks,
}

#[derive(Debug, Deserialize)]
struct StorageLinks {
    upload: String,
}

#[derive(Debug, Deserialize)]
struct SignedDownload {
    url: String,
}

impl ApsClient {
    /// Create a client for the given API root.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// `{base}/data/v1/projects/{project}/{segments...}` with each segment
    /// percent-encoded.
    pub fn project_url(&self, project_id: &str, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}/data/v1/projects", self.base_url))
            .map_err(|e| ApiError::Internal(format!("Invalid APS base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Internal("APS base URL cannot have a path".into()))?
            .push(project_id)
            .extend(segments);
        Ok(url)
    }

    fn auth_headers(access_token: &str) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", access_token))
                .map_err(|e| ApiError::Internal(format!("Invalid token header: {e}")))?,
        );
        Ok(headers)
    }

    /// Fail with the response body when the status is not one of `accepted`.
    async fn expect_status(
        resp: Response,
        accepted: &[u16],
        what: &str,
    ) -> Result<Response, ApiError> {
        let status = resp.status();
        if accepted.contains(&status.as_u16()) {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Aps(format!("{} returned {}: {}", what, status, body)))
    }

    /// Look up a version's storage href and item id.
    pub async fn version_info(
        &self,
        project_id: &str,
        version_id: &str,
        access_token: &str,
    ) -> Result<VersionInfo, ApiError> {
        let url = self.project_url(project_id, &["versions", version_id])?;
        let resp = self
            .http
            .get(url)
            .headers(Self::auth_headers(access_token)?)
            .send()
            .await?;
        let resp = Self::expect_status(resp, &[200], "Version lookup").await?;

        let doc: Document<VersionData> = resp
            .json()
            .await
            .map_err(|e| ApiError::Aps(format!("Version response parse failed: {e}")))?;

        Ok(VersionInfo {
            storage_href: doc.data.relationships.storage.meta.link.href,
            item_id: doc.data.relationships.item.map(|item| item.data.id),
        })
    }

    /// Resolve a storage href to a signed S3 download URL.
    pub async fn signed_download_url(
        &self,
        storage_href: &str,
        access_token: &str,
    ) -> Result<String, ApiError> {
        let url = signed_download_endpoint(storage_href)?;
        let resp = self
            .http
            .get(url)
            .headers(Self::auth_headers(access_token)?)
            .header(CONTENT_TYPE, JSON_API)
            .send()
            .await?;
        let resp = Self::expect_status(resp, &[200], "Signed download").await?;

        let signed: SignedDownload = resp
            .json()
            .await
            .map_err(|e| ApiError::Aps(format!("Signed download response parse failed: {e}")))?;
        Ok(signed.url)
    }

    /// Download the file of a model version.
    pub async fn download_model(
        &self,
        project_id: &str,
        version_id: &str,
        access_token: &str,
    ) -> Result<(VersionInfo, Bytes), ApiError> {
        let info = self.version_info(project_id, version_id, access_token).await?;
        let signed = self.signed_download_url(&info.storage_href, access_token).await?;

        let resp = self.http.get(&signed).send().await?;
        let resp = Self::expect_status(resp, &[200], "Model download").await?;
        let bytes = resp.bytes().await?;

        tracing::info!(
            project_id = %project_id,
            size = bytes.len(),
            "Downloaded model"
        );
        Ok((info, bytes))
    }

    /// Parent folder of an item.
    pub async fn item_folder(
        &self,
        project_id: &str,
        item_id: &str,
        access_token: &str,
    ) -> Result<String, ApiError> {
        let url = self.project_url(project_id, &["items", item_id])?;
        let resp = self
            .http
            .get(url)
            .headers(Self::auth_headers(access_token)?)
            .send()
            .await?;
        let resp = Self::expect_status(resp, &[200], "Item lookup").await?;

        let doc: Document<ItemData> = resp
            .json()
            .await
            .map_err(|e| ApiError::Aps(format!("Item response parse failed: {e}")))?;
        Ok(doc.data.relationships.parent.data.id)
    }

    /// Upload a file as a new version of `item_id`. Returns the new version id.
    pub async fn upload_new_version(
        &self,
        project_id: &str,
        item_id: &str,
        file_name: &str,
        data: Bytes,
        access_token: &str,
    ) -> Result<String, ApiError> {
        let folder_id = self.item_folder(project_id, item_id, access_token).await?;

        // Storage object in the item's folder
        let resp = self
            .http
            .post(self.project_url(project_id, &["storage"])?)
            .headers(Self::auth_headers(access_token)?)
            .header(CONTENT_TYPE, JSON_API)
            .json(&json!({
                "jsonapi": { "version": "1.0" },
                "data": {
                    "type": "objects",
                    "attributes": { "name": file_name },
                    "relationships": {
                        "target": { "data": { "type": "folders", "id": folder_id } }
                    }
                }
            }))
            .send()
            .await?;
        let resp = Self::expect_status(resp, &[201], "Storage creation").await?;
        let storage: Document<StorageData> = resp
            .json()
            .await
            .map_err(|e| ApiError::Aps(format!("Storage response parse failed: {e}")))?;

        let size = data.len();
        let resp = self
            .http
            .put(&storage.data.links.upload)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        Self::expect_status(resp, &[200, 201], "File upload").await?;
        tracing::debug!(size, "Uploaded patched model");

        let resp = self
            .http
            .post(self.project_url(project_id, &["versions"])?)
            .headers(Self::auth_headers(access_token)?)
            .header(CONTENT_TYPE, JSON_API)
            .json(&json!({
                "jsonapi": { "version": "1.0" },
                "data": {
                    "type": "versions",
                    "attributes": {
                        "name": file_name,
                        "extension": { "type": "versions:autodesk.bim360:File", "version": "2.0" }
                    },
                    "relationships": {
                        "item": { "data": { "type": "items", "id": item_id } },
                        "storage": { "data": { "type": "objects", "id": storage.data.id } }
                    }
                }
            }))
            .send()
            .await?;
        let resp = Self::expect_status(resp, &[201], "Version creation").await?;
        let version: Document<ResourceId> = resp
            .json()
            .await
            .map_err(|e| ApiError::Aps(format!("Version creation response parse failed: {e}")))?;

        tracing::info!(version_id = %version.data.id, "Created model version");
        Ok(version.data.id)
    }
}

/// Signed download endpoint of a storage href.
///
/// Query and fragment are dropped and the path is cut right after the
/// first `.ifc`, then `/signeds3download` is appended.
pub fn signed_download_endpoint(storage_href: &str) -> Result<Url, ApiError> {
    let mut url = Url::parse(storage_href)
        .map_err(|e| ApiError::Aps(format!("Invalid storage href {storage_href:?}: {e}")))?;
    url.set_query(None);
    url.set_fragment(None);

    let path = url.path();
    let base = match path.find(".ifc") {
        Some(at) => &path[..at + ".ifc".len()],
        None => path.trim_end_matches('/'),
    };
    let signed = format!("{}/signeds3download", base);
    url.set_path(&signed);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_urls_encode_the_version_urn() {
        let client = ApsClient::new("https://developer.api.autodesk.com/");
        let url = client
            .project_url("b.1234", &["versions", "urn:adsk.wipprod:fs.file:vf.abc?version=3"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://developer.api.autodesk.com/data/v1/projects/b.1234/versions/urn:adsk.wipprod:fs.file:vf.abc%3Fversion=3"
        );
    }

    #[test]
    fn signed_download_cuts_after_extension() {
        let url = signed_download_endpoint(
            "https://developer.api.autodesk.com/oss/v2/buckets/wip.dm.prod/objects/abc.ifc?scopes=b360project",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://developer.api.autodesk.com/oss/v2/buckets/wip.dm.prod/objects/abc.ifc/signeds3download"
        );

        let url = signed_download_endpoint(
            "https://developer.api.autodesk.com/oss/v2/buckets/wip.dm.prod/objects/abc.ifc/extra",
        )
        .unwrap();
        assert!(url.as_str().ends_with("/objects/abc.ifc/signeds3download"));
    }

    #[test]
    fn signed_download_without_extension_appends() {
        let url =
            signed_download_endpoint("https://example.com/oss/v2/buckets/b/objects/model").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/oss/v2/buckets/b/objects/model/signeds3download"
        );
    }

    #[test]
    fn rejects_relative_hrefs() {
        assert!(matches!(
            signed_download_endpoint("objects/abc.ifc"),
            Err(ApiError::Aps(_))
        ));
    }

    #[test]
    fn parses_version_documents() {
        let doc: Document<VersionData> = serde_json::from_value(json!({
            "data": {
                "type": "versions",
                "id": "urn:v?version=1",
                "relationships": {
                    "item": { "data": { "type": "items", "id": "urn:item" } },
                    "storage": {
                        "data": { "type": "objects", "id": "urn:obj" },
                        "meta": { "link": { "href": "https://x/objects/a.ifc?scopes=1" } }
                    }
                }
            }
        }))
        .unwrap();
        assert_eq!(doc.data.relationships.storage.meta.link.href, "https://x/objects/a.ifc?scopes=1");
        assert_eq!(doc.data.relationships.item.unwrap().data.id, "urn:item");
    }
}
