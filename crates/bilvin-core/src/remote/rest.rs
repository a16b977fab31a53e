//! Hosted backend over HTTP: PostgREST rows, storage objects, realtime feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, info};

use super::{realtime, RemoteBackend, Subscription, TABLE};
use crate::blobs::{object_path_from_url, ImageUpload, BUCKET};
use crate::config::RemoteConfig;
use crate::error::{WishlistError, WishlistResult};
use crate::types::{ItemId, ItemPatch, NewItem, User, WishlistItem};

/// Body of an update request: the patch plus the audit columns
#[derive(Serialize)]
struct RowUpdate<'a> {
    #[serde(flatten)]
    patch: &'a ItemPatch,
    updated_by: User,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct RemoveObjects<'a> {
    prefixes: [&'a str; 1],
}

/// REST client for the hosted store
#[derive(Clone)]
pub struct RestBackend {
    config: RemoteConfig,
    client: Client,
}

impl RestBackend {
    pub fn new(config: RemoteConfig) -> Self {
        info!(url = %config.url, "Using remote wishlist backend");
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", self.config.anon_key))
    }

    fn table(&self) -> String {
        self.config.rest_url(TABLE)
    }

    fn id_filter(id: &ItemId) -> [(&'static str, String); 1] {
        [("id", format!("eq.{}", id))]
    }

    /// Turn non-2xx responses into `BackendUnavailable`
    async fn ensure_success(op: &str, response: Response) -> WishlistResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| status.to_string());
        Err(WishlistError::BackendUnavailable(format!(
            "{} failed: {} - {}",
            op, status, body
        )))
    }

    /// First row of a `return=representation` response
    async fn single_row(op: &str, response: Response) -> WishlistResult<WishlistItem> {
        let rows: Vec<WishlistItem> = response.json().await?;
        rows.into_iter().next().ok_or_else(|| {
            WishlistError::BackendUnavailable(format!("{} returned no row", op))
        })
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn fetch_all(&self) -> WishlistResult<Vec<WishlistItem>> {
        let response = self
            .authorized(self.client.get(self.table()))
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await?;
        let rows: Vec<WishlistItem> = Self::ensure_success("fetch", response).await?.json().await?;
        debug!(count = rows.len(), "Fetched wishlist rows");
        Ok(rows)
    }

    async fn insert(&self, item: &NewItem) -> WishlistResult<WishlistItem> {
        let response = self
            .authorized(self.client.post(self.table()))
            .header("Prefer", "return=representation")
            .json(&[item])
            .send()
            .await?;
        let response = Self::ensure_success("insert", response).await?;
        Self::single_row("insert", response).await
    }

    async fn update(
        &self,
        id: &ItemId,
        patch: &ItemPatch,
        updated_by: User,
    ) -> WishlistResult<WishlistItem> {
        let body = RowUpdate {
            patch,
            updated_by,
            updated_at: Utc::now(),
        };
        let response = self
            .authorized(self.client.patch(self.table()))
            .query(&Self::id_filter(id))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        let response = Self::ensure_success("update", response).await?;
        Self::single_row("update", response).await
    }

    async fn delete(&self, id: &ItemId) -> WishlistResult<()> {
        let response = self
            .authorized(self.client.delete(self.table()))
            .query(&Self::id_filter(id))
            .send()
            .await?;
        Self::ensure_success("delete", response).await?;
        Ok(())
    }

    async fn upload_image(&self, upload: &ImageUpload, owner: User) -> WishlistResult<String> {
        let path = upload.object_path(owner, Utc::now().timestamp_millis());
        let response = self
            .authorized(
                self.client
                    .post(self.config.storage_object_url(BUCKET, &path)),
            )
            .header("Content-Type", upload.content_type())
            .body(upload.bytes.clone())
            .send()
            .await?;
        Self::ensure_success("upload", response).await?;
        debug!(%path, size = upload.size(), "Image uploaded");
        Ok(self.config.public_object_url(BUCKET, &path))
    }

    async fn delete_image(&self, url: &str) -> WishlistResult<()> {
        let path = object_path_from_url(url).ok_or_else(|| {
            WishlistError::Validation(format!("not a {} bucket URL: {}", BUCKET, url))
        })?;
        let endpoint = format!("{}/storage/v1/object/{}", self.config.url, BUCKET);
        let response = self
            .authorized(self.client.delete(endpoint))
            .json(&RemoveObjects { prefixes: [path] })
            .send()
            .await?;
        Self::ensure_success("remove image", response).await?;
        Ok(())
    }

    async fn subscribe(&self) -> WishlistResult<Subscription> {
        realtime::connect(&self.config).await
    }
}
