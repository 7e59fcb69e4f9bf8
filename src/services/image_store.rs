//! Image hosting: a trait the services talk to, the Cloudinary client used in
//! production and an in-memory store for tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{
    config::CloudinaryConfig,
    error::{AppError, AppResult},
    models::StoredImage,
};

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Uploads `upload` into `folder`, tagged with `tags`.
    async fn store(
        &self,
        upload: &UploadFile,
        folder: &str,
        tags: &[String],
    ) -> AppResult<StoredImage>;

    /// Removes a previously stored image.
    async fn delete(&self, public_id: &str) -> AppResult<()>;

    /// Name recorded as the location of stored images.
    fn provider(&self) -> &'static str;
}

/// Deletes every image in `images`, logging failures instead of returning them.
///
/// Used to undo uploads whose database write did not happen and to drop
/// images after the rows pointing at them are gone.
pub async fn discard_all(store: &dyn ImageStore, images: &[StoredImage]) {
    for image in images {
        if let Err(err) = store.delete(&image.public_id).await {
            tracing::warn!(error = %err, public_id = %image.public_id, "image cleanup failed");
        }
    }
}

pub struct CloudinaryImageStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl CloudinaryImageStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/{}",
            self.config.cloud_name, action
        )
    }

    async fn upstream_error(resp: reqwest::Response) -> AppError {
        let status = resp.status();
        let message = match resp.json::<ErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => status.to_string(),
        };
        AppError::Upstream(format!("image host: {message}"))
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, the API secret appended, then hashed.
fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{joined}{api_secret}").as_bytes()))
}

#[async_trait]
impl ImageStore for CloudinaryImageStore {
    async fn store(
        &self,
        upload: &UploadFile,
        folder: &str,
        tags: &[String],
    ) -> AppResult<StoredImage> {
        let timestamp = Utc::now().timestamp().to_string();
        let mut params = vec![("folder", folder.to_string()), ("timestamp", timestamp)];
        if !tags.is_empty() {
            params.push(("tags", tags.join(",")));
        }
        let signature = sign(&params, &self.config.api_secret);

        let mut file = reqwest::multipart::Part::bytes(upload.bytes.to_vec())
            .file_name(upload.filename.clone());
        if let Some(content_type) = &upload.content_type {
            file = file
                .mime_str(content_type)
                .map_err(|_| AppError::BadRequest(format!("invalid content type `{content_type}`")))?;
        }

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let resp = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("image host: {err}")))?;
        if !resp.status().is_success() {
            return Err(Self::upstream_error(resp).await);
        }

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("image host: {err}")))?;
        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| AppError::Upstream("image host returned no url".into()))?;

        tracing::debug!(public_id = %body.public_id, folder, "image stored");
        Ok(StoredImage {
            url,
            public_id: body.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> AppResult<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let params = [("public_id", public_id.to_string()), ("timestamp", timestamp)];
        let signature = sign(&params, &self.config.api_secret);

        let mut form: Vec<(&str, String)> = params.to_vec();
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let resp = self
            .client
            .post(self.endpoint("destroy"))
            .form(&form)
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("image host: {err}")))?;
        if !resp.status().is_success() {
            return Err(Self::upstream_error(resp).await);
        }

        tracing::debug!(public_id, "image deleted");
        Ok(())
    }

    fn provider(&self) -> &'static str {
        "Cloudinary"
    }
}

#[derive(Debug, Clone)]
pub struct HeldImage {
    pub folder: String,
    pub tags: Vec<String>,
    pub filename: String,
}

#[derive(Debug, Default)]
struct InMemoryImageState {
    images: HashMap<String, HeldImage>,
    uploads: usize,
    fail_after: Option<usize>,
}

/// Keeps uploads in memory. Used when no image host is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageStore {
    state: Arc<RwLock<InMemoryImageState>>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `n` more uploads succeed, then rejects the rest.
    /// `None` turns failures off again.
    pub fn fail_after(&self, n: Option<usize>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.fail_after = n.map(|n| state.uploads + n);
    }

    /// Number of successful uploads since creation.
    pub fn upload_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .uploads
    }

    /// Number of images currently held.
    pub fn stored_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .images
            .len()
    }

    pub fn get(&self, public_id: &str) -> Option<HeldImage> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .images
            .get(public_id)
            .cloned()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn store(
        &self,
        upload: &UploadFile,
        folder: &str,
        tags: &[String],
    ) -> AppResult<StoredImage> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail_after.is_some_and(|limit| state.uploads >= limit) {
            return Err(AppError::Upstream("image host: upload rejected".into()));
        }

        state.uploads += 1;
        let public_id = format!("{}/img-{:04}", folder, state.uploads);
        state.images.insert(
            public_id.clone(),
            HeldImage {
                folder: folder.to_string(),
                tags: tags.to_vec(),
                filename: upload.filename.clone(),
            },
        );

        Ok(StoredImage {
            url: format!("memory://{public_id}"),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> AppResult<()> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .images
            .remove(public_id);
        Ok(())
    }

    fn provider(&self) -> &'static str {
        "Memory"
    }
}
