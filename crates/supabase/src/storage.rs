use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::storage_error, SupabaseClient, SupabaseError};

/// Object storage operations against one bucket, performed as the caller so
/// storage policies apply.
pub struct StorageBucket {
    client: SupabaseClient,
    bucket: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

impl StorageBucket {
    pub(crate) fn new(client: SupabaseClient, bucket: String, access_token: String) -> Self {
        Self {
            client,
            bucket,
            access_token,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, path: &str) -> String {
        self.client.endpoint(&format!(
            "storage/v1/object/{}/{}",
            self.bucket,
            path.trim_start_matches('/')
        ))
    }

    /// Store `data` at `path`. Existing objects are never overwritten.
    pub async fn upload(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, SupabaseError> {
        debug!(bucket = %self.bucket, path, size = data.len(), "uploading object");

        let response = self
            .client
            .http()
            .post(self.object_url(path))
            .header("apikey", self.client.anon_key())
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(storage_error(status.as_u16(), &body));
        }

        let parsed: UploadResponse = serde_json::from_str(&body).unwrap_or(UploadResponse { key: None });
        Ok(parsed
            .key
            .unwrap_or_else(|| format!("{}/{}", self.bucket, path)))
    }

    pub async fn download(&self, path: &str) -> Result<Bytes, SupabaseError> {
        let response = self
            .client
            .http()
            .get(self.object_url(path))
            .header("apikey", self.client.anon_key())
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(storage_error(status.as_u16(), &body));
        }

        Ok(response.bytes().await?)
    }

    pub async fn remove(&self, paths: &[String]) -> Result<(), SupabaseError> {
        if paths.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .http()
            .delete(self.client.endpoint(&format!("storage/v1/object/{}", self.bucket)))
            .header("apikey", self.client.anon_key())
            .bearer_auth(&self.access_token)
            .json(&RemoveRequest { prefixes: paths })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(storage_error(status.as_u16(), &body));
        }

        Ok(())
    }
}
