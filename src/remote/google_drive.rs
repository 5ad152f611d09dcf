//! Google Drive backend (Drive v3)
//!
//! Uploads with a single multipart/related request and downloads with
//! `alt=media`. The bearer token arrives via the storage handle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;

use super::{BlobStore, RemoteError, RemoteResult, StorageHandle};

const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const BOUNDARY: &str = "shardvault_blob_boundary";

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

pub struct GoogleDriveStore {
    http: reqwest::Client,
}

impl GoogleDriveStore {
    pub fn new(timeout: Duration) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(Self { http })
    }

    /// multipart/related body: JSON metadata part, then the blob content
    fn multipart_body(folder_id: &str, name: &str, payload: &[u8]) -> Vec<u8> {
        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id],
        });

        let mut body = Vec::with_capacity(payload.len() + 256);
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}

#[async_trait]
impl BlobStore for GoogleDriveStore {
    async fn put(
        &self,
        handle: &StorageHandle,
        folder_id: &str,
        name: &str,
        payload: &[u8],
    ) -> RemoteResult<String> {
        let body = Self::multipart_body(folder_id, name, payload);

        let response = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(&handle.access_token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Unavailable(format!(
                "Drive upload returned {}",
                response.status()
            )));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(file.id)
    }

    async fn get(&self, handle: &StorageHandle, blob_id: &str) -> RemoteResult<Vec<u8>> {
        let url = format!("{FILES_URL}/{blob_id}?alt=media");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&handle.access_token)
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(blob_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(RemoteError::Unavailable(format!(
                "Drive download returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
