//! Object storage client for the app's audio library
//!
//! Talks to the Supabase-compatible storage and REST endpoints with the
//! service-role key. Small files go up in a single request; anything above
//! the resumable threshold is sent through the TUS endpoint in chunks.

use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SUPABASE_URL: &str = "SUPABASE_URL";
pub const SUPABASE_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";

pub const DEFAULT_BUCKET: &str = "audio-files";

/// Storage lists at most this many objects per call
pub const LIST_LIMIT: usize = 1000;
pub const DELETE_BATCH_SIZE: usize = 100;

pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_RESUMABLE_THRESHOLD: u64 = 50 * 1024 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 6 * 1024 * 1024;

const TUS_VERSION: &str = "1.0.0";
const TUS_CONTENT_TYPE: &str = "application/offset+octet-stream";

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Storage error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Resumable upload was created without a Location header")]
    MissingLocation,
}

/// Connection settings for [`StorageClient`]
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub url: String,
    pub service_key: String,
    pub bucket: String,
    /// Files larger than this use the resumable endpoint
    pub resumable_threshold: u64,
    pub chunk_size: usize,
}

impl StorageConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            resumable_threshold: DEFAULT_RESUMABLE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(StorageError::MissingEnv(key))
        };
        Ok(Self::new(read(SUPABASE_URL)?, read(SUPABASE_SERVICE_ROLE_KEY)?))
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }
}

/// Row inserted into `audio_tracks` for an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRecord {
    pub channel_id: String,
    pub energy_level: String,
    pub file_path: String,
    pub duration_seconds: u32,
    pub metadata: serde_json::Value,
}

impl TrackRecord {
    pub fn new(channel_id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            energy_level: "medium".to_string(),
            file_path: file_path.into(),
            duration_seconds: 180,
            metadata: json!({ "source": "soundcheck_import" }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: Option<String>,
}

/// Outcome of a batched delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteCounts {
    pub deleted: usize,
    pub failed: usize,
}

/// How a file was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Direct,
    Resumable { chunks: usize },
}

/// Client for the app's object storage
pub struct StorageClient {
    http: Client,
    config: StorageConfig,
}

impl StorageClient {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let http = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.config.url, self.config.bucket, path)
    }

    /// Names of the objects under `prefix`
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let url = format!("{}/storage/v1/object/list/{}", self.config.url, self.config.bucket);
        let response = self
            .request(Method::POST, &url)
            .json(&json!({ "limit": LIST_LIMIT, "prefix": prefix }))
            .send()
            .await?;

        let entries: Vec<ObjectEntry> = check(response).await?.json().await?;
        let names: Vec<String> = entries.into_iter().filter_map(|e| e.name).collect();
        debug!(prefix, count = names.len(), "Listed objects");
        Ok(names)
    }

    /// Delete `paths` in batches; a failed batch counts all of its paths as failed
    pub async fn delete(&self, paths: &[String]) -> DeleteCounts {
        let mut counts = DeleteCounts::default();
        let url = format!("{}/storage/v1/object/{}", self.config.url, self.config.bucket);
        let batches = paths.len().div_ceil(DELETE_BATCH_SIZE);

        for (i, batch) in paths.chunks(DELETE_BATCH_SIZE).enumerate() {
            let result: Result<Response> = async {
                let response = self
                    .request(Method::DELETE, &url)
                    .json(&json!({ "prefixes": batch }))
                    .send()
                    .await?;
                check(response).await
            }
            .await;

            match result {
                Ok(_) => {
                    debug!("Deleted batch {}/{}", i + 1, batches);
                    counts.deleted += batch.len();
                }
                Err(e) => {
                    warn!("Delete batch {}/{} failed: {}", i + 1, batches, e);
                    counts.failed += batch.len();
                }
            }
        }
        counts
    }

    /// Upload `file` to `storage_path`, switching to the resumable endpoint for large files
    pub async fn upload(&self, file: &Path, storage_path: &str, upsert: bool) -> Result<UploadMode> {
        let size = tokio::fs::metadata(file).await?.len();
        let data = tokio::fs::read(file).await?;
        let content_type = content_type_for(file);

        if size > self.config.resumable_threshold {
            let chunks = self.upload_resumable(data, storage_path, content_type, upsert).await?;
            info!(path = storage_path, size, chunks, "Uploaded (resumable)");
            return Ok(UploadMode::Resumable { chunks });
        }

        let mut request = self
            .request(Method::POST, &self.object_url(storage_path))
            .header(CONTENT_TYPE, content_type)
            .body(data);
        if upsert {
            request = request.header("x-upsert", "true");
        }
        check(request.send().await?).await?;

        info!(path = storage_path, size, "Uploaded");
        Ok(UploadMode::Direct)
    }

    async fn upload_resumable(
        &self,
        data: Vec<u8>,
        storage_path: &str,
        content_type: &str,
        upsert: bool,
    ) -> Result<usize> {
        let url = format!("{}/storage/v1/upload/resumable", self.config.url);
        let metadata = tus_metadata(&self.config.bucket, storage_path, content_type);

        let mut create = self
            .request(Method::POST, &url)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Length", data.len().to_string())
            .header("Upload-Metadata", metadata);
        if upsert {
            create = create.header("x-upsert", "true");
        }
        let created = check(create.send().await?).await?;

        let location = created
            .headers()
            .get(LOCATION)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .ok_or(StorageError::MissingLocation)?;
        let upload_url = resolve_location(&self.config.url, location);

        let mut offset = 0usize;
        let mut chunks = 0usize;
        for chunk in data.chunks(self.config.chunk_size.max(1)) {
            let response = self
                .request(Method::PATCH, &upload_url)
                .header("Tus-Resumable", TUS_VERSION)
                .header("Upload-Offset", offset.to_string())
                .header(CONTENT_TYPE, TUS_CONTENT_TYPE)
                .body(chunk.to_vec())
                .send()
                .await?;
            check(response).await?;

            offset += chunk.len();
            chunks += 1;
            debug!(path = storage_path, offset, total = data.len(), "Chunk sent");
        }
        Ok(chunks)
    }

    /// Insert an `audio_tracks` row; an existing row for the same file is left alone
    pub async fn register_track(&self, record: &TrackRecord) -> Result<()> {
        let url = format!("{}/rest/v1/audio_tracks", self.config.url);
        let response = self
            .request(Method::POST, &url)
            .header("Prefer", "resolution=ignore-duplicates")
            .json(record)
            .send()
            .await?;
        check(response).await?;
        debug!(path = %record.file_path, "Track registered");
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Server {
        status: status.as_u16(),
        message,
    })
}

pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => "application/json",
        _ => "audio/mpeg",
    }
}

/// Object path for `relative` under `prefix`, using `/` separators with no leading or trailing slash
pub fn storage_path(prefix: &str, relative: &Path) -> String {
    let relative: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}/{}", prefix, relative.join("/"))
        .trim_matches('/')
        .to_string()
}

fn tus_metadata(bucket: &str, object: &str, content_type: &str) -> String {
    format!(
        "bucketName {},objectName {},contentType {}",
        STANDARD.encode(bucket),
        STANDARD.encode(object),
        STANDARD.encode(content_type)
    )
}

fn resolve_location(base_url: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else {
        format!("{}/{}", base_url, location.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use test_case::test_case;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> StorageClient {
        StorageClient::new(StorageConfig::new(server.uri(), "service-key")).unwrap()
    }

    #[test_case("", "a.mp3" => "a.mp3")]
    #[test_case("tracks", "a.mp3" => "tracks/a.mp3")]
    #[test_case("/tracks/", "focus/a.mp3" => "tracks/focus/a.mp3")]
    #[test_case("", "focus/deep/a.json" => "focus/deep/a.json")]
    fn test_storage_path(prefix: &str, relative: &str) -> String {
        storage_path(prefix, &PathBuf::from(relative))
    }

    #[test_case("a.json" => "application/json")]
    #[test_case("a.JSON" => "application/json")]
    #[test_case("a.mp3" => "audio/mpeg")]
    #[test_case("noext" => "audio/mpeg")]
    fn test_content_type(file: &str) -> &'static str {
        content_type_for(Path::new(file))
    }

    #[test]
    fn test_config_requires_both_variables() {
        let err = StorageConfig::from_lookup(|k| (k == SUPABASE_URL).then(|| "https://x.example".into()));
        assert!(matches!(err, Err(StorageError::MissingEnv(SUPABASE_SERVICE_ROLE_KEY))));

        let config = StorageConfig::from_lookup(|k| match k {
            SUPABASE_URL => Some("https://x.example/".into()),
            _ => Some("key".into()),
        })
        .unwrap();
        assert_eq!(config.url, "https://x.example");
        assert_eq!(config.bucket, DEFAULT_BUCKET);
    }

    #[test]
    fn test_tus_metadata_is_base64() {
        let meta = tus_metadata("audio-files", "focus/a.mp3", "audio/mpeg");
        assert!(meta.starts_with("bucketName YXVkaW8tZmlsZXM=,objectName "));
        assert!(!meta.contains("focus/a.mp3"));
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(
            resolve_location("http://h", "/storage/v1/upload/resumable/abc"),
            "http://h/storage/v1/upload/resumable/abc"
        );
        assert_eq!(resolve_location("http://h", "https://other/x"), "https://other/x");
    }

    #[tokio::test]
    async fn test_list_returns_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/list/audio-files"))
            .and(header("apikey", "service-key"))
            .and(body_json(json!({ "limit": 1000, "prefix": "" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "a.mp3" },
                { "name": "a.json" },
                { "id": null }
            ])))
            .mount(&server)
            .await;

        let names = client_for(&server).list("").await.unwrap();
        assert_eq!(names, vec!["a.mp3", "a.json"]);
    }

    #[tokio::test]
    async fn test_list_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        match client_for(&server).list("").await {
            Err(StorageError::Server { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "forbidden");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_counts_failed_batches() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/audio-files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let paths: Vec<String> = (0..250).map(|i| format!("t{i}.mp3")).collect();
        let counts = client_for(&server).delete(&paths).await;
        assert_eq!(counts, DeleteCounts { deleted: 200, failed: 50 });
    }

    #[tokio::test]
    async fn test_delete_nothing_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert_eq!(client_for(&server).delete(&[]).await, DeleteCounts::default());
    }

    #[tokio::test]
    async fn test_direct_upload_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/audio-files/focus/a.mp3"))
            .and(header("content-type", "audio/mpeg"))
            .and(header("x-upsert", "true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.mp3");
        std::fs::write(&file, b"ID3audio").unwrap();

        let mode = client_for(&server).upload(&file, "focus/a.mp3", true).await.unwrap();
        assert_eq!(mode, UploadMode::Direct);
    }

    #[tokio::test]
    async fn test_large_upload_is_chunked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/upload/resumable"))
            .and(header("tus-resumable", "1.0.0"))
            .and(header("upload-length", "10"))
            .respond_with(
                ResponseTemplate::new(201).insert_header("Location", "/storage/v1/upload/resumable/abc"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/storage/v1/upload/resumable/abc"))
            .and(header("content-type", TUS_CONTENT_TYPE))
            .respond_with(ResponseTemplate::new(204))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.mp3");
        std::fs::write(&file, b"0123456789").unwrap();

        let mut config = StorageConfig::new(server.uri(), "service-key");
        config.resumable_threshold = 4;
        config.chunk_size = 4;
        let client = StorageClient::new(config).unwrap();

        let mode = client.upload(&file, "big.mp3", false).await.unwrap();
        assert_eq!(mode, UploadMode::Resumable { chunks: 3 });
    }

    #[tokio::test]
    async fn test_resumable_without_location_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.mp3");
        std::fs::write(&file, b"0123456789").unwrap();

        let mut config = StorageConfig::new(server.uri(), "service-key");
        config.resumable_threshold = 4;
        let client = StorageClient::new(config).unwrap();

        assert!(matches!(
            client.upload(&file, "big.mp3", false).await,
            Err(StorageError::MissingLocation)
        ));
    }

    #[tokio::test]
    async fn test_register_track() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/audio_tracks"))
            .and(header("prefer", "resolution=ignore-duplicates"))
            .and(body_partial_json(json!({
                "channel_id": "chan-1",
                "energy_level": "medium",
                "file_path": "focus/a.mp3",
                "duration_seconds": 180,
                "metadata": { "source": "soundcheck_import" }
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .register_track(&TrackRecord::new("chan-1", "focus/a.mp3"))
            .await
            .unwrap();
    }
}
