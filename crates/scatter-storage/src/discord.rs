//! Discord attachment storage provider.
//!
//! "Storage" here means message attachments: `prepare_storage` opens a
//! dedicated thread in a configured channel, `upload_chunk` posts the
//! encrypted payload as an attachment inside that thread, and
//! `download_chunk` re-fetches the message by id and pulls the attachment
//! bytes from its URL.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use tracing::{debug, info, warn};

use scatter_core::StorageError;
use scatter_core::types::{ChunkRef, FileMetadata, Platform, StorageContext};

use crate::provider::StorageProvider;

/// Hard attachment ceiling on the platform (free tier).
pub const DISCORD_ATTACHMENT_LIMIT: usize = 10 * 1024 * 1024;

/// Advertised default: safely below the hard ceiling to leave headroom for
/// encryption overhead and protocol framing.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024;

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Filename used for every posted attachment; the payload is opaque
/// ciphertext, so there is nothing meaningful to call it.
const ATTACHMENT_NAME: &str = "chunk.enc";

/// Configuration for one Discord storage backend.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Channel the per-file threads are created in.
    pub channel_id: String,
    /// Advertised chunk ceiling; configurable downward, never above the
    /// platform hard limit.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// API base URL; tests point this at a local mock server.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
    #[serde(default)]
    attachments: Vec<AttachmentResponse>,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

#[derive(Debug)]
pub struct DiscordProvider {
    config: DiscordConfig,
    client: Client,
}

impl DiscordProvider {
    pub fn new(config: DiscordConfig) -> Result<Self, StorageError> {
        if config.max_chunk_size > DISCORD_ATTACHMENT_LIMIT {
            return Err(StorageError::Api(format!(
                "max_chunk_size {} exceeds the platform attachment limit {DISCORD_ATTACHMENT_LIMIT}",
                config.max_chunk_size
            )));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.bot_token)
    }

    fn thread_id_for(
        chunk_ref: &ChunkRef,
        context: &StorageContext,
    ) -> Result<String, StorageError> {
        chunk_ref
            .get_str("thread_id")
            .or_else(|| context.get_str("thread_id"))
            .map(str::to_string)
            .ok_or_else(|| StorageError::Api("chunk reference is missing thread_id".into()))
    }

    /// Map a non-success Discord response onto the storage error taxonomy.
    /// 429 carries the platform cooldown so the router can honor it.
    async fn error_from_response(&self, response: reqwest::Response) -> StorageError {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let header_cooldown = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok());
            let body_cooldown = response
                .json::<RateLimitBody>()
                .await
                .ok()
                .and_then(|b| b.retry_after);
            let retry_after = body_cooldown
                .or(header_cooldown)
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(std::time::Duration::from_secs_f64);
            warn!(?retry_after, "Discord API rate limit hit");
            return StorageError::RateLimited { retry_after };
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => StorageError::Unauthorized(format!("HTTP {status}: {body}")),
            404 => StorageError::NotFound(format!("HTTP {status}: {body}")),
            s if s >= 500 => StorageError::Transient(format!("HTTP {status}: {body}")),
            _ => StorageError::Api(format!("HTTP {status}: {body}")),
        }
    }
}

fn transport_error(e: reqwest::Error) -> StorageError {
    StorageError::Transient(format!("network error: {e}"))
}

#[async_trait]
impl StorageProvider for DiscordProvider {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    async fn prepare_storage(
        &self,
        meta: &FileMetadata,
    ) -> Result<StorageContext, StorageError> {
        let thread_name = format!("[FILE] {}", meta.filename);
        info!(filename = %meta.filename, "creating Discord thread");

        let url = format!(
            "{}/channels/{}/threads",
            self.config.api_base, self.config.channel_id
        );
        // https://discord.com/developers/docs/resources/channel#start-thread-without-message
        let payload = serde_json::json!({
            "name": thread_name,
            "type": 11,
            "auto_archive_duration": 10080,
        });

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        let thread: ThreadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Api(format!("malformed thread response: {e}")))?;
        debug!(thread_id = %thread.id, "thread created");

        Ok(StorageContext(
            serde_json::json!({ "thread_id": thread.id }),
        ))
    }

    async fn upload_chunk(
        &self,
        data: &[u8],
        context: &StorageContext,
    ) -> Result<ChunkRef, StorageError> {
        let thread_id = context
            .get_str("thread_id")
            .ok_or_else(|| StorageError::Api("storage context is missing thread_id".into()))?;

        debug!(thread_id, size = data.len(), "uploading chunk");

        let url = format!("{}/channels/{thread_id}/messages", self.config.api_base);
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(ATTACHMENT_NAME)
            .mime_str("application/octet-stream")
            .map_err(|e| StorageError::Api(format!("invalid attachment part: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("payload_json", "{}")
            .part("files[0]", part);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Api(format!("malformed message response: {e}")))?;
        let attachment = message
            .attachments
            .first()
            .ok_or_else(|| StorageError::Api("message response has no attachment".into()))?;

        debug!(message_id = %message.id, "chunk uploaded");

        Ok(ChunkRef(serde_json::json!({
            "thread_id": thread_id,
            "message_id": message.id,
            "attachment_url": attachment.url,
        })))
    }

    async fn download_chunk(
        &self,
        chunk_ref: &ChunkRef,
        context: &StorageContext,
    ) -> Result<Vec<u8>, StorageError> {
        let thread_id = Self::thread_id_for(chunk_ref, context)?;
        let message_id = chunk_ref
            .get_str("message_id")
            .ok_or_else(|| StorageError::Api("chunk reference is missing message_id".into()))?;

        // Re-fetch the message rather than trusting a stored attachment URL;
        // the CDN links expire while message ids do not.
        let url = format!(
            "{}/channels/{thread_id}/messages/{message_id}",
            self.config.api_base
        );
        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Api(format!("malformed message response: {e}")))?;
        let attachment = message
            .attachments
            .first()
            .ok_or_else(|| StorageError::NotFound(format!("message {message_id} has no attachment")))?;

        let response = self
            .client
            .get(&attachment.url)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn delete_chunk(
        &self,
        chunk_ref: &ChunkRef,
        context: &StorageContext,
    ) -> Result<(), StorageError> {
        let thread_id = Self::thread_id_for(chunk_ref, context)?;
        let message_id = chunk_ref
            .get_str("message_id")
            .ok_or_else(|| StorageError::Api("chunk reference is missing message_id".into()))?;

        let url = format!(
            "{}/channels/{thread_id}/messages/{message_id}",
            self.config.api_base
        );
        let response = self
            .client
            .delete(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            return Ok(());
        }
        match self.error_from_response(response).await {
            // Already gone remotely — deletion is idempotent.
            StorageError::NotFound(_) => Ok(()),
            other => Err(other),
        }
    }

    fn max_chunk_size(&self) -> usize {
        self.config.max_chunk_size
    }

    async fn validate_config(&self) -> Result<(), StorageError> {
        debug!(channel_id = %self.config.channel_id, "validating Discord config");

        let url = format!(
            "{}/channels/{}",
            self.config.api_base, self.config.channel_id
        );
        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct MockDiscordServer {
        listener: tokio::net::TcpListener,
        base_url: String,
    }

    impl MockDiscordServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            let port = listener.local_addr().unwrap().port();
            let base_url = format!("http://127.0.0.1:{port}");
            Self { listener, base_url }
        }

        async fn respond_once(self, status_code: u16, body: &str) {
            self.respond_sequence(vec![(status_code, body.to_owned())]).await;
        }

        /// Serve the given responses to consecutive connections.
        async fn respond_sequence(self, responses: Vec<(u16, String)>) {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            for (status_code, body) in responses {
                let (mut stream, _) = self.listener.accept().await.unwrap();

                let mut buf = vec![0u8; 65536];
                let _ = stream.read(&mut buf).await.unwrap();

                let response = format!(
                    "HTTP/1.1 {status_code} OK\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\
                     \r\n\
                     {body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        }
    }

    fn make_provider(base_url: &str) -> DiscordProvider {
        DiscordProvider::new(DiscordConfig {
            bot_token: "test-token".into(),
            channel_id: "111222333444555666".into(),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            api_base: base_url.to_string(),
        })
        .unwrap()
    }

    fn meta() -> FileMetadata {
        FileMetadata {
            file_id: "f-1".into(),
            filename: "report.pdf".into(),
        }
    }

    #[test]
    fn rejects_max_chunk_size_above_platform_limit() {
        let result = DiscordProvider::new(DiscordConfig {
            bot_token: "t".into(),
            channel_id: "c".into(),
            max_chunk_size: DISCORD_ATTACHMENT_LIMIT + 1,
            api_base: DEFAULT_API_BASE.into(),
        });
        assert!(matches!(result, Err(StorageError::Api(_))));
    }

    #[test]
    fn config_defaults() {
        let cfg: DiscordConfig = serde_json::from_value(serde_json::json!({
            "bot_token": "t",
            "channel_id": "c",
        }))
        .unwrap();
        assert_eq!(cfg.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
    }

    #[tokio::test]
    async fn prepare_storage_creates_thread() {
        let server = MockDiscordServer::start().await;
        let provider = make_provider(&server.base_url);

        let handle = tokio::spawn(async move {
            server
                .respond_once(201, r#"{"id":"999888777","name":"[FILE] report.pdf"}"#)
                .await;
        });

        let context = provider.prepare_storage(&meta()).await.unwrap();
        handle.await.unwrap();

        assert_eq!(context.get_str("thread_id"), Some("999888777"));
    }

    #[tokio::test]
    async fn upload_chunk_returns_reference() {
        let server = MockDiscordServer::start().await;
        let provider = make_provider(&server.base_url);

        let body = r#"{"id":"12345","attachments":[{"url":"https://cdn.example/chunk.enc"}]}"#;
        let handle = tokio::spawn(async move {
            server.respond_once(200, body).await;
        });

        let context = StorageContext(serde_json::json!({"thread_id": "999"}));
        let chunk_ref = provider
            .upload_chunk(b"opaque-bytes", &context)
            .await
            .unwrap();
        handle.await.unwrap();

        assert_eq!(chunk_ref.get_str("thread_id"), Some("999"));
        assert_eq!(chunk_ref.get_str("message_id"), Some("12345"));
        assert_eq!(
            chunk_ref.get_str("attachment_url"),
            Some("https://cdn.example/chunk.enc")
        );
    }

    #[tokio::test]
    async fn upload_without_context_thread_fails() {
        let provider = make_provider("http://localhost:1");
        let err = provider
            .upload_chunk(b"bytes", &StorageContext::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Api(_)));
    }

    #[tokio::test]
    async fn download_refetches_message_then_attachment() {
        let server = MockDiscordServer::start().await;
        let base = server.base_url.clone();
        let provider = make_provider(&base);

        // First connection: the message fetch pointing back at the mock
        // server for the attachment URL. Second: the attachment bytes.
        let message_body =
            format!(r#"{{"id":"12345","attachments":[{{"url":"{base}/cdn/chunk.enc"}}]}}"#);
        let handle = tokio::spawn(async move {
            server
                .respond_sequence(vec![
                    (200, message_body),
                    (200, "ciphertext-bytes".to_string()),
                ])
                .await;
        });

        let context = StorageContext(serde_json::json!({"thread_id": "999"}));
        let chunk_ref = ChunkRef(serde_json::json!({
            "thread_id": "999",
            "message_id": "12345",
        }));
        let bytes = provider.download_chunk(&chunk_ref, &context).await.unwrap();
        handle.await.unwrap();

        assert_eq!(bytes, b"ciphertext-bytes");
    }

    #[tokio::test]
    async fn download_missing_message_is_not_found() {
        let server = MockDiscordServer::start().await;
        let provider = make_provider(&server.base_url);

        let handle = tokio::spawn(async move {
            server
                .respond_once(404, r#"{"message":"Unknown Message"}"#)
                .await;
        });

        let context = StorageContext(serde_json::json!({"thread_id": "999"}));
        let chunk_ref = ChunkRef(serde_json::json!({
            "thread_id": "999",
            "message_id": "gone",
        }));
        let err = provider
            .download_chunk(&chunk_ref, &context)
            .await
            .unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn rate_limit_carries_platform_cooldown() {
        let server = MockDiscordServer::start().await;
        let provider = make_provider(&server.base_url);

        let handle = tokio::spawn(async move {
            server
                .respond_once(
                    429,
                    r#"{"message":"You are being rate limited.","retry_after":2.5}"#,
                )
                .await;
        });

        let err = provider.prepare_storage(&meta()).await.unwrap_err();
        handle.await.unwrap();

        match err {
            StorageError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs_f64(2.5)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_token_is_unauthorized() {
        let server = MockDiscordServer::start().await;
        let provider = make_provider(&server.base_url);

        let handle = tokio::spawn(async move {
            server.respond_once(401, r#"{"message":"401: Unauthorized"}"#).await;
        });

        let err = provider.validate_config().await.unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, StorageError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockDiscordServer::start().await;
        let provider = make_provider(&server.base_url);

        let handle = tokio::spawn(async move {
            server.respond_once(502, "bad gateway").await;
        });

        let err = provider.prepare_storage(&meta()).await.unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, StorageError::Transient(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_message() {
        let server = MockDiscordServer::start().await;
        let provider = make_provider(&server.base_url);

        let handle = tokio::spawn(async move {
            server
                .respond_once(404, r#"{"message":"Unknown Message"}"#)
                .await;
        });

        let context = StorageContext(serde_json::json!({"thread_id": "999"}));
        let chunk_ref = ChunkRef(serde_json::json!({
            "thread_id": "999",
            "message_id": "12345",
        }));
        provider.delete_chunk(&chunk_ref, &context).await.unwrap();
        handle.await.unwrap();
    }
}
