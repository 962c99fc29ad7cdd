//! Attachment retrieval for dataset ingestion.
//!
//! Files land in the raw data directory under their own name and are not
//! downloaded again if already present. Authenticated references use a
//! bearer token from the process-wide [`TokenCache`]; direct references are
//! tried anonymously first and retried once with a token on 401/403.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use reportmind_core::config::{AttachmentAuthConfig, AttachmentsConfig};
use reportmind_core::types::{AttachmentRef, InboundAttachment};
use reportmind_core::utils::expand_home;

use crate::error::IngestionError;

/// A token is refreshed once it expires within this margin.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Per-request deadline for token and file downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client with a request deadline.
///
/// Falls back to reqwest's default client (no deadline) if the builder fails.
fn http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "failed to build HTTP client, downloads will have no timeout");
            reqwest::Client::new()
        }
    }
}

// ─────────────────────────────────────────────
// Token cache
// ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Clone, Debug)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Client-credentials bearer token, cached until it nears expiry.
pub struct TokenCache {
    client: reqwest::Client,
    auth: AttachmentAuthConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(client: reqwest::Client, auth: AttachmentAuthConfig) -> Self {
        Self {
            client,
            auth,
            cached: Mutex::new(None),
        }
    }

    /// Current token, fetching a fresh one when missing or about to expire.
    pub async fn token(&self) -> Result<String, IngestionError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at > now + chrono::Duration::seconds(EXPIRY_MARGIN_SECS) {
                return Ok(token.access_token.clone());
            }
        }

        if !self.auth.is_configured() {
            return Err(IngestionError::Auth(
                "no client credentials configured for authenticated downloads".into(),
            ));
        }

        debug!(url = %self.auth.token_url, "requesting bearer token");
        let response = self
            .client
            .post(&self.auth.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.auth.client_id.as_str()),
                ("client_secret", self.auth.client_secret.as_str()),
                ("scope", self.auth.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| IngestionError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestionError::Auth(format!("token endpoint returned {status}: {body}")));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IngestionError::Auth(format!("invalid token response: {e}")))?;

        info!(expires_in = token.expires_in, "obtained bearer token");
        let fresh = CachedToken {
            access_token: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        };
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }
}

// ─────────────────────────────────────────────
// Fetcher
// ─────────────────────────────────────────────

/// Downloads dataset attachments into the raw data directory.
pub struct AttachmentFetcher {
    client: reqwest::Client,
    raw_dir: PathBuf,
    tokens: TokenCache,
}

impl AttachmentFetcher {
    pub fn new(raw_dir: impl Into<PathBuf>, auth: AttachmentAuthConfig) -> Self {
        Self::with_client(raw_dir, auth, http_client(DOWNLOAD_TIMEOUT))
    }

    fn with_client(raw_dir: impl Into<PathBuf>, auth: AttachmentAuthConfig, client: reqwest::Client) -> Self {
        Self {
            tokens: TokenCache::new(client.clone(), auth),
            client,
            raw_dir: raw_dir.into(),
        }
    }

    pub fn from_config(config: &AttachmentsConfig) -> Self {
        Self::new(expand_home(&config.raw_dir), config.auth.clone())
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Local path of `attachment`, downloading it if it isn't stored yet.
    pub async fn fetch(&self, attachment: &InboundAttachment) -> Result<PathBuf, IngestionError> {
        let file_name = Path::new(&attachment.name)
            .file_name()
            .ok_or_else(|| IngestionError::Processing(format!("invalid file name: {}", attachment.name)))?;
        let path = self.raw_dir.join(file_name);
        if path.exists() {
            debug!(path = %path.display(), "attachment already stored, skipping download");
            return Ok(path);
        }

        let reference = attachment
            .reference
            .as_ref()
            .ok_or(IngestionError::MissingReference)?;
        let bytes = self.download(reference).await?;

        tokio::fs::create_dir_all(&self.raw_dir).await?;
        store(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "attachment stored");
        Ok(path)
    }

    async fn download(&self, reference: &AttachmentRef) -> Result<Vec<u8>, IngestionError> {
        let response = match reference {
            AttachmentRef::Authenticated(url) => self.get(url, Some(self.tokens.token().await?)).await?,
            AttachmentRef::Direct(url) => {
                let response = self.get(url, None).await?;
                if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                    warn!(status = %response.status(), "anonymous download refused, retrying with token");
                    self.get(url, Some(self.tokens.token().await?)).await?
                } else {
                    response
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(IngestionError::Download(format!("HTTP {}", status.as_u16())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IngestionError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str, bearer: Option<String>) -> Result<reqwest::Response, IngestionError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| IngestionError::Download(e.to_string()))
    }
}

/// Write `bytes` to `path` through a sibling `.part` file renamed into place,
/// so a failed write never leaves a truncated file under the final name.
async fn store(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result = match tokio::fs::write(&partial, bytes).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            debug!(path = %partial.display(), error = %e, "no partial download to remove");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn auth(server: &MockServer) -> AttachmentAuthConfig {
        AttachmentAuthConfig {
            client_id: "app-id".into(),
            client_secret: "secret".into(),
            token_url: format!("{}/token", server.uri()),
            scope: "https://api.botframework.com/.default".into(),
        }
    }

    async fn mount_token(server: &MockServer, expires_in: i64, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": expires_in
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start().await;
        mount_token(&server, 3600, 1).await;
        let cache = TokenCache::new(reqwest::Client::new(), auth(&server));
        assert_eq!(cache.token().await.unwrap(), "tok-1");
        assert_eq!(cache.token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_token_near_expiry_is_refreshed() {
        let server = MockServer::start().await;
        mount_token(&server, 30, 2).await;
        let cache = TokenCache::new(reqwest::Client::new(), auth(&server));
        cache.token().await.unwrap();
        cache.token().await.unwrap();
    }

    #[tokio::test]
    async fn test_token_without_credentials() {
        let cache = TokenCache::new(reqwest::Client::new(), AttachmentAuthConfig::default());
        assert!(matches!(cache.token().await, Err(IngestionError::Auth(_))));
    }

    #[tokio::test]
    async fn test_direct_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/Book2.xlsx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"xlsx-bytes".to_vec()))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::new(dir.path().join("raw"), auth(&server));

        let attachment = InboundAttachment::new(
            "Book2.xlsx",
            Some(AttachmentRef::Direct(format!("{}/files/Book2.xlsx", server.uri()))),
        );
        let stored = fetcher.fetch(&attachment).await.unwrap();
        assert_eq!(std::fs::read(stored).unwrap(), b"xlsx-bytes");
    }

    #[tokio::test]
    async fn test_direct_download_retries_with_token_on_401() {
        let server = MockServer::start().await;
        mount_token(&server, 3600, 1).await;
        Mock::given(method("GET"))
            .and(path("/files/Book2.xlsx"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"secret-bytes".to_vec()))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/Book2.xlsx"))
            .respond_with(ResponseTemplate::new(401))
            .with_priority(2)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::new(dir.path(), auth(&server));

        let attachment = InboundAttachment::new(
            "Book2.xlsx",
            Some(AttachmentRef::Direct(format!("{}/files/Book2.xlsx", server.uri()))),
        );
        let stored = fetcher.fetch(&attachment).await.unwrap();
        assert_eq!(std::fs::read(stored).unwrap(), b"secret-bytes");
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Book2.xlsx"), b"cached").unwrap();
        let fetcher = AttachmentFetcher::new(dir.path(), auth(&server));

        let attachment = InboundAttachment::new(
            "Book2.xlsx",
            Some(AttachmentRef::Direct(format!("{}/files/Book2.xlsx", server.uri()))),
        );
        let stored = fetcher.fetch(&attachment).await.unwrap();
        assert_eq!(std::fs::read(stored).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::new(dir.path(), AttachmentAuthConfig::default());
        let err = fetcher
            .fetch(&InboundAttachment::new("Book2.xlsx", None))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::MissingReference));
    }

    #[tokio::test]
    async fn test_http_error_is_download_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::new(dir.path(), auth(&server));
        let attachment = InboundAttachment::new(
            "Book2.xlsx",
            Some(AttachmentRef::Direct(format!("{}/missing.xlsx", server.uri()))),
        );
        let err = fetcher.fetch(&attachment).await.unwrap_err();
        assert_eq!(err.to_string(), "download failed: HTTP 404");
    }

    #[tokio::test]
    async fn test_store_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Book2.xlsx");
        store(&target, b"xlsx-bytes").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"xlsx-bytes");
        assert!(!dir.path().join("Book2.xlsx.part").exists());
    }

    #[tokio::test]
    async fn test_failed_store_leaves_no_file_and_next_fetch_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/Book2.xlsx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"xlsx-bytes".to_vec()))
            .expect(2)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::new(dir.path(), auth(&server));
        let attachment = InboundAttachment::new(
            "Book2.xlsx",
            Some(AttachmentRef::Direct(format!("{}/files/Book2.xlsx", server.uri()))),
        );

        // A directory squatting on the partial path makes the write fail.
        let blocker = dir.path().join("Book2.xlsx.part");
        std::fs::create_dir(&blocker).unwrap();
        let err = fetcher.fetch(&attachment).await.unwrap_err();
        assert!(matches!(err, IngestionError::Storage(_)));
        assert!(!dir.path().join("Book2.xlsx").exists());

        std::fs::remove_dir(&blocker).unwrap();
        let stored = fetcher.fetch(&attachment).await.unwrap();
        assert_eq!(std::fs::read(stored).unwrap(), b"xlsx-bytes");
    }

    #[tokio::test]
    async fn test_download_deadline_is_enforced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::with_client(
            dir.path(),
            auth(&server),
            http_client(Duration::from_millis(100)),
        );
        let attachment = InboundAttachment::new(
            "Book2.xlsx",
            Some(AttachmentRef::Direct(format!("{}/files/Book2.xlsx", server.uri()))),
        );
        let err = fetcher.fetch(&attachment).await.unwrap_err();
        assert!(matches!(err, IngestionError::Download(_)));
        assert!(!dir.path().join("Book2.xlsx").exists());
    }
}
