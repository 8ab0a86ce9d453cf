//! Module proxy protocol client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::OriginConfig;

use super::{Origin, OriginError, VersionInfo};

/// Header asking the proxy to serve only what it already has.
const DISABLE_FETCH_HEADER: &str = "Disable-Module-Fetch";

/// Origin implementation speaking the module proxy protocol
/// (`/@v/list`, `/@v/<version>.info`, `/@latest`, `.mod`, `.zip`).
#[derive(Clone)]
pub struct ProxyOrigin {
    client: Client,
    base_url: String,
    disable_fetch: bool,
}

impl ProxyOrigin {
    pub fn new(config: &OriginConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("modfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            disable_fetch: false,
        }
    }

    /// A client that asks the proxy not to download anything it does not
    /// already hold. Used when reprocessing known content.
    pub fn with_fetch_disabled(&self) -> Self {
        Self {
            disable_fetch: true,
            ..self.clone()
        }
    }

    /// Size in bytes of the module archive, from the proxy's headers.
    pub async fn zip_size(&self, module_path: &str, version: &str) -> Result<u64, OriginError> {
        let url = self.version_url(module_path, version, "zip");
        let response = self.send(self.client.head(&url), &url).await?;
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| OriginError::InvalidResponse(format!("{url}: missing Content-Length")))
    }

    fn module_url(&self, module_path: &str) -> String {
        format!("{}/{}", self.base_url, encode_path(module_path))
    }

    fn version_url(&self, module_path: &str, version: &str, suffix: &str) -> String {
        format!(
            "{}/@v/{}.{}",
            self.module_url(module_path),
            encode_path(version),
            suffix
        )
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, OriginError> {
        let request = if self.disable_fetch {
            request.header(DISABLE_FETCH_HEADER, "true")
        } else {
            request
        };

        debug!(url, "Origin request");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OriginError::TimedOut(url.to_string())
            } else {
                OriginError::Request(e.to_string())
            }
        })?;

        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(OriginError::NotFound(url.to_string())),
            StatusCode::GATEWAY_TIMEOUT => Err(OriginError::TimedOut(url.to_string())),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                Err(OriginError::BadRequest(format!(
                    "{url}: {}",
                    body.trim().chars().take(200).collect::<String>()
                )))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                warn!(url, %status, "Unexpected origin status");
                Err(OriginError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )))
            }
        }
    }

    async fn text(&self, url: &str) -> Result<String, OriginError> {
        let response = self.send(self.client.get(url), url).await?;
        response
            .text()
            .await
            .map_err(|e| OriginError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Origin for ProxyOrigin {
    async fn info(&self, module_path: &str, version: &str) -> Result<VersionInfo, OriginError> {
        let url = if version == crate::version::LATEST {
            format!("{}/@latest", self.module_url(module_path))
        } else {
            self.version_url(module_path, version, "info")
        };
        let response = self.send(self.client.get(&url), &url).await?;
        response
            .json::<VersionInfo>()
            .await
            .map_err(|e| OriginError::InvalidResponse(format!("{url}: {e}")))
    }

    async fn list(&self, module_path: &str) -> Result<Vec<String>, OriginError> {
        let url = format!("{}/@v/list", self.module_url(module_path));
        let body = self.text(&url).await?;
        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn mod_file(&self, module_path: &str, version: &str) -> Result<String, OriginError> {
        let url = self.version_url(module_path, version, "mod");
        self.text(&url).await
    }
}

/// Escapes a module path or version for proxy URLs: each upper-case letter
/// becomes `!` followed by its lower-case form.
pub fn encode_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            result.push('!');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Reverses [`encode_path`]. Returns `None` for upper-case letters or a
/// dangling `!`, neither of which an encoder produces.
pub fn decode_path(encoded: &str) -> Option<String> {
    let mut result = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        match c {
            '!' => {
                let next = chars.next().filter(char::is_ascii_lowercase)?;
                result.push(next.to_ascii_uppercase());
            }
            c if c.is_ascii_uppercase() => return None,
            c => result.push(c),
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn origin_for(server: &Server) -> ProxyOrigin {
        ProxyOrigin::new(&OriginConfig {
            url: server.url(),
            timeout_secs: 5,
        })
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("github.com/Azure/azure-sdk"), "github.com/!azure/azure-sdk");
        assert_eq!(encode_path("v1.0.0"), "v1.0.0");
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(
            decode_path("github.com/!azure/azure-sdk").as_deref(),
            Some("github.com/Azure/azure-sdk")
        );
        assert!(decode_path("github.com/Azure").is_none());
        assert!(decode_path("trailing!").is_none());
        assert!(decode_path("bang!1").is_none());
    }

    #[tokio::test]
    async fn test_info_latest() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/example.com/mod/@latest")
            .with_status(200)
            .with_body(r#"{"Version":"v1.2.0","Time":"2024-03-01T10:00:00Z"}"#)
            .create_async()
            .await;

        let info = origin_for(&server)
            .info("example.com/mod", "latest")
            .await
            .unwrap();
        assert_eq!(info.version, "v1.2.0");
        assert!(info.time.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_info_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/example.com/gone/@v/v1.0.0.info")
            .with_status(410)
            .create_async()
            .await;

        let err = origin_for(&server)
            .info("example.com/gone", "v1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, OriginError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_gateway_timeout_maps_to_timed_out() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/example.com/slow/@v/v1.0.0.info")
            .with_status(504)
            .create_async()
            .await;

        let err = origin_for(&server)
            .info("example.com/slow", "v1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, OriginError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_bad_request_is_not_an_invalid_response() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/example.com/mod/@v/v1..bad.info")
            .with_status(400)
            .with_body("bad request: invalid version\n")
            .create_async()
            .await;

        let err = origin_for(&server)
            .info("example.com/mod", "v1..bad")
            .await
            .unwrap_err();
        match err {
            OriginError::BadRequest(msg) => assert!(msg.ends_with("invalid version")),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_skips_blank_lines() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/example.com/mod/@v/list")
            .with_status(200)
            .with_body("v1.0.0\n\nv1.1.0\n")
            .create_async()
            .await;

        let versions = origin_for(&server).list("example.com/mod").await.unwrap();
        assert_eq!(versions, vec!["v1.0.0", "v1.1.0"]);
    }

    #[tokio::test]
    async fn test_disabled_fetch_sends_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/example.com/mod/@v/v1.0.0.mod")
            .match_header(DISABLE_FETCH_HEADER, Matcher::Exact("true".to_string()))
            .with_status(200)
            .with_body("module example.com/mod\n")
            .create_async()
            .await;

        let body = origin_for(&server)
            .with_fetch_disabled()
            .mod_file("example.com/mod", "v1.0.0")
            .await
            .unwrap();
        assert_eq!(body, "module example.com/mod\n");
        mock.assert_async().await;
    }
}
