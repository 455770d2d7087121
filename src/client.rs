use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, header};
use std::env;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{ChatRequest, ChatResponse};

/// Default base URL of the forecasting assistant.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8001/";
/// Environment variable consulted when no endpoint is given.
pub const ENDPOINT_ENV: &str = "FORECAST_CHAT_ENDPOINT";
/// Default time a request may stay unanswered before it fails.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One request/response exchange with the assistant.
///
/// Implementations should give up promptly once `cancel` fires; callers do
/// not rely on it, and treat a late result as stale.
#[async_trait::async_trait]
pub trait AssistantTransport: Send + Sync {
    /// Send `request` and wait for the reply.
    async fn chat(&self, request: &ChatRequest, cancel: &CancellationToken)
    -> Result<ChatResponse>;
}

/// HTTP client for the assistant's `chat` endpoint.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl AssistantClient {
    /// Create a new client.
    ///
    /// The endpoint can be provided directly or read from the
    /// `FORECAST_CHAT_ENDPOINT` environment variable, falling back to
    /// [`DEFAULT_ENDPOINT`].
    pub fn new(endpoint: Option<String>) -> Result<Self> {
        Self::with_options(endpoint, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(endpoint: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
        };
        let base_url = parse_base_url(&endpoint)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL requests are sent under.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create and return default headers for requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn map_request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_decode() {
            Error::serialization(format!("Failed to parse response: {}", e), Some(Box::new(e)))
        } else {
            Error::transport(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    async fn exchange(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.base_url.join("chat")?;

        let response = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::non_success_status(status.as_u16(), body));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| self.map_request_error(e))
    }
}

#[async_trait::async_trait]
impl AssistantTransport for AssistantClient {
    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled("request aborted")),
            result = self.exchange(request) => {
                if let Err(err) = &result {
                    tracing::warn!(error = %err, "assistant request failed");
                }
                result
            }
        }
    }
}

/// Parse an endpoint into a base URL that `join` treats as a directory.
fn parse_base_url(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response and hand back the raw request.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn client_creation() {
        let client = AssistantClient::new(Some("http://localhost:8001".to_string())).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8001/");
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);

        let client = AssistantClient::with_options(
            Some("https://forecast.example.com/api".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(
            client.base_url().join("chat").unwrap().as_str(),
            "https://forecast.example.com/api/chat"
        );
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let err = AssistantClient::new(Some("not a url".to_string())).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[tokio::test]
    async fn posts_message_and_decodes_reply() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"response":"Q3 forecast: 12000 units","source":"llm"}"#,
        )
        .await;
        let client = AssistantClient::new(Some(endpoint)).unwrap();
        let reply = client
            .chat(&ChatRequest::new("Forecast Q3 sales"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, ChatResponse::new("Q3 forecast: 12000 units", "llm"));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /chat HTTP/1.1"));
        assert!(raw.ends_with(r#"{"message":"Forecast Q3 sales"}"#));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (endpoint, server) =
            serve_once("500 Internal Server Error", r#"{"detail":"agent failed"}"#).await;
        let client = AssistantClient::new(Some(endpoint)).unwrap();
        let err = client
            .chat(&ChatRequest::new("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(err.is_assistant_failure());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unparseable_reply_is_an_error() {
        let (endpoint, server) = serve_once("200 OK", r#"{"answer":"wrong field"}"#).await;
        let client = AssistantClient::new(Some(endpoint)).unwrap();
        let err = client
            .chat(&ChatRequest::new("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_assistant_failure());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_token_aborts_without_sending() {
        let client = AssistantClient::new(Some("http://127.0.0.1:9/".to_string())).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client
            .chat(&ChatRequest::new("hi"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
