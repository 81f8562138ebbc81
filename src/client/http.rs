//! HTTP transport for the client proxy

use crate::error::FetchError;
use crate::routes::Verb;
use crate::server::Params;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::future::Future;
use url::Url;

/// Maximum length of response body to log
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate long bodies and strip control characters before logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Raw outcome of one request; classification happens in the client
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Value,
    pub location: Option<String>,
}

/// `request(method, path, params) -> (status, body)`
pub trait Transport: Send + Sync + 'static {
    fn request(
        &self,
        verb: Verb,
        path: &str,
        params: &Params,
        body: Option<&Value>,
    ) -> impl Future<Output = Result<TransportResponse, FetchError>> + Send;
}

/// Transport over real HTTP
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;

        let client = Client::builder()
            .user_agent(concat!("trellis/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, params: &Params) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| FetchError::Decode(format!("invalid request URL for {path}: {e}")))?;

        let pairs = params.to_query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn request(
        &self,
        verb: Verb,
        path: &str,
        params: &Params,
        body: Option<&Value>,
    ) -> Result<TransportResponse, FetchError> {
        let url = self.url(path, params)?;
        tracing::debug!("{} {}", verb, url);

        let mut request = self
            .client
            .request(verb.into(), url)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!("{} {} -> {} {}", verb, path, status, sanitize_for_log(&text));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                Err(_) if !status.is_success() => Value::String(text),
                Err(e) => return Err(FetchError::Decode(e.to_string())),
            }
        };

        Ok(TransportResponse {
            status,
            body,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let logged = sanitize_for_log(&body);
        assert!(logged.starts_with(&"x".repeat(200)));
        assert!(logged.contains("500 bytes total"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_url_carries_params() {
        let transport = HttpTransport::new("http://localhost:3000/").unwrap();
        let url = transport
            .url("/posts", &Params::new().filter("published", true).limit(5))
            .unwrap();
        assert_eq!(url.path(), "/posts");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("filters[published]".to_string(), "true".to_string()),
                ("limit".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(HttpTransport::new("not a url").is_err());
    }
}
