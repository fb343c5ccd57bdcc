use std::time::Duration;

use argus_core::error::AppError;
use argus_core::proxy::ProxyEndpoint;
use reqwest::{Client, StatusCode};

/// Bodies shorter than this are treated as malformed responses — real
/// profile pages are never this small.
const MIN_PLAUSIBLE_BODY: usize = 512;

/// Substrings that mark a challenge page served in place of content.
const CHALLENGE_SIGNATURES: &[&str] = &[
    "captcha",
    "cf-browser-verification",
    "attention required",
    "access denied",
    "unusual traffic",
    "verify you are a human",
    "enable javascript and cookies to continue",
];

/// HTTP page fetcher routing every request through a caller-supplied proxy.
///
/// The proxy changes per attempt (rotation happens upstream), so the client
/// is built per request rather than shared. Fetch failures map onto the
/// retry taxonomy: timeouts, connection failures, and short bodies are
/// [`AppError::Transient`]; 403/429 and challenge-looking bodies are
/// [`AppError::BotDetected`].
#[derive(Clone)]
pub struct ProxyFetcher {
    timeout: Duration,
    user_agent: String,
}

impl ProxyFetcher {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: "Argus/0.2 (profile aggregator)".to_string(),
        }
    }

    /// Fetch `url` through `proxy`, returning the page body.
    pub async fn get(&self, url: &str, proxy: &ProxyEndpoint) -> Result<String, AppError> {
        let mut proxy_config = reqwest::Proxy::all(format!("http://{}", proxy.authority()))
            .map_err(|e| AppError::Config(format!("Invalid proxy {}: {e}", proxy.authority())))?;
        if let (Some(user), Some(pass)) = (&proxy.user, &proxy.pass) {
            proxy_config = proxy_config.basic_auth(user, pass);
        }

        let client = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .proxy(proxy_config)
            .build()
            .map_err(|e| AppError::Transient(format!("Could not build HTTP client: {e}")))?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Transient(format!(
                    "Timeout after {}s fetching {url}",
                    self.timeout.as_secs()
                ))
            } else if e.is_connect() {
                AppError::Transient(format!("Connection failed for {url}: {e}"))
            } else {
                AppError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::BotDetected(url.to_string()));
        }
        if !status.is_success() {
            return Err(AppError::Transient(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Transient(format!("Failed to read response body: {e}")))?;

        if body.len() < MIN_PLAUSIBLE_BODY {
            return Err(AppError::Transient(format!(
                "Implausibly short body ({} bytes) for {url}",
                body.len()
            )));
        }
        if has_challenge_signature(&body) {
            return Err(AppError::BotDetected(url.to_string()));
        }

        Ok(body)
    }
}

impl Default for ProxyFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the body looks like a bot challenge rather than real content.
pub fn has_challenge_signature(body: &str) -> bool {
    let lower = body.to_lowercase();
    CHALLENGE_SIGNATURES.iter().any(|sig| lower.contains(sig))
}
