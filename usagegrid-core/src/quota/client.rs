//! HTTP client for the OAuth usage endpoint

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;

use crate::config::QuotaConfig;
use crate::error::{Error, Result};
use crate::ingest::parse_timestamp;

use super::credentials::TokenProvider;
use super::{QuotaSource, UsageWindow, UsageWindows};

const ANTHROPIC_BETA: &str = "anthropic-beta";
const OAUTH_BETA: &str = "oauth-2025-04-20";

/// Client for `GET /api/oauth/usage`.
pub struct UsageApiClient {
    http_client: reqwest::Client,
    endpoint: String,
    tokens: TokenProvider,
    plan: Mutex<Option<String>>,
}

impl UsageApiClient {
    /// Create a client that reads its token from the keychain or
    /// `credentials_path`.
    pub fn new(config: &QuotaConfig, credentials_path: PathBuf) -> Result<Self> {
        Self::with_token_provider(
            config,
            TokenProvider::Stored {
                keychain_service: config.keychain_service.clone(),
                credentials_path,
            },
        )
    }

    pub fn with_token_provider(config: &QuotaConfig, tokens: TokenProvider) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ANTHROPIC_BETA, HeaderValue::from_static(OAUTH_BETA));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| Error::Config(format!("invalid user_agent: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            tokens,
            plan: Mutex::new(None),
        })
    }

    /// Fetch the usage windows, reporting why a fetch failed.
    pub async fn fetch_windows(&self) -> Result<UsageWindows> {
        let tokens = self.tokens.clone();
        let credentials = tokio::task::spawn_blocking(move || tokens.resolve())
            .await
            .map_err(|e| Error::Credentials(format!("credential lookup panicked: {}", e)))??;

        *self.plan.lock().unwrap_or_else(PoisonError::into_inner) =
            credentials.rate_limit_tier.clone();

        let auth = HeaderValue::from_str(&format!("Bearer {}", credentials.access_token))
            .map_err(|e| Error::Credentials(format!("invalid access token: {}", e)))?;

        let response = self
            .http_client
            .get(&self.endpoint)
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Quota(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Quota(format!("API error ({}): {}", status, error_text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Quota(format!("failed to parse response: {}", e)))?;

        parse_usage_response(&body)
    }
}

impl QuotaSource for UsageApiClient {
    async fn fetch(&self) -> Option<UsageWindows> {
        match self.fetch_windows().await {
            Ok(windows) => {
                tracing::debug!(
                    five_hour = ?windows.five_hour.map(|w| w.utilization),
                    seven_day = ?windows.seven_day.map(|w| w.utilization),
                    "Fetched usage quota"
                );
                Some(windows)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Usage quota fetch failed");
                None
            }
        }
    }

    fn plan(&self) -> Option<String> {
        self.plan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Parse the endpoint's JSON body.
///
/// The body must be an object. A window whose `utilization` is missing or not
/// a number is treated as absent; an unparseable `resets_at` leaves only the
/// reset time absent. Unknown keys are ignored.
pub fn parse_usage_response(body: &Value) -> Result<UsageWindows> {
    let object = body
        .as_object()
        .ok_or_else(|| Error::Quota("response body is not an object".to_string()))?;

    let window = |key: &str| -> Option<UsageWindow> {
        let entry = object.get(key)?.as_object()?;
        let utilization = entry.get("utilization")?.as_f64()?;
        let resets_at = entry
            .get("resets_at")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
        Some(UsageWindow {
            utilization,
            resets_at,
        })
    };

    Ok(UsageWindows {
        five_hour: window("five_hour"),
        seven_day: window("seven_day"),
        seven_day_sonnet: window("seven_day_sonnet"),
        seven_day_opus: window("seven_day_opus"),
    })
}
