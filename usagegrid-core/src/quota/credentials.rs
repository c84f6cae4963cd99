//! OAuth credential lookup
//!
//! On macOS the token lives in the login keychain, and `security -w` may
//! print the stored payload either raw or hex-encoded. Elsewhere (and as a
//! fallback) it is read from `~/.claude/.credentials.json`. Either way the
//! payload is decoded fully first and then parsed as JSON.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
#[cfg(target_os = "macos")]
use std::process::Command;

/// The fields we use from a stored OAuth payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub access_token: String,
    pub rate_limit_tier: Option<String>,
    pub subscription_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPayload {
    claude_ai_oauth: Option<StoredOAuth>,
    #[serde(flatten)]
    top_level: StoredOAuth,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredOAuth {
    access_token: Option<String>,
    rate_limit_tier: Option<String>,
    subscription_type: Option<String>,
}

/// Turn `security -w` output into the payload text.
///
/// Output that is entirely hex digits (even length) and decodes to UTF-8 is
/// decoded; anything else is returned trimmed, as is.
pub fn decode_keychain_output(output: &str) -> String {
    let trimmed = output.trim();
    let looks_hex = !trimmed.is_empty()
        && trimmed.len() % 2 == 0
        && trimmed.bytes().all(|b| b.is_ascii_hexdigit());

    if looks_hex {
        if let Some(decoded) = hex::decode(trimmed)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        {
            return decoded;
        }
    }
    trimmed.to_string()
}

/// Parse a decoded payload.
///
/// The payload may carry leading bytes before the JSON object and trailing
/// bytes after it; only the first complete JSON value is read. The token is
/// taken from `claudeAiOauth`, or from the top level when that is absent.
pub fn parse_credentials(payload: &str) -> Result<OAuthCredentials> {
    let start = payload
        .find('{')
        .ok_or_else(|| Error::Credentials("payload contains no JSON object".to_string()))?;

    let stored: StoredPayload = serde_json::Deserializer::from_str(&payload[start..])
        .into_iter::<StoredPayload>()
        .next()
        .ok_or_else(|| Error::Credentials("empty credentials payload".to_string()))??;

    let oauth = match stored.claude_ai_oauth {
        Some(oauth) if oauth.access_token.is_some() => oauth,
        _ => stored.top_level,
    };

    let access_token = oauth
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Credentials("no accessToken in credentials".to_string()))?;

    Ok(OAuthCredentials {
        access_token,
        rate_limit_tier: oauth.rate_limit_tier,
        subscription_type: oauth.subscription_type,
    })
}

/// Where the bearer token comes from.
#[derive(Debug, Clone)]
pub enum TokenProvider {
    /// A token supplied directly.
    Fixed(String),
    /// Keychain first, then the credentials file.
    Stored {
        keychain_service: String,
        credentials_path: PathBuf,
    },
}

impl TokenProvider {
    /// Look the credentials up. Blocking: may spawn `security`.
    pub fn resolve(&self) -> Result<OAuthCredentials> {
        match self {
            TokenProvider::Fixed(token) => Ok(OAuthCredentials {
                access_token: token.clone(),
                rate_limit_tier: None,
                subscription_type: None,
            }),
            TokenProvider::Stored {
                keychain_service,
                credentials_path,
            } => {
                if let Some(payload) = read_keychain(keychain_service) {
                    match parse_credentials(&decode_keychain_output(&payload)) {
                        Ok(credentials) => return Ok(credentials),
                        Err(e) => tracing::debug!(error = %e, "Keychain payload unusable"),
                    }
                }
                read_credentials_file(credentials_path)
            }
        }
    }
}

fn read_credentials_file(path: &Path) -> Result<OAuthCredentials> {
    let payload = std::fs::read_to_string(path).map_err(|e| {
        Error::Credentials(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_credentials(&payload)
}

#[cfg(target_os = "macos")]
fn read_keychain(service: &str) -> Option<String> {
    let output = Command::new("/usr/bin/security")
        .args(["find-generic-password", "-s", service, "-w"])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        Ok(output) => {
            tracing::debug!(service, status = ?output.status.code(), "Keychain lookup failed");
            None
        }
        Err(e) => {
            tracing::debug!(service, error = %e, "Cannot run security");
            None
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn read_keychain(_service: &str) -> Option<String> {
    None
}
