//! Access token handshake.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::constants::{gemini_headers, ACCESS_TOKEN_PATTERN, APP_URL, LANDING_URL};
use crate::credentials::{format_cookie_header, CredentialBag};
use crate::transport::{HttpRequest, Transport};
use crate::GeminiError;

static ACCESS_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ACCESS_TOKEN_PATTERN).expect("static regex pattern must compile"));

#[derive(Debug)]
pub(crate) struct Acquired {
    pub token: String,
    pub cookies: Vec<(String, String)>,
}

pub(crate) fn extract_access_token(html: &str) -> Option<String> {
    ACCESS_TOKEN_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|t| !t.is_empty())
}

/// Fetch the landing page for supplementary cookies, then the app page
/// with the merged set, and pull the access token out of its HTML.
pub(crate) async fn acquire_token(
    transport: &dyn Transport,
    seed: &[(String, String)],
    timeout: Duration,
) -> Result<Acquired, GeminiError> {
    let merged = CredentialBag::from_pairs(seed.iter().cloned());

    let landing = transport.perform(HttpRequest::get(LANDING_URL, timeout)).await?;
    if landing.is_success() {
        // Seed cookies win over anything the landing page hands out.
        for (name, value) in landing.set_cookies() {
            if merged.get(&name).is_none() {
                merged.set(name, value);
            }
        }
    } else {
        debug!(status = landing.status, "Landing page returned no cookies");
    }

    let cookies = merged.snapshot();
    let request = HttpRequest::get(APP_URL, timeout)
        .with_headers(gemini_headers())
        .with_cookie_header(format_cookie_header(&cookies));
    let response = transport.perform(request).await?;

    if response.is_auth_denied() {
        return Err(GeminiError::Auth(format!(
            "app page rejected cookies (HTTP {})",
            response.status
        )));
    }
    if !response.is_success() {
        return Err(GeminiError::Transport(format!(
            "app page returned HTTP {}",
            response.status
        )));
    }

    merged.merge(&response.set_cookies());

    let token = extract_access_token(&response.text()).ok_or_else(|| {
        GeminiError::Auth("access token not found in app page; cookies may have expired".into())
    })?;

    debug!(cookies = merged.len(), "Access token acquired");
    Ok(Acquired {
        token,
        cookies: merged.snapshot(),
    })
}
