//! Secondary cookie rotation.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::cache::{cache_key, Clock, RotationCache};
use crate::constants::{
    rotate_cookies_headers, ROTATED_COOKIE_PATTERN, ROTATE_COOKIES_BODY, ROTATE_COOKIES_URL,
    SECONDARY_COOKIE,
};
use crate::credentials::CredentialBag;
use crate::transport::{HttpRequest, RequestBody, Transport};
use crate::GeminiError;

use super::types::{RotationOutcome, ROTATION_DEBOUNCE};

static ROTATED_COOKIE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ROTATED_COOKIE_PATTERN).expect("static regex pattern must compile")
});

pub(crate) struct CookieRotator {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn RotationCache>,
    clock: Arc<dyn Clock>,
}

impl CookieRotator {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn RotationCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            cache,
            clock,
        }
    }

    /// Last rotated secondary cookie for this identity, if any.
    pub(crate) fn cached_secondary(&self, identity: &str) -> Option<String> {
        match self.cache.get(&cache_key(identity)) {
            Ok(entry) => entry.map(|e| e.value).filter(|v| !v.is_empty()),
            Err(e) => {
                debug!(error = %e, "Rotation cache unreadable");
                None
            }
        }
    }

    /// One rotation attempt against the shared credentials.
    pub(crate) async fn rotate(
        &self,
        credentials: &CredentialBag,
        timeout: Duration,
    ) -> Result<RotationOutcome, GeminiError> {
        let identity = credentials
            .identity()
            .ok_or_else(|| GeminiError::Auth("identity cookie missing".into()))?;
        let key = cache_key(&identity);
        let now = self.clock.now();

        if let Some(entry) = self.cache.get(&key)? {
            // A timestamp in the future counts as fresh.
            let age = now.duration_since(entry.modified).unwrap_or_default();
            if age < ROTATION_DEBOUNCE {
                debug!(age_secs = age.as_secs(), "Rotation debounced");
                return Ok(RotationOutcome::Debounced);
            }
        }

        let request = HttpRequest::post(
            ROTATE_COOKIES_URL,
            timeout,
            RequestBody::Text(ROTATE_COOKIES_BODY.to_string()),
        )
        .with_headers(rotate_cookies_headers())
        .with_cookie_header(credentials.cookie_header());

        let response = self.transport.perform(request).await?;
        if response.is_auth_denied() {
            return Err(GeminiError::Auth(format!(
                "cookie rotation rejected (HTTP {})",
                response.status
            )));
        }
        if response.status >= 500 {
            return Err(GeminiError::Transport(format!(
                "cookie rotation failed (HTTP {})",
                response.status
            )));
        }

        let rotated = response
            .header_values("set-cookie")
            .find_map(|raw| ROTATED_COOKIE_RE.captures(raw))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        match rotated {
            Some(value) => {
                self.cache.put(&key, &value, now)?;
                credentials.set(SECONDARY_COOKIE, value);
                info!("Secondary cookie rotated");
                Ok(RotationOutcome::Rotated)
            }
            None => {
                debug!(status = response.status, "Rotation declined by backend");
                Ok(RotationOutcome::Declined)
            }
        }
    }
}
