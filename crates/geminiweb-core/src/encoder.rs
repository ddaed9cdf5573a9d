//! Outbound request encoding for the generate endpoint.

use serde_json::{json, Value};

use crate::constants::{gemini_headers, Model};
use crate::thread::ContinuationPointer;
use crate::GeminiError;

/// Headers and form fields for one generate call. Cookies are attached
/// separately, from a snapshot taken at send time.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl std::fmt::Debug for GenerateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateRequest")
            .field("headers", &self.headers)
            .field("form", &"[REDACTED]")
            .finish()
    }
}

/// `[null, "<json of [[prompt], null, pointer-or-null]>"]`
pub fn build_envelope(prompt: &str, pointer: &ContinuationPointer) -> String {
    let inner = json!([[prompt], Value::Null, pointer.to_value()]);
    json!([Value::Null, inner.to_string()]).to_string()
}

pub fn encode_request(
    prompt: &str,
    pointer: &ContinuationPointer,
    access_token: &str,
    model: Model,
) -> Result<GenerateRequest, GeminiError> {
    if prompt.trim().is_empty() {
        return Err(GeminiError::InvalidArgument("prompt must not be empty".into()));
    }
    if access_token.is_empty() {
        return Err(GeminiError::InvalidArgument("access token is empty".into()));
    }

    let mut headers = gemini_headers();
    headers.extend(model.headers());

    Ok(GenerateRequest {
        headers,
        form: vec![
            ("at".to_string(), access_token.to_string()),
            ("f.req".to_string(), build_envelope(prompt, pointer)),
        ],
    })
}
