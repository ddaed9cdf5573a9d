//! Positional accessors for the untyped response payload.
//!
//! Each candidate field lives at a fixed index path. Every lookup is
//! independent: a missing link anywhere along a path yields `None`, never
//! an error, and no lookup assumes anything beyond the indices it reads.

use serde_json::Value;

/// Index paths into a single candidate array.
pub(crate) mod paths {
    pub const ID: &[usize] = &[0];
    pub const TEXT: &[usize] = &[1, 0];
    pub const SOURCES: &[usize] = &[11];
    pub const WEB_IMAGES: &[usize] = &[12, 1];
    pub const GENERATED_IMAGES: &[usize] = &[12, 7, 0];
    pub const CODE_BLOCKS: &[usize] = &[14];
    pub const CODE_EXECUTION: &[usize] = &[16];
    pub const CARD_TEXT: &[usize] = &[22, 0];
    pub const FILE_ATTACHMENTS: &[usize] = &[30];
    pub const THOUGHTS: &[usize] = &[37, 0, 0];
    pub const FACTUALITY: &[usize] = &[45];

    // Within one web image entry.
    pub const WEB_IMAGE_URL: &[usize] = &[0, 0, 0];
    pub const WEB_IMAGE_TITLE: &[usize] = &[7, 0];
    pub const WEB_IMAGE_ALT: &[usize] = &[0, 4];

    // Within one generated image entry.
    pub const GENERATED_IMAGE_URL: &[usize] = &[0, 3, 3];
    pub const GENERATED_IMAGE_ID: &[usize] = &[3, 6];
    pub const GENERATED_IMAGE_ALT: &[usize] = &[3, 5, 0];

    // Within the decoded body and the outer envelope.
    pub const BODY_METADATA: &[usize] = &[1];
    pub const BODY_CANDIDATES: &[usize] = &[4];
    pub const ENVELOPE_PAYLOAD: &[usize] = &[2];
    pub const ENVELOPE_ERROR_CODE: &[usize] = &[0, 5, 2, 0, 1, 0];
}

/// Follow `path` through nested arrays. `null` counts as missing.
pub(crate) fn at<'a>(value: &'a Value, path: &[usize]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |v, &i| v.as_array()?.get(i))
        .filter(|v| !v.is_null())
}

pub(crate) fn str_at<'a>(value: &'a Value, path: &[usize]) -> Option<&'a str> {
    at(value, path)?.as_str()
}

pub(crate) fn array_at<'a>(value: &'a Value, path: &[usize]) -> Option<&'a Vec<Value>> {
    at(value, path)?.as_array()
}

/// Loose truthiness, matching how the backend marks populated slots.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Scalars rendered as text; anything else is empty.
pub(crate) fn scalar_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// One candidate entry of the body's candidate list.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawCandidate<'a>(pub &'a Value);

impl<'a> RawCandidate<'a> {
    pub fn id(&self) -> String {
        scalar_string(at(self.0, paths::ID))
    }

    pub fn text(&self) -> Option<&'a str> {
        str_at(self.0, paths::TEXT)
    }

    pub fn card_text(&self) -> Option<&'a str> {
        str_at(self.0, paths::CARD_TEXT)
    }

    pub fn thoughts(&self) -> Option<&'a str> {
        str_at(self.0, paths::THOUGHTS)
    }

    pub fn sources(&self) -> &'a [Value] {
        slice(array_at(self.0, paths::SOURCES))
    }

    pub fn web_images(&self) -> Option<&'a Vec<Value>> {
        array_at(self.0, paths::WEB_IMAGES)
    }

    pub fn generated_images(&self) -> &'a [Value] {
        slice(array_at(self.0, paths::GENERATED_IMAGES))
    }

    pub fn code_blocks(&self) -> &'a [Value] {
        slice(array_at(self.0, paths::CODE_BLOCKS))
    }

    pub fn code_execution(&self) -> Option<&'a Value> {
        at(self.0, paths::CODE_EXECUTION)
    }

    pub fn file_attachments(&self) -> &'a [Value] {
        slice(array_at(self.0, paths::FILE_ATTACHMENTS))
    }

    pub fn factuality(&self) -> Option<&'a Value> {
        at(self.0, paths::FACTUALITY)
    }
}

fn slice(array: Option<&Vec<Value>>) -> &[Value] {
    array.map(Vec::as_slice).unwrap_or(&[])
}
