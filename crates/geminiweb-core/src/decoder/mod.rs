//! Response decoding.
//!
//! The generate endpoint answers with newline-delimited text whose third
//! line is a JSON array of envelope entries. One of those entries carries
//! a JSON-encoded string holding the real body; the rest are framing and
//! telemetry of the same shape, so the body is found by content, not by
//! position. Candidate fields are then read through the index paths in
//! [`raw::paths`].

mod mime;
mod raw;
mod types;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::{CARD_CONTENT_PATTERN, FENCED_CODE_PATTERN, IMMERSIVE_CHIP_PATTERN};
use crate::GeminiError;

use raw::{array_at, at, is_truthy, paths, scalar_string, str_at, RawCandidate};

pub use mime::mime_for_file_name;
pub use types::{
    Candidate, CodeBlock, CodeExecution, Factuality, FileAttachment, GenerationResult, Image,
    ImageKind, WebSource,
};

static CARD_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CARD_CONTENT_PATTERN).expect("static regex pattern must compile"));
static IMMERSIVE_CHIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(IMMERSIVE_CHIP_PATTERN).expect("static regex pattern must compile")
});
static FENCED_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(FENCED_CODE_PATTERN).expect("static regex pattern must compile"));

const DEFAULT_FILE_NAME: &str = "file.txt";

/// Error codes the backend reports in place of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorCode {
    UsageLimitExceeded,
    ModelInconsistent,
    ModelHeaderInvalid,
    IpTemporarilyBlocked,
}

impl BackendErrorCode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1037 => Some(Self::UsageLimitExceeded),
            1050 => Some(Self::ModelInconsistent),
            1052 => Some(Self::ModelHeaderInvalid),
            1060 => Some(Self::IpTemporarilyBlocked),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::UsageLimitExceeded => "usage limit exceeded for this model",
            Self::ModelInconsistent => "model does not match the one used earlier in this conversation",
            Self::ModelHeaderInvalid => "model header rejected; the model may be unavailable",
            Self::IpTemporarilyBlocked => "requests from this IP are temporarily blocked",
        }
    }
}

/// Decode a raw generate response. Pure: the same text always yields the
/// same result.
pub fn decode_response(raw: &str) -> Result<GenerationResult, GeminiError> {
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() < 3 {
        return Err(GeminiError::Parse(format!(
            "expected at least 3 response lines, got {}",
            lines.len()
        )));
    }

    let envelope: Value = serde_json::from_str(lines[2])
        .map_err(|e| GeminiError::Parse(format!("invalid response envelope: {e}")))?;
    let entries = envelope
        .as_array()
        .ok_or_else(|| GeminiError::Parse("response envelope is not an array".into()))?;

    let body = find_body(entries).ok_or_else(|| no_body_error(&envelope))?;

    let raw_candidates = array_at(&body, paths::BODY_CANDIDATES)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| GeminiError::Parse("no candidates".into()))?;

    let candidates: Vec<Candidate> = raw_candidates
        .iter()
        .map(|c| decode_candidate(RawCandidate(c)))
        .collect();

    let metadata = array_at(&body, paths::BODY_METADATA)
        .map(|m| {
            m.iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    debug!(candidates = candidates.len(), "Decoded response");
    GenerationResult::new(metadata, candidates)
}

/// First envelope entry whose embedded JSON has a truthy candidate slot.
fn find_body(entries: &[Value]) -> Option<Value> {
    entries.iter().find_map(|entry| {
        let payload = str_at(entry, paths::ENVELOPE_PAYLOAD)?;
        let decoded: Value = serde_json::from_str(payload).ok()?;
        at(&decoded, paths::BODY_CANDIDATES)
            .is_some_and(is_truthy)
            .then_some(decoded)
    })
}

fn no_body_error(envelope: &Value) -> GeminiError {
    let code = at(envelope, paths::ENVELOPE_ERROR_CODE).and_then(Value::as_i64);
    match code {
        Some(code) => match BackendErrorCode::from_code(code) {
            Some(known) => GeminiError::Parse(format!(
                "no response body: {} (backend code {code})",
                known.description()
            )),
            None => GeminiError::Parse(format!("no response body (backend code {code})")),
        },
        None => GeminiError::Parse("no response body".into()),
    }
}

fn decode_candidate(raw: RawCandidate<'_>) -> Candidate {
    let text = resolve_text(&raw);
    let web_images = decode_web_images(&raw);
    let generated_images = decode_generated_images(&raw);
    let code_blocks = decode_code_blocks(&raw, &text);
    let file_attachments = decode_file_attachments(&raw, &text);

    Candidate {
        id: raw.id(),
        thoughts: raw.thoughts().map(str::to_string),
        code_execution: raw.code_execution().map(|v| CodeExecution {
            output: str_at(v, &[0]).unwrap_or_default().to_string(),
            error: str_at(v, &[1]).map(str::to_string),
        }),
        factuality: raw.factuality().map(|v| Factuality {
            rating: scalar_string(at(v, &[0])),
            confidence: at(v, &[1]).and_then(Value::as_f64),
        }),
        sources: raw.sources().iter().map(decode_source).collect(),
        text,
        web_images,
        generated_images,
        code_blocks,
        file_attachments,
    }
}

/// Card-style answers carry a placeholder URL instead of inline text; the
/// real text sits in a separate slot when the backend provides it.
fn resolve_text(raw: &RawCandidate<'_>) -> String {
    let text = raw.text().unwrap_or_default();
    if CARD_CONTENT_RE.is_match(text) {
        if let Some(card) = raw.card_text() {
            return card.to_string();
        }
    }
    text.to_string()
}

fn decode_source(entry: &Value) -> WebSource {
    let field = |i: usize| {
        at(entry, &[0])
            .and_then(|sub| str_at(sub, &[i]))
            .unwrap_or_default()
            .to_string()
    };
    WebSource {
        title: field(0),
        url: field(1),
        snippet: field(2),
    }
}

/// All-or-nothing: one malformed entry drops the web image list.
fn decode_web_images(raw: &RawCandidate<'_>) -> Vec<Image> {
    let Some(entries) = raw.web_images() else {
        return Vec::new();
    };
    let images: Option<Vec<Image>> = entries
        .iter()
        .map(|entry| {
            Some(Image {
                url: str_at(entry, paths::WEB_IMAGE_URL)?.to_string(),
                title: str_at(entry, paths::WEB_IMAGE_TITLE)
                    .unwrap_or_default()
                    .to_string(),
                alt: str_at(entry, paths::WEB_IMAGE_ALT)
                    .unwrap_or_default()
                    .to_string(),
                kind: ImageKind::Web,
            })
        })
        .collect();
    images.unwrap_or_else(|| {
        warn!("Malformed web image list; dropping web images for this candidate");
        Vec::new()
    })
}

/// Best effort: malformed entries are skipped individually.
fn decode_generated_images(raw: &RawCandidate<'_>) -> Vec<Image> {
    raw.generated_images()
        .iter()
        .filter_map(|entry| {
            let url = str_at(entry, paths::GENERATED_IMAGE_URL)?;
            let id = scalar_string(at(entry, paths::GENERATED_IMAGE_ID));
            Some(Image {
                url: url.to_string(),
                title: format!("[Generated Image {id}]"),
                alt: str_at(entry, paths::GENERATED_IMAGE_ALT)
                    .unwrap_or_default()
                    .to_string(),
                kind: ImageKind::Generated,
            })
        })
        .collect()
}

/// Structured code slots win; fenced blocks in the text are only used
/// when the structured list is empty.
fn decode_code_blocks(raw: &RawCandidate<'_>, text: &str) -> Vec<CodeBlock> {
    let structured: Vec<CodeBlock> = raw
        .code_blocks()
        .iter()
        .filter_map(|pair| {
            Some(CodeBlock {
                language: str_at(pair, &[0]).unwrap_or_default().to_string(),
                code: str_at(pair, &[1])?.to_string(),
            })
        })
        .collect();
    if !structured.is_empty() {
        return structured;
    }

    FENCED_CODE_RE
        .captures_iter(text)
        .map(|c| CodeBlock {
            language: c.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
            code: c.get(2).map(|m| m.as_str()).unwrap_or_default().trim().to_string(),
        })
        .collect()
}

fn decode_file_attachments(raw: &RawCandidate<'_>, text: &str) -> Vec<FileAttachment> {
    let entries = raw.file_attachments();
    if entries.is_empty() {
        return Vec::new();
    }
    let chip_url = IMMERSIVE_CHIP_RE.find(text).map(|m| m.as_str().to_string());

    entries
        .iter()
        .map(|entry| {
            let file_name = str_at(entry, &[0])
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_FILE_NAME)
                .to_string();
            FileAttachment {
                mime_type: mime_for_file_name(&file_name).to_string(),
                url: chip_url.clone(),
                title: str_at(entry, &[1]).map(str::to_string),
                content: str_at(entry, &[2]).unwrap_or_default().to_string(),
                file_name,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Candidate array with `fields` placed at their indices, null elsewhere.
    fn candidate(fields: &[(usize, Value)]) -> Value {
        let len = fields.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        let mut slots = vec![Value::Null; len];
        for (i, v) in fields {
            slots[*i] = v.clone();
        }
        Value::Array(slots)
    }

    fn body(candidates: Vec<Value>) -> Value {
        json!([null, ["c_conv", "r_resp"], null, null, candidates])
    }

    /// Wraps a body the way the endpoint does: a prefix line, a blank
    /// line, then the envelope with framing entries around the payload.
    fn wrap(body: &Value) -> String {
        let envelope = json!([
            ["wrb.fr", null, json!([null, null, null, null, null]).to_string()],
            ["wrb.fr", null, body.to_string()],
            ["di", 120],
            ["af.httprm", 120, "-1234", 5],
        ]);
        format!(")]}}'\n\n{envelope}\n25\n[[\"e\",4,null,null,300]]")
    }

    fn simple(id: &str, text: &str) -> Value {
        candidate(&[(0, json!(id)), (1, json!([text]))])
    }

    #[test]
    fn minimal_body_with_one_candidate() {
        let raw = concat!(
            "...\n...\n",
            r#"[[null,null,"[null,null,null,null,[[0,[\"hi\"]]]]"]]"#
        );
        let result = decode_response(raw).unwrap();
        assert_eq!(result.candidates().len(), 1);
        assert_eq!(result.text(), "hi");
        assert_eq!(result.rcid(), "0");
        assert!(result.images().is_empty());
        assert!(result.code_blocks().is_empty());
        assert!(result.sources().is_empty());
        assert!(result.metadata().is_empty());
    }

    #[test]
    fn fewer_than_three_lines_is_parse_error() {
        for raw in ["", "one line", "one\ntwo"] {
            let err = decode_response(raw).unwrap_err();
            assert!(matches!(err, GeminiError::Parse(_)), "{raw:?}");
        }
    }

    #[test]
    fn invalid_envelope_is_parse_error() {
        let err = decode_response("a\nb\nnot json").unwrap_err();
        assert!(matches!(err, GeminiError::Parse(_)));
        let err = decode_response("a\nb\n{\"x\":1}").unwrap_err();
        assert!(matches!(err, GeminiError::Parse(_)));
    }

    #[test]
    fn body_found_among_framing_entries() {
        let result = decode_response(&wrap(&body(vec![simple("rc_1", "hello")]))).unwrap();
        assert_eq!(result.text(), "hello");
        assert_eq!(result.conversation_id(), Some("c_conv"));
        assert_eq!(result.response_id(), Some("r_resp"));
    }

    #[test]
    fn missing_body_is_parse_error() {
        let raw = format!(")]}}'\n\n{}", json!([["di", 12], ["wrb.fr", null, "[1,2]"]]));
        let err = decode_response(&raw).unwrap_err();
        assert_eq!(err, GeminiError::Parse("no response body".into()));
    }

    #[test]
    fn empty_candidate_list_is_not_a_body() {
        let raw = wrap(&body(Vec::new()));
        let err = decode_response(&raw).unwrap_err();
        assert_eq!(err, GeminiError::Parse("no response body".into()));
    }

    #[test]
    fn non_array_candidate_slot_reports_no_candidates() {
        let raw = wrap(&json!([null, null, null, null, "truthy"]));
        let err = decode_response(&raw).unwrap_err();
        assert_eq!(err, GeminiError::Parse("no candidates".into()));
    }

    #[test]
    fn backend_error_code_is_named() {
        let envelope = json!([[
            "wrb.fr",
            null,
            null,
            null,
            null,
            [null, null, [[null, [1037]]]]
        ]]);
        let raw = format!(")]}}'\n\n{envelope}");
        let err = decode_response(&raw).unwrap_err();
        match err {
            GeminiError::Parse(msg) => {
                assert!(msg.contains("usage limit"), "{msg}");
                assert!(msg.contains("1037"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn card_placeholder_resolves_to_alternate_text() {
        let c = candidate(&[
            (0, json!("rc_1")),
            (1, json!(["http://googleusercontent.com/card_content/0"])),
            (22, json!(["The real answer"])),
        ]);
        let result = decode_response(&wrap(&body(vec![c]))).unwrap();
        assert_eq!(result.text(), "The real answer");
    }

    #[test]
    fn card_placeholder_kept_without_alternate() {
        let c = candidate(&[
            (0, json!("rc_1")),
            (1, json!(["http://googleusercontent.com/card_content/3"])),
        ]);
        let result = decode_response(&wrap(&body(vec![c]))).unwrap();
        assert_eq!(result.text(), "http://googleusercontent.com/card_content/3");
    }

    #[test]
    fn fenced_code_used_when_structured_list_empty() {
        let text = "Here you go:\n```python\n\nprint('hi')\n\n```\nDone.";
        let c = candidate(&[(0, json!("rc_1")), (1, json!([text])), (14, json!([]))]);
        let result = decode_response(&wrap(&body(vec![c]))).unwrap();
        assert_eq!(
            result.code_blocks(),
            &[CodeBlock {
                language: "python".into(),
                code: "print('hi')".into(),
            }]
        );
    }

    #[test]
    fn structured_code_blocks_win_over_fenced() {
        let text = "```rust\nfn main() {}\n```";
        let c = candidate(&[
            (0, json!("rc_1")),
            (1, json!([text])),
            (14, json!([["js", "console.log(1)"]])),
        ]);
        let result = decode_response(&wrap(&body(vec![c]))).unwrap();
        assert_eq!(result.code_blocks().len(), 1);
        assert_eq!(result.code_blocks()[0].language, "js");
    }

    #[test]
    fn thoughts_present_and_absent() {
        let with = candidate(&[
            (0, json!("a")),
            (1, json!(["t"])),
            (37, json!([["thinking..."]])),
        ]);
        let partial = candidate(&[(0, json!("b")), (1, json!(["t"])), (37, json!([]))]);
        let result = decode_response(&wrap(&body(vec![with, partial]))).unwrap();
        assert_eq!(result.candidates()[0].thoughts.as_deref(), Some("thinking..."));
        assert_eq!(result.candidates()[1].thoughts, None);
    }

    #[test]
    fn images_sources_and_extras() {
        let web = json!([
            [["https://img.example/cat.jpg"], null, null, null, "a cat"],
            null, null, null, null, null, null,
            ["Cat picture"]
        ]);
        let generated = json!([
            [null, null, null, [null, null, null, "https://gen.example/1.png"]],
            null,
            null,
            [null, null, null, null, null, ["a generated dog"], 7]
        ]);
        let malformed_generated = json!(["nope"]);
        let c = candidate(&[
            (0, json!("rc_1")),
            (1, json!(["Look at http://googleusercontent.com/immersive_entry_chip/4"])),
            (11, json!([[["Wiki", "https://wiki.example", "snippet text"]], [["Only title"]]])),
            (12, json!([null, [web], null, null, null, null, null, [[generated, malformed_generated]]])),
            (16, json!(["stdout text"])),
            (30, json!([["main.py", "Script", "print(1)", null, null], [null, null, "x", null, null]])),
            (45, json!(["supported", 0.9])),
        ]);
        let result = decode_response(&wrap(&body(vec![c]))).unwrap();
        let cand = result.candidate();

        let images = cand.images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://img.example/cat.jpg");
        assert_eq!(images[0].title, "Cat picture");
        assert_eq!(images[0].alt, "a cat");
        assert_eq!(images[0].kind, ImageKind::Web);
        assert_eq!(images[1].url, "https://gen.example/1.png");
        assert_eq!(images[1].title, "[Generated Image 7]");
        assert_eq!(images[1].alt, "a generated dog");
        assert_eq!(images[1].kind, ImageKind::Generated);

        assert_eq!(
            cand.sources,
            vec![
                WebSource {
                    title: "Wiki".into(),
                    url: "https://wiki.example".into(),
                    snippet: "snippet text".into(),
                },
                WebSource {
                    title: "Only title".into(),
                    url: String::new(),
                    snippet: String::new(),
                },
            ]
        );

        assert_eq!(
            cand.code_execution,
            Some(CodeExecution {
                output: "stdout text".into(),
                error: None,
            })
        );
        assert_eq!(
            cand.factuality,
            Some(Factuality {
                rating: "supported".into(),
                confidence: Some(0.9),
            })
        );

        let chip = Some("http://googleusercontent.com/immersive_entry_chip/4".to_string());
        assert_eq!(cand.file_attachments.len(), 2);
        assert_eq!(cand.file_attachments[0].file_name, "main.py");
        assert_eq!(cand.file_attachments[0].mime_type, "text/x-python");
        assert_eq!(cand.file_attachments[0].title.as_deref(), Some("Script"));
        assert_eq!(cand.file_attachments[0].content, "print(1)");
        assert_eq!(cand.file_attachments[0].url, chip);
        assert_eq!(cand.file_attachments[1].file_name, "file.txt");
        assert_eq!(cand.file_attachments[1].mime_type, "text/plain");
        assert_eq!(cand.file_attachments[1].url, chip);
    }

    #[test]
    fn code_execution_carries_stderr() {
        let c = candidate(&[
            (0, json!("rc_1")),
            (1, json!(["Ran it"])),
            (16, json!(["partial output", "Traceback: ZeroDivisionError"])),
        ]);
        let result = decode_response(&wrap(&body(vec![c]))).unwrap();
        assert_eq!(
            result.candidate().code_execution,
            Some(CodeExecution {
                output: "partial output".into(),
                error: Some("Traceback: ZeroDivisionError".into()),
            })
        );
    }

    #[test]
    fn malformed_web_image_drops_whole_list() {
        let good = json!([[["https://img.example/a.jpg"]]]);
        let bad = json!([[[]]]);
        let c = candidate(&[
            (0, json!("rc_1")),
            (1, json!(["t"])),
            (12, json!([null, [good, bad]])),
        ]);
        let result = decode_response(&wrap(&body(vec![c]))).unwrap();
        assert!(result.candidate().web_images.is_empty());
    }

    #[test]
    fn multiple_candidates_keep_order() {
        let result = decode_response(&wrap(&body(vec![
            simple("rc_a", "first"),
            simple("rc_b", "second"),
            simple("rc_c", "third"),
        ])))
        .unwrap();
        let ids: Vec<&str> = result.candidates().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["rc_a", "rc_b", "rc_c"]);
        assert_eq!(result.chosen_index(), 0);
    }

    #[test]
    fn decoding_is_deterministic() {
        let raw = wrap(&body(vec![simple("rc_a", "first"), simple("rc_b", "second")]));
        assert_eq!(decode_response(&raw).unwrap(), decode_response(&raw).unwrap());
    }

    #[test]
    fn backend_error_codes_map() {
        assert_eq!(
            BackendErrorCode::from_code(1060),
            Some(BackendErrorCode::IpTemporarilyBlocked)
        );
        assert_eq!(BackendErrorCode::from_code(1), None);
    }
}
