//! Multi-turn conversation threads.
//!
//! A thread binds a shared [`Session`], a model, and the three-slot
//! continuation pointer that links each turn to the previous one.
//! `send_turn` takes `&mut self`, so turns on one thread are serialized by
//! the borrow checker; callers sharing a thread across tasks behind their
//! own lock decide the order in which pointer updates land.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::constants::{Model, GENERATE_URL};
use crate::decoder::{decode_response, GenerationResult};
use crate::encoder::encode_request;
use crate::session::Session;
use crate::transport::{HttpRequest, RequestBody};
use crate::GeminiError;

const POINTER_SLOTS: usize = 3;

/// (conversation id, response id, chosen candidate id), each optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuationPointer {
    slots: [Option<String>; POINTER_SLOTS],
}

impl ContinuationPointer {
    pub fn conversation_id(&self) -> Option<&str> {
        self.slots[0].as_deref()
    }

    pub fn response_id(&self) -> Option<&str> {
        self.slots[1].as_deref()
    }

    pub fn candidate_id(&self) -> Option<&str> {
        self.slots[2].as_deref()
    }

    pub fn slots(&self) -> &[Option<String>; POINTER_SLOTS] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Overwrite the first `values.len()` slots. More than three values is
    /// rejected and leaves the pointer untouched.
    pub fn set(&mut self, values: &[Option<String>]) -> Result<(), GeminiError> {
        if values.len() > POINTER_SLOTS {
            return Err(GeminiError::InvalidArgument(format!(
                "continuation pointer takes at most {POINTER_SLOTS} values, got {}",
                values.len()
            )));
        }
        for (slot, value) in self.slots.iter_mut().zip(values) {
            *slot = value.clone();
        }
        Ok(())
    }

    pub(crate) fn set_candidate(&mut self, id: &str) {
        self.slots[2] = Some(id.to_string()).filter(|s| !s.is_empty());
    }

    /// JSON form sent to the backend: `null` for a fresh conversation.
    pub fn to_value(&self) -> Value {
        if self.is_empty() {
            return Value::Null;
        }
        Value::Array(
            self.slots
                .iter()
                .map(|s| s.clone().map(Value::String).unwrap_or(Value::Null))
                .collect(),
        )
    }
}

/// Per-turn overrides of the thread defaults.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    pub model: Option<Model>,
    pub timeout: Option<Duration>,
}

impl TurnOptions {
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub struct ConversationThread {
    session: Arc<Session>,
    model: Model,
    pointer: ContinuationPointer,
    last: Option<GenerationResult>,
}

impl ConversationThread {
    pub fn new(session: Arc<Session>, model: Model) -> Self {
        Self {
            session,
            model,
            pointer: ContinuationPointer::default(),
            last: None,
        }
    }

    /// Send one prompt and absorb the reply into the continuation pointer.
    pub async fn send_turn(
        &mut self,
        prompt: &str,
        options: TurnOptions,
    ) -> Result<GenerationResult, GeminiError> {
        if !self.session.is_ready() {
            return Err(GeminiError::NotInitialized);
        }
        let token = self
            .session
            .access_token()
            .filter(|t| !t.is_empty())
            .ok_or(GeminiError::NotInitialized)?;

        let model = options.model.unwrap_or(self.model);
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.session.options().timeout);
        let encoded = encode_request(prompt, &self.pointer, &token, model)?;

        let request = HttpRequest::post(GENERATE_URL, timeout, RequestBody::Form(encoded.form))
            .with_headers(encoded.headers)
            .with_cookie_header(self.session.credentials().cookie_header());

        debug!(model = %model, continuing = !self.pointer.is_empty(), "Sending turn");
        let response = self.session.transport().perform(request).await?;

        if response.is_auth_denied() {
            let err = GeminiError::Auth(format!(
                "generate request rejected (HTTP {})",
                response.status
            ));
            self.session.mark_failed(err.clone());
            return Err(err);
        }
        if !response.is_success() {
            return Err(GeminiError::Transport(format!(
                "generate request failed (HTTP {})",
                response.status
            )));
        }

        let result = decode_response(&response.text())?;

        self.pointer.set(&[
            result.conversation_id().map(str::to_string),
            result.response_id().map(str::to_string),
        ])?;
        self.pointer.set_candidate(result.rcid());
        info!(
            candidates = result.candidates().len(),
            conversation = result.conversation_id().unwrap_or("-"),
            "Turn complete"
        );

        self.last = Some(result.clone());
        Ok(result)
    }

    /// Continue the conversation from another candidate of the last turn.
    pub fn select_candidate(&mut self, index: usize) -> Result<GenerationResult, GeminiError> {
        let last = self.last.as_ref().ok_or(GeminiError::NoPriorResult)?;
        let chosen = last.with_chosen(index)?;
        self.pointer.set_candidate(chosen.rcid());
        self.last = Some(chosen.clone());
        Ok(chosen)
    }

    pub fn set_continuation(&mut self, values: &[Option<String>]) -> Result<(), GeminiError> {
        self.pointer.set(values)
    }

    pub fn pointer(&self) -> &ContinuationPointer {
        &self.pointer
    }

    pub fn last_result(&self) -> Option<&GenerationResult> {
        self.last.as_ref()
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn set_model(&mut self, model: Model) {
        self.model = model;
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}
