//! High-level client over a shared session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geminiweb_common::SessionEvent;
use tokio::sync::broadcast;

use crate::constants::Model;
use crate::decoder::{GenerationResult, Image};
use crate::session::{Session, SessionOptions, SessionState};
use crate::thread::{ConversationThread, TurnOptions};
use crate::GeminiError;

/// Gemini web client.
///
/// Owns one [`Session`] and hands out conversation threads that share it.
pub struct GeminiClient {
    session: Arc<Session>,
    default_model: Model,
}

impl GeminiClient {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
            default_model: Model::default(),
        }
    }

    /// Client backed by `reqwest` and an on-disk rotation cache in
    /// `cookie_cache_dir`.
    pub fn with_defaults(
        proxy: Option<&str>,
        cookie_cache_dir: impl Into<PathBuf>,
    ) -> Result<Self, GeminiError> {
        Ok(Self::new(Session::with_defaults(proxy, cookie_cache_dir)?))
    }

    pub fn with_default_model(mut self, model: Model) -> Self {
        self.default_model = model;
        self
    }

    pub async fn init(
        &self,
        cookies: Vec<(String, String)>,
        options: SessionOptions,
    ) -> Result<(), GeminiError> {
        self.session.initialize(cookies, options).await
    }

    /// Single-turn generation on a fresh conversation.
    pub async fn generate_content(
        &self,
        prompt: &str,
        model: Option<Model>,
    ) -> Result<GenerationResult, GeminiError> {
        let mut thread = self.start_chat(model);
        thread.send_turn(prompt, TurnOptions::default()).await
    }

    pub fn start_chat(&self, model: Option<Model>) -> ConversationThread {
        ConversationThread::new(self.session.clone(), model.unwrap_or(self.default_model))
    }

    pub fn list_models(&self) -> &'static [Model] {
        &Model::ALL
    }

    pub async fn save_image(&self, image: &Image, dir: &Path) -> Result<PathBuf, GeminiError> {
        self.session.fetch_image(image, dir).await
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn close(&self) {
        self.session.close();
    }
}
