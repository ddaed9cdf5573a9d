//! Client core for the Gemini web app.
//!
//! Provides:
//! - Cookie-based session setup (access token handshake)
//! - Background rotation of the secondary session cookie, debounced
//!   through a persisted cache
//! - Request encoding and decoding of the positional response payload
//! - Multi-turn conversation threads with candidate selection

pub mod cache;
pub mod client;
pub mod constants;
pub mod credentials;
pub mod decoder;
pub mod encoder;
pub mod session;
pub mod thread;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{Clock, FileRotationCache, MemoryRotationCache, RotationCache, SystemClock};
pub use client::GeminiClient;
pub use constants::Model;
pub use credentials::CredentialBag;
pub use decoder::{
    decode_response, Candidate, CodeBlock, CodeExecution, Factuality, FileAttachment,
    GenerationResult, Image, ImageKind, WebSource,
};
pub use session::{RotationOutcome, Session, SessionOptions, SessionState};
pub use thread::{ContinuationPointer, ConversationThread, TurnOptions};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, RequestBody, Transport};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeminiError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Session is not initialized")]
    NotInitialized,
    #[error("No previous result to select a candidate from")]
    NoPriorResult,
    #[error("Candidate index {index} out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Cache error: {0}")]
    Cache(String),
}

impl GeminiError {
    /// True for errors that invalidate the session's credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, GeminiError::Auth(_))
    }
}
