//! Cookie-authenticated session lifecycle.
//!
//! A `Session` acquires the access token through a two-step page
//! handshake, keeps the merged cookies in a shared [`CredentialBag`], and
//! optionally runs a background task that rotates the secondary cookie.
//!
//! [`CredentialBag`]: crate::CredentialBag

mod acquire;
mod manager;
mod media;
mod rotate;
mod types;

pub use manager::Session;
pub use types::{
    RotationOutcome, SessionOptions, SessionState, MAX_REFRESH_INTERVAL, ROTATION_DEBOUNCE,
};
