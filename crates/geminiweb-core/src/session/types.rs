//! Session state, options, and rotation outcomes.

use std::time::Duration;

use crate::GeminiError;

/// Minimum age of a cached rotation before the endpoint is hit again.
pub const ROTATION_DEBOUNCE: Duration = Duration::from_secs(60);

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(540);
/// Longest accepted rotation interval.
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Acquiring,
    Ready,
    /// A rotation tick is in flight. Generation is still allowed.
    Refreshing,
    Closed,
    /// Terminal until `initialize` is called again.
    Failed(GeminiError),
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Refreshing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    /// Per-request timeout applied to every call the session makes.
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SessionOptions {
    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Reject rotation intervals the scheduler cannot run: zero, or longer
/// than [`MAX_REFRESH_INTERVAL`].
pub(crate) fn check_refresh_interval(interval: Duration) -> Result<(), GeminiError> {
    if interval.is_zero() {
        return Err(GeminiError::InvalidArgument(
            "refresh interval must be non-zero".into(),
        ));
    }
    if interval > MAX_REFRESH_INTERVAL {
        return Err(GeminiError::InvalidArgument(format!(
            "refresh interval {}s exceeds the maximum of {}s",
            interval.as_secs(),
            MAX_REFRESH_INTERVAL.as_secs()
        )));
    }
    Ok(())
}

/// Result of a single rotation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// A new secondary cookie was stored.
    Rotated,
    /// The cached value is younger than [`ROTATION_DEBOUNCE`].
    Debounced,
    /// The endpoint answered without a replacement cookie.
    Declined,
}
