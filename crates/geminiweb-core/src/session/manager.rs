//! Session struct, lifecycle transitions, and the rotation task.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use geminiweb_common::{EventBus, SessionEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{Clock, FileRotationCache, RotationCache, SystemClock};
use crate::constants::SECONDARY_COOKIE;
use crate::credentials::CredentialBag;
use crate::transport::{ReqwestTransport, Transport};
use crate::GeminiError;

use super::acquire::acquire_token;
use super::rotate::CookieRotator;
use super::types::{check_refresh_interval, RotationOutcome, SessionOptions, SessionState};

struct RotationTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Cookie-authenticated session, shared by any number of conversation
/// threads through an `Arc`.
pub struct Session {
    credentials: CredentialBag,
    token: RwLock<Option<String>>,
    state: Arc<Mutex<SessionState>>,
    options: RwLock<SessionOptions>,
    rotation: Mutex<Option<RotationTask>>,
    transport: Arc<dyn Transport>,
    rotator: Arc<CookieRotator>,
    events: Arc<EventBus>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("credentials", &self.credentials)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<dyn RotationCache>) -> Self {
        Self::with_clock(transport, cache, Arc::new(SystemClock))
    }

    pub fn with_clock(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn RotationCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials: CredentialBag::new(),
            token: RwLock::new(None),
            state: Arc::new(Mutex::new(SessionState::Uninitialized)),
            options: RwLock::new(SessionOptions::default()),
            rotation: Mutex::new(None),
            rotator: Arc::new(CookieRotator::new(transport.clone(), cache, clock)),
            transport,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Session backed by `reqwest` and an on-disk rotation cache in
    /// `cookie_cache_dir`.
    pub fn with_defaults(
        proxy: Option<&str>,
        cookie_cache_dir: impl Into<PathBuf>,
    ) -> Result<Self, GeminiError> {
        let transport = ReqwestTransport::new(proxy)?;
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(FileRotationCache::new(cookie_cache_dir)),
        ))
    }

    /// Run the token handshake and move to `Ready`.
    ///
    /// `seed` must contain the identity cookie. When it lacks the secondary
    /// cookie, the last rotated value for this identity is taken from the
    /// rotation cache. Must be called from within a Tokio runtime when
    /// `auto_refresh` is set.
    pub async fn initialize(
        &self,
        seed: Vec<(String, String)>,
        options: SessionOptions,
    ) -> Result<(), GeminiError> {
        let seed_bag = CredentialBag::from_pairs(seed);
        let identity = seed_bag.identity().ok_or_else(|| {
            GeminiError::InvalidArgument("identity cookie __Secure-1PSID is required".into())
        })?;
        if options.auto_refresh {
            check_refresh_interval(options.refresh_interval)?;
        }

        self.stop_rotation();
        self.set_state(SessionState::Acquiring);
        *self.write_options() = options.clone();

        if seed_bag.get(SECONDARY_COOKIE).is_none() {
            if let Some(cached) = self.rotator.cached_secondary(&identity) {
                debug!("Using cached secondary cookie");
                seed_bag.set(SECONDARY_COOKIE, cached);
            }
        }

        let acquired =
            match acquire_token(self.transport.as_ref(), &seed_bag.snapshot(), options.timeout)
                .await
            {
                Ok(acquired) => acquired,
                Err(e) => {
                    if e.is_auth() {
                        self.mark_failed(e.clone());
                    } else {
                        self.set_state(SessionState::Uninitialized);
                    }
                    return Err(e);
                }
            };

        self.credentials.merge(&acquired.cookies);
        *self.write_token() = Some(acquired.token);
        self.set_state(SessionState::Ready);
        self.events.publish(SessionEvent::Ready);
        info!(cookies = self.credentials.len(), "Session ready");

        if options.auto_refresh {
            self.start_rotation(options.refresh_interval)?;
        }
        Ok(())
    }

    /// Schedule a recurring rotation tick. A failing tick is logged and
    /// published as [`SessionEvent::RotationFailed`]; the next tick still
    /// fires. Replaces any previously scheduled task.
    ///
    /// Fails with [`GeminiError::InvalidArgument`] for a zero interval or one
    /// above [`MAX_REFRESH_INTERVAL`](super::MAX_REFRESH_INTERVAL); any
    /// running task is left untouched in that case.
    pub fn start_rotation(&self, interval: Duration) -> Result<(), GeminiError> {
        check_refresh_interval(interval)?;
        let start = Instant::now().checked_add(interval).ok_or_else(|| {
            GeminiError::InvalidArgument("refresh interval overflows the clock".into())
        })?;
        self.stop_rotation();

        let cancel = CancellationToken::new();
        let tick = TickContext {
            credentials: self.credentials.clone(),
            state: self.state.clone(),
            rotator: self.rotator.clone(),
            events: self.events.clone(),
            timeout: self.options().timeout,
        };
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = tick.run().await;
                    }
                }
            }
            debug!("Rotation task stopped");
        });

        info!(interval_secs = interval.as_secs(), "Cookie rotation scheduled");
        *self.lock_rotation() = Some(RotationTask { cancel, handle });
        Ok(())
    }

    /// Run one rotation tick now, outside the schedule.
    pub async fn rotate_now(&self) -> Result<RotationOutcome, GeminiError> {
        if !self.is_ready() {
            return Err(GeminiError::NotInitialized);
        }
        TickContext {
            credentials: self.credentials.clone(),
            state: self.state.clone(),
            rotator: self.rotator.clone(),
            events: self.events.clone(),
            timeout: self.options().timeout,
        }
        .run()
        .await
    }

    pub fn is_rotating(&self) -> bool {
        self.lock_rotation()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Cancel the rotation task and mark the session closed. Idempotent.
    /// Requests already in flight are left to finish on their own.
    pub fn close(&self) {
        self.stop_rotation();
        let was_closed = {
            let mut state = self.lock_state();
            let was_closed = *state == SessionState::Closed;
            *state = SessionState::Closed;
            was_closed
        };
        if !was_closed {
            self.events.publish(SessionEvent::Closed);
            info!("Session closed");
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.lock_state().is_ready()
    }

    pub fn access_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn credentials(&self) -> &CredentialBag {
        &self.credentials
    }

    pub fn options(&self) -> SessionOptions {
        match self.options.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Move to `Failed`; the caller must initialize again.
    pub(crate) fn mark_failed(&self, error: GeminiError) {
        self.stop_rotation();
        warn!(error = %error, "Session failed");
        self.events.publish(SessionEvent::Failed {
            error: error.to_string(),
        });
        self.set_state(SessionState::Failed(error));
    }

    fn stop_rotation(&self) {
        if let Some(task) = self.lock_rotation().take() {
            task.cancel.cancel();
        }
    }

    fn set_state(&self, next: SessionState) {
        *self.lock_state() = next;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_rotation(&self) -> std::sync::MutexGuard<'_, Option<RotationTask>> {
        match self.rotation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_token(&self) -> std::sync::RwLockWriteGuard<'_, Option<String>> {
        match self.token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_options(&self) -> std::sync::RwLockWriteGuard<'_, SessionOptions> {
        match self.options.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_rotation();
    }
}

/// Everything a rotation tick touches, cloned out of the session so the
/// background task does not keep the session itself alive.
struct TickContext {
    credentials: CredentialBag,
    state: Arc<Mutex<SessionState>>,
    rotator: Arc<CookieRotator>,
    events: Arc<EventBus>,
    timeout: Duration,
}

impl TickContext {
    async fn run(&self) -> Result<RotationOutcome, GeminiError> {
        self.transition(SessionState::Ready, SessionState::Refreshing);
        let result = self.rotator.rotate(&self.credentials, self.timeout).await;
        self.transition(SessionState::Refreshing, SessionState::Ready);

        match &result {
            Ok(RotationOutcome::Rotated) => {
                self.events.publish(SessionEvent::CookieRotated);
            }
            Ok(RotationOutcome::Debounced) => {
                self.events.publish(SessionEvent::RotationSkipped {
                    reason: "rotated less than 60s ago".into(),
                });
            }
            Ok(RotationOutcome::Declined) => {
                self.events.publish(SessionEvent::RotationSkipped {
                    reason: "backend returned no replacement cookie".into(),
                });
            }
            Err(e) => {
                warn!(error = %e, "Cookie rotation failed; keeping current cookies");
                self.events.publish(SessionEvent::RotationFailed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    fn transition(&self, from: SessionState, to: SessionState) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *state == from {
            *state = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{cache_key, MemoryRotationCache};
    use crate::constants::{APP_URL, IDENTITY_COOKIE, LANDING_URL, ROTATE_COOKIES_URL};
    use crate::testing::{
        app_page, ok_response, status_response, with_set_cookie, FakeTransport, ManualClock,
    };

    fn seed() -> Vec<(String, String)> {
        vec![(IDENTITY_COOKIE.to_string(), "sid".to_string())]
    }

    fn no_refresh() -> SessionOptions {
        SessionOptions::default().with_auto_refresh(false)
    }

    fn happy_transport() -> FakeTransport {
        FakeTransport::new()
            .on(LANDING_URL, ok_response(""))
            .on(APP_URL, app_page("tok"))
    }

    fn session_with(transport: FakeTransport) -> (Session, Arc<FakeTransport>, Arc<MemoryRotationCache>) {
        let transport = Arc::new(transport);
        let cache = Arc::new(MemoryRotationCache::new());
        let session = Session::with_clock(
            transport.clone(),
            cache.clone(),
            Arc::new(ManualClock::new()),
        );
        (session, transport, cache)
    }

    #[tokio::test]
    async fn initialize_reaches_ready() {
        let (session, _, _) = session_with(happy_transport());
        let mut events = session.subscribe();
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.initialize(seed(), no_refresh()).await.unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.access_token().as_deref(), Some("tok"));
        assert_eq!(session.credentials().identity().as_deref(), Some("sid"));
        assert!(!session.is_rotating());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Ready);
    }

    #[tokio::test]
    async fn initialize_requires_identity_cookie() {
        let (session, transport, _) = session_with(happy_transport());
        let err = session
            .initialize(vec![("NID".into(), "x".into())], no_refresh())
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::InvalidArgument(_)));
        assert_eq!(transport.request_count(), 0);
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn auth_failure_marks_session_failed() {
        let (session, _, _) = session_with(
            FakeTransport::new()
                .on(LANDING_URL, ok_response(""))
                .on(APP_URL, status_response(401)),
        );
        let err = session.initialize(seed(), no_refresh()).await.unwrap_err();
        assert!(err.is_auth());
        assert!(matches!(session.state(), SessionState::Failed(GeminiError::Auth(_))));
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn transport_failure_returns_to_uninitialized() {
        let (session, _, _) = session_with(
            FakeTransport::new()
                .on(LANDING_URL, ok_response(""))
                .on(APP_URL, status_response(500)),
        );
        let err = session.initialize(seed(), no_refresh()).await.unwrap_err();
        assert!(matches!(err, GeminiError::Transport(_)));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn failed_session_can_be_reinitialized() {
        let transport = FakeTransport::new()
            .on(LANDING_URL, ok_response(""))
            .on(APP_URL, ok_response("expired"))
            .on(APP_URL, app_page("tok-2"));
        let (session, _, _) = session_with(transport);

        assert!(session.initialize(seed(), no_refresh()).await.is_err());
        session.initialize(seed(), no_refresh()).await.unwrap();
        assert_eq!(session.access_token().as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn cached_secondary_cookie_is_reused() {
        let (session, transport, cache) = session_with(happy_transport());
        cache
            .put(&cache_key("sid"), "cached-ts", std::time::SystemTime::now())
            .unwrap();

        session.initialize(seed(), no_refresh()).await.unwrap();

        assert_eq!(
            session.credentials().get(SECONDARY_COOKIE).as_deref(),
            Some("cached-ts")
        );
        let app = &transport.requests_to(APP_URL)[0];
        assert!(app
            .headers
            .iter()
            .any(|(k, v)| k == "Cookie" && v.contains("__Secure-1PSIDTS=cached-ts")));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_stops_rotation() {
        let (session, _, _) = session_with(happy_transport());
        session
            .initialize(
                seed(),
                SessionOptions::default().with_refresh_interval(Duration::from_secs(3600)),
            )
            .await
            .unwrap();
        assert!(session.is_rotating());

        let mut events = session.subscribe();
        session.close();
        session.close();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Closed);
        assert!(events.try_recv().is_err());
        assert!(session.lock_rotation().is_none());
    }

    #[tokio::test]
    async fn rotate_now_requires_ready() {
        let (session, _, _) = session_with(happy_transport());
        assert_eq!(
            session.rotate_now().await.unwrap_err(),
            GeminiError::NotInitialized
        );
    }

    #[tokio::test]
    async fn rotate_now_updates_credentials() {
        let transport = happy_transport().on(
            ROTATE_COOKIES_URL,
            with_set_cookie(ok_response(""), "__Secure-1PSIDTS=rotated; Secure"),
        );
        let (session, _, _) = session_with(transport);
        session.initialize(seed(), no_refresh()).await.unwrap();

        let outcome = session.rotate_now().await.unwrap();
        assert_eq!(outcome, RotationOutcome::Rotated);
        assert_eq!(
            session.credentials().get(SECONDARY_COOKIE).as_deref(),
            Some("rotated")
        );
        assert_eq!(session.state(), SessionState::Ready);

        // Inside the debounce window the endpoint is not called again.
        assert_eq!(session.rotate_now().await.unwrap(), RotationOutcome::Debounced);
    }

    #[tokio::test]
    async fn rotation_auth_failure_does_not_fail_session() {
        let transport = happy_transport().on(ROTATE_COOKIES_URL, status_response(401));
        let (session, _, _) = session_with(transport);
        session.initialize(seed(), no_refresh()).await.unwrap();

        let err = session.rotate_now().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.access_token().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn failing_ticks_do_not_stop_schedule() {
        let transport = happy_transport().on_error(
            ROTATE_COOKIES_URL,
            GeminiError::Transport("connection reset".into()),
        );
        let (session, transport, _) = session_with(transport);
        session.initialize(seed(), no_refresh()).await.unwrap();
        let mut events = session.subscribe();

        session.start_rotation(Duration::from_millis(10)).unwrap();

        for _ in 0..3 {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("tick fired")
                .unwrap();
            assert!(matches!(event, SessionEvent::RotationFailed { .. }));
        }
        assert!(session.is_rotating());
        assert!(transport.requests_to(ROTATE_COOKIES_URL).len() >= 3);
        assert_eq!(session.state(), SessionState::Ready);

        session.close();
    }

    #[tokio::test]
    async fn unusable_refresh_interval_is_rejected_before_handshake() {
        for interval in [Duration::ZERO, Duration::from_secs(u64::MAX)] {
            let (session, transport, _) = session_with(happy_transport());
            let err = session
                .initialize(
                    seed(),
                    SessionOptions::default().with_refresh_interval(interval),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, GeminiError::InvalidArgument(_)), "{interval:?}");
            assert_eq!(transport.request_count(), 0);
            assert_eq!(session.state(), SessionState::Uninitialized);
            assert!(!session.is_rotating());
        }
    }

    #[tokio::test]
    async fn start_rotation_rejects_unusable_interval_and_keeps_schedule() {
        let (session, _, _) = session_with(happy_transport());
        session
            .initialize(
                seed(),
                SessionOptions::default().with_refresh_interval(Duration::from_secs(3600)),
            )
            .await
            .unwrap();
        assert!(session.is_rotating());

        for interval in [Duration::ZERO, Duration::from_secs(u64::MAX)] {
            let err = session.start_rotation(interval).unwrap_err();
            assert!(matches!(err, GeminiError::InvalidArgument(_)), "{interval:?}");
            assert!(session.is_rotating());
        }
        assert_eq!(session.state(), SessionState::Ready);

        session.close();
    }
}
