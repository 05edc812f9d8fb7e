use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::config::QobuzConfig;
use crate::error::SessionError;
use crate::invariants::{debug_assert_session_error_exclusive, debug_assert_single_login_in_flight};

/// An authenticated Qobuz session, as returned by `/login/username`.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_auth_token: String,
    pub user_id: String,
}

type SessionHandler = Box<dyn FnOnce(Result<Session, SessionError>) + Send>;

struct State {
    session: Option<Session>,
    error: Option<SessionError>,
    login_in_flight: bool,
    handlers: VecDeque<SessionHandler>,
}

/// Single-flight login client.
///
/// Any number of callers may request the current session via
/// [`add_handler`](Self::add_handler); only one login request is ever in
/// flight, and every caller queued behind it is resolved once that request
/// completes. Grounded on `QobuzClient::AddLoginHandler`/`InvokeHandlers`,
/// reworked from an intrusive callback list into an owned queue of
/// closures since this crate has no event-loop-affine handler type to hook
/// into.
pub struct SessionClient {
    config: QobuzConfig,
    http: reqwest::Client,
    state: Mutex<State>,
}

impl SessionClient {
    #[must_use]
    pub fn new(config: QobuzConfig, http: reqwest::Client) -> Arc<Self> {
        Arc::new(Self {
            config,
            http,
            state: Mutex::new(State {
                session: None,
                error: None,
                login_in_flight: false,
                handlers: VecDeque::new(),
            }),
        })
    }

    /// Returns the cached session or error without waiting or triggering a
    /// login. Mirrors `QobuzClient::GetSession`.
    pub fn cached_session(&self) -> Result<Session, SessionError> {
        let state = self.state.lock().unwrap();
        if let Some(e) = &state.error {
            return Err(e.clone());
        }
        state.session.clone().ok_or(SessionError::NoSession)
    }

    /// Queues `handler` for the current (or next) session, starting a login
    /// request if none is cached and none is already in flight.
    pub fn add_handler(
        self: &Arc<Self>,
        handler: impl FnOnce(Result<Session, SessionError>) + Send + 'static,
    ) {
        let mut state = self.state.lock().unwrap();

        if let Some(session) = &state.session {
            let session = session.clone();
            drop(state);
            handler(Ok(session));
            return;
        }
        if let Some(e) = &state.error {
            let e = e.clone();
            drop(state);
            handler(Err(e));
            return;
        }

        let was_in_flight = state.login_in_flight;
        let should_start = !was_in_flight;
        state.handlers.push_back(Box::new(handler));
        if !should_start {
            return;
        }
        state.login_in_flight = true;
        debug_assert_single_login_in_flight!(was_in_flight, should_start);
        drop(state);

        self.start_login();
    }

    /// Awaits the current (or next) session as a future, bridging
    /// [`add_handler`](Self::add_handler)'s callback style onto an async
    /// caller via a one-shot channel.
    ///
    /// # Panics
    ///
    /// Panics if the handler is dropped without firing, which only happens
    /// if `self` itself is dropped mid-login.
    pub async fn session(self: &Arc<Self>) -> Result<Session, SessionError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.add_handler(move |result| {
            let _ = tx.send(result);
        });
        rx.await.expect("session resolved without a response")
    }

    fn start_login(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this.login().await;
            this.on_login_complete(result);
        });
    }

    async fn login(&self) -> Result<Session, SessionError> {
        let url = format!("{}/login/username", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[
                ("app_id", self.config.app_id.as_str()),
                ("username", self.config.username.as_str()),
                ("email", self.config.email.as_str()),
                ("password", self.config.password.as_str()),
                (
                    "device_manufacturer_id",
                    self.config.device_manufacturer_id.as_str(),
                ),
            ])
            .send()
            .await
            .map_err(|e| SessionError::AuthError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::AuthError(format!(
                "login rejected: HTTP {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            user_auth_token: String,
            user: LoginUser,
        }
        #[derive(serde::Deserialize)]
        struct LoginUser {
            id: serde_json::Value,
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| SessionError::AuthError(e.to_string()))?;

        Ok(Session {
            user_auth_token: body.user_auth_token,
            user_id: body.user.id.to_string(),
        })
    }

    fn on_login_complete(&self, result: Result<Session, SessionError>) {
        let mut state = self.state.lock().unwrap();
        match &result {
            Ok(session) => state.session = Some(session.clone()),
            Err(e) => state.error = Some(e.clone()),
        }
        debug_assert_session_error_exclusive!(state.session.is_some(), state.error.is_some());
        state.login_in_flight = false;
        let handlers: Vec<_> = state.handlers.drain(..).collect();
        drop(state);

        for handler in handlers {
            handler(result.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> QobuzConfig {
        QobuzConfig::new(
            "http://127.0.0.1:0",
            "app-id",
            "app-secret",
            "device-id",
            "user",
            "user@example.com",
            "hunter2",
        )
    }

    #[tokio::test]
    async fn cached_session_is_no_session_before_any_login() {
        let client = SessionClient::new(config(), reqwest::Client::new());
        assert!(matches!(
            client.cached_session(),
            Err(SessionError::NoSession)
        ));
    }

    #[tokio::test]
    async fn ten_concurrent_handlers_share_one_login_attempt() {
        // Exercises the single-flight fan-out without a live server: the
        // session never resolves (no server on port 0), but every handler
        // must still be queued behind exactly one `login_in_flight` cycle.
        let client = SessionClient::new(config(), reqwest::Client::new());
        let called = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let called = Arc::clone(&called);
            client.add_handler(move |_result| {
                called.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(client.state.lock().unwrap().login_in_flight);
        assert_eq!(client.state.lock().unwrap().handlers.len(), 10);

        // Simulate the in-flight login failing, as `OnQobuzLoginError` would.
        client.on_login_complete(Err(SessionError::AuthError("unreachable".into())));

        assert_eq!(called.load(Ordering::SeqCst), 10);
        assert!(!client.state.lock().unwrap().login_in_flight);
        assert!(matches!(
            client.cached_session(),
            Err(SessionError::AuthError(_))
        ));
    }

    #[tokio::test]
    async fn handler_added_after_session_cached_resolves_immediately() {
        let client = SessionClient::new(config(), reqwest::Client::new());
        client.on_login_complete(Ok(Session {
            user_auth_token: "tok".into(),
            user_id: "1".into(),
        }));

        let called = Arc::new(AtomicUsize::new(0));
        let called2 = Arc::clone(&called);
        client.add_handler(move |result| {
            assert!(result.is_ok());
            called2.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(called.load(Ordering::SeqCst), 1);
        assert!(!client.state.lock().unwrap().login_in_flight);
    }
}
