//! Session lifecycle: login, logout, start-up restore and forced expiry.
//!
//! [`SessionController`] is the only writer of the user-facing
//! [`AuthState`], published through a `tokio::sync::watch` channel so views
//! can wait for `ready` before deciding whether to show a login prompt.
//!
//! Expiry is driven by the HTTP adapter: it clears the [`SessionStore`] and
//! publishes [`SessionEvent::Expired`]. The listener started with
//! [`SessionController::spawn_expiry_listener`] reacts to that exactly as
//! to an explicit [`SessionController::logout`].

use std::sync::Arc;

use pomgmt_core::endpoints;
use pomgmt_core::session::{Identity, LoginResponse};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{SessionEvent, SessionEvents};
use crate::http::ApiClient;
use crate::session_store::SessionStore;

/// Shown when the server rejects a login without a usable message.
const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please try again.";

/// Authentication state as seen by views.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthState {
    /// `false` until [`SessionController::bootstrap`] has run.
    pub ready: bool,
    pub identity: Option<Identity>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// A rejected login, carrying the message to show.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LoginFailure {
    pub message: String,
}

pub struct SessionController {
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
    events: Arc<SessionEvents>,
    state: watch::Sender<AuthState>,
}

impl SessionController {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionStore>, events: Arc<SessionEvents>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            api,
            session,
            events,
            state,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Restore a persisted session without contacting the server.
    pub fn bootstrap(&self) -> AuthState {
        let identity = self.session.restore().map(|c| c.identity().clone());
        match &identity {
            Some(identity) => tracing::info!(user_id = %identity.id, "Restored session"),
            None => tracing::debug!("No persisted session"),
        }
        self.publish_state(AuthState {
            ready: true,
            identity,
        })
    }

    /// Exchange credentials for a token and persist the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, LoginFailure> {
        let fields = vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ];

        let response: LoginResponse = self
            .api
            .post_form(endpoints::LOGIN, fields)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Login request failed");
                LoginFailure {
                    message: e.detail().unwrap_or(LOGIN_FAILED_MESSAGE).to_string(),
                }
            })?;

        let credential = response.into_credential().map_err(|e| {
            tracing::warn!(error = %e, "Login response was unusable");
            LoginFailure {
                message: LOGIN_FAILED_MESSAGE.to_string(),
            }
        })?;
        let identity = credential.identity().clone();

        if let Err(e) = self.session.save(credential) {
            tracing::error!(error = %e, "Failed to persist session");
            return Err(LoginFailure {
                message: LOGIN_FAILED_MESSAGE.to_string(),
            });
        }

        tracing::info!(user_id = %identity.id, "Logged in");
        self.events.publish(SessionEvent::LoggedIn {
            user_id: identity.id.clone(),
        });
        self.publish_state(AuthState {
            ready: true,
            identity: Some(identity.clone()),
        });
        Ok(identity)
    }

    /// Sign out. Safe to call with no active session.
    pub fn logout(&self) {
        self.sign_out();
        self.events.publish(SessionEvent::LoggedOut);
    }

    /// React to a session event published elsewhere.
    ///
    /// The adapter has already cleared the store when it publishes
    /// `Expired`; a login that raced ahead of this event is left alone.
    pub fn handle_event(&self, event: &SessionEvent) {
        if *event == SessionEvent::Expired {
            self.sync_with_store();
        }
    }

    /// Run [`handle_event`](Self::handle_event) for every published event
    /// until `cancel` fires.
    pub fn spawn_expiry_listener(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => controller.handle_event(&event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Session event listener lagged");
                            controller.sync_with_store();
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    /// Drop the in-memory identity if the store no longer holds a session.
    fn sync_with_store(&self) {
        if self.session.is_authenticated() {
            return;
        }
        if self.state.borrow().identity.is_some() {
            tracing::info!("Session expired, signing out");
        }
        self.publish_state(AuthState {
            ready: true,
            identity: None,
        });
    }

    fn sign_out(&self) {
        if let Err(e) = self.session.clear() {
            tracing::warn!(error = %e, "Failed to remove persisted session");
        }
        self.publish_state(AuthState {
            ready: true,
            identity: None,
        });
    }

    fn publish_state(&self, state: AuthState) -> AuthState {
        self.state.send_replace(state.clone());
        state
    }
}
