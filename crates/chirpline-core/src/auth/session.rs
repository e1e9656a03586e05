//! Session controller: who is signed in, and the transitions between
//! signed in and signed out.
//!
//! The controller is an explicit context object. The application creates one
//! at start-up, shares it (usually behind an `Arc`) with everything that needs
//! the session, and drops it on shutdown. State changes are published on a
//! `tokio::sync::watch` channel so any number of observers can follow along.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{AuthResponse, ProfileUpdate, RegisterData, User};

use super::AuthEvent;

/// Authentication state. Holding the `User` inside `Authenticated` keeps
/// "signed in" and "have a user snapshot" from drifting apart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Start-up, before the stored token has been checked
    #[default]
    Loading,
    Unauthenticated,
    Authenticated(User),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// What a successful registration does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterPolicy {
    /// Store the returned tokens and sign the new user in
    #[default]
    AutoLogin,
    /// Leave the session alone; the user signs in afterwards
    RequireSignIn,
}

pub struct SessionController {
    api: ApiClient,
    register_policy: RegisterPolicy,
    state: watch::Sender<SessionState>,
    last_error: Mutex<Option<String>>,
}

impl SessionController {
    /// Create a controller in the `Loading` state. Call [`initialize`]
    /// to resolve it.
    ///
    /// A controller built this way does not notice a failed token refresh
    /// until [`listen_for_auth_events`] is running; without it the state can
    /// stay `Authenticated` after the tokens were cleared. [`spawn`] does
    /// both.
    ///
    /// [`initialize`]: SessionController::initialize
    /// [`listen_for_auth_events`]: SessionController::listen_for_auth_events
    /// [`spawn`]: SessionController::spawn
    pub fn new(api: ApiClient, register_policy: RegisterPolicy) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            api,
            register_policy,
            state,
            last_error: Mutex::new(None),
        }
    }

    /// Create a shared controller that already follows the API client's
    /// auth events. Must be called from within a tokio runtime. The
    /// listener stops once the controller is dropped.
    pub fn spawn(api: ApiClient, register_policy: RegisterPolicy) -> Arc<Self> {
        let controller = Arc::new(Self::new(api, register_policy));
        controller.listen_for_auth_events();
        controller
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// User-facing message from the last failed operation, if any
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_error(&self, message: Option<String>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = message;
    }

    fn clear_tokens(&self) {
        if let Err(e) = self.api.tokens().clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Resolve the start-up state by validating any stored access token
    /// against `/users/me/`. Always leaves the session out of `Loading`.
    pub async fn initialize(&self) {
        self.state.send_replace(SessionState::Loading);

        if self.api.tokens().load_access().is_none() {
            debug!("No stored access token");
            self.state.send_replace(SessionState::Unauthenticated);
            return;
        }

        debug!("Validating stored access token");
        match self.api.current_user().await {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "Stored session is valid");
                self.state.send_replace(SessionState::Authenticated(user));
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected, clearing tokens");
                self.clear_tokens();
                self.state.send_replace(SessionState::Unauthenticated);
            }
        }
    }

    /// Sign in. Returns `false` on any failure and leaves the state as it
    /// was; the reason is available from [`last_error`].
    ///
    /// [`last_error`]: SessionController::last_error
    pub async fn login(&self, username: &str, password: &str) -> bool {
        match self.api.login(username, password).await {
            Ok(auth) => self.establish(auth),
            Err(e) => {
                error!(error = %e, "Login failed");
                let message = match e {
                    ApiError::Unauthorized => "Invalid username or password".to_string(),
                    other => other.user_message(),
                };
                self.set_error(Some(message));
                false
            }
        }
    }

    /// Create an account. Whether the new user ends up signed in depends on
    /// the configured [`RegisterPolicy`].
    pub async fn register(&self, data: &RegisterData) -> bool {
        match self.api.register(data).await {
            Ok(auth) => match self.register_policy {
                RegisterPolicy::AutoLogin => self.establish(auth),
                RegisterPolicy::RequireSignIn => {
                    info!(username = %auth.user.username, "Registration complete, sign-in required");
                    self.set_error(None);
                    true
                }
            },
            Err(e) => {
                error!(error = %e, "Registration failed");
                self.set_error(Some(e.user_message()));
                false
            }
        }
    }

    /// Persist the tokens from a login/register response and move to
    /// `Authenticated`.
    fn establish(&self, auth: AuthResponse) -> bool {
        if auth.tokens.access.is_empty() {
            error!("Server returned an empty access token");
            self.set_error(Some("Unexpected response from server.".to_string()));
            return false;
        }

        if let Err(e) = self.api.tokens().save(&auth.tokens) {
            error!(error = %e, "Failed to store tokens");
            self.set_error(Some(ApiError::from(e).user_message()));
            return false;
        }

        info!(user_id = auth.user.id, username = %auth.user.username, "Signed in");
        self.set_error(None);
        self.state.send_replace(SessionState::Authenticated(auth.user));
        true
    }

    /// Sign out: forget the tokens and the user. No network call; calling it
    /// while already signed out changes nothing.
    pub fn logout(&self) {
        self.clear_tokens();
        let changed = self.state.send_if_modified(|state| {
            if *state == SessionState::Unauthenticated {
                false
            } else {
                *state = SessionState::Unauthenticated;
                true
            }
        });
        if changed {
            info!("Signed out");
        }
    }

    /// Send a profile edit and, on success, replace the user snapshot with
    /// the server's copy.
    pub async fn update_profile(&self, update: ProfileUpdate) -> bool {
        match self.api.update_profile(update).await {
            Ok(user) => {
                self.set_error(None);
                self.state.send_if_modified(|state| match state {
                    SessionState::Authenticated(current) if current.id == user.id => {
                        *current = user;
                        true
                    }
                    _ => false,
                });
                true
            }
            Err(e) => {
                error!(error = %e, "Profile update failed");
                self.set_error(Some(e.user_message()));
                false
            }
        }
    }

    /// React to an event from the API client. A failed refresh has already
    /// cleared the tokens; the session follows.
    pub fn handle_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignInRequired => {
                let changed = self.state.send_if_modified(|state| {
                    if state.is_authenticated() {
                        *state = SessionState::Unauthenticated;
                        true
                    } else {
                        false
                    }
                });
                if changed {
                    info!("Session expired, sign-in required");
                }
            }
        }
    }

    /// Forward API client events into [`handle_auth_event`] on a background
    /// task. The task ends when the client's event channel closes.
    ///
    /// [`handle_auth_event`]: SessionController::handle_auth_event
    pub fn listen_for_auth_events(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.api.subscribe_events();
        let controller = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match controller.upgrade() {
                        Some(controller) => controller.handle_auth_event(event),
                        None => break,
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Auth event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
