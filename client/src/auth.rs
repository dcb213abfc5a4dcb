//! Auth provider handle.
//!
//! The engine never authenticates anyone itself. It only watches an
//! [`AuthState`] that the host application drives through [`AuthHandle`].

use std::sync::Arc;

use binder_engine::UserId;
use tokio::sync::watch;

/// Credentials of a signed-in user.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Owner of the remote rows
    pub user_id: UserId,
    /// Bearer token for the remote store
    pub access_token: String,
}

impl Session {
    pub fn new(user_id: impl Into<UserId>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

// Keep tokens out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Whether a user is signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::SignedIn(session) => Some(session),
            AuthState::SignedOut => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session().map(|s| s.user_id.as_str())
    }
}

/// Shared, observable auth state.
///
/// Clones share the same state. Tabs of one browser profile share a session,
/// so tests hand clones of one handle to every engine.
#[derive(Debug, Clone)]
pub struct AuthHandle {
    state: Arc<watch::Sender<AuthState>>,
}

impl Default for AuthHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthHandle {
    /// Start signed out.
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self {
            state: Arc::new(state),
        }
    }

    /// Start signed in.
    pub fn signed_in(session: Session) -> Self {
        let handle = Self::new();
        handle.sign_in(session);
        handle
    }

    pub fn sign_in(&self, session: Session) {
        tracing::info!(user_id = %session.user_id, "Signed in");
        self.state.send_replace(AuthState::SignedIn(session));
    }

    pub fn sign_out(&self) {
        let previous = self.state.send_replace(AuthState::SignedOut);
        if let Some(user_id) = previous.user_id() {
            tracing::info!(user_id = %user_id, "Signed out");
        }
    }

    /// Swap in a fresh access token for the current user.
    ///
    /// Returns `false` when nobody is signed in. Observers are not woken:
    /// the user did not change.
    pub fn refresh(&self, access_token: impl Into<String>) -> bool {
        let access_token = access_token.into();
        let mut refreshed = false;
        self.state.send_if_modified(|state| match state {
            AuthState::SignedIn(session) => {
                session.access_token = access_token;
                refreshed = true;
                false
            }
            AuthState::SignedOut => false,
        });
        if refreshed {
            tracing::debug!("Access token refreshed");
        }
        refreshed
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::SignedIn(_))
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.state.borrow().user_id().map(str::to_string)
    }

    /// The current session, if signed in.
    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    /// Observe sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}
