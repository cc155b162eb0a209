//! Shared session state `{ user, loading, error }`.
//!
//! One owned `SessionHandle` per client. Every mutation goes through its
//! methods; readers take a snapshot or subscribe to changes through the
//! underlying `watch` channel.

use tokio::sync::watch;

use crate::types::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Non-null only while the stored access token is believed valid.
    pub user: Option<User>,
    /// True until the startup session check has finished.
    pub loading: bool,
    /// Most recent failure message. Replaced, never accumulated.
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct SessionHandle {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.tx.borrow().user.clone()
    }

    pub(crate) fn set_user(&self, user: User) {
        self.tx.send_modify(|state| state.user = Some(user));
    }

    pub(crate) fn clear_user(&self) {
        self.tx.send_if_modified(|state| state.user.take().is_some());
    }

    pub(crate) fn set_error(&self, error: Option<String>) {
        self.tx.send_if_modified(|state| {
            if state.error == error {
                return false;
            }
            state.error = error;
            true
        });
    }

    pub(crate) fn finish_loading(&self) {
        self.tx.send_if_modified(|state| std::mem::replace(&mut state.loading, false));
    }
}
