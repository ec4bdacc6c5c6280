//! Password recovery screen state.

use std::sync::Arc;

use tokio::sync::watch;

use super::{INVALID_EMAIL, NETWORK_ERROR, TOO_MANY_REQUESTS, failure_message, is_valid_email};
use crate::identity::{AccountService, IdentityProvider, ProfileStore};

const FAILURE_RULES: &[(&str, &str)] = &[
    ("user-not-found", "No account exists for this email address"),
    ("invalid-email", INVALID_EMAIL),
    ("network", NETWORK_ERROR),
    ("too-many-requests", TOO_MANY_REQUESTS),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverState {
    pub loading: bool,
    /// Reset email sent
    pub success: bool,
    pub error: Option<String>,
}

pub struct RecoverPasswordModel<P: IdentityProvider, S: ProfileStore> {
    accounts: Arc<AccountService<P, S>>,
    state: watch::Sender<RecoverState>,
}

impl<P: IdentityProvider, S: ProfileStore> RecoverPasswordModel<P, S> {
    pub fn new(accounts: Arc<AccountService<P, S>>) -> Self {
        let (state, _) = watch::channel(RecoverState::default());
        Self { accounts, state }
    }

    pub fn state(&self) -> RecoverState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecoverState> {
        self.state.subscribe()
    }

    pub async fn recover_password(&self, email: &str) {
        if !is_valid_email(email) {
            self.state.send_replace(RecoverState {
                error: Some(INVALID_EMAIL.to_string()),
                ..RecoverState::default()
            });
            return;
        }

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let next = match self.accounts.recover_password(email).await {
            Ok(()) => RecoverState {
                success: true,
                ..RecoverState::default()
            },
            Err(e) => RecoverState {
                error: Some(failure_message(
                    &e,
                    FAILURE_RULES,
                    false,
                    "Could not send the recovery email",
                )),
                ..RecoverState::default()
            },
        };
        self.state.send_replace(next);
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }

    pub fn reset(&self) {
        self.state.send_replace(RecoverState::default());
    }
}
