//! Login screen state.

use std::sync::Arc;

use tokio::sync::watch;

use super::{INVALID_EMAIL, NETWORK_ERROR, TOO_MANY_REQUESTS, failure_message, is_valid_email};
use crate::identity::{AccountService, IdentityProvider, ProfileStore};

pub const MISSING_FIELDS: &str = "Please fill in all fields";

const FAILURE_RULES: &[(&str, &str)] = &[
    ("password", "Incorrect password"),
    ("user-not-found", "User not found"),
    ("user-disabled", "This account has been disabled"),
    ("invalid-email", INVALID_EMAIL),
    ("invalid-credential", "Invalid credentials"),
    ("network", NETWORK_ERROR),
    ("too-many-requests", TOO_MANY_REQUESTS),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginState {
    pub loading: bool,
    pub success: bool,
    pub error: Option<String>,
}

pub struct LoginModel<P: IdentityProvider, S: ProfileStore> {
    accounts: Arc<AccountService<P, S>>,
    state: watch::Sender<LoginState>,
}

impl<P: IdentityProvider, S: ProfileStore> LoginModel<P, S> {
    pub fn new(accounts: Arc<AccountService<P, S>>) -> Self {
        let (state, _) = watch::channel(LoginState::default());
        Self { accounts, state }
    }

    pub fn state(&self) -> LoginState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    pub async fn login(&self, email: &str, password: &str) {
        if email.is_empty() || password.is_empty() {
            self.fail(MISSING_FIELDS);
            return;
        }
        if !is_valid_email(email) {
            self.fail(INVALID_EMAIL);
            return;
        }

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let next = match self.accounts.login(email, password).await {
            Ok(_) => LoginState {
                success: true,
                ..LoginState::default()
            },
            Err(e) => LoginState {
                error: Some(failure_message(&e, FAILURE_RULES, true, "Could not sign in")),
                ..LoginState::default()
            },
        };
        self.state.send_replace(next);
    }

    fn fail(&self, message: &str) {
        self.state.send_replace(LoginState {
            error: Some(message.to_string()),
            ..LoginState::default()
        });
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }

    pub fn reset(&self) {
        self.state.send_replace(LoginState::default());
    }
}
