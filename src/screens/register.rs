//! Registration screen state.

use std::sync::Arc;

use tokio::sync::watch;

use super::{INVALID_EMAIL, NETWORK_ERROR, failure_message, is_valid_email};
use crate::identity::{AccountService, IdentityProvider, ProfileStore};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters";

// Matched case-sensitively.
const FAILURE_RULES: &[(&str, &str)] = &[
    ("email", "Invalid email or already registered"),
    ("password", "Password is too weak"),
    ("network", NETWORK_ERROR),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterState {
    pub loading: bool,
    pub success: bool,
    pub error: Option<String>,
}

pub struct RegisterModel<P: IdentityProvider, S: ProfileStore> {
    accounts: Arc<AccountService<P, S>>,
    state: watch::Sender<RegisterState>,
}

impl<P: IdentityProvider, S: ProfileStore> RegisterModel<P, S> {
    pub fn new(accounts: Arc<AccountService<P, S>>) -> Self {
        let (state, _) = watch::channel(RegisterState::default());
        Self { accounts, state }
    }

    pub fn state(&self) -> RegisterState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegisterState> {
        self.state.subscribe()
    }

    pub async fn register(&self, email: &str, password: &str) {
        if !is_valid_email(email) {
            self.fail(INVALID_EMAIL);
            return;
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            self.fail(PASSWORD_TOO_SHORT);
            return;
        }

        self.state.send_modify(|s| s.loading = true);

        let next = match self.accounts.register(email, password).await {
            Ok(_) => RegisterState {
                success: true,
                ..RegisterState::default()
            },
            Err(e) => RegisterState {
                error: Some(failure_message(
                    &e,
                    FAILURE_RULES,
                    false,
                    "Could not create the account",
                )),
                ..RegisterState::default()
            },
        };
        self.state.send_replace(next);
    }

    fn fail(&self, message: &str) {
        self.state.send_replace(RegisterState {
            error: Some(message.to_string()),
            ..RegisterState::default()
        });
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }
}
