//! State holders for the account screens.
//!
//! Each model keeps its UI state in a `tokio::sync::watch` channel, validates
//! input before calling a service, and turns service failures into
//! user-facing messages.

pub mod login;
pub mod profile;
pub mod recover;
pub mod register;

pub use login::{LoginModel, LoginState};
pub use profile::{ProfileModel, ProfileState};
pub use recover::{RecoverPasswordModel, RecoverState};
pub use register::{RegisterModel, RegisterState};

use crate::SenderosError;

pub const INVALID_EMAIL: &str = "Invalid email address";
pub const NETWORK_ERROR: &str = "Connection error. Check your internet";
pub const TOO_MANY_REQUESTS: &str = "Too many attempts. Try again later";

/// Shape check for an email address: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Map a service failure to the first message whose key occurs in the
/// backend's text; otherwise the backend's text itself, or `default` when
/// that is empty.
pub(crate) fn failure_message(
    error: &SenderosError,
    rules: &[(&str, &str)],
    ignore_case: bool,
    default: &str,
) -> String {
    let raw = match error {
        SenderosError::Provider(message) => message.clone(),
        other => other.to_string(),
    };

    let haystack = if ignore_case { raw.to_lowercase() } else { raw.clone() };
    for (key, message) in rules {
        let hit = if ignore_case {
            haystack.contains(&key.to_lowercase())
        } else {
            haystack.contains(key)
        };
        if hit {
            return (*message).to_string();
        }
    }

    if raw.is_empty() {
        default.to_string()
    } else {
        raw
    }
}
