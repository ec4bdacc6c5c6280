//! # Identity & Profiles
//!
//! Account operations and the per-user profile document, over two injected
//! backends:
//! - [`IdentityProvider`]: email/password accounts and the signed-in session
//! - [`ProfileStore`]: one [`UserProfile`] document per user id
//!
//! Backend failures arrive as [`ProviderFailure`] and surface as
//! [`SenderosError::Provider`] carrying the backend's message unchanged; the
//! screen state holders map those messages to user-facing text.

use std::future::Future;
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::{Result, SenderosError, UserProfile};

/// Message returned by profile operations without a signed-in user.
pub const NOT_SIGNED_IN: &str = "User is not signed in";

/// Message returned when the profile store rejects an update.
pub const PROFILE_STORE_UNAVAILABLE: &str =
    "The profile store is unavailable. Please try again later.";

// ============================================================================
// Backend Capabilities
// ============================================================================

/// Failure reported by an identity or profile backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderFailure {
    pub message: String,
}

impl ProviderFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ProviderFailure> for SenderosError {
    fn from(failure: ProviderFailure) -> Self {
        SenderosError::Provider(failure.message)
    }
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Email/password account backend.
pub trait IdentityProvider: Send + Sync + 'static {
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = std::result::Result<SessionUser, ProviderFailure>> + Send;

    /// Create an account and return the new user id.
    fn register(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = std::result::Result<String, ProviderFailure>> + Send;

    fn send_password_reset(
        &self,
        email: &str,
    ) -> impl Future<Output = std::result::Result<(), ProviderFailure>> + Send;

    fn sign_out(&self);

    fn current_user(&self) -> Option<SessionUser>;
}

/// Remote store of profile documents keyed by user id.
pub trait ProfileStore: Send + Sync + 'static {
    fn get(
        &self,
        uid: &str,
    ) -> impl Future<Output = std::result::Result<Option<UserProfile>, ProviderFailure>> + Send;

    /// Full overwrite of the document at `profile.id`.
    fn put(
        &self,
        profile: &UserProfile,
    ) -> impl Future<Output = std::result::Result<(), ProviderFailure>> + Send;
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// Account Service
// ============================================================================

/// Login, registration, password recovery and logout.
pub struct AccountService<P: IdentityProvider, S: ProfileStore> {
    identity: Arc<P>,
    profiles: Arc<S>,
}

impl<P: IdentityProvider, S: ProfileStore> AccountService<P, S> {
    pub fn new(identity: Arc<P>, profiles: Arc<S>) -> Self {
        Self { identity, profiles }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser> {
        let user = self.identity.sign_in(email, password).await?;
        info!("[AccountService] Signed in {}", user.uid);
        Ok(user)
    }

    /// Create the account, then its profile document.
    ///
    /// A failed profile write is logged and does not fail the registration;
    /// the profile is created again on first load.
    pub async fn register(&self, email: &str, password: &str) -> Result<String> {
        let uid = self.identity.register(email, password).await?;
        info!("[AccountService] Registered {}", uid);

        let profile = UserProfile::basic(uid.clone(), email, now_ms());
        if let Err(e) = self.profiles.put(&profile).await {
            warn!("[AccountService] Could not create profile for {}: {}", uid, e);
        }
        Ok(uid)
    }

    pub async fn recover_password(&self, email: &str) -> Result<()> {
        self.identity.send_password_reset(email).await?;
        Ok(())
    }

    pub fn logout(&self) {
        self.identity.sign_out();
        info!("[AccountService] Signed out");
    }

    pub fn is_logged_in(&self) -> bool {
        self.identity.current_user().is_some()
    }
}

// ============================================================================
// Profile Service
// ============================================================================

/// Profile document of the signed-in user.
pub struct ProfileService<P: IdentityProvider, S: ProfileStore> {
    identity: Arc<P>,
    profiles: Arc<S>,
}

impl<P: IdentityProvider, S: ProfileStore> ProfileService<P, S> {
    pub fn new(identity: Arc<P>, profiles: Arc<S>) -> Self {
        Self { identity, profiles }
    }

    fn session(&self) -> Result<SessionUser> {
        self.identity
            .current_user()
            .ok_or_else(|| SenderosError::Provider(NOT_SIGNED_IN.to_string()))
    }

    /// Load the profile, creating a default document when none exists.
    ///
    /// When the store cannot be reached, a basic profile built from the
    /// session is returned instead of an error.
    pub async fn load_profile(&self) -> Result<UserProfile> {
        let user = self.session()?;
        let email = user.email.clone().unwrap_or_default();

        match self.profiles.get(&user.uid).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => {
                let profile = UserProfile::basic(user.uid.clone(), email, now_ms());
                match self.profiles.put(&profile).await {
                    Ok(()) => info!("[ProfileService] Created profile for {}", user.uid),
                    Err(e) => {
                        warn!("[ProfileService] Could not create profile for {}: {}", user.uid, e)
                    }
                }
                Ok(profile)
            }
            Err(e) => {
                warn!("[ProfileService] Profile store unavailable: {}", e);
                Ok(UserProfile::basic(user.uid, email, now_ms()))
            }
        }
    }

    /// Overwrite the signed-in user's profile.
    ///
    /// The id is forced to the session's user id and `updated_at` to now.
    /// Returns the document as written.
    pub async fn update_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        let user = self.session()?;
        let profile = UserProfile {
            id: user.uid,
            updated_at: now_ms(),
            ..profile
        };

        if let Err(e) = self.profiles.put(&profile).await {
            warn!("[ProfileService] Profile update failed: {}", e);
            return Err(SenderosError::Provider(PROFILE_STORE_UNAVAILABLE.to_string()));
        }
        Ok(profile)
    }
}
