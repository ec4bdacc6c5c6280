//! Profile screen state.

use std::sync::Arc;

use log::debug;
use tokio::sync::watch;

use crate::identity::{IdentityProvider, ProfileService, ProfileStore};
use crate::{SenderosError, UserProfile};

pub const EMPTY_ALIAS: &str = "Alias cannot be empty";
pub const PROFILE_UPDATED: &str = "Profile updated";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub profile: Option<UserProfile>,
    pub loading: bool,
    pub updating: bool,
    pub error: Option<String>,
    pub success_message: Option<String>,
}

pub struct ProfileModel<P: IdentityProvider, S: ProfileStore> {
    profiles: Arc<ProfileService<P, S>>,
    state: watch::Sender<ProfileState>,
}

fn error_text(e: &SenderosError) -> String {
    match e {
        SenderosError::Provider(message) => message.clone(),
        other => other.to_string(),
    }
}

impl<P: IdentityProvider, S: ProfileStore> ProfileModel<P, S> {
    /// Create the model without loading. The screen calls
    /// [`load_profile`](Self::load_profile) when it opens.
    pub fn new(profiles: Arc<ProfileService<P, S>>) -> Self {
        let (state, _) = watch::channel(ProfileState::default());
        Self { profiles, state }
    }

    /// Create the model and load the profile.
    pub async fn open(profiles: Arc<ProfileService<P, S>>) -> Self {
        let model = Self::new(profiles);
        model.load_profile().await;
        model
    }

    pub fn state(&self) -> ProfileState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileState> {
        self.state.subscribe()
    }

    pub async fn load_profile(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let next = match self.profiles.load_profile().await {
            Ok(profile) => ProfileState {
                profile: Some(profile),
                ..ProfileState::default()
            },
            Err(e) => {
                let message = error_text(&e);
                ProfileState {
                    error: Some(if message.is_empty() {
                        "Could not load profile".to_string()
                    } else {
                        message
                    }),
                    ..ProfileState::default()
                }
            }
        };
        self.state.send_replace(next);
    }

    /// Save a new alias. Surrounding whitespace is trimmed; an alias that is
    /// empty after trimming is rejected without touching the store.
    pub async fn update_profile(&self, alias: &str) {
        let alias = alias.trim();
        if alias.is_empty() {
            self.state
                .send_modify(|s| s.error = Some(EMPTY_ALIAS.to_string()));
            return;
        }

        let mut current = None;
        self.state.send_modify(|s| {
            s.updating = true;
            s.error = None;
            s.success_message = None;
            current = s.profile.clone();
        });

        let edited = UserProfile {
            alias: alias.to_string(),
            ..current.unwrap_or_default()
        };

        match self.profiles.update_profile(edited).await {
            Ok(written) => {
                debug!("[ProfileModel] Alias updated for {}", written.id);
                self.state.send_replace(ProfileState {
                    profile: Some(written),
                    success_message: Some(PROFILE_UPDATED.to_string()),
                    ..ProfileState::default()
                });
            }
            Err(e) => {
                let message = error_text(&e);
                self.state.send_modify(|s| {
                    s.updating = false;
                    s.error = Some(if message.is_empty() {
                        "Could not update profile".to_string()
                    } else {
                        message
                    });
                });
            }
        }
    }

    pub fn clear_messages(&self) {
        self.state.send_modify(|s| {
            s.error = None;
            s.success_message = None;
        });
    }
}
