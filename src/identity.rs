use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::bridge::{BackendBridge, BridgeMessage};
use crate::error::{Result, WalkError};
use crate::store::{keys, KeyValueStore};

/// Identity returned by the login provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub nickname: String,
}

pub trait IdentityProvider {
    fn login(&mut self) -> Result<UserInfo>;
}

/// Provider that hands out a fixed identity, e.g. one given on the command line
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user: Option<UserInfo>,
}

impl StaticIdentity {
    pub fn new(user: UserInfo) -> Self {
        Self { user: Some(user) }
    }

    /// A provider whose login always fails
    pub fn unavailable() -> Self {
        Self { user: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn login(&mut self) -> Result<UserInfo> {
        self.user
            .clone()
            .ok_or_else(|| WalkError::Login("no identity available".to_string()))
    }
}

/// Log in through `provider`, remember the user locally and tell the backend
/// about it without waiting for an answer
pub fn complete_login(
    provider: &mut dyn IdentityProvider,
    store: &dyn KeyValueStore,
    bridge: &BackendBridge,
) -> Result<UserInfo> {
    let user = provider.login().map_err(|e| {
        error!("login failed: {e}");
        e
    })?;

    store.put(keys::USER_INFO, &serde_json::to_string(&user)?)?;
    bridge.post(BridgeMessage::UserLoggedIn(user.clone()));
    info!(id = user.id, nickname = %user.nickname, "user logged in");
    Ok(user)
}

pub fn check_login_status(store: &dyn KeyValueStore) -> Option<UserInfo> {
    let raw = match store.get(keys::USER_INFO) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!("failed to read {}: {e}", keys::USER_INFO);
            return None;
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| warn!("ignoring malformed {}: {e}", keys::USER_INFO))
        .ok()
}

pub fn logout(store: &dyn KeyValueStore) -> Result<()> {
    store.remove(keys::USER_INFO)
}
