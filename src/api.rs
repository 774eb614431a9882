//! Request and response bodies shared by the backend server and its clients

use serde::{Deserialize, Serialize};

use crate::identity::UserInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveUserRequest {
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl From<&UserInfo> for SaveUserRequest {
    /// Accounts created from an identity-provider login are keyed by the
    /// provider id and carry no password.
    fn from(user: &UserInfo) -> Self {
        Self {
            username: user.id.to_string(),
            password: String::new(),
            nickname: Some(user.nickname.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
