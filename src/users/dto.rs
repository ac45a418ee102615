use serde::{Deserialize, Serialize};

// Absent fields decode as empty strings and are rejected by the handlers.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub username: String,
}

/// Body of Ban, Unban and Delete.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TargetUserRequest {
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePasswordRequest {
    pub username: String,
    #[serde(alias = "oldPassword")]
    pub old_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateEmailRequest {
    #[serde(alias = "oldEmail")]
    pub old_email: String,
    #[serde(alias = "newEmail")]
    pub new_email: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
