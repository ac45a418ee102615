use serde::{Deserialize, Serialize};

/// Request body for login. Absent fields decode as empty strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct CheckTokenResponse {
    pub username: String,
}
