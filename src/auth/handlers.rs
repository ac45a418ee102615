use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{CheckTokenRequest, CheckTokenResponse, LoginRequest, LoginResponse},
        services::{check_credentials, normalize_email, verify_password},
    },
    error::{RpcError, RpcJson},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth.AuthenticationService/Login", post(login))
        .route("/api/auth.AuthenticationService/CheckToken", post(check_token))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<LoginRequest>,
) -> Result<Json<LoginResponse>, RpcError> {
    let username = normalize_email(&payload.username);
    check_credentials(&username, &payload.password)?;

    let user = state
        .users
        .find_one_by_email(&username)
        .await?
        .ok_or_else(|| RpcError::not_found("User not found"))?;

    let ok = verify_password(
        state.passwords.clone(),
        payload.password,
        user.password_hash.clone(),
    )
    .await?;
    if !ok {
        warn!(email = %username, "login invalid password");
        return Err(RpcError::unauthenticated("Invalid credentials"));
    }

    let token = state.tokens.issue(&user.email)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse { token }))
}

#[instrument(skip_all)]
pub async fn check_token(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<CheckTokenRequest>,
) -> Result<Json<CheckTokenResponse>, RpcError> {
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(RpcError::invalid_argument("Token is empty"));
    }

    let verified = state
        .tokens
        .verify(token)
        .map_err(|e| RpcError::unauthenticated(e.to_string()))?;

    Ok(Json(CheckTokenResponse {
        username: verified.subject,
    }))
}
