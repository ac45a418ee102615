use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        extractors::CallContext,
        roles::{Role, RoleSet},
        services::{hash_password, is_valid_email, normalize_email, verify_password},
    },
    error::{RpcError, RpcJson},
    state::AppState,
    users::{
        dto::{
            RegisterRequest, RegisterResponse, SuccessResponse, TargetUserRequest,
            UpdateEmailRequest, UpdatePasswordRequest,
        },
        repo::EmailTaken,
        repo_types::User,
    },
};

/// A concurrent write can still claim the email after the existence check.
fn email_taken_as(msg: &'static str) -> impl Fn(anyhow::Error) -> RpcError {
    move |err| {
        if err.is::<EmailTaken>() {
            RpcError::already_exists(msg)
        } else {
            RpcError::from(err)
        }
    }
}

/// Register and self-service account updates.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/user.UserService/Register", post(register))
        .route("/api/user.UserService/UpdatePassword", post(update_password))
        .route("/api/user.UserService/UpdateEmail", post(update_email))
}

/// Admin-only moderation.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/user.UserService/Ban", post(ban))
        .route("/api/user.UserService/Unban", post(unban))
        .route("/api/user.UserService/Delete", post(delete))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>, RpcError> {
    let username = normalize_email(&payload.username);
    if !is_valid_email(&username) {
        warn!(email = %username, "invalid email");
        return Err(RpcError::invalid_argument("Username is not a valid email"));
    }
    if payload.password.is_empty() {
        return Err(RpcError::invalid_argument("Password is required"));
    }

    // banned accounts keep their row, so look at deleted users too
    match state.users.find_any_by_email(&username).await? {
        Some(existing) if existing.is_banned() => {
            return Err(RpcError::permission_denied("User is banned"));
        }
        Some(_) => return Err(RpcError::already_exists("User already exists")),
        None => {}
    }

    let hash = hash_password(state.passwords.clone(), payload.password).await?;
    state
        .users
        .create(&username, &hash, &RoleSet::from([Role::User]))
        .await
        .map_err(email_taken_as("User already exists"))?;

    let token = state.tokens.issue(&username)?;
    info!(email = %username, "user registered");
    Ok(Json(RegisterResponse { token, username }))
}

/// Authorizes an admin caller and resolves the user the call targets.
async fn admin_and_target(
    state: &AppState,
    ctx: &CallContext,
    username: &str,
) -> Result<(User, User), RpcError> {
    let admin = state
        .access
        .require_any_role(ctx.credential(), RoleSet::from([Role::Admin]))
        .await?;

    let username = normalize_email(username);
    if username.is_empty() {
        return Err(RpcError::invalid_argument("Username is empty"));
    }

    let target = state
        .users
        .find_any_by_email(&username)
        .await?
        .ok_or_else(|| RpcError::not_found("User not found"))?;
    Ok((admin, target))
}

#[instrument(skip_all, fields(
    route = %ctx.meta.route,
    client_ip = %ctx.meta.client_ip,
    user_agent = %ctx.meta.user_agent,
))]
pub async fn ban(
    State(state): State<AppState>,
    ctx: CallContext,
    RpcJson(payload): RpcJson<TargetUserRequest>,
) -> Result<Json<SuccessResponse>, RpcError> {
    let (admin, target) = admin_and_target(&state, &ctx, &payload.username).await?;
    state.users.soft_delete(&target.email).await?;
    info!(admin = %admin.email, target = %target.email, "user banned");
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip_all, fields(
    route = %ctx.meta.route,
    client_ip = %ctx.meta.client_ip,
    user_agent = %ctx.meta.user_agent,
))]
pub async fn unban(
    State(state): State<AppState>,
    ctx: CallContext,
    RpcJson(payload): RpcJson<TargetUserRequest>,
) -> Result<Json<SuccessResponse>, RpcError> {
    let (admin, target) = admin_and_target(&state, &ctx, &payload.username).await?;
    state.users.remove_soft_delete(&target.email).await?;
    info!(admin = %admin.email, target = %target.email, "user unbanned");
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip_all, fields(
    route = %ctx.meta.route,
    client_ip = %ctx.meta.client_ip,
    user_agent = %ctx.meta.user_agent,
))]
pub async fn delete(
    State(state): State<AppState>,
    ctx: CallContext,
    RpcJson(payload): RpcJson<TargetUserRequest>,
) -> Result<Json<SuccessResponse>, RpcError> {
    let (admin, target) = admin_and_target(&state, &ctx, &payload.username).await?;
    state.users.hard_delete(target.id).await?;
    info!(admin = %admin.email, target = %target.email, user_id = %target.id, "user deleted");
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip_all, fields(
    route = %ctx.meta.route,
    client_ip = %ctx.meta.client_ip,
    user_agent = %ctx.meta.user_agent,
))]
pub async fn update_password(
    State(state): State<AppState>,
    ctx: CallContext,
    RpcJson(payload): RpcJson<UpdatePasswordRequest>,
) -> Result<Json<SuccessResponse>, RpcError> {
    let caller = state
        .access
        .require_any_role(ctx.credential(), RoleSet::new())
        .await?;

    let username = normalize_email(&payload.username);
    if username.is_empty() {
        return Err(RpcError::invalid_argument("Username is empty"));
    }
    if payload.new_password.is_empty() {
        return Err(RpcError::invalid_argument("Password is empty"));
    }
    // only the account owner may change its password
    if !caller.email.eq_ignore_ascii_case(&username) {
        return Err(RpcError::not_found("User not found"));
    }

    let valid = verify_password(
        state.passwords.clone(),
        payload.old_password,
        caller.password_hash.clone(),
    )
    .await?;
    if !valid {
        return Err(RpcError::unauthenticated("Invalid password"));
    }

    let hash = hash_password(state.passwords.clone(), payload.new_password).await?;
    state.users.update_password(caller.id, &hash).await?;
    info!(user_id = %caller.id, "password updated");
    Ok(Json(SuccessResponse::ok()))
}

#[instrument(skip_all, fields(
    route = %ctx.meta.route,
    client_ip = %ctx.meta.client_ip,
    user_agent = %ctx.meta.user_agent,
))]
pub async fn update_email(
    State(state): State<AppState>,
    ctx: CallContext,
    RpcJson(payload): RpcJson<UpdateEmailRequest>,
) -> Result<Json<SuccessResponse>, RpcError> {
    let caller = state
        .access
        .require_any_role(ctx.credential(), RoleSet::new())
        .await?;

    let old_email = normalize_email(&payload.old_email);
    let new_email = normalize_email(&payload.new_email);
    if old_email.is_empty() {
        return Err(RpcError::invalid_argument("Old email is empty"));
    }
    if !is_valid_email(&new_email) {
        return Err(RpcError::invalid_argument("New email is not a valid email"));
    }
    if !caller.email.eq_ignore_ascii_case(&old_email) && !caller.roles.contains(&Role::Admin) {
        return Err(RpcError::permission_denied("Cannot change another user's email"));
    }

    let user = state
        .users
        .find_one_by_email(&old_email)
        .await?
        .ok_or_else(|| RpcError::not_found("User not found"))?;
    if state.users.find_any_by_email(&new_email).await?.is_some() {
        return Err(RpcError::already_exists("Email already in use"));
    }

    state
        .users
        .update_email(&user.email, &new_email)
        .await
        .map_err(email_taken_as("Email already in use"))?;
    info!(user_id = %user.id, by = %caller.email, "email updated");
    Ok(Json(SuccessResponse::ok()))
}
