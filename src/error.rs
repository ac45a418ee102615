//! RPC error envelope shared by every service.
//!
//! Errors are rendered the way Twirp clients expect them:
//! `{"code": "not_found", "msg": "User not found"}` with the matching HTTP
//! status. This is the only place errors get logged.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, warn};

use crate::auth::access::AccessError;
use crate::auth::jwt::TokenError;
use crate::auth::password::PasswordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    Malformed,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::Malformed => "malformed",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::NotFound => "not_found",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::Internal => "internal",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidArgument | ErrorCode::Malformed => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{}: {msg}", .code.as_str())]
pub struct RpcError {
    pub code: ErrorCode,
    pub msg: String,
}

impl RpcError {
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, msg)
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Malformed, msg)
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, msg)
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, msg)
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, msg)
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::Internal, err.to_string())
    }
}

impl From<anyhow::Error> for RpcError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        Self::new(ErrorCode::Internal, format!("{err:#}"))
    }
}

impl From<PasswordError> for RpcError {
    fn from(err: PasswordError) -> Self {
        Self::internal(err)
    }
}

impl From<TokenError> for RpcError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid | TokenError::Expired => Self::unauthenticated(err.to_string()),
            TokenError::Configuration(_) | TokenError::Signing(_) => Self::internal(err),
        }
    }
}

impl From<AccessError> for RpcError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::MissingCredential | AccessError::Token(_) => {
                Self::unauthenticated(err.to_string())
            }
            AccessError::UserNotFound | AccessError::InsufficientRole | AccessError::ForbiddenRole => {
                Self::permission_denied(err.to_string())
            }
            AccessError::LookupFailure(e) => Self::from(e),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let code = self.code.as_str();
        if self.code == ErrorCode::Internal {
            error!(code, msg = %self.msg, "rpc error");
        } else {
            warn!(code, msg = %self.msg, "rpc error");
        }

        // internal details stay in the logs
        let msg = match self.code {
            ErrorCode::Internal => "internal error".to_string(),
            _ => self.msg,
        };
        (self.code.status(), Json(json!({ "code": code, "msg": msg }))).into_response()
    }
}

/// `Json` whose rejection uses the RPC error envelope.
pub struct RpcJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for RpcJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RpcError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| RpcError::malformed(rejection.body_text()))?;
        Ok(Self(value))
    }
}
