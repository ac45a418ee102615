use std::sync::Arc;

use crate::auth::extractors::BearerToken;
use crate::auth::jwt::{CredentialIssuer, TokenError};
use crate::auth::roles::RoleSet;
use crate::users::repo::UserDirectory;
use crate::users::repo_types::User;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("token is missing")]
    MissingCredential,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("user lookup failed: {0}")]
    LookupFailure(anyhow::Error),
    #[error("user not found")]
    UserNotFound,
    #[error("user does not have the required role")]
    InsufficientRole,
    #[error("user has a forbidden role")]
    ForbiddenRole,
}

/// Role decision applied once the caller is resolved.
///
/// The two variants are opposites and an empty set authorizes any
/// authenticated user in both.
#[derive(Debug, Clone)]
pub enum RolePolicy {
    /// Caller must hold at least one of the roles.
    RequireAny(RoleSet),
    /// Caller must hold none of the roles. Not used by any handler.
    #[allow(dead_code)]
    ForbidAny(RoleSet),
}

impl RolePolicy {
    fn check(&self, user: &User) -> Result<(), AccessError> {
        match self {
            RolePolicy::RequireAny(roles) if !roles.is_empty() && !user.roles.intersects(roles) => {
                Err(AccessError::InsufficientRole)
            }
            RolePolicy::ForbidAny(roles) if user.roles.intersects(roles) => {
                Err(AccessError::ForbiddenRole)
            }
            _ => Ok(()),
        }
    }
}

/// Binds token verification, user resolution and role policy together.
///
/// Every call re-verifies the token and re-reads the user; nothing is cached.
#[derive(Clone)]
pub struct AccessControl {
    tokens: Arc<dyn CredentialIssuer>,
    users: Arc<dyn UserDirectory>,
}

impl AccessControl {
    pub fn new(tokens: Arc<dyn CredentialIssuer>, users: Arc<dyn UserDirectory>) -> Self {
        Self { tokens, users }
    }

    pub async fn require_any_role(
        &self,
        credential: Option<&BearerToken>,
        roles: RoleSet,
    ) -> Result<User, AccessError> {
        self.authorize(credential, &RolePolicy::RequireAny(roles)).await
    }

    #[allow(dead_code)]
    pub async fn forbid_any_role(
        &self,
        credential: Option<&BearerToken>,
        roles: RoleSet,
    ) -> Result<User, AccessError> {
        self.authorize(credential, &RolePolicy::ForbidAny(roles)).await
    }

    pub async fn authorize(
        &self,
        credential: Option<&BearerToken>,
        policy: &RolePolicy,
    ) -> Result<User, AccessError> {
        let token = credential
            .map(BearerToken::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(AccessError::MissingCredential)?;

        let verified = self.tokens.verify(token)?;

        let user = self
            .users
            .find_one_by_email(&verified.subject)
            .await
            .map_err(AccessError::LookupFailure)?
            .filter(|u| u.email.eq_ignore_ascii_case(&verified.subject))
            .ok_or(AccessError::UserNotFound)?;

        policy.check(&user)?;
        Ok(user)
    }
}
