use std::convert::Infallible;
use std::fmt;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

/// Raw bearer token as sent by the caller. Opaque outside `auth::jwt`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// keep tokens out of logs
impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

/// Identifying request metadata recorded for logging.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub route: String,
    pub user_agent: String,
    pub client_ip: String,
}

impl RequestMeta {
    /// Shared by the `CallContext` extractor and the request trace span.
    pub fn new(path: &str, headers: &HeaderMap) -> Self {
        let client_ip = header_str(headers, "x-forwarded-for")
            .or_else(|| header_str(headers, "remote-addr"))
            .unwrap_or("unknown");
        Self {
            route: path.to_string(),
            user_agent: header_str(headers, header::USER_AGENT.as_str())
                .unwrap_or("unknown")
                .to_string(),
            client_ip: client_ip.to_string(),
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.uri.path(), &parts.headers)
    }
}

/// Everything the transport propagates to a handler about the caller.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub credential: Option<BearerToken>,
    pub meta: RequestMeta,
}

impl CallContext {
    pub fn credential(&self) -> Option<&BearerToken> {
        self.credential.as_ref()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reads `Authorization: Bearer <token>`; a bare token is accepted as well.
fn bearer_from_headers(headers: &HeaderMap) -> Option<BearerToken> {
    let value = header_str(headers, header::AUTHORIZATION.as_str())?;
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };
    (!token.is_empty()).then(|| BearerToken::new(token.to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for CallContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CallContext {
            credential: bearer_from_headers(&parts.headers),
            meta: RequestMeta::from_parts(parts),
        })
    }
}
