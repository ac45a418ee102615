use crate::state::AppState;
use axum::Router;

pub mod access;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod roles;
pub(crate) mod services;

#[cfg(test)]
pub(crate) mod fakes;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
