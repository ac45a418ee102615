use std::time::Duration;

use axum::{http::Request, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Span;

use crate::auth::extractors::RequestMeta;
use crate::config::ServerConfig;
use crate::state::AppState;
use crate::{auth, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let meta = RequestMeta::new(req.uri().path(), req.headers());
                    tracing::info_span!(
                        "rpc_request",
                        method = %req.method(),
                        route = %meta.route,
                        client_ip = %meta.client_ip,
                        user_agent = %meta.user_agent,
                        status = tracing::field::Empty,
                    )
                })
                .on_response(|res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    let elapsed_ms = latency.as_millis() as u64;
                    if status.is_server_error() {
                        tracing::error!(%status, elapsed_ms, "response");
                    } else {
                        tracing::info!(%status, elapsed_ms, "response");
                    }
                }),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "Message": "I'm alive" }))
}

pub async fn serve(app: Router, server: &ServerConfig) -> anyhow::Result<()> {
    let addr = server.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
