use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod activities;
mod admin;
mod alerts;
mod auth;
mod config;
mod domain;
mod error;
mod measurements;
mod state;
mod stats;
#[cfg(test)]
mod testutil;
mod users;
mod validate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "glicotrack=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    // embedded migrations; a data file we cannot migrate is unusable
    state::MIGRATOR
        .run(&app_state.db().await)
        .await
        .map_err(|e| anyhow::anyhow!(e).context("run migrations"))?;

    let addr: SocketAddr = format!("{}:{}", app_state.config.host, app_state.config.port).parse()?;

    let app = Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(measurements::router())
        .merge(activities::router())
        .merge(alerts::router())
        .merge(admin::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        );

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
