use std::{net::SocketAddr, time::Duration};

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::Span;

use crate::config::AppConfig;
use crate::state::AppState;
use crate::storage::PUBLIC_PREFIX;
use crate::{auth, users};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.frontend_url);
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .merge(users::router(state.config.max_photo_bytes))
        .merge(auth::router())
        .route("/health", get(|| async { "ok" }))
        .nest_service(PUBLIC_PREFIX, uploads)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(record_response),
        )
}

fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    )
}

fn record_response(res: &Response<Body>, latency: Duration, span: &Span) {
    let status = res.status();
    span.record("status", status.as_u16());
    span.record("latency_ms", latency.as_millis() as u64);
    match status.as_u16() {
        500.. => tracing::error!(%status, "request failed"),
        400..=499 => tracing::warn!(%status, "request rejected"),
        _ => tracing::debug!(%status, "request served"),
    }
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => base.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, frontend_url, "invalid FRONTEND_URL; cross-origin requests disabled");
            base
        }
    }
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
