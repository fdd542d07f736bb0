use std::{net::SocketAddr, time::Duration};

use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::CorsLayer, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::extractors::auth_gate;
use crate::state::AppState;
use crate::{auth, pets};

pub const SERVER_HEADER: &str = "PetAgency/0.1";

pub fn build_app(state: AppState) -> Router {
    let secure = Router::new()
        .merge(pets::secure_router())
        .merge(auth::secure_router())
        .route_layer(middleware::from_fn_with_state(state.keys.clone(), auth_gate));

    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let routes = Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        .route("/health", get(|| async { "ok" }))
        .merge(auth::router())
        .merge(pets::router())
        .nest("/secure", secure)
        .with_state(state);
    with_layers(routes, timeout)
}

/// Timeout, CORS, `Server` header and request tracing, outermost last.
fn with_layers(routes: Router, timeout: Duration) -> Router {
    routes
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(SERVER_HEADER),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

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
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
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
