use std::{any::Any, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    config::ServerConfig,
    extractors::{ReqId, REQUEST_ID_HEADER},
    health,
    response::send_error,
    state::AppState,
};

/// Marks a response built by the panic handler, which has no access to the request.
#[derive(Debug, Clone, Copy)]
struct Panicked;

fn handle_panic(_err: Box<dyn Any + Send + 'static>) -> Response {
    error!("handler panicked");
    let mut res = send_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        None,
        None,
    );
    res.extensions_mut().insert(Panicked);
    res
}

/// Bounds the request by `timeout` and puts the request id on error
/// envelopes produced outside a handler.
async fn guard_request(
    State(timeout): State<Duration>,
    ReqId(request_id): ReqId,
    req: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(timeout, next.run(req)).await {
        Ok(res) if res.extensions().get::<Panicked>().is_some() => send_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            None,
            request_id,
        ),
        Ok(res) => res,
        Err(_) => {
            warn!(
                ?timeout,
                request_id = request_id.as_deref().unwrap_or(""),
                "request timed out"
            );
            send_error(
                StatusCode::REQUEST_TIMEOUT,
                "Request timeout",
                None,
                request_id,
            )
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let request_timeout = state.config.server.request_timeout;
    with_middleware(
        Router::new()
            .merge(health::handlers::health_routes())
            .with_state(state),
        request_timeout,
    )
}

fn with_middleware(router: Router, request_timeout: Duration) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(request_timeout, guard_request))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let request_id = req
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_owned();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        %request_id,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let duration = format!("{latency:?}");
                        if status.is_server_error() {
                            tracing::error!(%status, %duration, "response");
                        } else {
                            tracing::info!(%status, %duration, "response");
                        }
                    },
                ),
        )
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Serves until SIGINT/SIGTERM, then drains in-flight requests for at most
/// `shutdown_timeout`.
pub async fn serve(app: Router, cfg: &ServerConfig) -> anyhow::Result<()> {
    let addr = cfg.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("starting HTTP server on {}", listener.local_addr()?);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        res = &mut server => {
            res.context("server task panicked")?.context("server error")?;
            warn!("server stopped without a shutdown signal");
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    info!("shutting down server...");
    let _ = stop_tx.send(());

    match tokio::time::timeout(cfg.shutdown_timeout, server).await {
        Ok(res) => {
            res.context("server task panicked")?.context("server error")?;
            info!("server exited properly");
            Ok(())
        }
        Err(_) => {
            error!(timeout = ?cfg.shutdown_timeout, "server forced to shutdown");
            anyhow::bail!("in-flight requests did not drain within {:?}", cfg.shutdown_timeout)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::health::services::tests::FakeProbe;

    fn app(healthy: bool) -> Router {
        build_app(AppState::fake(Arc::new(FakeProbe { healthy })))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Value) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let header = res
            .headers()
            .get(REQUEST_ID_HEADER)
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, header, body)
    }

    #[tokio::test]
    async fn healthcheck_ok() {
        let (status, header, body) = get(app(true), "/healthcheck").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Health check successful");
        assert_eq!(body["data"]["status"], "healthy");
        assert!(body.get("error").is_none());

        let header = header.expect("request id propagated");
        assert_eq!(body["request_id"], header.as_str());
    }

    #[tokio::test]
    async fn healthcheck_store_down() {
        let (status, _, body) = get(app(false), "/healthcheck").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Health check failed");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("unhealthy - database connection failed"));
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn incoming_request_id_is_echoed() {
        let res = app(true)
            .oneshot(
                Request::builder()
                    .uri("/healthcheck")
                    .header(REQUEST_ID_HEADER, "trace-abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.headers()[REQUEST_ID_HEADER], "trace-abc");
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["request_id"], "trace-abc");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, _, _) = get(app(true), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn panic_handler_marks_response() {
        let res = handle_panic(Box::new("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.extensions().get::<Panicked>().is_some());
    }

    fn misbehaving_app() -> Router {
        let routes = Router::new()
            .route(
                "/slow",
                axum::routing::get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route(
                "/boom",
                axum::routing::get(|| async {
                    if true {
                        panic!("boom");
                    }
                    "unreachable"
                }),
            );
        with_middleware(routes, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn timeout_is_an_error_envelope_with_request_id() {
        let (status, header, body) = get(misbehaving_app(), "/slow").await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Request timeout");
        let header = header.expect("request id propagated");
        assert_eq!(body["request_id"], header.as_str());
    }

    #[tokio::test]
    async fn panic_is_an_error_envelope_with_request_id() {
        let (status, header, body) = get(misbehaving_app(), "/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
        let header = header.expect("request id propagated");
        assert_eq!(body["request_id"], header.as_str());
    }
}
