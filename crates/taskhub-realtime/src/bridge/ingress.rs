//! Local HTTP ingress for decrypted push payloads.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{NotifyError, NotifyResult};

use super::push::PushReceiver;

#[derive(Debug, Serialize)]
struct IngressResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

struct IngressError(NotifyError);

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "Push ingress rejected payload");
        let body = IngressResponse {
            status: "error",
            error: Some(self.0.to_string()),
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

/// Router exposing `POST /push`.
pub fn router(receiver: Arc<PushReceiver>) -> Router {
    Router::new()
        .route("/push", post(receive_push))
        .with_state(receiver)
}

async fn receive_push(
    State(receiver): State<Arc<PushReceiver>>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngressResponse>), IngressError> {
    let accepted = receiver.receive(&body).await.map_err(IngressError)?;
    let (status, label) = if accepted {
        (StatusCode::ACCEPTED, "accepted")
    } else {
        (StatusCode::OK, "ignored")
    };
    Ok((
        status,
        Json(IngressResponse {
            status: label,
            error: None,
        }),
    ))
}

/// Serve the ingress on `addr` until `cancel` fires.
pub async fn serve(
    addr: &str,
    receiver: Arc<PushReceiver>,
    cancel: CancellationToken,
) -> NotifyResult<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| NotifyError::platform_fatal(format!("invalid ingress address '{addr}': {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| NotifyError::platform_fatal(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, "Push ingress listening");
    axum::serve(listener, router(receiver))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| NotifyError::platform(format!("push ingress failed: {e}")))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::bridge::delivery;
    use crate::notification::notifier::TagCollapsingNotifier;
    use crate::notification::persistence::MemoryStorage;
    use crate::notification::store::NotificationStore;

    fn push(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/push")
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn test_push_route_status_codes() {
        let store = Arc::new(NotificationStore::load(
            Arc::new(MemoryStorage::new()),
            "history",
            20,
        ));
        let (handle, bridge) = delivery::channel(4, store);
        let receiver = Arc::new(PushReceiver::new(
            Arc::new(TagCollapsingNotifier::new()),
            handle,
        ));
        let app = router(receiver);

        let response = app.clone().oneshot(push(r#"{"title":"x"}"#)).await.expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app.clone().oneshot(push("")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        drop(bridge);
        let response = app.oneshot(push("late")).await.expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
