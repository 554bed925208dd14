use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

pub fn send_response<T: Serialize>(
    code: StatusCode,
    data: Option<T>,
    message: impl Into<String>,
    request_id: Option<String>,
) -> Response {
    let body = ApiResponse {
        success: code.is_success(),
        message: message.into(),
        data,
        request_id,
    };
    (code, Json(body)).into_response()
}

pub fn send_error(
    code: StatusCode,
    message: impl Into<String>,
    err: Option<&dyn std::error::Error>,
    request_id: Option<String>,
) -> Response {
    let message = message.into();
    let error = err.map(|e| {
        error!(
            error = %e,
            %message,
            request_id = request_id.as_deref().unwrap_or(""),
            "error response"
        );
        e.to_string()
    });
    let body = ErrorResponse {
        success: false,
        message,
        error,
        request_id,
    };
    (code, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_envelope_shape() {
        let res = send_response(StatusCode::OK, Some("x"), "ok", Some("req-1".into()));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );
        let body = json(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "x");
        assert_eq!(body["request_id"], "req-1");
    }

    #[tokio::test]
    async fn success_flag_follows_status() {
        let res = send_response::<()>(StatusCode::ACCEPTED, None, "queued", None);
        let body = json(res).await;
        assert_eq!(body["success"], true);
        assert!(body.get("data").is_none());
        assert!(body.get("request_id").is_none());

        let res = send_response::<()>(StatusCode::NOT_FOUND, None, "missing", None);
        assert_eq!(json(res).await["success"], false);
    }

    #[tokio::test]
    async fn error_envelope_carries_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let res = send_error(StatusCode::INTERNAL_SERVER_ERROR, "failed", Some(&cause), None);
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "failed");
        assert_eq!(body["error"], "boom");
    }
}
