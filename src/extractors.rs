use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tower_http::request_id::RequestId;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id assigned by the request-id middleware, if any.
pub struct ReqId(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ReqId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.header_value())
            .or_else(|| parts.headers.get(REQUEST_ID_HEADER))
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(ReqId(id))
    }
}
