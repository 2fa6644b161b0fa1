use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app::REQUEST_ID_HEADER;

/// The `x-request-id` of the current request, as set by
/// [`AxumApp::with_request_tracing`](crate::AxumApp::with_request_tracing).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestId(pub Option<String>);

impl RequestId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Ok(Self(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> RequestId {
        let (mut parts, _) = req.into_parts();
        RequestId::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_header_when_present() {
        let req = Request::builder().header("x-request-id", "req-42").body(()).unwrap();
        assert_eq!(extract(req).await.as_deref(), Some("req-42"));

        let req = Request::builder().body(()).unwrap();
        assert_eq!(extract(req).await, RequestId(None));
    }
}
