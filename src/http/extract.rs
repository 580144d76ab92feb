//! Request URL extraction

use crate::envelope::RequestUrl;
use crate::error::GatewayError;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::HOST;
use axum::http::request::Parts;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Path segments (context, class, instance id) are limited to these characters
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 404 for a URL no route serves
pub fn unrecognized(url: &RequestUrl) -> GatewayError {
    GatewayError::NotFound(format!("The URL ({}) is not recognized.", url.full_url()))
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestUrl
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = header(parts, HOST.as_str())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost")
            .to_string();
        let scheme = header(parts, FORWARDED_PROTO).unwrap_or("http").to_string();

        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| GatewayError::BadRequest(e.body_text()))?;

        Ok(RequestUrl::new(&scheme, &host, parts.uri.path(), parts.uri.query()).with_pairs(pairs))
    }
}
