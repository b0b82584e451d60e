use super::details::{RequestDetails, header_values};
use super::failure::EchoFailure;
use crate::http::{Body, RequestTarget};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Request, Response, StatusCode};
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

/// Codes accepted by the `status` query parameter; 500 is the deliberate upper bound
pub const STATUS_RANGE: RangeInclusive<i64> = 100..=500;

/// Answers any request with a JSON description of it.
///
/// `?sleep=<ms>` delays this request only; `?status=<code>` forces the status.
/// Every failure is turned into its plain-text response here, so the caller
/// always gets something to write.
pub async fn handle<S>(request: Request<Body<'_, S>>) -> Response<Bytes>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match echo_request(request).await {
        Ok(response) => response,
        Err(failure) => {
            if failure.is_client_error() {
                info!(%failure, "Rejecting request");
            } else {
                error!(%failure, "Request failed");
            }
            failure.into_response()
        }
    }
}

async fn echo_request<S>(request: Request<Body<'_, S>>) -> Result<Response<Bytes>, EchoFailure>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (parts, mut body) = request.into_parts();
    let method = parts.method.to_string();
    let target = parts
        .extensions
        .get::<RequestTarget>()
        .cloned()
        .unwrap_or_else(|| RequestTarget::new(parts.uri.to_string()));
    let path = target.to_string();
    info!(%method, %path, "Got request");

    let query = target.query();

    if let Some(raw) = query_param(query, "sleep") {
        let duration = parse_sleep(&raw).inspect_err(|failure| {
            debug!(sleep = %raw, "{failure}");
        })?;
        tokio::time::sleep(duration).await;
    }

    let status = match query_param(query, "status") {
        Some(raw) => parse_status(&raw).inspect_err(|failure| {
            debug!(status = %raw, "{failure}");
        })?,
        None => StatusCode::OK,
    };

    let payload = body.read_to_end().await.map_err(|e| {
        debug!(error = %e, "Error reading request body");
        EchoFailure::BodyRead
    })?;

    let details = RequestDetails {
        method,
        path,
        header: header_values(&parts.headers),
        body: String::from_utf8_lossy(&payload).into_owned(),
    };

    let json = serde_json::to_vec(&details).map_err(|e| {
        debug!(error = %e, "Error marshalling request details to JSON");
        EchoFailure::Marshal
    })?;

    let mut response = Response::new(Bytes::from(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// First value of `key` in a query string, percent-decoded; empty counts as absent
pub fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Parses a `sleep` value: a non-negative number of milliseconds
pub fn parse_sleep(raw: &str) -> Result<Duration, EchoFailure> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| EchoFailure::InvalidSleep)
}

/// Parses a `status` value and checks it against [`STATUS_RANGE`]
pub fn parse_status(raw: &str) -> Result<StatusCode, EchoFailure> {
    let code = raw
        .parse::<i64>()
        .map_err(|_| EchoFailure::InvalidStatusFormat)?;
    if !STATUS_RANGE.contains(&code) {
        return Err(EchoFailure::StatusOutOfRange);
    }
    u16::try_from(code)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or(EchoFailure::StatusOutOfRange)
}
