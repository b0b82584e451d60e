use bytes::{BufMut, Bytes, BytesMut};
use http::header::{CONTENT_TYPE, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use http::{Response, StatusCode, Version};

/// A response plus the request facts that decide how it goes on the wire
#[derive(Debug)]
pub struct Outgoing {
    pub response: Response<Bytes>,
    pub request_version: Version,
    pub head_request: bool,
    pub close: bool,
}

/// Builds a plain-text response whose body is exactly `message`
pub fn plain_text(status: StatusCode, message: &str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::copy_from_slice(message.as_bytes()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Encodes `outgoing` into `dst`, returning whether the connection must close.
///
/// Informational codes other than 101 are written as an interim head followed
/// by a final `200` carrying the body. 101, 204 and 304 never carry a body.
pub fn encode(outgoing: Outgoing, dst: &mut BytesMut) -> bool {
    let Outgoing {
        response,
        request_version,
        head_request,
        mut close,
    } = outgoing;
    let (parts, body) = response.into_parts();

    let status = parts.status;
    let (status, body_allowed) = if status == StatusCode::SWITCHING_PROTOCOLS {
        close = true;
        (status, false)
    } else if status.is_informational() {
        if request_version != Version::HTTP_10 {
            encode_interim(status, dst);
        }
        (StatusCode::OK, true)
    } else if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        (status, false)
    } else {
        (status, true)
    };

    encode_status_line(status, dst);
    for (name, value) in parts.headers.iter() {
        dst.put_slice(name.as_str().as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
    if body_allowed {
        dst.put_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
    }
    if close {
        dst.put_slice(b"connection: close\r\n");
    }
    dst.put_slice(b"\r\n");

    if body_allowed && !head_request {
        dst.put_slice(&body);
    }
    close
}

/// Bare interim head, e.g. `100 Continue`
pub fn encode_interim(status: StatusCode, dst: &mut BytesMut) {
    encode_status_line(status, dst);
    dst.put_slice(b"\r\n");
}

fn encode_status_line(status: StatusCode, dst: &mut BytesMut) {
    let reason = status.canonical_reason().unwrap_or("");
    dst.put_slice(format!("HTTP/1.1 {} {}\r\n", status.as_u16(), reason).as_bytes());
}
