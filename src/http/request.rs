use super::error::HttpProtocolError;
use http::header::{CONNECTION, CONTENT_LENGTH, EXPECT, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use std::fmt;

/// The request target exactly as it appeared on the request line.
///
/// Travels with the request as an extension, since `Uri` normalises some
/// forms and rejects others that httparse accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget(String);

impl RequestTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Query string without the `?` and without any fragment
    pub fn query(&self) -> Option<&str> {
        let without_fragment = self.0.split_once('#').map_or(self.0.as_str(), |(target, _)| target);
        without_fragment.split_once('?').map(|(_, query)| query)
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed request line and headers, owned independently of the read buffer
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub target: RequestTarget,
    /// Best-effort parse of `target`; `/` when `Uri` rejects it
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

/// How the request body is delimited on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Empty,
    Length(u64),
    Chunked,
}

impl RequestHead {
    /// Copies a complete `httparse` request out of the borrowed buffer
    pub(crate) fn from_parsed(req: &httparse::Request<'_, '_>) -> Result<Self, HttpProtocolError> {
        let method = req
            .method
            .ok_or_else(|| HttpProtocolError::HttpParse("missing method".to_string()))?;
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| HttpProtocolError::InvalidRequest(format!("method {method:?}: {e}")))?;

        let target = req
            .path
            .ok_or_else(|| HttpProtocolError::HttpParse("missing request target".to_string()))?;
        let uri = target.parse::<Uri>().unwrap_or_default();
        let target = RequestTarget::new(target);

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            other => {
                return Err(HttpProtocolError::HttpParse(format!(
                    "unsupported HTTP version {other:?}"
                )));
            }
        };

        let mut headers = HeaderMap::with_capacity(req.headers.len());
        for header in req.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
                HttpProtocolError::InvalidRequest(format!("header name {:?}: {e}", header.name))
            })?;
            let value = HeaderValue::from_bytes(header.value).map_err(|e| {
                HttpProtocolError::InvalidRequest(format!("header {:?} value: {e}", header.name))
            })?;
            headers.append(name, value);
        }

        Ok(Self {
            method,
            target,
            uri,
            version,
            headers,
        })
    }

    /// Works out body delimiting; chunked wins over Content-Length
    pub fn framing(&self) -> Result<BodyFraming, HttpProtocolError> {
        let codings: Vec<String> = self
            .headers
            .get_all(TRANSFER_ENCODING)
            .iter()
            .flat_map(|value| comma_tokens(value))
            .collect();

        if !codings.is_empty() {
            return if codings.len() == 1 && codings[0].eq_ignore_ascii_case("chunked") {
                Ok(BodyFraming::Chunked)
            } else {
                Err(HttpProtocolError::UnsupportedTransferEncoding(codings.join(", ")))
            };
        }

        let mut length: Option<u64> = None;
        for token in self
            .headers
            .get_all(CONTENT_LENGTH)
            .iter()
            .flat_map(|value| comma_tokens(value))
        {
            let parsed = token
                .parse::<u64>()
                .ok()
                .filter(|_| token.bytes().all(|b| b.is_ascii_digit()))
                .ok_or_else(|| {
                    HttpProtocolError::InvalidRequest(format!("bad Content-Length {token:?}"))
                })?;
            match length {
                Some(existing) if existing != parsed => {
                    return Err(HttpProtocolError::InvalidRequest(
                        "conflicting Content-Length values".to_string(),
                    ));
                }
                _ => length = Some(parsed),
            }
        }

        Ok(match length {
            None | Some(0) => BodyFraming::Empty,
            Some(n) => BodyFraming::Length(n),
        })
    }

    /// Whether the connection may carry another request after this one
    pub fn keep_alive(&self) -> bool {
        let has_token = |wanted: &str| {
            self.headers
                .get_all(CONNECTION)
                .iter()
                .flat_map(|value| comma_tokens(value))
                .any(|token| token.eq_ignore_ascii_case(wanted))
        };

        if has_token("close") {
            return false;
        }
        match self.version {
            Version::HTTP_10 => has_token("keep-alive"),
            _ => true,
        }
    }

    /// Whether the client waits for `100 Continue` before sending the body
    pub fn expects_continue(&self) -> bool {
        self.version == Version::HTTP_11
            && self
                .headers
                .get(EXPECT)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("100-continue"))
    }
}

fn comma_tokens(value: &HeaderValue) -> Vec<String> {
    String::from_utf8_lossy(value.as_bytes())
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<RequestHead, HttpProtocolError> {
        let mut headers = [httparse::EMPTY_HEADER; 16];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(raw.as_bytes()) {
            Ok(httparse::Status::Complete(_)) => RequestHead::from_parsed(&req),
            other => panic!("unexpected parse result: {other:?}"),
        }
    }

    #[test]
    fn test_parses_extension_method_and_target() {
        let head = parse("PURGE /cache?key=a%20b HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(head.method.as_str(), "PURGE");
        assert_eq!(head.target.as_str(), "/cache?key=a%20b");
        assert_eq!(head.uri.path(), "/cache");
        assert_eq!(head.version, Version::HTTP_11);
    }

    #[test]
    fn test_target_is_kept_verbatim() {
        let head = parse("GET http://Example.com HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(head.target.as_str(), "http://Example.com");

        let head = parse("GET /a<b>?status=201 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(head.target.as_str(), "/a<b>?status=201");
        assert_eq!(head.target.query(), Some("status=201"));
    }

    #[test]
    fn test_target_query_ignores_fragment() {
        assert_eq!(RequestTarget::new("/a?q=1#frag").query(), Some("q=1"));
        assert_eq!(RequestTarget::new("/a#frag?q=1").query(), None);
        assert_eq!(RequestTarget::new("http://x.test/p?status=201").query(), Some("status=201"));
        assert_eq!(RequestTarget::new("/plain").query(), None);
    }

    #[test]
    fn test_framing() {
        let head = parse("GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(head.framing().unwrap(), BodyFraming::Empty);

        let head = parse("POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n").unwrap();
        assert_eq!(head.framing().unwrap(), BodyFraming::Length(5));

        let head = parse(
            "POST / HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n",
        )
        .unwrap();
        assert_eq!(head.framing().unwrap(), BodyFraming::Chunked);
    }

    #[test]
    fn test_framing_rejects_bad_lengths() {
        let head = parse("POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\n")
            .unwrap();
        assert!(matches!(
            head.framing(),
            Err(HttpProtocolError::InvalidRequest(_))
        ));

        let head = parse("POST / HTTP/1.1\r\nContent-Length: +5\r\n\r\n").unwrap();
        assert!(head.framing().is_err());

        let head = parse("POST / HTTP/1.1\r\nTransfer-Encoding: gzip, chunked\r\n\r\n").unwrap();
        assert!(matches!(
            head.framing(),
            Err(HttpProtocolError::UnsupportedTransferEncoding(_))
        ));
    }

    #[test]
    fn test_keep_alive_rules() {
        assert!(parse("GET / HTTP/1.1\r\n\r\n").unwrap().keep_alive());
        assert!(!parse("GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap().keep_alive());
        assert!(!parse("GET / HTTP/1.0\r\n\r\n").unwrap().keep_alive());
        assert!(parse("GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n").unwrap().keep_alive());
    }

    #[test]
    fn test_expect_continue() {
        assert!(parse("PUT / HTTP/1.1\r\nExpect: 100-continue\r\n\r\n").unwrap().expects_continue());
        assert!(!parse("PUT / HTTP/1.0\r\nExpect: 100-continue\r\n\r\n").unwrap().expects_continue());
        assert!(!parse("PUT / HTTP/1.1\r\n\r\n").unwrap().expects_continue());
    }
}
