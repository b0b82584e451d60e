use crate::http::plain_text;
use bytes::Bytes;
use http::{Response, StatusCode};

/// Per-request failures; `Display` is the exact body sent to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EchoFailure {
    #[error("Error parsing sleep duration")]
    InvalidSleep,
    #[error("Invalid status code format")]
    InvalidStatusFormat,
    #[error("Invalid status code range")]
    StatusOutOfRange,
    #[error("Error reading request body")]
    BodyRead,
    #[error("Error marshalling request body")]
    Marshal,
    #[error("Error writing response")]
    WriteResponse,
}

impl EchoFailure {
    /// Status code this failure is answered with
    pub fn status_code(self) -> StatusCode {
        match self {
            EchoFailure::InvalidSleep | EchoFailure::InvalidStatusFormat => {
                StatusCode::BAD_REQUEST
            }
            EchoFailure::StatusOutOfRange => StatusCode::NOT_FOUND,
            EchoFailure::BodyRead | EchoFailure::Marshal | EchoFailure::WriteResponse => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the client caused it, as opposed to an I/O or internal fault
    pub fn is_client_error(self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn into_response(self) -> Response<Bytes> {
        plain_text(self.status_code(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_status_and_message() {
        let cases = [
            (EchoFailure::InvalidSleep, 400, "Error parsing sleep duration"),
            (EchoFailure::InvalidStatusFormat, 400, "Invalid status code format"),
            (EchoFailure::StatusOutOfRange, 404, "Invalid status code range"),
            (EchoFailure::BodyRead, 500, "Error reading request body"),
            (EchoFailure::Marshal, 500, "Error marshalling request body"),
            (EchoFailure::WriteResponse, 500, "Error writing response"),
        ];

        for (failure, status, message) in cases {
            let response = failure.into_response();
            assert_eq!(response.status().as_u16(), status);
            assert_eq!(response.body().as_ref(), message.as_bytes());
        }
    }

    #[test]
    fn test_client_errors() {
        assert!(EchoFailure::InvalidSleep.is_client_error());
        assert!(EchoFailure::StatusOutOfRange.is_client_error());
        assert!(!EchoFailure::BodyRead.is_client_error());
    }
}
