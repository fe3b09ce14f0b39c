//! Error types for the endpoint protocol engine.
//!
//! Every non-2xx response is classified into one of a fixed set of error
//! kinds by [`classify`], a pure function of the response alone. Local
//! (non-HTTP) failure modes get their own variants.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenience type alias for Results using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type covering every failure mode of the endpoint engine.
#[derive(Error, Debug)]
pub enum Error {
    /// The server rejected the request content (400).
    #[error("invalid data: {message}")]
    InvalidData {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The request lacked valid credentials (401).
    #[error("authentication failed: {message}")]
    Authentication { status: u16, message: String },

    /// The credentials were valid but do not grant access (403).
    #[error("authorization denied: {message}")]
    Authorization { status: u16, message: String },

    /// The resource does not exist (404, 410).
    #[error("not found: {message}")]
    NotFound { status: u16, message: String },

    /// A version conflict, including failed optimistic-concurrency
    /// preconditions (409, 412).
    #[error("conflict: {message}")]
    Conflict { status: u16, message: String },

    /// The requested element range cannot be served (416). Distinct from
    /// [`Error::NotFound`] so the streaming loop can treat it as a benign
    /// empty poll.
    #[error("range not satisfiable: {message}")]
    RangeNotSatisfiable { status: u16, message: String },

    /// Any other non-2xx status, or a transport-level failure with no
    /// status at all.
    #[error("transport error: {message}")]
    Transport {
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        message: String,
    },

    /// No link or link template with the given relation type exists, even
    /// after lazy discovery.
    #[error("no link with relation type {rel:?}")]
    LinkNotFound {
        /// The relation type that could not be resolved.
        rel: String,
    },

    /// Encoding or decoding an entity failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A URI template could not be expanded.
    #[error("invalid uri template: {0}")]
    InvalidTemplate(String),

    /// A URI could not be parsed or joined.
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// Building the underlying HTTP client failed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The HTTP status code behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::InvalidData { status, .. }
            | Error::Authentication { status, .. }
            | Error::Authorization { status, .. }
            | Error::NotFound { status, .. }
            | Error::Conflict { status, .. }
            | Error::RangeNotSatisfiable { status, .. } => Some(*status),
            Error::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Classify a non-2xx response into an [`Error`] kind.
///
/// Pure function of the response status and body. The message is taken from
/// a JSON `message` field when the body has one, otherwise synthesized as
/// `"<status> <reason phrase>"`.
pub fn classify(status: StatusCode, body: &[u8]) -> Error {
    let message = extract_message(status, body);
    let code = status.as_u16();
    match code {
        400 => Error::InvalidData {
            status: code,
            message,
        },
        401 => Error::Authentication {
            status: code,
            message,
        },
        403 => Error::Authorization {
            status: code,
            message,
        },
        404 | 410 => Error::NotFound {
            status: code,
            message,
        },
        // 412 is the precondition-failure status guarded writes produce on a
        // lost update; it is the same Conflict kind as 409.
        409 | 412 => Error::Conflict {
            status: code,
            message,
        },
        416 => Error::RangeNotSatisfiable {
            status: code,
            message,
        },
        _ => Error::Transport {
            status: Some(code),
            message,
        },
    }
}

/// Extract a human-readable message from an error response body.
fn extract_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            )
        })
}
