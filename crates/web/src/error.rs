//! Error types shared by the router, the dispatcher and request handlers.
//!
//! Handlers and middleware return [`BoxError`]; the dispatcher hands any such error to the
//! configured [`ErrorHandler`](crate::ErrorHandler), which recognises [`HttpError`] and maps
//! everything else to `500 Internal Server Error`.

use http::{Method, StatusCode};
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// The error type returned by handlers and middleware.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// An error carrying the HTTP status code and message that should be sent to the client.
///
/// The optional internal error keeps the underlying cause for logging; it is never shown to
/// the client unless the mux runs in debug mode.
#[derive(Debug)]
pub struct HttpError {
    code: StatusCode,
    message: String,
    internal: Option<BoxError>,
}

macro_rules! http_error_constructor {
    ($name:ident, $code:ident) => {
        #[doc = concat!("Creates an [`HttpError`] with status `", stringify!($code), "`.")]
        #[inline]
        pub fn $name() -> Self {
            Self::new(StatusCode::$code)
        }
    };
}

impl HttpError {
    /// Creates an error whose message is the canonical reason phrase of `code`.
    pub fn new(code: StatusCode) -> Self {
        let message = code.canonical_reason().unwrap_or_default().to_owned();
        Self { code, message, internal: None }
    }

    pub fn with_message(code: StatusCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), internal: None }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<BoxError>) -> Self {
        self.internal = Some(internal.into());
        self
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn internal(&self) -> Option<&BoxError> {
        self.internal.as_ref()
    }

    http_error_constructor!(bad_request, BAD_REQUEST);
    http_error_constructor!(unauthorized, UNAUTHORIZED);
    http_error_constructor!(forbidden, FORBIDDEN);
    http_error_constructor!(not_found, NOT_FOUND);
    http_error_constructor!(method_not_allowed, METHOD_NOT_ALLOWED);
    http_error_constructor!(request_timeout, REQUEST_TIMEOUT);
    http_error_constructor!(conflict, CONFLICT);
    http_error_constructor!(payload_too_large, PAYLOAD_TOO_LARGE);
    http_error_constructor!(unsupported_media_type, UNSUPPORTED_MEDIA_TYPE);
    http_error_constructor!(too_many_requests, TOO_MANY_REQUESTS);
    http_error_constructor!(internal_server_error, INTERNAL_SERVER_ERROR);
    http_error_constructor!(bad_gateway, BAD_GATEWAY);
    http_error_constructor!(service_unavailable, SERVICE_UNAVAILABLE);
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.internal {
            None => write!(f, "code={}, message={}", self.code.as_u16(), self.message),
            Some(internal) => {
                write!(f, "code={}, message={}, internal={}", self.code.as_u16(), self.message, internal)
            }
        }
    }
}

impl Error for HttpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.internal.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Errors detected while registering routes. They are configuration errors: a mux that
/// fails to build must not serve requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("empty segment in route pattern '{pattern}'")]
    EmptySegment { pattern: String },

    #[error("parameter without a name in route pattern '{pattern}'")]
    EmptyParamName { pattern: String },

    #[error("invalid segment '{segment}' in route pattern '{pattern}'")]
    InvalidSegment { pattern: String, segment: String },

    #[error("duplicate parameter '{name}' in route pattern '{pattern}'")]
    DuplicateParam { pattern: String, name: String },

    #[error("more than one catch-all in route pattern '{pattern}'")]
    DuplicateCatchAll { pattern: String },

    #[error("catch-all must be the last segment of route pattern '{pattern}'")]
    CatchAllNotLast { pattern: String },

    #[error("route {method} '{pattern}' conflicts with registered route '{existing}'")]
    Conflict { method: Method, pattern: String, existing: String },
}

/// Errors of reverse URL generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReverseError {
    #[error("no route named '{name}'")]
    UnknownRoute { name: String },

    #[error("route '{name}' needs {expected} parameters, {given} given")]
    MissingParams { name: String, expected: usize, given: usize },
}

/// Errors raised by the response helpers of [`Context`](crate::Context).
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("invalid redirect status code {0}")]
    InvalidRedirectCode(StatusCode),

    #[error("renderer not registered")]
    RendererNotRegistered,

    #[error("invalid header value: {source}")]
    InvalidHeaderValue {
        #[from]
        source: http::header::InvalidHeaderValue,
    },

    #[error("json encode error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}
