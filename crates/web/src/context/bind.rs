//! Request binding and validation.
//!
//! [`Context::bind`] picks the decoder from the request: an empty body reads the query
//! string with `serde_qs`, otherwise the `Content-Type` selects JSON or url-encoded forms.
//!
//! ```no_run
//! # use serde::Deserialize;
//! # use switchyard_web::{BoxError, Context, Validate, ValidationError};
//! # use http::StatusCode;
//! #[derive(Deserialize)]
//! struct Search {
//!     q: String,
//! }
//!
//! impl Validate for Search {
//!     fn validate(&self) -> Result<(), ValidationError> {
//!         ValidationError::check(|errors| {
//!             if self.q.is_empty() {
//!                 errors.add("q", "cannot be blank");
//!             }
//!         })
//!     }
//! }
//!
//! async fn search(ctx: &mut Context) -> Result<(), BoxError> {
//!     let search: Search = ctx.bind()?;
//!     ctx.validate(&search)?;
//!     ctx.string(StatusCode::OK, search.q)
//! }
//! ```

use crate::Context;
use crate::error::HttpError;
use http::header::CONTENT_TYPE;
use mime::Mime;
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindError {
    #[error("unsupported media type '{0}'")]
    UnsupportedMediaType(String),

    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("invalid query string: {0}")]
    Query(#[from] serde_qs::Error),
}

impl From<BindError> for HttpError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::UnsupportedMediaType(_) => HttpError::unsupported_media_type().with_internal(err),
            _ => HttpError::bad_request().with_internal(err),
        }
    }
}

/// Implemented by bound types that carry their own constraints.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// One or more failed field constraints.
///
/// Displays as `field: message; other: message`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    errors: Vec<(String, String)>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push((field.into(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(field, message)| (field.as_str(), message.as_str()))
    }

    /// Runs `f` against an empty error set and fails when `f` added anything.
    pub fn check(f: impl FnOnce(&mut ValidationError)) -> Result<(), ValidationError> {
        let mut errors = Self::default();
        f(&mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (field, message)) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        HttpError::with_message(http::StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl Context {
    /// Decodes the request into `T`.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        self.decode().map_err(HttpError::from)
    }

    /// Runs the constraints of `value`, mapping a failure to `400 Bad Request`.
    pub fn validate<T: Validate>(&self, value: &T) -> Result<(), HttpError> {
        value.validate().map_err(HttpError::from)
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        let request = self.request();
        let body = request.body();
        if body.is_empty() {
            let query = request.uri().query().unwrap_or_default();
            return Ok(serde_qs::from_str(query)?);
        }

        let content_type =
            request.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or_default();
        match content_type.parse::<Mime>() {
            Ok(mime) if mime.essence_str() == mime::APPLICATION_JSON.essence_str() => Ok(serde_json::from_slice(body)?),
            Ok(mime) if mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() => {
                Ok(serde_urlencoded::from_bytes(body)?)
            }
            _ => Err(BindError::UnsupportedMediaType(content_type.to_owned())),
        }
    }
}
