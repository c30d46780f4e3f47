use crate::Context;
use crate::error::{BoxError, HttpError};
use http::{Method, StatusCode};
use serde::Serialize;
use tracing::{error, warn};

/// Writes the response for an error returned by the handler chain.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, err: BoxError, ctx: &mut Context);
}

impl<F> ErrorHandler for F
where
    F: Fn(BoxError, &mut Context) + Send + Sync,
{
    fn handle(&self, err: BoxError, ctx: &mut Context) {
        (self)(err, ctx)
    }
}

/// Renders errors as `{"message": ...}` JSON.
///
/// An [`HttpError`] keeps its status and message; when its internal cause is itself an
/// `HttpError`, the inner one is used. Any other error becomes `500` with the generic reason
/// phrase. In debug mode the message is the full error text. `HEAD` requests get the status
/// only, and nothing is written once the response is committed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, err: BoxError, ctx: &mut Context) {
        if ctx.response().is_committed() {
            warn!(cause = %err, path = %ctx.path(), "error after response was committed");
            return;
        }

        let (code, message) = match err.downcast_ref::<HttpError>() {
            Some(http_error) => {
                let http_error =
                    http_error
                        .internal()
                        .and_then(|internal| internal.downcast_ref::<HttpError>())
                        .unwrap_or(http_error);
                (http_error.code(), http_error.message().to_owned())
            }
            None => {
                let code = StatusCode::INTERNAL_SERVER_ERROR;
                (code, code.canonical_reason().unwrap_or_default().to_owned())
            }
        };
        let message = if ctx.is_debug() { err.to_string() } else { message };

        if code.is_server_error() {
            error!(cause = %err, method = %ctx.method(), path = %ctx.path(), status = code.as_u16(), "request failed");
        }

        let written = if ctx.method() == Method::HEAD {
            ctx.no_content(code)
        } else {
            ctx.json(code, &ErrorBody { message: &message })
        };
        if let Err(e) = written {
            error!(cause = %e, "failed to write error response");
        }
    }
}
