use crate::Context;
use crate::decorator::Decorator;
use crate::error::{BoxError, HttpError};
use crate::handler::{BoxHandler, Handler};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::error;

/// Turns a panic further down the chain into a `500 Internal Server Error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Recover;

pub struct RecoverHandler {
    next: BoxHandler,
}

impl fmt::Debug for RecoverHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoverHandler").field("next", &self.next.name()).finish()
    }
}

impl Decorator<BoxHandler> for Recover {
    type Out = BoxHandler;

    fn decorate(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RecoverHandler { next })
    }
}

#[async_trait]
impl Handler for RecoverHandler {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let result = AssertUnwindSafe(self.next.call(ctx)).catch_unwind().await;
        match result {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(method = %ctx.method(), path = %ctx.path(), panic = %message, "handler panicked");
                Err(HttpError::internal_server_error().with_internal(format!("panic: {message}")).into())
            }
        }
    }

    fn name(&self) -> &'static str {
        self.next.name()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
