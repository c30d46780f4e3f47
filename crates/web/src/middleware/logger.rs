use crate::Context;
use crate::decorator::Decorator;
use crate::error::BoxError;
use crate::handler::{BoxHandler, Handler};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Emits one access-log event per request.
///
/// Failed requests are logged with their error before the mux's error handler turns them
/// into a response.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

pub struct RequestLoggerHandler {
    next: BoxHandler,
}

impl fmt::Debug for RequestLoggerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLoggerHandler").field("next", &self.next.name()).finish()
    }
}

impl Decorator<BoxHandler> for RequestLogger {
    type Out = BoxHandler;

    fn decorate(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RequestLoggerHandler { next })
    }
}

#[async_trait]
impl Handler for RequestLoggerHandler {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let start = Instant::now();
        let result = self.next.call(ctx).await;
        let latency = start.elapsed();

        match &result {
            Ok(()) => info!(
                method = %ctx.method(),
                path = %ctx.path(),
                status = ctx.response().status().as_u16(),
                latency = ?latency,
                "request served"
            ),
            Err(e) => warn!(
                method = %ctx.method(),
                path = %ctx.path(),
                cause = %e,
                latency = ?latency,
                "request failed"
            ),
        }
        result
    }

    fn name(&self) -> &'static str {
        self.next.name()
    }
}
