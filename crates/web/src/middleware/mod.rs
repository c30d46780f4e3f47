//! Middleware: decorators that wrap a handler in another handler.
//!
//! A [`Middleware`] takes the next handler of the chain and returns the handler that runs
//! in its place. [`apply_middleware`] composes a list so that the first entry is the
//! outermost wrapper: with `[a, b]` around `h`, a request runs `a`, `b`, `h`, then unwinds
//! through `b` and `a`.
//!
//! Middleware can be written as a type implementing [`Decorator`], or as an async fn with
//! [`from_fn`]:
//!
//! ```no_run
//! # use switchyard_web::middleware::{from_fn, Next};
//! # use switchyard_web::{BoxError, Context};
//! async fn auth(ctx: &mut Context, next: Next) -> Result<(), BoxError> {
//!     ctx.set("user", "guest".to_string());
//!     next.run(ctx).await
//! }
//!
//! let middleware = from_fn(auth);
//! ```

mod logger;
mod recover;
mod trailing_slash;

pub use logger::RequestLogger;
pub use recover::Recover;
pub use trailing_slash::RemoveTrailingSlash;

use crate::Context;
use crate::decorator::Decorator;
use crate::error::BoxError;
use crate::fn_trait::MiddlewareFn;
use crate::handler::{BoxHandler, Handler};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A shared handler decorator.
pub type Middleware = Arc<dyn Decorator<BoxHandler, Out = BoxHandler> + Send + Sync>;

/// Shares `decorator` as a [`Middleware`].
pub fn middleware<D>(decorator: D) -> Middleware
where
    D: Decorator<BoxHandler, Out = BoxHandler> + Send + Sync + 'static,
{
    Arc::new(decorator)
}

/// Wraps `handler` so that `middleware[0]` runs first.
pub fn apply_middleware(handler: BoxHandler, middleware: &[Middleware]) -> BoxHandler {
    middleware.iter().rev().fold(handler, |handler, middleware| middleware.decorate(handler))
}

/// The rest of the chain, as seen from a middleware fn.
#[derive(Clone)]
pub struct Next {
    handler: BoxHandler,
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("handler", &self.handler.name()).finish()
    }
}

impl Next {
    pub(crate) fn new(handler: BoxHandler) -> Self {
        Self { handler }
    }

    pub async fn run(&self, ctx: &mut Context) -> Result<(), BoxError> {
        self.handler.call(ctx).await
    }
}

/// Turns `async fn(&mut Context, Next) -> Result<(), BoxError>` into a [`Middleware`].
pub fn from_fn<F>(f: F) -> Middleware
where
    F: for<'c> MiddlewareFn<'c> + 'static,
{
    Arc::new(FromFn { f: Arc::new(f) })
}

struct FromFn<F> {
    f: Arc<F>,
}

impl<F> Decorator<BoxHandler> for FromFn<F>
where
    F: for<'c> MiddlewareFn<'c> + 'static,
{
    type Out = BoxHandler;

    fn decorate(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(FnMiddlewareHandler { f: Arc::clone(&self.f), next })
    }
}

struct FnMiddlewareHandler<F> {
    f: Arc<F>,
    next: BoxHandler,
}

#[async_trait]
impl<F> Handler for FnMiddlewareHandler<F>
where
    F: for<'c> MiddlewareFn<'c> + 'static,
{
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        MiddlewareFn::call(&*self.f, ctx, Next::new(Arc::clone(&self.next))).await
    }

    fn name(&self) -> &'static str {
        self.next.name()
    }
}
