//! Bridges between plain `async fn`s and the [`Handler`](crate::Handler) /
//! [`Middleware`](crate::middleware::Middleware) traits.
//!
//! An `async fn(&mut Context) -> Result<(), BoxError>` returns a future that borrows the
//! context, so its type depends on the borrow's lifetime. The traits below name that future
//! per lifetime, which lets `for<'c> HandlerFn<'c>` describe such functions:
//!
//!```no_run
//! # use switchyard_web::{BoxError, Context};
//! # use http::StatusCode;
//! async fn hello(ctx: &mut Context) -> Result<(), BoxError> {
//!     ctx.string(StatusCode::OK, "hello")
//! }
//!```

use crate::Context;
use crate::error::BoxError;
use crate::middleware::Next;

/// An async function usable as a request handler.
pub trait HandlerFn<'c>: Send + Sync {
    type Fut: Future<Output = Result<(), BoxError>> + Send + 'c;

    fn call(&self, ctx: &'c mut Context) -> Self::Fut;
}

impl<'c, F, Fut> HandlerFn<'c> for F
where
    F: Fn(&'c mut Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'c,
{
    type Fut = Fut;

    #[inline]
    fn call(&self, ctx: &'c mut Context) -> Self::Fut {
        (self)(ctx)
    }
}

/// An async function usable as middleware: it receives the context and the rest of the chain.
pub trait MiddlewareFn<'c>: Send + Sync {
    type Fut: Future<Output = Result<(), BoxError>> + Send + 'c;

    fn call(&self, ctx: &'c mut Context, next: Next) -> Self::Fut;
}

impl<'c, F, Fut> MiddlewareFn<'c> for F
where
    F: Fn(&'c mut Context, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'c,
{
    type Fut = Fut;

    #[inline]
    fn call(&self, ctx: &'c mut Context, next: Next) -> Self::Fut {
        (self)(ctx, next)
    }
}
