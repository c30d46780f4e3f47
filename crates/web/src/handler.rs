use crate::Context;
use crate::error::{BoxError, HttpError};
use crate::fn_trait::HandlerFn;
use async_trait::async_trait;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

/// Serves one request by reading from and writing to its [`Context`].
///
/// Returning `Err` hands the error to the mux's error handler, which writes the response.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError>;

    /// The name routes registered with this handler get by default; used by reverse routing.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// A shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// a [`HandlerFn`] holder which represents any `async fn(&mut Context)`
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'c> HandlerFn<'c>,
{
    FnHandler { f }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'c> HandlerFn<'c> + Send + Sync,
{
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        HandlerFn::call(&self.f, ctx).await
    }

    fn name(&self) -> &'static str {
        type_name::<F>()
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("f", &type_name::<F>()).finish()
    }
}

/// Resolved when no route matches the request path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotFoundHandler;

#[async_trait]
impl Handler for NotFoundHandler {
    async fn call(&self, _ctx: &mut Context) -> Result<(), BoxError> {
        Err(HttpError::not_found().into())
    }
}

/// Resolved when the path matches but no route is registered for the request method.
#[derive(Debug, Default, Clone, Copy)]
pub struct MethodNotAllowedHandler;

#[async_trait]
impl Handler for MethodNotAllowedHandler {
    async fn call(&self, _ctx: &mut Context) -> Result<(), BoxError> {
        Err(HttpError::method_not_allowed().into())
    }
}
