//! Tree router, middleware chain and request dispatcher of the switchyard framework.
//!
//! ```no_run
//! use http::StatusCode;
//! use switchyard_web::mux::{get, Mux};
//! use switchyard_web::{handler_fn, BoxError, Context, Server};
//!
//! async fn show_user(ctx: &mut Context) -> Result<(), BoxError> {
//!     let id = ctx.param("id").unwrap_or_default().to_owned();
//!     ctx.string(StatusCode::OK, format!("user {id}"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let mut builder = Mux::builder();
//!     builder.route("/users/:id", get(handler_fn(show_user)));
//!
//!     let server = Server::builder().mux(builder.build()?).bind("127.0.0.1:8080").build()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

mod body;
mod error;
mod fn_trait;
mod handler;

pub mod context;
pub mod decorator;
pub mod fs;
pub mod middleware;
pub mod mux;
pub mod pool;
pub mod router;
pub mod server;

pub use body::ResponseBody;
pub use context::{Context, Renderer, Validate, ValidationError};
pub use error::{BoxError, ContextError, HttpError, ReverseError, RouteError};
pub use fn_trait::{HandlerFn, MiddlewareFn};
pub use handler::{BoxHandler, FnHandler, Handler, MethodNotAllowedHandler, NotFoundHandler, handler_fn};
pub use mux::{ErrorHandler, Mux, MuxBuilder, MuxConfig};
pub use server::{Server, ServerConfig};
