//! The request dispatcher.
//!
//! A [`Mux`] owns the default router, one router per virtual host, the context pool and the
//! error handler. [`Mux::dispatch`] is the single entry point of the transport layer:
//!
//! 1. acquire a pooled context and reset it with the request,
//! 2. pick the router whose host equals the request host, falling back to the default one,
//! 3. without pre middleware, resolve the route right away; with pre middleware, run the pre
//!    chain around a resolver that only looks the route up when the chain reaches it,
//! 4. run the resolved handler, which already carries the mux, group and route middleware,
//! 5. hand an error to the [`ErrorHandler`],
//! 6. take the response, return the context to the pool and drop the body of `HEAD` answers.

mod builder;
mod error_handler;
mod group;

pub use builder::{MuxBuilder, RouteBuilder};
pub use builder::{any, connect, delete, get, head, methods, options, patch, post, put, trace};
pub use error_handler::{DefaultErrorHandler, ErrorHandler};
pub use group::Group;

#[cfg(test)]
pub use error_handler::MockErrorHandler;

use crate::Context;
use crate::body::ResponseBody;
use crate::error::{BoxError, ReverseError};
use crate::handler::{BoxHandler, Handler};
use crate::pool::{ContextPool, DEFAULT_MAX_IDLE_CONTEXTS};
use crate::router::{Route, RouteMatch, Router};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ALLOW, HOST};
use http::{HeaderValue, Method, Request, Response};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

/// Construction-time settings of a [`Mux`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Show full error text in error responses.
    pub debug: bool,
    /// How many idle contexts the pool keeps for reuse.
    pub max_idle_contexts: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self { debug: false, max_idle_contexts: DEFAULT_MAX_IDLE_CONTEXTS }
    }
}

pub(crate) struct Routing {
    pub(crate) default: Router,
    pub(crate) hosts: HashMap<String, Router>,
    pub(crate) names: HashMap<String, Arc<Route>>,
    pub(crate) not_found: BoxHandler,
    pub(crate) method_not_allowed: BoxHandler,
}

impl Routing {
    fn router_for(&self, request: &Request<Bytes>) -> &Router {
        if self.hosts.is_empty() {
            return &self.default;
        }
        request_host(request).and_then(|host| self.hosts.get(host)).unwrap_or(&self.default)
    }

    /// Looks the route up and records it on `ctx`; returns the handler chain to run.
    fn resolve(&self, ctx: &mut Context) -> BoxHandler {
        let (request, params) = ctx.request_and_params();
        let router = self.router_for(request);

        match router.find(request.method(), request.uri().path(), params) {
            RouteMatch::Found { handler, route } => {
                let handler = Arc::clone(handler);
                ctx.set_route(Arc::clone(route));
                ctx.set_handler(Arc::clone(&handler));
                handler
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                let allowed = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allowed) {
                    ctx.response_mut().headers_mut().insert(ALLOW, value);
                }
                ctx.set_handler(Arc::clone(&self.method_not_allowed));
                Arc::clone(&self.method_not_allowed)
            }
            RouteMatch::NotFound => {
                ctx.set_handler(Arc::clone(&self.not_found));
                Arc::clone(&self.not_found)
            }
        }
    }
}

/// The host a request is addressed to, port included: the URI authority for absolute-form
/// requests, the `Host` header otherwise.
fn request_host(request: &Request<Bytes>) -> Option<&str> {
    request
        .uri()
        .authority()
        .map(|authority| authority.as_str())
        .or_else(|| request.headers().get(HOST).and_then(|value| value.to_str().ok()))
}

/// The innermost handler of the pre chain.
pub(crate) struct Resolver {
    pub(crate) routing: Arc<Routing>,
}

#[async_trait]
impl Handler for Resolver {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let handler = self.routing.resolve(ctx);
        handler.call(ctx).await
    }
}

pub struct Mux {
    routing: Arc<Routing>,
    pre: Option<BoxHandler>,
    pool: ContextPool,
    error_handler: Arc<dyn ErrorHandler>,
}

impl fmt::Debug for Mux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mux")
            .field("routes", &self.routes().collect::<Vec<_>>())
            .field("hosts", &self.routing.hosts.keys().collect::<Vec<_>>())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Mux {
    pub fn builder() -> MuxBuilder {
        MuxBuilder::new()
    }

    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<ResponseBody> {
        let mut ctx = self.pool.acquire();
        ctx.reset(request);

        let result = match &self.pre {
            Some(pre) => pre.call(&mut ctx).await,
            None => {
                let handler = self.routing.resolve(&mut ctx);
                handler.call(&mut ctx).await
            }
        };

        if let Err(err) = result {
            self.error_handler.handle(err, &mut ctx);
        }

        let is_head = ctx.method() == Method::HEAD;
        let mut response = ctx.take_response();
        self.pool.release(ctx);

        if is_head {
            *response.body_mut() = ResponseBody::empty();
        }
        response
    }

    /// Builds the URL of the route called `name`, filling its parameters in order.
    pub fn reverse(&self, name: &str, params: &[&dyn Display]) -> Result<String, ReverseError> {
        let route = self
            .routing
            .names
            .get(name)
            .ok_or_else(|| ReverseError::UnknownRoute { name: name.to_owned() })?;
        route.reverse(params)
    }

    /// Like [`reverse`](Mux::reverse), naming the route by the handler it was registered with.
    pub fn uri_for(&self, handler: &dyn Handler, params: &[&dyn Display]) -> Result<String, ReverseError> {
        self.reverse(handler.name(), params)
    }

    /// Every registered route: the default router's first, then those of virtual hosts.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routing.default.routes().iter().chain(self.routing.hosts.values().flat_map(|router| router.routes()))
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::{Group, MockErrorHandler, Mux, MuxBuilder, MuxConfig, get, head, methods, post};
    use crate::Context;
    use crate::body::ResponseBody;
    use crate::decorator::Decorator;
    use crate::error::{BoxError, HttpError, ReverseError, RouteError};
    use crate::handler::{BoxHandler, Handler, handler_fn};
    use crate::middleware::{Next, RemoveTrailingSlash, from_fn};
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::header::{ALLOW, CONTENT_TYPE};
    use http::{Method, Request, Response, StatusCode};
    use std::sync::{Arc, Mutex};

    async fn show_user(ctx: &mut Context) -> Result<(), BoxError> {
        let id = ctx.param("id").unwrap_or_default().to_owned();
        ctx.string(StatusCode::OK, format!("id={id}"))
    }

    async fn create_user(ctx: &mut Context) -> Result<(), BoxError> {
        ctx.no_content(StatusCode::CREATED)
    }

    async fn fail(_ctx: &mut Context) -> Result<(), BoxError> {
        Err("storage offline".into())
    }

    fn request(method: Method, uri: &str) -> Request<Bytes> {
        Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
    }

    fn body(response: &Response<ResponseBody>) -> String {
        String::from_utf8(response.body().as_bytes().to_vec()).unwrap()
    }

    fn users_mux() -> Mux {
        let mut builder = Mux::builder();
        builder.route("/users/:id", get(handler_fn(show_user))).route("/users", post(handler_fn(create_user)));
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn get_user_by_id() {
        let mux = users_mux();
        let response = mux.dispatch(request(Method::GET, "/users/42")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), "id=42");
        assert_eq!(mux.pool().idle_len(), 1);
    }

    #[tokio::test]
    async fn unregistered_method_is_405_with_allow() {
        let mux = users_mux();
        let response = mux.dispatch(request(Method::DELETE, "/users/42")).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET");
        assert_eq!(body(&response), r#"{"message":"Method Not Allowed"}"#);
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let mux = users_mux();
        let response = mux.dispatch(request(Method::GET, "/nothing/here")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body(&response), r#"{"message":"Not Found"}"#);
    }

    #[tokio::test]
    async fn head_body_is_dropped() {
        let mut builder = Mux::builder();
        builder.route("/users/:id", head(handler_fn(show_user)));
        let mux = builder.build().unwrap();

        let response = mux.dispatch(request(Method::HEAD, "/users/1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().as_bytes().is_empty());
    }

    #[tokio::test]
    async fn untyped_error_is_500_and_context_is_released() {
        let mut builder = Mux::builder();
        builder.route("/fail", get(handler_fn(fail)));
        let mux = builder.build().unwrap();

        let response = mux.dispatch(request(Method::GET, "/fail")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&response), r#"{"message":"Internal Server Error"}"#);
        assert_eq!(mux.pool().idle_len(), 1);
    }

    #[tokio::test]
    async fn debug_mode_shows_error_text() {
        let mut builder = Mux::builder();
        builder.config(MuxConfig { debug: true, ..MuxConfig::default() }).route("/fail", get(handler_fn(fail)));
        let mux = builder.build().unwrap();

        let response = mux.dispatch(request(Method::GET, "/fail")).await;
        assert_eq!(body(&response), r#"{"message":"storage offline"}"#);
    }

    #[tokio::test]
    async fn custom_error_handler_receives_error() {
        let mut error_handler = MockErrorHandler::new();
        error_handler.expect_handle().times(1).returning(|err, ctx| {
            assert!(err.downcast_ref::<HttpError>().is_some());
            ctx.string(StatusCode::GONE, "gone").unwrap();
        });

        let mut builder = Mux::builder();
        builder.error_handler(error_handler);
        let mux = builder.build().unwrap();

        let response = mux.dispatch(request(Method::GET, "/missing")).await;
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(body(&response), "gone");
    }

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    struct Mark {
        label: &'static str,
        trace: Trace,
    }

    struct MarkHandler {
        label: &'static str,
        trace: Trace,
        next: BoxHandler,
    }

    impl Decorator<BoxHandler> for Mark {
        type Out = BoxHandler;

        fn decorate(&self, next: BoxHandler) -> BoxHandler {
            Arc::new(MarkHandler { label: self.label, trace: Arc::clone(&self.trace), next })
        }
    }

    #[async_trait]
    impl Handler for MarkHandler {
        async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
            let resolved = if ctx.handler().is_some() { "resolved" } else { "unresolved" };
            self.trace.lock().unwrap().push(self.label);
            self.trace.lock().unwrap().push(resolved);
            self.next.call(ctx).await
        }
    }

    fn mark(label: &'static str, trace: &Trace) -> Mark {
        Mark { label, trace: Arc::clone(trace) }
    }

    #[tokio::test]
    async fn middleware_tiers_run_in_order() {
        let trace = Trace::default();
        let mut builder = Mux::builder();
        builder
            .pre(mark("pre", &trace))
            .with(mark("mux", &trace))
            .group(Group::new("/api").with(mark("group", &trace)).route(
                "/users/:id",
                get(handler_fn(show_user)).with(mark("route", &trace)),
            ));
        let mux = builder.build().unwrap();

        let response = mux.dispatch(request(Method::GET, "/api/users/7")).await;
        assert_eq!(body(&response), "id=7");
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["pre", "unresolved", "mux", "resolved", "group", "resolved", "route", "resolved"]
        );
    }

    #[tokio::test]
    async fn mux_middleware_wraps_fallbacks() {
        let trace = Trace::default();
        let mut builder = Mux::builder();
        builder.with(mark("mux", &trace));
        let mux = builder.build().unwrap();

        let response = mux.dispatch(request(Method::GET, "/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(*trace.lock().unwrap(), vec!["mux", "resolved"]);
    }

    async fn short_circuit(ctx: &mut Context, next: Next) -> Result<(), BoxError> {
        if ctx.header("x-block").is_some() {
            return Err(HttpError::too_many_requests().into());
        }
        next.run(ctx).await
    }

    #[tokio::test]
    async fn pre_middleware_can_stop_before_routing() {
        let mut builder = Mux::builder();
        builder.pre(from_fn(short_circuit)).pre(RemoveTrailingSlash).route("/users/:id", get(handler_fn(show_user)));
        let mux = builder.build().unwrap();

        let blocked = Request::get("/users/1").header("x-block", "1").body(Bytes::new()).unwrap();
        assert_eq!(mux.dispatch(blocked).await.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = mux.dispatch(request(Method::GET, "/users/1/")).await;
        assert_eq!(body(&response), "id=1");
    }

    async fn api_home(ctx: &mut Context) -> Result<(), BoxError> {
        ctx.string(StatusCode::OK, "api")
    }

    #[tokio::test]
    async fn virtual_hosts_match_exactly() {
        let mut builder = Mux::builder();
        builder
            .route("/", get(handler_fn(show_user)))
            .host_route("api.example.com:8080", "/", get(handler_fn(api_home)));
        let mux = builder.build().unwrap();

        let with_host = |host: &str| Request::get("/").header("host", host).body(Bytes::new()).unwrap();

        assert_eq!(body(&mux.dispatch(with_host("api.example.com:8080")).await), "api");
        assert_eq!(body(&mux.dispatch(with_host("api.example.com")).await), "id=");
        assert_eq!(body(&mux.dispatch(request(Method::GET, "http://api.example.com:8080/")).await), "api");
    }

    #[test]
    fn reverse_by_name_and_handler() {
        let show = handler_fn(show_user);
        let mut builder = Mux::builder();
        builder
            .route("/users/:id", get(handler_fn(show_user)))
            .route("/files/*path", get(handler_fn(create_user)).name("files"));
        let mux = builder.build().unwrap();

        assert_eq!(mux.uri_for(&show, &[&42]).unwrap(), "/users/42");
        assert_eq!(mux.reverse("files", &[&"a/b.txt"]).unwrap(), "/files/a/b.txt");
        assert_eq!(mux.reverse("nope", &[]).unwrap_err(), ReverseError::UnknownRoute { name: "nope".into() });
        assert!(matches!(mux.reverse("files", &[]), Err(ReverseError::MissingParams { .. })));
        assert_eq!(mux.routes().count(), 2);
    }

    #[test]
    fn methods_registers_each_method() {
        let mut builder = MuxBuilder::new();
        builder.route("/items", methods(&[Method::GET, Method::PUT], handler_fn(create_user)));
        let mux = builder.build().unwrap();
        let registered = mux.routes().map(|route| route.method().clone()).collect::<Vec<_>>();
        assert_eq!(registered, vec![Method::GET, Method::PUT]);
    }

    #[test]
    fn invalid_routes_fail_the_build() {
        let mut builder = Mux::builder();
        builder.route("/u/:id", get(handler_fn(show_user))).route("/u/:uid", get(handler_fn(show_user)));
        assert!(matches!(builder.build(), Err(RouteError::Conflict { .. })));

        let mut builder = Mux::builder();
        builder.route("/a/*x/b", get(handler_fn(show_user)));
        assert!(matches!(builder.build(), Err(RouteError::CatchAllNotLast { .. })));
    }
}
