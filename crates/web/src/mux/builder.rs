use crate::context::{Renderer, Shared};
use crate::decorator::Decorator;
use crate::error::RouteError;
use crate::fs::{ServeFile, StaticDir};
use crate::handler::{BoxHandler, Handler, MethodNotAllowedHandler, NotFoundHandler};
use crate::middleware::{Middleware, apply_middleware, middleware};
use crate::mux::error_handler::{DefaultErrorHandler, ErrorHandler};
use crate::mux::group::Group;
use crate::mux::{Mux, MuxConfig, Resolver, Routing};
use crate::pool::ContextPool;
use crate::router::Router;
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// A handler with the methods it answers, an optional name and route-level middleware.
pub struct RouteBuilder {
    methods: Vec<Method>,
    handler: BoxHandler,
    name: Option<String>,
    middleware: Vec<Middleware>,
}

impl fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("methods", &self.methods)
            .field("handler", &self.handler.name())
            .field("name", &self.name)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl RouteBuilder {
    fn new<H: Handler + 'static>(methods: Vec<Method>, handler: H) -> Self {
        Self { methods, handler: Arc::new(handler), name: None, middleware: Vec::new() }
    }

    /// Adds route-level middleware; it runs inside the mux-level chain.
    pub fn with<D>(mut self, decorator: D) -> Self
    where
        D: Decorator<BoxHandler, Out = BoxHandler> + Send + Sync + 'static,
    {
        self.middleware.push(middleware(decorator));
        self
    }

    /// Names the route for [`Mux::reverse`]; defaults to the handler's type name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Routes `", stringify!($method), "` requests to `handler`.")]
        pub fn $name<H: Handler + 'static>(handler: H) -> RouteBuilder {
            RouteBuilder::new(vec![Method::$method], handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(connect, CONNECT);
method_route!(patch, PATCH);
method_route!(trace, TRACE);

/// Routes every standard method to `handler`.
pub fn any<H: Handler + 'static>(handler: H) -> RouteBuilder {
    let methods = vec![
        Method::CONNECT,
        Method::DELETE,
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::PATCH,
        Method::POST,
        Method::PUT,
        Method::TRACE,
    ];
    RouteBuilder::new(methods, handler)
}

pub fn methods<H: Handler + 'static>(methods: &[Method], handler: H) -> RouteBuilder {
    RouteBuilder::new(methods.to_vec(), handler)
}

/// A route waiting for [`MuxBuilder::build`], with the middleware of its enclosing groups.
pub(crate) struct PendingRoute {
    pub(crate) host: Option<String>,
    pub(crate) path: String,
    pub(crate) route: RouteBuilder,
    pub(crate) group_middleware: Vec<Middleware>,
}

/// Collects routes and policy, then builds an immutable [`Mux`].
///
/// Middleware tiers compose as pre → mux → group → route, outermost first. Pre middleware
/// runs before the route is resolved.
pub struct MuxBuilder {
    config: MuxConfig,
    pre: Vec<Middleware>,
    middleware: Vec<Middleware>,
    routes: Vec<PendingRoute>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl fmt::Debug for MuxBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxBuilder")
            .field("config", &self.config)
            .field("pre", &self.pre.len())
            .field("middleware", &self.middleware.len())
            .field("routes", &self.routes.iter().map(|pending| pending.path.as_str()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for MuxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MuxBuilder {
    pub fn new() -> Self {
        Self {
            config: MuxConfig::default(),
            pre: Vec::new(),
            middleware: Vec::new(),
            routes: Vec::new(),
            error_handler: None,
            renderer: None,
        }
    }

    pub fn config(&mut self, config: MuxConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn debug(&mut self, debug: bool) -> &mut Self {
        self.config.debug = debug;
        self
    }

    /// Adds middleware that runs before route resolution.
    pub fn pre<D>(&mut self, decorator: D) -> &mut Self
    where
        D: Decorator<BoxHandler, Out = BoxHandler> + Send + Sync + 'static,
    {
        self.pre.push(middleware(decorator));
        self
    }

    /// Adds middleware around every resolved handler, including the 404 and 405 fallbacks.
    pub fn with<D>(&mut self, decorator: D) -> &mut Self
    where
        D: Decorator<BoxHandler, Out = BoxHandler> + Send + Sync + 'static,
    {
        self.middleware.push(middleware(decorator));
        self
    }

    pub fn route(&mut self, path: impl Into<String>, route: RouteBuilder) -> &mut Self {
        self.routes.push(PendingRoute { host: None, path: path.into(), route, group_middleware: Vec::new() });
        self
    }

    /// Registers a route on the router of the virtual host `host`, e.g. `api.example.com:8080`.
    pub fn host_route(&mut self, host: impl Into<String>, path: impl Into<String>, route: RouteBuilder) -> &mut Self {
        self.routes.push(PendingRoute {
            host: Some(host.into()),
            path: path.into(),
            route,
            group_middleware: Vec::new(),
        });
        self
    }

    /// Serves the files under `root` on `GET {prefix}/*`, see [`StaticDir`].
    pub fn static_dir(&mut self, prefix: &str, root: impl Into<PathBuf>) -> &mut Self {
        let pattern = format!("{}/*", prefix.trim_end_matches('/'));
        self.route(pattern, get(StaticDir::new(root)))
    }

    /// Serves the single file `file` on `GET path`.
    pub fn file(&mut self, path: impl Into<String>, file: impl Into<PathBuf>) -> &mut Self {
        self.route(path, get(ServeFile::new(file)))
    }

    pub fn group(&mut self, group: Group) -> &mut Self {
        group.flatten_into(&mut self.routes);
        self
    }

    pub fn error_handler<E: ErrorHandler + 'static>(&mut self, error_handler: E) -> &mut Self {
        self.error_handler = Some(Arc::new(error_handler));
        self
    }

    pub fn renderer<R: Renderer + 'static>(&mut self, renderer: R) -> &mut Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Builds the route tables. Any invalid or conflicting route fails the whole build.
    pub fn build(self) -> Result<Mux, RouteError> {
        let mux_middleware = self.middleware;
        let mut default = Router::new();
        let mut hosts: HashMap<String, Router> = HashMap::new();
        let mut names = HashMap::new();

        for PendingRoute { host, path, route, group_middleware } in self.routes {
            let name = route.name.unwrap_or_else(|| route.handler.name().to_owned());
            let handler = apply_middleware(route.handler, &route.middleware);
            let handler = apply_middleware(handler, &group_middleware);
            let handler = apply_middleware(handler, &mux_middleware);

            let router = match host {
                Some(host) => hosts.entry(host).or_default(),
                None => &mut default,
            };
            for method in route.methods {
                let registered = router.add(method, &path, Arc::clone(&handler), name.clone())?;
                names.entry(name.clone()).or_insert(registered);
            }
        }

        let max_params = hosts.values().map(Router::max_params).fold(default.max_params(), usize::max);
        let route_count = hosts.values().map(|router| router.routes().len()).sum::<usize>() + default.routes().len();

        let routing = Arc::new(Routing {
            default,
            hosts,
            names,
            not_found: apply_middleware(Arc::new(NotFoundHandler), &mux_middleware),
            method_not_allowed: apply_middleware(Arc::new(MethodNotAllowedHandler), &mux_middleware),
        });

        let pre = if self.pre.is_empty() {
            None
        } else {
            Some(apply_middleware(Arc::new(Resolver { routing: Arc::clone(&routing) }), &self.pre))
        };

        let shared = Arc::new(Shared { debug: self.config.debug, renderer: self.renderer });
        let pool = ContextPool::new(max_params, self.config.max_idle_contexts, shared);
        let error_handler =
            self.error_handler.unwrap_or_else(|| Arc::new(DefaultErrorHandler) as Arc<dyn ErrorHandler>);

        info!(routes = route_count, hosts = routing.hosts.len(), max_params, debug = self.config.debug, "mux built");

        Ok(Mux { routing, pre, pool, error_handler })
    }
}
