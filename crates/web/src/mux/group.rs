use crate::decorator::Decorator;
use crate::handler::BoxHandler;
use crate::middleware::{Middleware, middleware};
use crate::mux::builder::{PendingRoute, RouteBuilder};
use std::fmt;

/// Routes sharing a path prefix, an optional virtual host and middleware.
///
/// A group only shapes registration: its routes end up in the mux's routers with the prefix
/// prepended and the group middleware placed between the mux-level and route-level chains.
///
/// ```no_run
/// # use switchyard_web::mux::{get, Group, Mux};
/// # use switchyard_web::middleware::RequestLogger;
/// # use switchyard_web::{handler_fn, BoxError, Context};
/// # async fn list(_ctx: &mut Context) -> Result<(), BoxError> { Ok(()) }
/// let mut builder = Mux::builder();
/// builder.group(Group::new("/admin").with(RequestLogger).route("/users", get(handler_fn(list))));
/// ```
pub struct Group {
    prefix: String,
    host: Option<String>,
    middleware: Vec<Middleware>,
    routes: Vec<(String, RouteBuilder)>,
    groups: Vec<Group>,
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("prefix", &self.prefix)
            .field("host", &self.host)
            .field("routes", &self.routes)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

impl Group {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), host: None, middleware: Vec::new(), routes: Vec::new(), groups: Vec::new() }
    }

    /// Registers the group's routes on the router of `host`. Nested groups inherit it.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with<D>(mut self, decorator: D) -> Self
    where
        D: Decorator<BoxHandler, Out = BoxHandler> + Send + Sync + 'static,
    {
        self.middleware.push(middleware(decorator));
        self
    }

    pub fn route(mut self, path: impl Into<String>, route: RouteBuilder) -> Self {
        self.routes.push((path.into(), route));
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    pub(crate) fn flatten_into(self, routes: &mut Vec<PendingRoute>) {
        self.flatten("", None, &[], routes);
    }

    fn flatten(
        self,
        parent_prefix: &str,
        parent_host: Option<&str>,
        parent_middleware: &[Middleware],
        out: &mut Vec<PendingRoute>,
    ) {
        let prefix = join(parent_prefix, &self.prefix);
        let host = self.host.as_deref().or(parent_host).map(str::to_owned);
        let middleware = parent_middleware.iter().chain(&self.middleware).cloned().collect::<Vec<_>>();

        for (path, route) in self.routes {
            out.push(PendingRoute {
                host: host.clone(),
                path: join(&prefix, &path),
                route,
                group_middleware: middleware.clone(),
            });
        }

        for group in self.groups {
            group.flatten(&prefix, host.as_deref(), &middleware, out);
        }
    }
}

/// Joins a prefix and a path; an empty or `/` path stands for the prefix itself.
fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match path {
        "" | "/" if prefix.is_empty() => "/".to_owned(),
        "" | "/" => prefix.to_owned(),
        path if path.starts_with('/') => format!("{prefix}{path}"),
        path => format!("{prefix}/{path}"),
    }
}
