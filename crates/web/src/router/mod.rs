//! Radix-style route tree with static, `:param` and `*catch_all` segments.
//!
//! Matching prefers static children over parameters over catch-alls at every level, and
//! backtracks when a preferred branch dead-ends. A path that reaches a terminal without a
//! route for the request method reports [`RouteMatch::MethodNotAllowed`].

mod node;
mod pattern;

pub use pattern::CATCH_ALL_NAME;

use crate::error::{ReverseError, RouteError};
use crate::handler::BoxHandler;
use http::Method;
use node::{Endpoint, Node};
use pattern::Pattern;
use std::fmt::{self, Display};
use std::sync::Arc;
use tracing::debug;

/// A registered route: method, pattern, name and the names of its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    path: String,
    name: String,
    param_names: Arc<[String]>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The normalized pattern, e.g. `/users/:id`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_names(&self) -> &Arc<[String]> {
        &self.param_names
    }

    /// Builds a URL from the pattern by substituting `params` positionally.
    ///
    /// Extra values are ignored; too few is an error.
    pub fn reverse(&self, params: &[&dyn Display]) -> Result<String, ReverseError> {
        if params.len() < self.param_names.len() {
            return Err(ReverseError::MissingParams {
                name: self.name.clone(),
                expected: self.param_names.len(),
                given: params.len(),
            });
        }

        if self.path == "/" {
            return Ok(self.path.clone());
        }

        let mut url = String::with_capacity(self.path.len());
        let mut values = params.iter();
        for part in self.path[1..].split('/') {
            url.push('/');
            if part.starts_with([':', '*']) {
                if let Some(value) = values.next() {
                    url.push_str(&value.to_string());
                }
            } else {
                url.push_str(part);
            }
        }
        Ok(url)
    }
}

/// Parameter values captured while matching, in declaration order.
///
/// Slots keep their allocation across [`clear`](Params::clear) so a pooled context can be
/// reused without reallocating.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Vec<String>,
    len: usize,
}

impl Params {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { values: std::iter::repeat_with(String::new).take(capacity).collect(), len: 0 }
    }

    pub(crate) fn push(&mut self, value: &str) {
        if let Some(slot) = self.values.get_mut(self.len) {
            slot.clear();
            slot.push_str(value);
        } else {
            self.values.push(value.to_owned());
        }
        self.len += 1;
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Empties every slot, not only the used ones.
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(String::clear);
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        if index < self.len { self.values.get(index).map(String::as_str) } else { None }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values[..self.len].iter().map(String::as_str)
    }

    /// Number of slots allocated.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }
}

/// Result of [`Router::find`].
pub enum RouteMatch<'r> {
    Found { handler: &'r BoxHandler, route: &'r Arc<Route> },
    /// The path matched, but not for this method. `allowed` lists, without duplicates, the
    /// methods of every terminal the path reached, in search order.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

impl fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found { route, .. } => f.debug_struct("Found").field("route", route).finish_non_exhaustive(),
            Self::MethodNotAllowed { allowed } => f.debug_struct("MethodNotAllowed").field("allowed", allowed).finish(),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// The route tree of one host.
#[derive(Default)]
pub struct Router {
    root: Node,
    routes: Vec<Arc<Route>>,
    max_params: usize,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` on `pattern`.
    pub fn add(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxHandler,
        name: impl Into<String>,
    ) -> Result<Arc<Route>, RouteError> {
        let pattern = Pattern::parse(pattern)?;
        let node = self.root.insert(pattern.segments());

        if let Some(existing) = node.endpoint(&method) {
            return Err(RouteError::Conflict {
                method,
                pattern: pattern.as_str().to_owned(),
                existing: existing.route.path.clone(),
            });
        }

        let param_names: Arc<[String]> = pattern.param_names().into();
        let route = Arc::new(Route {
            method: method.clone(),
            path: pattern.as_str().to_owned(),
            name: name.into(),
            param_names,
        });
        debug!(method = %route.method, path = %route.path, name = %route.name, "route registered");

        node.push_endpoint(Endpoint { method, handler, route: Arc::clone(&route) });
        self.max_params = self.max_params.max(route.param_names.len());
        self.routes.push(Arc::clone(&route));
        Ok(route)
    }

    /// Looks up `path` for `method`, writing captured values into `params`.
    ///
    /// `params` is cleared first; on a miss it is left empty.
    pub fn find<'r>(&'r self, method: &Method, path: &str, params: &mut Params) -> RouteMatch<'r> {
        params.clear();
        let Some(rest) = path.strip_prefix('/') else {
            return RouteMatch::NotFound;
        };
        let rest = if rest.is_empty() { None } else { Some(rest) };

        let mut allowed = Vec::new();
        match self.root.search(rest, method, params, &mut allowed) {
            Some(endpoint) => RouteMatch::Found { handler: &endpoint.handler, route: &endpoint.route },
            None => {
                params.clear();
                if allowed.is_empty() { RouteMatch::NotFound } else { RouteMatch::MethodNotAllowed { allowed } }
            }
        }
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Looks a route up by method and normalized pattern.
    pub fn route(&self, method: &Method, path: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|route| route.method == *method && route.path == path)
    }

    /// The largest number of parameters any route declares.
    pub fn max_params(&self) -> usize {
        self.max_params
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes).field("max_params", &self.max_params).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Params, RouteMatch, Router};
    use crate::error::{ReverseError, RouteError};
    use crate::handler::{BoxHandler, MethodNotAllowedHandler, NotFoundHandler};
    use http::Method;
    use std::sync::Arc;

    fn handler() -> BoxHandler {
        Arc::new(NotFoundHandler)
    }

    fn router(routes: &[(Method, &str, &str)]) -> Router {
        let mut router = Router::new();
        for (method, path, name) in routes {
            router.add(method.clone(), path, handler(), *name).unwrap();
        }
        router
    }

    fn found_name(router: &Router, method: Method, path: &str, params: &mut Params) -> Option<String> {
        match router.find(&method, path, params) {
            RouteMatch::Found { route, .. } => Some(route.name().to_owned()),
            _ => None,
        }
    }

    #[test]
    fn test_find_params_in_declaration_order() {
        let router = router(&[(Method::GET, "/users/:id/posts/:post", "post")]);
        let mut params = Params::with_capacity(router.max_params());

        assert_eq!(found_name(&router, Method::GET, "/users/7/posts/42", &mut params).as_deref(), Some("post"));
        assert_eq!(params.iter().collect::<Vec<_>>(), vec!["7", "42"]);
        assert_eq!(router.max_params(), 2);
    }

    #[test]
    fn test_static_wins_over_param() {
        let router = router(&[(Method::GET, "/users/:id", "show"), (Method::GET, "/users/new", "new")]);
        let mut params = Params::default();

        assert_eq!(found_name(&router, Method::GET, "/users/new", &mut params).as_deref(), Some("new"));
        assert!(params.is_empty());

        assert_eq!(found_name(&router, Method::GET, "/users/5", &mut params).as_deref(), Some("show"));
        assert_eq!(params.get(0), Some("5"));
    }

    #[test]
    fn test_backtracks_from_static_dead_end() {
        let router = router(&[(Method::GET, "/a/b/c", "static"), (Method::GET, "/a/:x/d", "param")]);
        let mut params = Params::default();

        assert_eq!(found_name(&router, Method::GET, "/a/b/d", &mut params).as_deref(), Some("param"));
        assert_eq!(params.iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_backtracks_from_static_terminal_without_method() {
        let router = router(&[(Method::POST, "/users/new", "create"), (Method::GET, "/users/:id", "show")]);
        let mut params = Params::default();

        assert_eq!(found_name(&router, Method::GET, "/users/new", &mut params).as_deref(), Some("show"));
        assert_eq!(params.get(0), Some("new"));
    }

    #[test]
    fn test_catch_all() {
        let router = router(&[(Method::GET, "/files/*path", "files")]);
        let mut params = Params::default();

        assert_eq!(found_name(&router, Method::GET, "/files/a/b/c.txt", &mut params).as_deref(), Some("files"));
        assert_eq!(params.get(0), Some("a/b/c.txt"));

        assert!(matches!(router.find(&Method::GET, "/files", &mut params), RouteMatch::NotFound));
        assert!(matches!(router.find(&Method::GET, "/files/", &mut params), RouteMatch::NotFound));
    }

    #[test]
    fn test_param_falls_back_to_catch_all() {
        let router = router(&[(Method::GET, "/static/:file", "file"), (Method::GET, "/static/*", "any")]);
        let mut params = Params::default();

        assert_eq!(found_name(&router, Method::GET, "/static/app.js", &mut params).as_deref(), Some("file"));
        assert_eq!(found_name(&router, Method::GET, "/static/js/app.js", &mut params).as_deref(), Some("any"));
        assert_eq!(params.iter().collect::<Vec<_>>(), vec!["js/app.js"]);
    }

    #[test]
    fn test_method_not_allowed_vs_not_found() {
        let router = router(&[(Method::GET, "/users/:id", "show"), (Method::PUT, "/users/:uid", "update")]);
        let mut params = Params::default();

        match router.find(&Method::DELETE, "/users/42", &mut params) {
            RouteMatch::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![Method::GET, Method::PUT]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(params.is_empty());

        assert!(matches!(router.find(&Method::GET, "/nothing", &mut params), RouteMatch::NotFound));
        assert!(matches!(router.find(&Method::GET, "users/42", &mut params), RouteMatch::NotFound));
    }

    #[test]
    fn test_method_not_allowed_lists_every_reachable_terminal() {
        let router = router(&[
            (Method::GET, "/users/:id", "show"),
            (Method::POST, "/users/new", "create"),
            (Method::GET, "/users/*rest", "any"),
        ]);
        let mut params = Params::default();

        assert_eq!(found_name(&router, Method::GET, "/users/new", &mut params).as_deref(), Some("show"));

        match router.find(&Method::DELETE, "/users/new", &mut params) {
            RouteMatch::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![Method::POST, Method::GET]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(params.is_empty());
    }

    #[test]
    fn test_param_names_are_per_route() {
        let router = router(&[(Method::GET, "/u/:id", "show"), (Method::PUT, "/u/:uid", "update")]);
        let put = router.route(&Method::PUT, "/u/:uid").unwrap();
        let get = router.route(&Method::GET, "/u/:id").unwrap();
        assert_eq!(&put.param_names()[..], &["uid".to_string()]);
        assert_eq!(&get.param_names()[..], &["id".to_string()]);
    }

    #[test]
    fn test_root_and_empty_pattern() {
        let router = router(&[(Method::GET, "", "root")]);
        let mut params = Params::default();
        assert_eq!(found_name(&router, Method::GET, "/", &mut params).as_deref(), Some("root"));
        assert_eq!(router.routes()[0].path(), "/");
    }

    #[test]
    fn test_conflicts() {
        let mut router = router(&[(Method::GET, "/files/*a", "a"), (Method::GET, "/u/:id", "id")]);

        let err = router.add(Method::GET, "/files/*b", handler(), "b").unwrap_err();
        assert!(matches!(err, RouteError::Conflict { ref existing, .. } if existing == "/files/*a"));

        let err = router.add(Method::GET, "/u/:uid", handler(), "uid").unwrap_err();
        assert!(matches!(err, RouteError::Conflict { .. }));

        router.add(Method::POST, "/u/:uid", Arc::new(MethodNotAllowedHandler), "create").unwrap();
    }

    #[test]
    fn test_reverse() {
        let router = router(&[(Method::GET, "/users/:id/files/*", "file"), (Method::GET, "/", "root")]);

        let route = router.route(&Method::GET, "/users/:id/files/*").unwrap();
        assert_eq!(route.reverse(&[&42, &"a/b.txt"]).unwrap(), "/users/42/files/a/b.txt");
        assert_eq!(
            route.reverse(&[&42]).unwrap_err(),
            ReverseError::MissingParams { name: "file".into(), expected: 2, given: 1 }
        );

        let root = router.route(&Method::GET, "/").unwrap();
        assert_eq!(root.reverse(&[]).unwrap(), "/");
    }

    #[test]
    fn test_params_reuse_slots() {
        let mut params = Params::with_capacity(2);
        params.push("a");
        params.push("b");
        params.push("c");
        assert_eq!(params.len(), 3);
        assert_eq!(params.capacity(), 3);

        params.clear();
        assert!(params.is_empty());
        assert_eq!(params.get(0), None);
        assert_eq!(params.capacity(), 3);
    }
}
