//! Per-request state handed through the middleware chain to the handler.
//!
//! A [`Context`] owns the request, buffers the response, holds the matched route and its
//! parameter values, and carries a typed key/value store for middleware-to-handler
//! communication. Contexts are recycled by the [`ContextPool`](crate::pool::ContextPool):
//! every piece of request state is cleared before a context is handed out again.

mod bind;
mod response;

pub use bind::{BindError, Validate, ValidationError};
pub use response::ResponseWriter;

use crate::error::{BoxError, ContextError};
use crate::fs::{INDEX_FILE, file_error};
use crate::handler::BoxHandler;
use crate::router::{Params, Route};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::body::ResponseBody;

/// Renders named templates for [`Context::render`].
pub trait Renderer: Send + Sync {
    fn render(&self, name: &str, data: &serde_json::Value) -> Result<String, BoxError>;
}

/// Policy shared by every context of one mux.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) debug: bool,
    pub(crate) renderer: Option<Arc<dyn Renderer>>,
}

pub struct Context {
    request: Request<Bytes>,
    response: ResponseWriter,
    route: Option<Arc<Route>>,
    param_names: Arc<[String]>,
    params: Params,
    handler: Option<BoxHandler>,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn new(max_params: usize, shared: Arc<Shared>) -> Self {
        Self {
            request: Request::default(),
            response: ResponseWriter::default(),
            route: None,
            param_names: Arc::new([]),
            params: Params::with_capacity(max_params),
            handler: None,
            store: HashMap::new(),
            shared,
        }
    }

    /// Clears all state of a previous request and installs `request`.
    pub(crate) fn reset(&mut self, request: Request<Bytes>) {
        self.clear();
        self.request = request;
    }

    pub(crate) fn clear(&mut self) {
        self.request = Request::default();
        self.response.reset();
        self.route = None;
        self.param_names = Arc::new([]);
        self.params.clear();
        self.handler = None;
        self.store.clear();
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request<Bytes> {
        &mut self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// The request path, e.g. `/users/42`.
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.request.headers().get(name).and_then(|value| value.to_str().ok())
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    /// The route matched for this request, if resolution already happened.
    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn handler(&self) -> Option<&BoxHandler> {
        self.handler.as_ref()
    }

    pub(crate) fn set_handler(&mut self, handler: BoxHandler) {
        self.handler = Some(handler);
    }

    pub(crate) fn set_route(&mut self, route: Arc<Route>) {
        self.param_names = Arc::clone(route.param_names());
        self.route = Some(route);
    }

    #[cfg(test)]
    pub(crate) fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub(crate) fn request_and_params(&mut self) -> (&Request<Bytes>, &mut Params) {
        (&self.request, &mut self.params)
    }

    /// The value captured for the parameter `name` of the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        let index = self.param_names.iter().position(|param| param == name)?;
        self.params.get(index)
    }

    /// Parameter name/value pairs in declaration order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.param_names.iter().map(String::as_str).zip(self.params.iter())
    }

    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self, key: &str) -> Option<&mut T> {
        self.store.get_mut(key).and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self, key: &str) -> Option<T> {
        self.store.remove(key).and_then(|value| value.downcast::<T>().ok()).map(|value| *value)
    }

    pub fn is_debug(&self) -> bool {
        self.shared.debug
    }

    pub fn string(&mut self, code: StatusCode, body: impl Into<String>) -> Result<(), BoxError> {
        self.blob(code, mime::TEXT_PLAIN_UTF_8.as_ref(), body.into())
    }

    pub fn html(&mut self, code: StatusCode, body: impl Into<String>) -> Result<(), BoxError> {
        self.blob(code, mime::TEXT_HTML_UTF_8.as_ref(), body.into())
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) -> Result<(), BoxError> {
        let body = serde_json::to_vec(value).map_err(ContextError::from)?;
        self.blob(code, mime::APPLICATION_JSON.as_ref(), body)
    }

    pub fn json_pretty<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) -> Result<(), BoxError> {
        let body = serde_json::to_vec_pretty(value).map_err(ContextError::from)?;
        self.blob(code, mime::APPLICATION_JSON.as_ref(), body)
    }

    /// Writes `body` with the given content type.
    pub fn blob(&mut self, code: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Result<(), BoxError> {
        let content_type = HeaderValue::from_str(content_type).map_err(ContextError::from)?;
        self.response.headers_mut().insert(CONTENT_TYPE, content_type);
        self.response.write_header(code);
        self.response.write(&body.into());
        Ok(())
    }

    pub fn no_content(&mut self, code: StatusCode) -> Result<(), BoxError> {
        self.response.write_header(code);
        Ok(())
    }

    /// Redirects to `url`; `code` must be a `3xx` status.
    pub fn redirect(&mut self, code: StatusCode, url: &str) -> Result<(), BoxError> {
        if !code.is_redirection() {
            return Err(ContextError::InvalidRedirectCode(code).into());
        }
        let location = HeaderValue::from_str(url).map_err(ContextError::from)?;
        self.response.headers_mut().insert(LOCATION, location);
        self.response.write_header(code);
        Ok(())
    }

    /// Writes the file at `path` with a content type guessed from its extension. A directory
    /// is answered with its [`INDEX_FILE`]; a missing file is a `404`.
    pub async fn file(&mut self, path: impl AsRef<Path>) -> Result<(), BoxError> {
        let mut path = path.as_ref().to_path_buf();
        if tokio::fs::metadata(&path).await.map_err(file_error)?.is_dir() {
            path.push(INDEX_FILE);
        }
        let body = tokio::fs::read(&path).await.map_err(file_error)?;
        let content_type = mime_guess::from_path(&path).first_or_octet_stream();
        self.blob(StatusCode::OK, content_type.as_ref(), body)
    }

    /// Renders the template `name` with the mux's [`Renderer`] and writes it as HTML.
    pub fn render<T: Serialize + ?Sized>(&mut self, code: StatusCode, name: &str, data: &T) -> Result<(), BoxError> {
        let renderer = self.shared.renderer.clone().ok_or(ContextError::RendererNotRegistered)?;
        let data = serde_json::to_value(data).map_err(ContextError::from)?;
        let html = renderer.render(name, &data)?;
        self.html(code, html)
    }

    pub(crate) fn take_response(&mut self) -> Response<ResponseBody> {
        self.response.take()
    }

    #[cfg(test)]
    pub(crate) fn for_test() -> Self {
        Self::new(0, Arc::new(Shared::default()))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("route", &self.route)
            .field("params", &self.params().collect::<Vec<_>>())
            .field("status", &self.response.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, Renderer, Shared};
    use crate::error::{BoxError, ContextError};
use crate::fs::{INDEX_FILE, file_error};
    use bytes::Bytes;
    use http::header::{CONTENT_TYPE, LOCATION};
    use http::{Request, StatusCode};
    use serde_json::json;
    use std::sync::Arc;

    struct Upper;

    impl Renderer for Upper {
        fn render(&self, name: &str, data: &serde_json::Value) -> Result<String, BoxError> {
            Ok(format!("<h1>{}</h1>{}", name.to_uppercase(), data["title"].as_str().unwrap_or_default()))
        }
    }

    #[test]
    fn store_is_typed() {
        let mut ctx = Context::for_test();
        ctx.set("user", 42_u64);
        assert_eq!(ctx.get::<u64>("user"), Some(&42));
        assert_eq!(ctx.get::<String>("user"), None);

        *ctx.get_mut::<u64>("user").unwrap() += 1;
        assert_eq!(ctx.remove::<u64>("user"), Some(43));
        assert!(ctx.get::<u64>("user").is_none());
    }

    #[test]
    fn json_response() {
        let mut ctx = Context::for_test();
        ctx.json(StatusCode::CREATED, &json!({"id": 1})).unwrap();

        let response = ctx.take_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.body().as_bytes(), br#"{"id":1}"#);
    }

    #[test]
    fn redirect_requires_3xx() {
        let mut ctx = Context::for_test();
        let err = ctx.redirect(StatusCode::OK, "/login").unwrap_err();
        assert!(matches!(err.downcast_ref::<ContextError>(), Some(ContextError::InvalidRedirectCode(_))));

        ctx.redirect(StatusCode::FOUND, "/login").unwrap();
        let response = ctx.take_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/login");
    }

    #[test]
    fn render_needs_renderer() {
        let mut ctx = Context::for_test();
        let err = ctx.render(StatusCode::OK, "index", &json!({})).unwrap_err();
        assert!(matches!(err.downcast_ref::<ContextError>(), Some(ContextError::RendererNotRegistered)));

        let mut ctx = Context::new(0, Arc::new(Shared { debug: false, renderer: Some(Arc::new(Upper)) }));
        ctx.render(StatusCode::OK, "index", &json!({"title": "hi"})).unwrap();
        assert_eq!(ctx.response().body(), b"<h1>INDEX</h1>hi");
    }

    #[test]
    fn reset_clears_previous_request() {
        let mut ctx = Context::for_test();
        ctx.reset(Request::get("/a").body(Bytes::new()).unwrap());
        ctx.set("k", "v");
        ctx.params_mut().push("secret");
        ctx.string(StatusCode::OK, "body").unwrap();

        ctx.reset(Request::get("/b").body(Bytes::new()).unwrap());
        assert_eq!(ctx.path(), "/b");
        assert!(ctx.get::<&str>("k").is_none());
        assert_eq!(ctx.params().count(), 0);
        assert!(ctx.params_mut().get(0).is_none());
        assert!(ctx.handler().is_none());
        assert!(!ctx.response().is_committed());
        assert!(ctx.response().body().is_empty());
    }
}
