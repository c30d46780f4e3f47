use crate::Context;
use crate::decorator::Decorator;
use crate::error::BoxError;
use crate::handler::{BoxHandler, Handler};
use async_trait::async_trait;
use http::uri::{PathAndQuery, Uri};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Rewrites `/users/` to `/users` before the route is resolved.
///
/// Route patterns cannot end with a slash, so this belongs in the mux's pre middleware.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveTrailingSlash;

pub struct RemoveTrailingSlashHandler {
    next: BoxHandler,
}

impl fmt::Debug for RemoveTrailingSlashHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoveTrailingSlashHandler").field("next", &self.next.name()).finish()
    }
}

impl Decorator<BoxHandler> for RemoveTrailingSlash {
    type Out = BoxHandler;

    fn decorate(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RemoveTrailingSlashHandler { next })
    }
}

#[async_trait]
impl Handler for RemoveTrailingSlashHandler {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        if let Some(uri) = trimmed(ctx.request().uri()) {
            debug!(from = %ctx.request().uri(), to = %uri, "trailing slash removed");
            *ctx.request_mut().uri_mut() = uri;
        }
        self.next.call(ctx).await
    }
}

fn trimmed(uri: &Uri) -> Option<Uri> {
    let path = uri.path();
    let path_without_slash = path.trim_end_matches('/');
    if path_without_slash.len() == path.len() || path_without_slash.is_empty() {
        return None;
    }

    let path_and_query = match uri.query() {
        Some(query) => format!("{path_without_slash}?{query}"),
        None => path_without_slash.to_owned(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

#[cfg(test)]
mod tests {
    use super::trimmed;
    use http::Uri;

    #[test]
    fn trims_path_and_keeps_query() {
        let uri = trimmed(&Uri::from_static("/users/?page=2")).unwrap();
        assert_eq!(uri.path(), "/users");
        assert_eq!(uri.query(), Some("page=2"));

        let uri = trimmed(&Uri::from_static("http://example.com/a//")).unwrap();
        assert_eq!(uri, "http://example.com/a");
    }

    #[test]
    fn leaves_root_and_clean_paths() {
        assert!(trimmed(&Uri::from_static("/")).is_none());
        assert!(trimmed(&Uri::from_static("/users")).is_none());
    }
}
