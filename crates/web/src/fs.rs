//! Serving files from disk.
//!
//! [`StaticDir`] maps the catch-all remainder of its route onto a directory and [`ServeFile`]
//! always answers with the same file. Both are usually registered through
//! [`MuxBuilder::static_dir`](crate::MuxBuilder::static_dir) and
//! [`MuxBuilder::file`](crate::MuxBuilder::file).

use crate::Context;
use crate::error::{BoxError, HttpError};
use crate::handler::Handler;
use async_trait::async_trait;
use http::StatusCode;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Served in place of a directory.
pub const INDEX_FILE: &str = "index.html";

/// Serves the files below `root`, addressed by the last parameter of the route.
///
/// The requested path is resolved against `/` before it is joined to `root`, so `..` can
/// never leave the directory. A directory requested without a trailing slash is redirected
/// to the slash form.
#[derive(Debug, Clone)]
pub struct StaticDir {
    root: PathBuf,
}

impl StaticDir {
    /// An empty `root` serves the working directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self { root: if root.as_os_str().is_empty() { PathBuf::from(".") } else { root } }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Handler for StaticDir {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let raw = ctx.params().last().map(|(_, value)| value.to_owned()).unwrap_or_default();
        let decoded = urlencoding::decode(&raw).map_err(|e| HttpError::bad_request().with_internal(e))?;
        let Some(relative) = clean(&decoded) else {
            return Err(HttpError::not_found().into());
        };

        let path = self.root.join(relative);
        let metadata = tokio::fs::metadata(&path).await.map_err(file_error)?;
        if metadata.is_dir() && !ctx.path().ends_with('/') {
            let location = format!("{}/", ctx.path());
            return ctx.redirect(StatusCode::MOVED_PERMANENTLY, &location);
        }
        ctx.file(&path).await
    }
}

/// Answers every request with the file at `path`.
#[derive(Debug, Clone)]
pub struct ServeFile {
    path: PathBuf,
}

impl ServeFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Handler for ServeFile {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        ctx.file(&self.path).await
    }
}

/// Lexically resolves `path` as if rooted at `/`: empty and `.` segments vanish and `..`
/// drops the previous segment. `None` when a segment is not a plain file name.
fn clean(path: &str) -> Option<PathBuf> {
    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    let cleaned: PathBuf = parts.into_iter().collect();
    cleaned.components().all(|component| matches!(component, Component::Normal(_))).then_some(cleaned)
}

pub(crate) fn file_error(e: io::Error) -> BoxError {
    let error = match e.kind() {
        io::ErrorKind::PermissionDenied => HttpError::forbidden(),
        _ => HttpError::not_found(),
    };
    error.with_internal(e).into()
}
