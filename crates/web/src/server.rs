//! HTTP/1 transport: accepts TCP connections with tokio, serves them with hyper and feeds
//! every request to [`Mux::dispatch`].

use crate::body::ResponseBody;
use crate::mux::Mux;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::convert::Infallible;
use std::future;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Default limit of a buffered request body: 4 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: "0.0.0.0:3000".to_owned(), max_body_size: DEFAULT_MAX_BODY_SIZE }
    }
}

#[derive(Debug)]
pub struct ServerBuilder {
    mux: Option<Mux>,
    address: Option<String>,
    max_body_size: usize,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { mux: None, address: None, max_body_size: DEFAULT_MAX_BODY_SIZE }
    }

    pub fn mux(mut self, mux: Mux) -> Self {
        self.mux = Some(mux);
        self
    }

    pub fn bind(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn config(self, config: ServerConfig) -> Self {
        self.bind(config.address).max_body_size(config.max_body_size)
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let mux = self.mux.ok_or(ServerBuildError::MissingMux)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?;
        Ok(Server { mux: Arc::new(mux), address, max_body_size: self.max_body_size })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("mux must be set")]
    MissingMux,
    #[error("address must be set")]
    MissingAddress,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },
}

#[derive(Debug)]
pub struct Server {
    mux: Arc<Mux>,
    address: String,
    max_body_size: usize,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn mux(&self) -> &Arc<Mux> {
        &self.mux
    }

    /// Serves until the process exits.
    pub async fn start(self) -> Result<(), ServerError> {
        self.start_with_shutdown(future::pending()).await
    }

    /// Serves until `signal` completes. Connections already accepted run to completion on
    /// their own tasks.
    pub async fn start_with_shutdown(self, signal: impl Future<Output = ()>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.address.as_str())
            .await
            .map_err(|source| ServerError::Bind { address: self.address.clone(), source })?;
        self.serve(listener, signal).await;
        Ok(())
    }

    /// Serves connections from an already bound listener until `signal` completes.
    pub async fn serve(self, listener: TcpListener, signal: impl Future<Output = ()>) {
        match listener.local_addr() {
            Ok(address) => info!(%address, "start listening"),
            Err(e) => warn!(cause = %e, "listening on unknown address"),
        }

        let server = Arc::new(self);
        tokio::pin!(signal);

        loop {
            let (tcp_stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
                () = &mut signal => {
                    info!("shutdown signal received, stop accepting");
                    break;
                }
            };

            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle(request).await) }
                });

                match http1::Builder::new().serve_connection(TokioIo::new(tcp_stream), service).await {
                    Ok(()) => debug!(%remote_addr, "connection closed"),
                    Err(e) => error!(%remote_addr, cause = %e, "connection error"),
                }
            });
        }
    }

    async fn handle(&self, request: Request<Incoming>) -> Response<ResponseBody> {
        let (parts, body) = request.into_parts();
        match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => self.mux.dispatch(Request::from_parts(parts, collected.to_bytes())).await,
            Err(e) => {
                let status = if e.downcast_ref::<LengthLimitError>().is_some() {
                    StatusCode::PAYLOAD_TOO_LARGE
                } else {
                    StatusCode::BAD_REQUEST
                };
                warn!(
                    cause = %e,
                    method = %parts.method,
                    uri = %parts.uri,
                    status = status.as_u16(),
                    "failed to read request body"
                );
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = status;
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Server, ServerBuildError};
    use crate::mux::{Mux, get, post};
    use crate::{BoxError, Context, handler_fn};
    use http::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    async fn show_user(ctx: &mut Context) -> Result<(), BoxError> {
        let id = ctx.param("id").unwrap_or_default().to_owned();
        ctx.string(StatusCode::OK, format!("id={id}"))
    }

    async fn echo(ctx: &mut Context) -> Result<(), BoxError> {
        let body = ctx.request().body().clone();
        ctx.blob(StatusCode::OK, "application/octet-stream", body)
    }

    async fn roundtrip(address: std::net::SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(address).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn build_requires_mux_and_address() {
        assert!(matches!(Server::builder().bind("127.0.0.1:0").build(), Err(ServerBuildError::MissingMux)));

        let mux = Mux::builder().build().unwrap();
        assert!(matches!(Server::builder().mux(mux).build(), Err(ServerBuildError::MissingAddress)));
    }

    #[tokio::test]
    async fn serves_requests_until_shutdown() {
        let mut builder = Mux::builder();
        builder.route("/users/:id", get(handler_fn(show_user))).route("/echo", post(handler_fn(echo)));
        let server = Server::builder().mux(builder.build().unwrap()).bind("unused").max_body_size(8).build().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let serving = tokio::spawn(server.serve(listener, async move {
            let _ = stopped.await;
        }));

        let response =
            roundtrip(address, "GET /users/42 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with("id=42"), "{response}");

        let response =
            roundtrip(address, "DELETE /users/42 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed"), "{response}");

        let response = roundtrip(
            address,
            "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\nConnection: close\r\n\r\nping",
        )
        .await;
        assert!(response.ends_with("ping"), "{response}");

        let response = roundtrip(
            address,
            "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 16\r\nConnection: close\r\n\r\n0123456789abcdef",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large"), "{response}");

        stop.send(()).unwrap();
        serving.await.unwrap();
    }
}
