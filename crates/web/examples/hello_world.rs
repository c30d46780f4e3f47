use http::StatusCode;
use serde::Deserialize;
use switchyard_web::middleware::{Recover, RemoveTrailingSlash, RequestLogger};
use switchyard_web::mux::{Mux, get, post};
use switchyard_web::{BoxError, Context, Server, handler_fn};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Debug)]
struct User {
    name: String,
    zip: String,
}

async fn hello_world(ctx: &mut Context) -> Result<(), BoxError> {
    ctx.string(StatusCode::OK, "hello world")
}

async fn show_file(ctx: &mut Context) -> Result<(), BoxError> {
    let path = ctx.param("path").unwrap_or_default().to_owned();
    ctx.string(StatusCode::OK, format!("file: {path}\r\n"))
}

// curl -v -d "name=hello&zip=world" http://127.0.0.1:3000/user
// curl -v -H 'Content-Type: application/json' -d '{"name":"hello","zip":"world"}' http://127.0.0.1:3000/user
async fn create_user(ctx: &mut Context) -> Result<(), BoxError> {
    let user: User = ctx.bind()?;
    ctx.string(StatusCode::OK, format!("receive user: {user:#?}\r\n"))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut builder = Mux::builder();
    builder
        .pre(RemoveTrailingSlash)
        .with(RequestLogger)
        .with(Recover)
        .route("/", get(handler_fn(hello_world)))
        .route("/files/*path", get(handler_fn(show_file)))
        .route("/user", post(handler_fn(create_user)));

    Server::builder().mux(builder.build()?).bind("127.0.0.1:3000").build()?.start().await?;
    Ok(())
}
