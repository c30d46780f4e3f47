//! A complete application: the `product` plugin plus the account service.
//!
//! ```sh
//! cargo run -p switchyard-framework --example server
//! curl localhost:3000/product
//! ```

use http::StatusCode;
use std::sync::Arc;
use switchyard_account::MemoryUserStore;
use switchyard_framework::{Config, Framework, Plugin, PluginRegistry, SessionExt, init_tracing};
use switchyard_web::mux::get;
use switchyard_web::{BoxError, Context, MuxBuilder, handler_fn};
use tracing::info;

const CONFIG: &str = r#"
[app]
env = "development"
debug = true
key = "0123456789abcdef0123456789abcdef"

[server]
address = "127.0.0.1:3000"
"#;

struct ProductPlugin;

impl Plugin for ProductPlugin {
    fn install(&mut self) -> Result<(), BoxError> {
        info!("Install Hook");
        Ok(())
    }

    fn post_install(&mut self) -> Result<(), BoxError> {
        info!("PostInstall Hook");
        Ok(())
    }

    fn configure_routes(&self, builder: &mut MuxBuilder) {
        builder.route("/product", get(handler_fn(product)));
    }
}

async fn product(ctx: &mut Context) -> Result<(), BoxError> {
    let visits = match ctx.session_mut() {
        Some(session) => {
            let visits = session.get::<u64>("visits").unwrap_or_default() + 1;
            session.put("visits", &visits)?;
            visits
        }
        None => 0,
    };
    ctx.string(StatusCode::OK, format!("Hello from ProductPlugin (visit {visits})"))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_toml_str(CONFIG)?;
    init_tracing(config.app.debug)?;

    let mut registry = PluginRegistry::new();
    registry.register("product", || ProductPlugin)?;

    let mut framework = Framework::new(config, &registry)?;
    framework.add_service(switchyard_account::service(Arc::new(MemoryUserStore::new())));
    framework.start().await?;
    Ok(())
}
