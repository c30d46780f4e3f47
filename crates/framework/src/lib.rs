//! Application layer of the switchyard framework: TOML configuration, plugin lifecycle,
//! cookie sessions and the [`Framework`] bootstrap that wires them onto a
//! [`Mux`](switchyard_web::Mux).

pub mod config;
pub mod crypto;
mod framework;
pub mod plugin;
pub mod session;

pub use config::{AppConfig, Config, ConfigError, PluginsConfig};
pub use crypto::secure_token;
pub use framework::{Framework, FrameworkError, init_tracing};
pub use plugin::{LoadedPlugins, Plugin, PluginError, PluginRegistry};
pub use session::{Session, SessionExt, SessionManager};
