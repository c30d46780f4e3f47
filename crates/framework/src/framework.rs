use crate::config::{Config, ConfigError};
use crate::plugin::{LoadedPlugins, PluginError, PluginRegistry};
use crate::session::{MemoryStore, SessionManager};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use switchyard_web::middleware::{Recover, RequestLogger};
use switchyard_web::server::ServerBuildError;
use switchyard_web::{Mux, MuxBuilder, MuxConfig, RouteError, Server};
use thiserror::Error;
use tracing::Level;
use tracing::info;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;

#[derive(Error, Debug)]
pub enum FrameworkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    ServerBuild(#[from] ServerBuildError),

    #[error(transparent)]
    Server(#[from] switchyard_web::server::ServerError),
}

/// Installs a global fmt subscriber; `debug` lowers the level from `INFO` to `DEBUG`.
pub fn init_tracing(debug: bool) -> Result<(), SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder().with_max_level(if debug { Level::DEBUG } else { Level::INFO }).finish();
    tracing::subscriber::set_global_default(subscriber)
}

/// An application: configuration, activated plugins and the mux being assembled.
///
/// ```no_run
/// use switchyard_framework::{Config, Framework, PluginRegistry};
///
/// # async fn run() -> Result<(), switchyard_framework::FrameworkError> {
/// let config = Config::from_file("switchyard.toml")?;
/// let mut framework = Framework::new(config, &PluginRegistry::new())?;
/// framework.add_service(|_builder| {});
/// framework.start().await
/// # }
/// ```
pub struct Framework {
    config: Config,
    builder: MuxBuilder,
    plugins: LoadedPlugins,
    sessions: Arc<MemoryStore>,
}

impl Framework {
    /// Validates `config`, installs the default middleware and activates the enabled plugins.
    pub fn new(config: Config, registry: &PluginRegistry) -> Result<Self, FrameworkError> {
        config.validate()?;

        let sessions = Arc::new(MemoryStore::new());
        let mut builder = Mux::builder();
        builder
            .config(MuxConfig { debug: config.app.debug, ..MuxConfig::default() })
            .with(RequestLogger)
            .with(Recover)
            .with(SessionManager::new(config.session.clone(), Arc::clone(&sessions)));

        let plugins = registry.initialize(&config.plugins.enabled, &mut builder)?;
        info!(app = %config.app.name, env = %config.app.env, plugins = plugins.len(), "framework initialized");

        Ok(Self { config, builder, plugins, sessions })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn plugins(&self) -> &LoadedPlugins {
        &self.plugins
    }

    /// The store behind the default session middleware.
    pub fn session_store(&self) -> &Arc<MemoryStore> {
        &self.sessions
    }

    /// Lets a service register its routes and middleware.
    pub fn add_service(&mut self, service: impl FnOnce(&mut MuxBuilder)) -> &mut Self {
        service(&mut self.builder);
        self
    }

    /// Builds the mux without serving it. Plugins stay active.
    pub fn into_mux(self) -> Result<Mux, FrameworkError> {
        Ok(self.builder.build()?)
    }

    /// Serves on the configured address until the process exits.
    pub async fn start(self) -> Result<(), FrameworkError> {
        self.start_with_shutdown(std::future::pending()).await
    }

    /// Serves until `signal` completes, then deactivates the plugins.
    ///
    /// Expired sessions are swept from the store every `session.cleanup_interval_secs` while
    /// serving.
    pub async fn start_with_shutdown(self, signal: impl Future<Output = ()>) -> Result<(), FrameworkError> {
        let Self { config, builder, mut plugins, sessions } = self;
        let mux = builder.build()?;
        let server = Server::builder().mux(mux).config(config.server).build()?;

        let period = Duration::from_secs(u64::from(config.session.cleanup_interval_secs.max(1)));
        let cleanup = sessions.spawn_cleanup(period);
        let result = server.start_with_shutdown(signal).await;
        cleanup.abort();
        plugins.deactivate_all();
        result.map_err(FrameworkError::from)
    }
}

impl fmt::Debug for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framework")
            .field("config", &self.config)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
