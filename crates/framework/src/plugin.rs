//! Plugin lifecycle.
//!
//! A plugin is registered under a name with a constructor. On startup every enabled plugin is
//! constructed and driven through `install`, `post_install` and `activate`, then asked to
//! register its routes. A failing or panicking hook aborts startup.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use switchyard_web::{BoxError, MuxBuilder};
use thiserror::Error;
use tracing::{info, warn};

/// Lifecycle hooks of a plugin. Every hook defaults to a no-op.
pub trait Plugin: Send + Sync {
    fn install(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn post_install(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn update(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn post_update(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn activate(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn configure_routes(&self, _builder: &mut MuxBuilder) {}
}

type Constructor = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin {0} is not registered")]
    Unknown(String),

    #[error("plugin {0} is already registered")]
    Duplicate(String),

    #[error("plugin {plugin} failed in {hook}: {source}")]
    Hook { plugin: String, hook: &'static str, source: BoxError },

    #[error("plugin {plugin} panicked in {hook}")]
    Panicked { plugin: String, hook: &'static str },
}

/// Plugin constructors by name, in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    entries: Vec<(String, Constructor)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, P>(&mut self, name: impl Into<String>, constructor: F) -> Result<&mut Self, PluginError>
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: Plugin + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(PluginError::Duplicate(name));
        }
        let boxed: Constructor = Box::new(move || Box::new(constructor()) as Box<dyn Plugin>);
        self.entries.push((name, boxed));
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(registered, _)| registered == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Constructs and activates the plugins named in `enabled`, in that order, and lets each
    /// register its routes on `builder`. An empty list enables every registered plugin.
    pub fn initialize(&self, enabled: &[String], builder: &mut MuxBuilder) -> Result<LoadedPlugins, PluginError> {
        let names: Vec<&str> = if enabled.is_empty() {
            self.names().collect()
        } else {
            enabled.iter().map(String::as_str).collect()
        };

        let mut loaded = LoadedPlugins { plugins: Vec::with_capacity(names.len()) };
        for name in names {
            let constructor = self
                .entries
                .iter()
                .find(|(registered, _)| registered == name)
                .map(|(_, constructor)| constructor)
                .ok_or_else(|| PluginError::Unknown(name.to_owned()))?;

            let mut plugin = constructor();
            run_hook(name, "install", || plugin.install())?;
            run_hook(name, "post_install", || plugin.post_install())?;
            run_hook(name, "activate", || plugin.activate())?;
            run_hook(name, "configure_routes", || {
                plugin.configure_routes(builder);
                Ok(())
            })?;

            info!(plugin = name, "plugin activated");
            loaded.plugins.push((name.to_owned(), plugin));
        }
        Ok(loaded)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry").field("plugins", &self.names().collect::<Vec<_>>()).finish()
    }
}

fn run_hook(plugin: &str, hook: &'static str, f: impl FnOnce() -> Result<(), BoxError>) -> Result<(), PluginError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(PluginError::Hook { plugin: plugin.to_owned(), hook, source }),
        Err(_) => Err(PluginError::Panicked { plugin: plugin.to_owned(), hook }),
    }
}

/// Activated plugins, in activation order.
pub struct LoadedPlugins {
    plugins: Vec<(String, Box<dyn Plugin>)>,
}

impl LoadedPlugins {
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|(name, _)| name.as_str())
    }

    /// Runs `update` then `post_update` on every plugin, stopping at the first failure.
    pub fn update_all(&mut self) -> Result<(), PluginError> {
        for (name, plugin) in &mut self.plugins {
            run_hook(name, "update", || plugin.update())?;
            run_hook(name, "post_update", || plugin.post_update())?;
        }
        Ok(())
    }

    /// Deactivates every plugin in reverse activation order. Failures are logged, not returned.
    pub fn deactivate_all(&mut self) {
        for (name, plugin) in self.plugins.iter_mut().rev() {
            match run_hook(name, "deactivate", || plugin.deactivate()) {
                Ok(()) => info!(plugin = %name, "plugin deactivated"),
                Err(e) => warn!(cause = %e, "failed to deactivate plugin"),
            }
        }
    }
}

impl fmt::Debug for LoadedPlugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugins").field("plugins", &self.names().collect::<Vec<_>>()).finish()
    }
}
