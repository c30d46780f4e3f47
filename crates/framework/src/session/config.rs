use serde::Deserialize;

/// Session lifetime and cookie settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Absolute lifetime of a session, counted from its creation.
    pub lifetime_secs: u32,
    /// Expire sessions idle for this long; `None` disables the idle timeout.
    pub idle_timeout_secs: Option<u32>,
    /// How often the in-memory store drops expired sessions while serving.
    pub cleanup_interval_secs: u32,
    pub cookie: CookieConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 24 * 60 * 60,
            idle_timeout_secs: None,
            cleanup_interval_secs: 60,
            cookie: CookieConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub domain: Option<String>,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    /// Send `Expires`/`Max-Age` so the cookie outlives the browser session.
    pub persist: bool,
    pub same_site: SameSite,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session".to_owned(),
            domain: None,
            path: "/".to_owned(),
            http_only: true,
            secure: false,
            persist: true,
            same_site: SameSite::Lax,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl From<SameSite> for cookie::SameSite {
    fn from(same_site: SameSite) -> Self {
        match same_site {
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::None => cookie::SameSite::None,
        }
    }
}
