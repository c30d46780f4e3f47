//! Cookie-based sessions.
//!
//! [`SessionManager`] is a middleware: it loads the session named by the request cookie
//! before the handler runs and, afterwards, commits a modified session to the
//! [`SessionStore`] and writes the cookie, or expires the cookie of a destroyed one. Handlers
//! reach the session through [`SessionExt`].

mod config;
mod store;

pub use config::{CookieConfig, SameSite, SessionConfig};
pub use store::{MemoryStore, SessionStore};

use crate::crypto::secure_token;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use cookie::Cookie;
use cookie::time::{Duration, OffsetDateTime};
use http::header::{CACHE_CONTROL, COOKIE, InvalidHeaderValue, SET_COOKIE, VARY};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use switchyard_web::context::ResponseWriter;
use switchyard_web::decorator::Decorator;
use switchyard_web::{BoxError, BoxHandler, Context, Handler, HttpError};
use thiserror::Error;
use tracing::error;

/// Key of the [`Session`] in the context store.
pub const SESSION_KEY: &str = "switchyard.session";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session store failed: {0}")]
    Store(BoxError),

    #[error("failed to encode session: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid session cookie: {0}")]
    Cookie(#[from] InvalidHeaderValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unmodified,
    Modified,
    Destroyed,
}

#[derive(Serialize, Deserialize)]
struct Record {
    deadline: DateTime<Utc>,
    values: Map<String, Value>,
}

/// The session of one request.
#[derive(Debug)]
pub struct Session {
    token: Option<String>,
    stale_token: Option<String>,
    deadline: DateTime<Utc>,
    values: Map<String, Value>,
    status: Status,
}

impl Session {
    fn fresh(deadline: DateTime<Utc>) -> Self {
        Self { token: None, stale_token: None, deadline, values: Map::new(), status: Status::Unmodified }
    }

    fn loaded(token: String, record: Record) -> Self {
        Self {
            token: Some(token),
            stale_token: None,
            deadline: record.deadline,
            values: record.values,
            status: Status::Unmodified,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The instant the session expires regardless of activity.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn put<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) -> Result<(), SessionError> {
        self.values.insert(key.into(), serde_json::to_value(value)?);
        self.status = Status::Modified;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.status = Status::Modified;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.status = Status::Modified;
        }
    }

    /// Drops all data and expires the cookie. Writing to the session afterwards starts a new
    /// one under a new token.
    pub fn destroy(&mut self) {
        self.retire_token();
        self.values.clear();
        self.status = Status::Destroyed;
    }

    /// Keeps the data but moves it to a new token; call it on privilege changes such as login.
    pub fn renew_token(&mut self) {
        self.retire_token();
        self.status = Status::Modified;
    }

    fn retire_token(&mut self) {
        if let Some(token) = self.token.take() {
            self.stale_token.get_or_insert(token);
        }
    }
}

/// Session access for handlers running behind a [`SessionManager`].
pub trait SessionExt {
    fn session(&self) -> Option<&Session>;

    fn session_mut(&mut self) -> Option<&mut Session>;
}

impl SessionExt for Context {
    fn session(&self) -> Option<&Session> {
        self.get::<Session>(SESSION_KEY)
    }

    fn session_mut(&mut self) -> Option<&mut Session> {
        self.get_mut::<Session>(SESSION_KEY)
    }
}

/// Loads and saves sessions; install it with `MuxBuilder::with`.
#[derive(Clone)]
pub struct SessionManager {
    config: Arc<SessionConfig>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, store: impl SessionStore + 'static) -> Self {
        Self { config: Arc::new(config), store: Arc::new(store) }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The session token carried by the request's cookies.
    pub fn token_from(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.config.cookie.name)
            .map(|cookie| cookie.value().to_owned())
    }

    /// The live session stored under `token`, or a new empty one.
    pub async fn load(&self, token: Option<&str>) -> Result<Session, SessionError> {
        if let Some(token) = token.filter(|token| !token.is_empty()) {
            if let Some(data) = self.store.find(token).await.map_err(SessionError::Store)? {
                let record: Record = serde_json::from_slice(&data)?;
                if record.deadline > Utc::now() {
                    return Ok(Session::loaded(token.to_owned(), record));
                }
            }
        }
        Ok(Session::fresh(Utc::now() + TimeDelta::seconds(i64::from(self.config.lifetime_secs))))
    }

    /// Persists `session` according to its status and writes the matching cookie.
    pub async fn save(&self, session: Session, response: &mut ResponseWriter) -> Result<(), SessionError> {
        if let Some(stale) = &session.stale_token {
            self.store.delete(stale).await.map_err(SessionError::Store)?;
        }

        match session.status {
            Status::Modified => self.commit(session, response).await,
            Status::Unmodified if self.config.idle_timeout_secs.is_some() && session.token.is_some() => {
                self.commit(session, response).await
            }
            Status::Unmodified => Ok(()),
            Status::Destroyed => {
                if let Some(token) = &session.token {
                    self.store.delete(token).await.map_err(SessionError::Store)?;
                }
                self.write_cookie(response, String::new(), None)
            }
        }
    }

    async fn commit(&self, session: Session, response: &mut ResponseWriter) -> Result<(), SessionError> {
        let expiry = match self.config.idle_timeout_secs {
            Some(idle) => session.deadline.min(Utc::now() + TimeDelta::seconds(i64::from(idle))),
            None => session.deadline,
        };
        let token = session.token.unwrap_or_else(secure_token);
        let data = serde_json::to_vec(&Record { deadline: session.deadline, values: session.values })?;

        self.store.commit(&token, data, expiry).await.map_err(SessionError::Store)?;
        self.write_cookie(response, token, Some(expiry))
    }

    fn write_cookie(
        &self,
        response: &mut ResponseWriter,
        token: String,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), SessionError> {
        let config = &self.config.cookie;
        let mut builder = Cookie::build((config.name.clone(), token))
            .path(config.path.clone())
            .http_only(config.http_only)
            .secure(config.secure)
            .same_site(config.same_site.into());
        if let Some(domain) = &config.domain {
            builder = builder.domain(domain.clone());
        }

        match expiry {
            None => {
                builder = builder.max_age(Duration::ZERO);
                if let Ok(expires) = OffsetDateTime::from_unix_timestamp(1) {
                    builder = builder.expires(expires);
                }
            }
            Some(expiry) if config.persist => {
                builder = builder.max_age(Duration::seconds((expiry - Utc::now()).num_seconds() + 1));
                if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expiry.timestamp() + 1) {
                    builder = builder.expires(expires);
                }
            }
            Some(_) => {}
        }

        let headers = response.headers_mut();
        headers.append(SET_COOKIE, HeaderValue::try_from(builder.build().to_string())?);
        append_if_missing(headers, VARY, "Cookie");
        append_if_missing(headers, CACHE_CONTROL, r#"no-cache="Set-Cookie""#);
        Ok(())
    }
}

fn append_if_missing(headers: &mut HeaderMap, name: HeaderName, value: &'static str) {
    if !headers.get_all(&name).iter().any(|existing| existing == value) {
        headers.append(name, HeaderValue::from_static(value));
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Decorator<BoxHandler> for SessionManager {
    type Out = BoxHandler;

    fn decorate(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(SessionHandler { manager: self.clone(), next })
    }
}

pub struct SessionHandler {
    manager: SessionManager,
    next: BoxHandler,
}

impl fmt::Debug for SessionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandler").field("next", &self.next.name()).finish_non_exhaustive()
    }
}

fn internal(e: SessionError) -> BoxError {
    HttpError::internal_server_error().with_internal(e).into()
}

#[async_trait]
impl Handler for SessionHandler {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let token = self.manager.token_from(ctx.request().headers());
        let session = self.manager.load(token.as_deref()).await.map_err(internal)?;
        ctx.set(SESSION_KEY, session);

        let result = self.next.call(ctx).await;

        let Some(session) = ctx.remove::<Session>(SESSION_KEY) else {
            return result;
        };
        if let Err(e) = self.manager.save(session, ctx.response_mut()).await {
            error!(cause = %e, "failed to save session");
            ctx.response_mut().reset();
            return Err(internal(e));
        }
        result
    }

    fn name(&self) -> &'static str {
        self.next.name()
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, SessionConfig, SessionExt, SessionManager, SessionStore, Status};
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::{DateTime, Utc};
    use cookie::Cookie;
    use http::header::{CACHE_CONTROL, COOKIE, SET_COOKIE, VARY};
    use http::{Request, Response, StatusCode};
    use std::sync::{Arc, Mutex};
    use switchyard_web::mux::get;
    use switchyard_web::{BoxError, Context, Mux, ResponseBody, handler_fn};

    async fn login(ctx: &mut Context) -> Result<(), BoxError> {
        let session = ctx.session_mut().ok_or("no session")?;
        session.put("user", "ana")?;
        session.renew_token();
        ctx.string(StatusCode::OK, "logged in")
    }

    async fn whoami(ctx: &mut Context) -> Result<(), BoxError> {
        let user =
            ctx.session().and_then(|session| session.get::<String>("user")).unwrap_or_else(|| "nobody".to_owned());
        ctx.string(StatusCode::OK, user)
    }

    async fn logout(ctx: &mut Context) -> Result<(), BoxError> {
        ctx.session_mut().ok_or("no session")?.destroy();
        ctx.no_content(StatusCode::NO_CONTENT)
    }

    fn mux(manager: SessionManager) -> Mux {
        let mut builder = Mux::builder();
        builder
            .with(manager)
            .route("/login", get(handler_fn(login)))
            .route("/whoami", get(handler_fn(whoami)))
            .route("/logout", get(handler_fn(logout)));
        builder.build().unwrap()
    }

    async fn send(mux: &Mux, path: &str, cookie: Option<&str>) -> Response<ResponseBody> {
        let mut request = Request::get(path);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        mux.dispatch(request.body(Bytes::new()).unwrap()).await
    }

    fn session_cookie(response: &Response<ResponseBody>) -> String {
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_owned()
    }

    #[tokio::test]
    async fn modified_session_is_committed_and_loaded_back() {
        let store = Arc::new(MemoryStore::new());
        let mux = mux(SessionManager::new(SessionConfig::default(), Arc::clone(&store)));

        let response = send(&mux, "/login", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("session="), "{set_cookie}");
        assert!(set_cookie.contains("HttpOnly"), "{set_cookie}");
        assert!(set_cookie.contains("SameSite=Lax"), "{set_cookie}");
        assert!(set_cookie.contains("Path=/"), "{set_cookie}");
        assert!(set_cookie.contains("Max-Age="), "{set_cookie}");
        assert_eq!(response.headers()[VARY], "Cookie");
        assert_eq!(response.headers()[CACHE_CONTROL], r#"no-cache="Set-Cookie""#);
        assert_eq!(store.len(), 1);

        let cookie = session_cookie(&response);
        let response = send(&mux, "/whoami", Some(&cookie)).await;
        assert_eq!(response.body().as_bytes(), b"ana");
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn unknown_token_starts_fresh_session() {
        let mux = mux(SessionManager::new(SessionConfig::default(), MemoryStore::new()));

        let response = send(&mux, "/whoami", Some("session=forged; theme=dark")).await;
        assert_eq!(response.body().as_bytes(), b"nobody");
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn destroyed_session_expires_cookie() {
        let store = Arc::new(MemoryStore::new());
        let mux = mux(SessionManager::new(SessionConfig::default(), Arc::clone(&store)));

        let cookie = session_cookie(&send(&mux, "/login", None).await);
        let response = send(&mux, "/logout", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("session=;"), "{set_cookie}");
        assert!(set_cookie.contains("Max-Age=0"), "{set_cookie}");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn renew_token_moves_data() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(SessionConfig::default(), Arc::clone(&store));

        let mut session = manager.load(None).await.unwrap();
        session.put("n", &1).unwrap();
        let mut response = switchyard_web::context::ResponseWriter::default();
        manager.save(session, &mut response).await.unwrap();
        let first = manager.token_from(&cookie_headers(&response)).unwrap();

        let mut session = manager.load(Some(first.as_str())).await.unwrap();
        assert_eq!(session.get::<i32>("n"), Some(1));
        assert_eq!(session.status(), Status::Unmodified);
        session.renew_token();
        let mut response = switchyard_web::context::ResponseWriter::default();
        manager.save(session, &mut response).await.unwrap();
        let second = manager.token_from(&cookie_headers(&response)).unwrap();

        assert_ne!(first, second);
        assert!(store.find(&first).await.unwrap().is_none());
        assert_eq!(manager.load(Some(second.as_str())).await.unwrap().get::<i32>("n"), Some(1));
    }

    fn cookie_headers(response: &switchyard_web::context::ResponseWriter) -> http::HeaderMap {
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        let mut headers = http::HeaderMap::new();
        headers.insert(COOKIE, set_cookie.split(';').next().unwrap().parse().unwrap());
        headers
    }

    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        expiries: Mutex<Vec<DateTime<Utc>>>,
    }

    impl RecordingStore {
        fn expiries(&self) -> Vec<DateTime<Utc>> {
            self.expiries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionStore for RecordingStore {
        async fn find(&self, token: &str) -> Result<Option<Vec<u8>>, BoxError> {
            self.inner.find(token).await
        }

        async fn commit(&self, token: &str, data: Vec<u8>, expiry: DateTime<Utc>) -> Result<(), BoxError> {
            self.expiries.lock().unwrap().push(expiry);
            self.inner.commit(token, data, expiry).await
        }

        async fn delete(&self, token: &str) -> Result<(), BoxError> {
            self.inner.delete(token).await
        }
    }

    fn parsed_cookie(response: &Response<ResponseBody>) -> Cookie<'static> {
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_owned();
        Cookie::parse(set_cookie).unwrap()
    }

    fn seconds_left(expiry: DateTime<Utc>) -> i64 {
        (expiry - Utc::now()).num_seconds()
    }

    #[tokio::test]
    async fn idle_timeout_caps_expiry_and_recommits_unmodified_sessions() {
        let config = SessionConfig { idle_timeout_secs: Some(60), ..SessionConfig::default() };
        let store = Arc::new(RecordingStore::default());
        let mux = mux(SessionManager::new(config, Arc::clone(&store)));

        let response = send(&mux, "/login", None).await;
        let cookie = parsed_cookie(&response);
        let max_age = cookie.max_age().unwrap().whole_seconds();
        assert!((59..=61).contains(&max_age), "{cookie}");
        assert!(cookie.expires().is_some(), "{cookie}");
        let expiries = store.expiries();
        assert_eq!(expiries.len(), 1);
        assert!((58..=60).contains(&seconds_left(expiries[0])));

        let response = send(&mux, "/whoami", Some(&session_cookie(&response))).await;
        assert_eq!(response.body().as_bytes(), b"ana");
        let cookie = parsed_cookie(&response);
        assert!((59..=61).contains(&cookie.max_age().unwrap().whole_seconds()), "{cookie}");
        let expiries = store.expiries();
        assert_eq!(expiries.len(), 2);
        assert!((58..=60).contains(&seconds_left(expiries[1])));
    }

    #[tokio::test]
    async fn lifetime_wins_when_shorter_than_idle_timeout() {
        let config = SessionConfig { lifetime_secs: 30, idle_timeout_secs: Some(60), ..SessionConfig::default() };
        let store = Arc::new(RecordingStore::default());
        let mux = mux(SessionManager::new(config, Arc::clone(&store)));

        let response = send(&mux, "/login", None).await;
        assert!((29..=31).contains(&parsed_cookie(&response).max_age().unwrap().whole_seconds()));
        assert!((28..=30).contains(&seconds_left(store.expiries()[0])));
    }

    #[tokio::test]
    async fn unpersisted_cookie_has_no_expiry_attributes() {
        let mut config = SessionConfig::default();
        config.cookie.persist = false;
        let store = Arc::new(RecordingStore::default());
        let mux = mux(SessionManager::new(config, Arc::clone(&store)));

        let response = send(&mux, "/login", None).await;
        let cookie = parsed_cookie(&response);
        assert_eq!(cookie.name(), "session");
        assert!(cookie.max_age().is_none(), "{cookie}");
        assert!(cookie.expires().is_none(), "{cookie}");
        assert_eq!(store.expiries().len(), 1);

        let response = send(&mux, "/whoami", Some(&session_cookie(&response))).await;
        assert_eq!(response.body().as_bytes(), b"ana");
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(store.expiries().len(), 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn find(&self, _token: &str) -> Result<Option<Vec<u8>>, BoxError> {
            Ok(None)
        }

        async fn commit(&self, _token: &str, _data: Vec<u8>, _expiry: DateTime<Utc>) -> Result<(), BoxError> {
            Err("disk full".into())
        }

        async fn delete(&self, _token: &str) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn store_failure_is_internal_error() {
        let mux = mux(SessionManager::new(SessionConfig::default(), BrokenStore));

        let response = send(&mux, "/login", None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }
}
