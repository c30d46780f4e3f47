use crate::model::User;
use crate::password;
use async_trait::async_trait;
use chrono::Utc;
use switchyard_web::BoxError;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("email {0} is already taken")]
    DuplicateEmail(String),

    #[error("user store failed: {0}")]
    Backend(BoxError),
}

/// Persistence of [`User`] accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Stores a new user with the digest of `password`, filling in id and timestamps.
    async fn create(&self, user: &mut User, password: &str) -> Result<(), StoreError>;

    async fn set_email(&self, user: &mut User, email: &str) -> Result<(), StoreError>;

    async fn find(&self, id: Uuid) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn find_by_confirmation_token(&self, token: &str) -> Result<User, StoreError>;

    async fn find_by_recovery_token(&self, token: &str) -> Result<User, StoreError>;

    /// Every user, oldest first.
    async fn list(&self) -> Result<Vec<User>, StoreError>;
}

/// [`UserStore`] keeping users in memory. Emails are unique, compared case-insensitively.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn find_by(&self, predicate: impl Fn(&User) -> bool) -> Result<User, StoreError> {
        self.users.read().await.iter().find(|user| predicate(user)).cloned().ok_or(StoreError::NotFound)
    }
}

fn email_taken(users: &[User], email: &str, except: Uuid) -> bool {
    users.iter().any(|user| user.model.id != except && user.email.eq_ignore_ascii_case(email))
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: &mut User, password: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if email_taken(&users, &user.email, Uuid::nil()) {
            return Err(StoreError::DuplicateEmail(user.email.clone()));
        }

        if user.model.id.is_nil() {
            user.model.id = Uuid::new_v4();
        }
        let now = Utc::now();
        user.model.created_at = now;
        user.model.updated_at = now;
        user.password_hash = password::hash(password);

        users.push(user.clone());
        Ok(())
    }

    async fn set_email(&self, user: &mut User, email: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if email_taken(&users, email, user.model.id) {
            return Err(StoreError::DuplicateEmail(email.to_owned()));
        }
        let stored = users.iter_mut().find(|stored| stored.model.id == user.model.id).ok_or(StoreError::NotFound)?;

        stored.email = email.to_owned();
        stored.model.updated_at = Utc::now();
        user.email = stored.email.clone();
        user.model.updated_at = stored.model.updated_at;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<User, StoreError> {
        self.find_by(|user| user.model.id == id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.find_by(|user| user.email.eq_ignore_ascii_case(email)).await
    }

    async fn find_by_confirmation_token(&self, token: &str) -> Result<User, StoreError> {
        self.find_by(|user| !token.is_empty() && user.confirmation_token == token).await
    }

    async fn find_by_recovery_token(&self, token: &str) -> Result<User, StoreError> {
        self.find_by(|user| !token.is_empty() && user.recovery_token == token).await
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.clone())
    }
}
