use crate::model::User;
use crate::store::{StoreError, UserStore};
use async_trait::async_trait;
use http::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use switchyard_web::{BoxError, Context, Handler, HttpError, Validate, ValidationError};
use tracing::error;
use uuid::Uuid;

macro_rules! store_handler {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name {
            store: Arc<dyn UserStore>,
        }

        impl $name {
            pub fn new(store: Arc<dyn UserStore>) -> Self {
                Self { store }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

store_handler!(
    /// `GET /users`: every account as JSON.
    ListUsers
);
store_handler!(
    /// `POST /user`: registers an account.
    CreateUser
);
store_handler!(
    /// `GET /user/:id`: one account as JSON.
    ShowUser
);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateParams {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl Validate for CreateParams {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check(|errors| {
            if self.email.is_empty() {
                errors.add("email", "cannot be blank");
            } else if !is_email(&self.email) {
                errors.add("email", "must be a valid email address");
            }
            for (field, value) in [("firstName", &self.first_name), ("lastName", &self.last_name)] {
                if !(2..=25).contains(&value.chars().count()) {
                    errors.add(field, "must be between 2 and 25 characters");
                }
            }
            if self.password.chars().count() < 6 {
                errors.add("password", "must be at least 6 characters");
            }
        })
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

#[async_trait]
impl Handler for ListUsers {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let users = self.store.list().await.map_err(|e| HttpError::internal_server_error().with_internal(e))?;
        ctx.json(StatusCode::OK, &users)
    }
}

#[async_trait]
impl Handler for CreateUser {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let Ok(params) = ctx.bind::<CreateParams>() else {
            return ctx.string(StatusCode::BAD_REQUEST, "invalid params");
        };
        if let Err(e) = params.validate() {
            return ctx.string(StatusCode::BAD_REQUEST, e.to_string());
        }

        let mut user = User {
            email: params.email,
            first_name: params.first_name,
            last_name: params.last_name,
            is_active: true,
            ..User::default()
        };
        match self.store.create(&mut user, &params.password).await {
            Ok(()) => ctx.json(StatusCode::OK, &user),
            Err(e @ StoreError::DuplicateEmail(_)) => ctx.string(StatusCode::CONFLICT, e.to_string()),
            Err(e) => {
                error!(cause = %e, "failed to create user");
                ctx.string(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

#[async_trait]
impl Handler for ShowUser {
    async fn call(&self, ctx: &mut Context) -> Result<(), BoxError> {
        let id = ctx
            .param("id")
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| HttpError::with_message(StatusCode::BAD_REQUEST, "invalid user id"))?;

        match self.store.find(id).await {
            Ok(user) => ctx.json(StatusCode::OK, &user),
            Err(StoreError::NotFound) => Err(HttpError::with_message(StatusCode::NOT_FOUND, "user not found").into()),
            Err(e) => Err(HttpError::internal_server_error().with_internal(e).into()),
        }
    }
}
