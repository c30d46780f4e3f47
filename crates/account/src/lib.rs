//! User accounts: the [`User`] model, the [`UserStore`] persistence seam and the HTTP
//! handlers that expose them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use switchyard_account::MemoryUserStore;
//! use switchyard_web::Mux;
//!
//! let mut builder = Mux::builder();
//! switchyard_account::configure(&mut builder, Arc::new(MemoryUserStore::new()));
//! ```

pub mod handler;
pub mod model;
pub mod password;
pub mod store;

pub use handler::{CreateParams, CreateUser, ListUsers, ShowUser};
pub use model::{Group, Model, Permission, User};
pub use store::{MemoryUserStore, StoreError, UserStore};

use std::sync::Arc;
use switchyard_web::MuxBuilder;
use switchyard_web::mux::{get, post};

/// Registers `GET /users`, `POST /user` and `GET /user/:id`.
pub fn configure(builder: &mut MuxBuilder, store: Arc<dyn UserStore>) {
    builder
        .route("/users", get(ListUsers::new(Arc::clone(&store))).name("account.list"))
        .route("/user", post(CreateUser::new(Arc::clone(&store))).name("account.create"))
        .route("/user/:id", get(ShowUser::new(store)).name("account.show"));
}

/// [`configure`] as a service for `Framework::add_service`.
pub fn service(store: Arc<dyn UserStore>) -> impl FnOnce(&mut MuxBuilder) {
    move |builder| configure(builder, store)
}
