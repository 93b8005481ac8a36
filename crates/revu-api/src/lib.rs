//! JSON REST API for revu.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`AccountStore`] and [`CatalogStore`]. TLS and transport concerns are the
//! caller's responsibility; every handler resolves the calling subject from
//! its bearer token and runs the endpoint's policies before touching the
//! store.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1", revu_api::api_router(state))
//! ```

pub mod auth;
pub mod comments;
pub mod error;
pub mod extract;
pub mod reviews;
pub mod tags;
pub mod titles;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use revu_core::{
  identity::IdentityManager,
  store::{AccountStore, CatalogStore},
};

pub use error::ApiError;

/// Everything the API needs from a storage backend.
pub trait Backend: AccountStore + CatalogStore + 'static {}

impl<T: AccountStore + CatalogStore + 'static> Backend for T {}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub identity: Arc<IdentityManager<S>>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), identity: self.identity.clone() }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Backend>(state: AppState<S>) -> Router<()> {
  Router::new()
    // Auth
    .route("/auth/signup/", post(auth::signup::<S>))
    .route("/auth/token/", post(auth::token::<S>))
    // Users
    .route("/users/", get(users::list::<S>).post(users::create::<S>))
    .route("/users/me/", get(users::get_me::<S>).patch(users::update_me::<S>))
    .route(
      "/users/{username}/",
      get(users::get_one::<S>)
        .patch(users::update_one::<S>)
        .delete(users::delete_one::<S>),
    )
    // Categories and genres
    .route(
      "/categories/",
      get(tags::list_categories::<S>).post(tags::create_category::<S>),
    )
    .route("/categories/{slug}/", delete(tags::delete_category::<S>))
    .route(
      "/genres/",
      get(tags::list_genres::<S>).post(tags::create_genre::<S>),
    )
    .route("/genres/{slug}/", delete(tags::delete_genre::<S>))
    // Titles
    .route("/titles/", get(titles::list::<S>).post(titles::create::<S>))
    .route(
      "/titles/{title_id}/",
      get(titles::get_one::<S>)
        .patch(titles::update_one::<S>)
        .delete(titles::delete_one::<S>),
    )
    // Reviews
    .route(
      "/titles/{title_id}/reviews/",
      get(reviews::list::<S>).post(reviews::create::<S>),
    )
    .route(
      "/titles/{title_id}/reviews/{review_id}/",
      get(reviews::get_one::<S>)
        .patch(reviews::update_one::<S>)
        .delete(reviews::delete_one::<S>),
    )
    // Comments
    .route(
      "/titles/{title_id}/reviews/{review_id}/comments/",
      get(comments::list::<S>).post(comments::create::<S>),
    )
    .route(
      "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
      get(comments::get_one::<S>)
        .patch(comments::update_one::<S>)
        .delete(comments::delete_one::<S>),
    )
    .with_state(state)
}
