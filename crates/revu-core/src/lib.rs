//! Core types, policies and identity logic for the revu review service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod account;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod policy;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
