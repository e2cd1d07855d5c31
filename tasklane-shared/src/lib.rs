//! # Tasklane Shared Library
//!
//! Types, persistence and business logic shared by the Tasklane API server.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and embedded migrations
//! - `models`: Users and tasks
//! - `auth`: Password hashing, JWTs and bearer authentication
//! - `billing`: Payment gateway integration and the subscription reconciler

pub mod auth;
pub mod billing;
pub mod db;
pub mod models;

/// Current version of the Tasklane shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
