/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login, refresh)
/// - `users`: Own profile
/// - `tasks`: Task CRUD
/// - `billing`: Checkout, portal, cancellation, status and the gateway webhook

pub mod auth;
pub mod billing;
pub mod health;
pub mod tasks;
pub mod users;
