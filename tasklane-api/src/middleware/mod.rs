/// Middleware modules for the API server
///
/// - `security`: Security response headers
///
/// Bearer authentication lives in `app` because it needs `AppState`.

pub mod security;
