/// Database layer for Tasklane
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Embedded SQL migrations and their status
/// - Models are in the `models` module at crate root level

pub mod migrations;
pub mod pool;
