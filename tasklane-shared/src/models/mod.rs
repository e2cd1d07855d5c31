/// Database models for Tasklane
///
/// # Models
///
/// - `user`: User accounts, credentials and the billing projection
/// - `task`: Personal tasks owned by a user
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::models::user::{User, CreateUser, AuthProvider};
/// use tasklane_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: Some("$argon2id$...".to_string()),
///     provider: AuthProvider::Local,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod task;
pub mod user;
