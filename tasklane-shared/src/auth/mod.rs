/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and validation
/// - [`jwt`]: JWT token generation and validation
/// - [`context`]: Bearer header parsing into an [`context::AuthContext`]
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::auth::password::{hash_password, verify_password};
/// use tasklane_shared::auth::jwt::{create_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "user@example.com", TokenType::Access);
/// let token = create_token(&claims, "a-development-secret-of-at-least-32-bytes")?;
/// # Ok(())
/// # }
/// ```

pub mod context;
pub mod jwt;
pub mod password;
