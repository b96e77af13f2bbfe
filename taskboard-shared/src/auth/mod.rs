/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: HS256 access and refresh tokens
/// - [`middleware`]: bearer-token extraction into an `AuthContext`
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::auth::password::{hash_password, verify_password};
/// use taskboard_shared::auth::jwt::TokenPair;
///
/// # fn example(user_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("kanban2024")?;
/// assert!(verify_password("kanban2024", &hash)?);
///
/// let tokens = TokenPair::issue(user_id, "a-secret-of-at-least-32-bytes!!")?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
