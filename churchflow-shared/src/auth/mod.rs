/// Authentication and authorization
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: access and refresh tokens (HS256)
/// - [`middleware`]: session middleware and request extractors
/// - [`authorization`]: church role checks
///
/// # Example
///
/// ```no_run
/// use churchflow_shared::auth::jwt::issue_token_pair;
/// use churchflow_shared::auth::password::{hash_password, verify_password};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("grace2024!")?;
/// assert!(verify_password("grace2024!", &hash)?);
///
/// let tokens = issue_token_pair(Uuid::new_v4(), None, "a-secret-of-at-least-32-characters")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
