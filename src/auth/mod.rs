// Authentication module
// Verifies the bearer JWT issued by the identity service and exposes the
// caller's numeric user id to handlers

pub mod error;
pub mod middleware;
pub mod token;

// Re-export commonly used types
pub use error::AuthError;
pub use middleware::AuthenticatedUser;
pub use token::{Claims, TokenService};
