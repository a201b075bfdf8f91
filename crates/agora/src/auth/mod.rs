//! Authentication module.
//!
//! This service never issues tokens; it only validates JWTs minted by
//! the external auth service and attaches the resulting identity to the
//! request.

mod claims;
mod error;
mod middleware;

pub use claims::Claims;
pub use error::AuthError;
pub use middleware::{AuthState, CurrentUser, auth_middleware};
