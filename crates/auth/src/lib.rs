//! `taskforge-auth`: authentication/authorization boundary.
//!
//! Users and credentials, password hashing, session tokens and the role
//! allow-list check. Decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod error;
pub mod password;
pub mod principal;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, authorize};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use principal::Actor;
pub use roles::Role;
pub use token::TokenIssuer;
pub use user::{Credential, NewUser, User, UserProfile, UserStatus, normalize_email};
