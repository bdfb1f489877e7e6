use thiserror::Error;

use crate::{Actor, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("user role '{0}' is not authorized to access this route")]
    Forbidden(Role),
}

/// Role allow-list check.
///
/// - No IO
/// - No panics
/// - Resource ownership is decided elsewhere (see the project access predicate)
pub fn authorize(actor: &Actor, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&actor.role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(actor.role))
    }
}
