//! Infrastructure layer: persistence, backplane transport, external services.

pub mod event_bus;
pub mod mail;
pub mod oauth;
pub mod store;

pub use mail::{CapturingMailer, HttpMailer, LogMailer, MailError, Mailer, OutgoingEmail};
pub use oauth::{ExternalProfile, GoogleOAuth, GoogleOAuthConfig, IdentityProvider, OAuthError};
pub use store::{
    InMemoryStore, NotificationRepository, PgDocumentStore, ProjectRepository, Store, StoreError, StoreResult,
    TaskRepository, TenantRepository, UserRepository,
};
