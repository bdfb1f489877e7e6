//! In-app notifications and the message templates for each trigger.

pub mod notification;
pub mod templates;

pub use notification::{Notification, NotificationFilter, NotificationType, RelatedResource, ResourceType};
pub use templates::{EmailContent, NotificationDraft};
