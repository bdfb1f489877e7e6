//! Side-effect fan-out for mutations.
//!
//! Every delivery runs in order: persist the notification, push it to the
//! recipient's user room, then email the recipient. Only the first step is
//! required for a notification to exist; push and email failures are logged
//! and swallowed. Nothing here fails the mutation that triggered it.

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use taskforge_core::{ProjectId, TenantId, UserId};
use taskforge_events::{Room, RoomEnvelope, ServerEvent, ServerFrame};
use taskforge_infra::OutgoingEmail;
use taskforge_notifications::NotificationDraft;

use crate::app::services::AppServices;

/// Persist, push and email one notification.
#[instrument(skip(services, draft), fields(%tenant_id, kind = ?draft.kind, recipient = %draft.recipient))]
pub async fn deliver(services: &AppServices, tenant_id: TenantId, draft: NotificationDraft) {
    let email = draft.email.clone();
    let notification = draft.into_notification(tenant_id, Utc::now());

    if let Err(err) = services.store.insert_notification(&notification).await {
        tracing::error!(error = %err, "failed to persist notification");
        return;
    }

    push_to_user(services, tenant_id, notification.recipient, ServerEvent::Notification, &notification);

    let recipient = match services.store.get_user(tenant_id, notification.recipient).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(error = %err, "could not load notification recipient for email");
            return;
        }
    };
    send_email(
        services,
        OutgoingEmail {
            to: recipient.email,
            subject: email.subject,
            body: email.body,
        },
    )
    .await;
}

/// Deliver several drafts one after another.
pub async fn deliver_all(services: &AppServices, tenant_id: TenantId, drafts: Vec<NotificationDraft>) {
    for draft in drafts {
        deliver(services, tenant_id, draft).await;
    }
}

/// Best-effort email. Failures are logged at `warn`.
pub async fn send_email(services: &AppServices, email: OutgoingEmail) {
    if let Err(err) = services.mailer.send(&email).await {
        tracing::warn!(error = %err, to = %email.to, "email delivery failed");
    }
}

pub fn push_to_project<T: Serialize>(
    services: &AppServices,
    tenant_id: TenantId,
    project_id: ProjectId,
    event: ServerEvent,
    payload: &T,
) {
    publish(services, Room::project(tenant_id, project_id), event, payload);
}

pub fn push_to_user<T: Serialize>(
    services: &AppServices,
    tenant_id: TenantId,
    user_id: UserId,
    event: ServerEvent,
    payload: &T,
) {
    publish(services, Room::user(tenant_id, user_id), event, payload);
}

fn publish<T: Serialize>(services: &AppServices, room: Room, event: ServerEvent, payload: &T) {
    let data = match serde_json::to_value(payload) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(error = %err, %room, "could not serialize realtime payload");
            return;
        }
    };
    if let Err(err) = services
        .backplane
        .publish(RoomEnvelope::new(room, ServerFrame::new(event, data)))
    {
        tracing::warn!(error = %err, %room, "realtime publish failed");
    }
}
