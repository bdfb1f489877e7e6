//! Websocket endpoint for room-scoped pushes.
//!
//! Identity and tenant come from the gates that ran before the upgrade. Every
//! join is checked against that identity. Every outgoing frame is checked
//! against the joined rooms and then against the current state of the store:
//! the user is reloaded (gone or disabled closes the socket) and project
//! frames need read access at delivery time, not just at join time.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;

use taskforge_auth::Actor;
use taskforge_events::{ClientFrame, JoinError, Room, RoomEnvelope, RoomSet, ServerEvent, ServerFrame};
use taskforge_projects::project_access;

use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub async fn connect(
    ws: WebSocketUpgrade,
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    let actor = principal.actor();
    ws.on_upgrade(move |socket| async move {
        tracing::debug!(user_id = %actor.user_id, tenant_id = %actor.tenant_id, "realtime connected");
        serve_socket(socket, services, actor).await;
        tracing::debug!(user_id = %actor.user_id, "realtime disconnected");
    })
}

/// What to do with one backplane envelope on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Forward,
    Skip,
    /// The session no longer authorizes a connection.
    Close,
}

async fn serve_socket(socket: WebSocket, services: Arc<AppServices>, mut actor: Actor) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = services.backplane.subscribe();
    let mut rooms = RoomSet::new(actor.tenant_id, actor.user_id);

    loop {
        let outgoing = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => Some(match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => handle_client_frame(&services, &mut rooms, &actor, frame).await,
                    Err(err) => ServerFrame::error(format!("invalid frame: {err}")),
                }),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None,
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "realtime socket read failed");
                    break;
                }
            },
            envelope = subscription.recv() => match envelope {
                Some(envelope) => match authorize_delivery(&services, &mut rooms, &mut actor, &envelope).await {
                    Delivery::Forward => Some(envelope.into_frame()),
                    Delivery::Skip => None,
                    Delivery::Close => break,
                },
                None => break,
            },
        };

        let Some(frame) = outgoing else { continue };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "could not encode realtime frame");
                continue;
            }
        };
        if sender.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}

/// Apply one client frame to the connection's rooms and build the reply.
pub async fn handle_client_frame(
    services: &AppServices,
    rooms: &mut RoomSet,
    actor: &Actor,
    frame: ClientFrame,
) -> ServerFrame {
    let tenant_id = rooms.tenant_id();
    let result = match frame {
        ClientFrame::JoinTenant => join(rooms, Room::tenant(tenant_id), false),
        ClientFrame::JoinUserRoom { user_id } => {
            let user_id = user_id.unwrap_or(rooms.user_id());
            join(rooms, Room::user(tenant_id, user_id), false)
        }
        ClientFrame::JoinProject { project_id } => {
            let readable = match services.store.get_project(tenant_id, project_id).await {
                Ok(Some(project)) => project_access(actor, &project).read,
                Ok(None) => false,
                Err(err) => {
                    tracing::warn!(error = %err, %project_id, "project lookup failed during room join");
                    false
                }
            };
            join(rooms, Room::project(tenant_id, project_id), readable)
        }
        ClientFrame::LeaveProject { project_id } => {
            let room = Room::project(tenant_id, project_id);
            rooms.leave(&room);
            return ServerFrame::new(ServerEvent::Left, json!({ "room": room.to_string() }));
        }
    };

    match result {
        Ok(room) => ServerFrame::new(ServerEvent::Joined, json!({ "room": room.to_string() })),
        Err(err) => {
            tracing::debug!(user_id = %actor.user_id, error = %err, "room join refused");
            ServerFrame::error(err.to_string())
        }
    }
}

/// Decide whether `envelope` may go out on this connection right now.
///
/// Refreshes `actor` from the store so role changes apply to later joins too.
/// A project room the actor can no longer read is left.
pub async fn authorize_delivery(
    services: &AppServices,
    rooms: &mut RoomSet,
    actor: &mut Actor,
    envelope: &RoomEnvelope,
) -> Delivery {
    if !rooms.accepts(envelope) {
        return Delivery::Skip;
    }

    let user = match services.store.get_user(actor.tenant_id, actor.user_id).await {
        Ok(Some(user)) if user.ensure_can_sign_in().is_ok() => user,
        Ok(_) => {
            tracing::info!(user_id = %actor.user_id, "closing realtime session for removed or disabled user");
            return Delivery::Close;
        }
        Err(err) => {
            tracing::warn!(error = %err, "user lookup failed during realtime delivery");
            return Delivery::Skip;
        }
    };
    *actor = Actor::from(&user);

    let room = envelope.room();
    if let Room::Project { tenant_id, project_id } = room {
        let readable = match services.store.get_project(tenant_id, project_id).await {
            Ok(Some(project)) => project_access(actor, &project).read,
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(error = %err, %project_id, "project lookup failed during realtime delivery");
                return Delivery::Skip;
            }
        };
        if !readable {
            rooms.leave(&room);
            tracing::debug!(user_id = %actor.user_id, %project_id, "project room revoked");
            return Delivery::Skip;
        }
    }
    Delivery::Forward
}

fn join(rooms: &mut RoomSet, room: Room, project_readable: bool) -> Result<Room, JoinError> {
    rooms.join(room, project_readable).map(|()| room)
}
