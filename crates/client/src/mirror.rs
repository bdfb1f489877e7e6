//! Local mirror of the signed-in user's notifications.
//!
//! The REST snapshot is authoritative. Realtime pushes are applied on top of
//! it until the next resync; there is no replay, so the client resyncs after
//! every reconnect.

use taskforge_core::{NotificationId, UserId};
use taskforge_events::{ServerEvent, ServerFrame};
use taskforge_notifications::Notification;

#[derive(Debug, Clone)]
pub struct NotificationMirror {
    me: UserId,
    items: Vec<Notification>,
    unread: u64,
}

impl NotificationMirror {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            items: Vec::new(),
            unread: 0,
        }
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread(&self) -> u64 {
        self.unread
    }

    /// Replace local state with a fresh server snapshot (newest first).
    pub fn resync(&mut self, items: Vec<Notification>, unread: u64) {
        self.items = items.into_iter().filter(|n| n.recipient == self.me).collect();
        self.unread = unread;
    }

    /// Apply one realtime frame. Returns `true` if it changed the mirror.
    ///
    /// Frames that are not notifications, that do not decode, that address
    /// another user, or that repeat a known id are dropped.
    pub fn apply_push(&mut self, frame: &ServerFrame) -> bool {
        if frame.event != ServerEvent::Notification {
            return false;
        }
        let notification: Notification = match serde_json::from_value(frame.data.clone()) {
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(error = %err, "ignoring undecodable notification push");
                return false;
            }
        };
        if notification.recipient != self.me {
            tracing::warn!(recipient = %notification.recipient, "dropping notification addressed to another user");
            return false;
        }
        if self.items.iter().any(|n| n.id == notification.id) {
            return false;
        }

        if !notification.read {
            self.unread += 1;
        }
        self.items.insert(0, notification);
        true
    }

    /// Mirror a successful `POST /notifications/read`.
    pub fn mark_read(&mut self, ids: &[NotificationId]) {
        for n in self.items.iter_mut().filter(|n| ids.contains(&n.id)) {
            if n.mark_read() {
                self.unread = self.unread.saturating_sub(1);
            }
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.mark_read();
        }
        self.unread = 0;
    }

    pub fn remove(&mut self, id: NotificationId) {
        if let Some(pos) = self.items.iter().position(|n| n.id == id) {
            let removed = self.items.remove(pos);
            if !removed.read {
                self.unread = self.unread.saturating_sub(1);
            }
        }
    }
}
