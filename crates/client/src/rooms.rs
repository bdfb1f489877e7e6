//! Room bookkeeping for the realtime socket.
//!
//! The server forgets a connection's rooms when it drops, so the client keeps
//! the project rooms it wants and replays every join after a reconnect.

use std::collections::BTreeSet;

use taskforge_core::ProjectId;
use taskforge_events::ClientFrame;

#[derive(Debug, Clone, Default)]
pub struct RoomTracker {
    projects: BTreeSet<ProjectId>,
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a project room and return the frame that joins it now.
    pub fn join_project(&mut self, project_id: ProjectId) -> ClientFrame {
        self.projects.insert(project_id);
        ClientFrame::JoinProject { project_id }
    }

    pub fn leave_project(&mut self, project_id: ProjectId) -> Option<ClientFrame> {
        self.projects
            .remove(&project_id)
            .then_some(ClientFrame::LeaveProject { project_id })
    }

    /// Frames to send on every (re)connect: tenant room, own user room, then
    /// each tracked project.
    pub fn connect_frames(&self) -> Vec<ClientFrame> {
        let mut frames = vec![ClientFrame::JoinTenant, ClientFrame::JoinUserRoom { user_id: None }];
        frames.extend(
            self.projects
                .iter()
                .map(|&project_id| ClientFrame::JoinProject { project_id }),
        );
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_rejoins_tenant_user_and_tracked_projects() {
        let mut rooms = RoomTracker::new();
        let (p1, p2) = (ProjectId::new(), ProjectId::new());
        rooms.join_project(p1);
        rooms.join_project(p2);
        rooms.join_project(p1);

        let frames = rooms.connect_frames();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], ClientFrame::JoinTenant);
        assert_eq!(frames[1], ClientFrame::JoinUserRoom { user_id: None });
        assert!(frames.contains(&ClientFrame::JoinProject { project_id: p1 }));
        assert!(frames.contains(&ClientFrame::JoinProject { project_id: p2 }));
    }

    #[test]
    fn leaving_stops_rejoining() {
        let mut rooms = RoomTracker::new();
        let p = ProjectId::new();
        rooms.join_project(p);

        assert_eq!(rooms.leave_project(p), Some(ClientFrame::LeaveProject { project_id: p }));
        assert_eq!(rooms.leave_project(p), None);
        assert_eq!(rooms.connect_frames().len(), 2);
    }

    #[test]
    fn join_frames_use_the_wire_names() {
        let json = serde_json::to_value(ClientFrame::JoinUserRoom { user_id: None }).unwrap();
        assert_eq!(json["event"], "join-user-room");
    }
}
