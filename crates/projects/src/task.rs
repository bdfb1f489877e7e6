use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskforge_core::error::require_text;
use taskforge_core::{DomainResult, Entity, ProjectId, TaskId, TenantId, TenantScoped, UserId};

use crate::project::{Priority, normalize_tags};

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl core::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Comments / Attachments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<UserId>,
    pub created_by: UserId,
    /// Newest first.
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<UserId>,
    pub attachments: Vec<Attachment>,
    pub tags: Vec<String>,
}

/// Partial update. `assigned_to: Some(None)` unassigns.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Option<UserId>>,
    pub tags: Option<Vec<String>>,
}

/// What an update changed, for notification fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChange {
    /// Set when the task now has a different assignee than before.
    pub reassigned_to: Option<UserId>,
    /// Set when the status moved.
    pub status_changed: Option<TaskStatus>,
    pub fields_changed: bool,
}

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_COMMENT_CHARS: usize = 1000;

impl Task {
    pub fn create(
        tenant_id: TenantId,
        created_by: UserId,
        new: NewTask,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id: TaskId::new(),
            tenant_id,
            project_id: new.project_id,
            title: require_text("title", &new.title, MAX_TITLE_CHARS)?,
            description: optional_description(new.description)?,
            status: new.status.unwrap_or_default(),
            priority: new.priority.unwrap_or_default(),
            due_date: new.due_date,
            assigned_to: new.assigned_to,
            created_by,
            comments: Vec::new(),
            attachments: new.attachments,
            tags: normalize_tags(new.tags),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_assignee(&self, user: UserId) -> bool {
        self.assigned_to == Some(user)
    }

    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> DomainResult<TaskChange> {
        let mut next = self.clone();

        if let Some(title) = patch.title {
            next.title = require_text("title", &title, MAX_TITLE_CHARS)?;
        }
        if let Some(description) = patch.description {
            next.description = optional_description(Some(description))?;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(due) = patch.due_date {
            next.due_date = Some(due);
        }
        if let Some(assignee) = patch.assigned_to {
            next.assigned_to = assignee;
        }
        if let Some(tags) = patch.tags {
            next.tags = normalize_tags(tags);
        }

        let change = TaskChange {
            reassigned_to: next.assigned_to.filter(|_| next.assigned_to != self.assigned_to),
            status_changed: Some(next.status).filter(|s| *s != self.status),
            fields_changed: next != *self,
        };

        if change.fields_changed {
            next.updated_at = now;
        }
        *self = next;
        Ok(change)
    }

    /// Append a comment at the front (newest first) and return it.
    pub fn add_comment(&mut self, user: UserId, text: &str, now: DateTime<Utc>) -> DomainResult<&Comment> {
        let comment = Comment {
            id: Uuid::now_v7(),
            text: require_text("comment", text, MAX_COMMENT_CHARS)?,
            user,
            created_at: now,
        };
        self.comments.insert(0, comment);
        self.updated_at = now;
        Ok(&self.comments[0])
    }
}

impl Entity for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Task {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project: Option<ProjectId>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<UserId>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.project.is_none_or(|p| task.project_id == p)
            && self.status.is_none_or(|s| task.status == s)
            && self.priority.is_none_or(|p| task.priority == p)
            && self.assigned_to.is_none_or(|u| task.assigned_to == Some(u))
    }
}

fn optional_description(description: Option<String>) -> DomainResult<Option<String>> {
    match description {
        Some(d) if !d.trim().is_empty() => {
            Ok(Some(require_text("description", &d, MAX_DESCRIPTION_CHARS)?))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::DomainError;

    fn task(assignee: Option<UserId>) -> Task {
        Task::create(
            TenantId::new(),
            UserId::new(),
            NewTask {
                project_id: ProjectId::new(),
                title: "Write docs".into(),
                description: None,
                status: None,
                priority: Some(Priority::High),
                due_date: None,
                assigned_to: assignee,
                attachments: vec![],
                tags: vec![],
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn reassignment_is_detected() {
        let (a, b) = (UserId::new(), UserId::new());
        let mut t = task(Some(a));

        let same = t
            .apply(
                TaskPatch {
                    assigned_to: Some(Some(a)),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(same.reassigned_to, None);

        let moved = t
            .apply(
                TaskPatch {
                    assigned_to: Some(Some(b)),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(moved.reassigned_to, Some(b));
    }

    #[test]
    fn unassign_is_not_a_reassignment() {
        let mut t = task(Some(UserId::new()));
        let change = t
            .apply(
                TaskPatch {
                    assigned_to: Some(None),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(change.reassigned_to, None);
        assert!(change.fields_changed);
        assert_eq!(t.assigned_to, None);
    }

    #[test]
    fn status_change_is_detected() {
        let mut t = task(None);
        let change = t
            .apply(
                TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(change.status_changed, Some(TaskStatus::Done));

        let again = t
            .apply(
                TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(again, TaskChange::default());
    }

    #[test]
    fn comments_are_newest_first() {
        let mut t = task(None);
        let u = UserId::new();
        t.add_comment(u, "first", Utc::now()).unwrap();
        t.add_comment(u, "second", Utc::now()).unwrap();
        assert_eq!(t.comments[0].text, "second");
        assert_eq!(t.comments[1].text, "first");
    }

    #[test]
    fn blank_comment_is_rejected() {
        let mut t = task(None);
        assert!(matches!(
            t.add_comment(UserId::new(), "  ", Utc::now()),
            Err(DomainError::Validation(_))
        ));
        assert!(t.comments.is_empty());
    }

    #[test]
    fn filter_by_assignee() {
        let u = UserId::new();
        let filter = TaskFilter {
            assigned_to: Some(u),
            ..Default::default()
        };
        assert!(filter.matches(&task(Some(u))));
        assert!(!filter.matches(&task(None)));
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(TaskStatus::InProgress).unwrap(), "in-progress");
    }
}
