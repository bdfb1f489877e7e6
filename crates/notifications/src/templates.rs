//! Notification drafts for every trigger.
//!
//! A draft carries the in-app title/message and the email rendering of the
//! same event. Persisting, pushing and mailing it is the caller's job.

use chrono::{DateTime, Utc};

use taskforge_core::{NotificationId, TenantId, UserId};
use taskforge_projects::{Project, Task};

use crate::{Notification, NotificationType, RelatedResource, ResourceType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub kind: NotificationType,
    pub recipient: UserId,
    pub sender: Option<UserId>,
    pub title: String,
    pub message: String,
    pub related: RelatedResource,
    pub email: EmailContent,
}

impl NotificationDraft {
    pub fn into_notification(self, tenant_id: TenantId, now: DateTime<Utc>) -> Notification {
        Notification {
            id: NotificationId::new(),
            tenant_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            recipient: self.recipient,
            sender: self.sender,
            read: false,
            related_resource: self.related,
            created_at: now,
        }
    }

    pub fn task_assigned(task: &Task, project: &Project, assignee: UserId, sender: UserId) -> Self {
        Self {
            kind: NotificationType::TaskAssigned,
            recipient: assignee,
            sender: Some(sender),
            title: "New task assigned".into(),
            message: format!("You have been assigned to task: {}", task.title),
            related: task_ref(task),
            email: EmailContent {
                subject: format!("New task assigned: {}", task.title),
                body: task_email_body("You have been assigned a new task.", task, project),
            },
        }
    }

    pub fn task_status_changed(task: &Task, project: &Project, recipient: UserId, sender: UserId) -> Self {
        Self {
            kind: NotificationType::TaskUpdated,
            recipient,
            sender: Some(sender),
            title: "Task status updated".into(),
            message: format!("Task \"{}\" status changed to {}", task.title, task.status),
            related: task_ref(task),
            email: EmailContent {
                subject: format!("Task updated: {}", task.title),
                body: task_email_body(
                    &format!("The status of a task changed to {}.", task.status),
                    task,
                    project,
                ),
            },
        }
    }

    pub fn task_completed(task: &Task, project: &Project, manager: UserId, sender: UserId) -> Self {
        Self {
            kind: NotificationType::TaskUpdated,
            recipient: manager,
            sender: Some(sender),
            title: "Task completed".into(),
            message: format!("Task \"{}\" in {} was completed", task.title, project.name),
            related: task_ref(task),
            email: EmailContent {
                subject: format!("Task completed: {}", task.title),
                body: task_email_body("A task in a project you manage was completed.", task, project),
            },
        }
    }

    pub fn task_comment(
        task: &Task,
        project: &Project,
        comment: &str,
        recipient: UserId,
        sender: UserId,
    ) -> Self {
        Self {
            kind: NotificationType::TaskComment,
            recipient,
            sender: Some(sender),
            title: "New comment on your task".into(),
            message: format!("New comment on task: {}", task.title),
            related: task_ref(task),
            email: EmailContent {
                subject: format!("New comment on: {}", task.title),
                body: task_email_body(&format!("New comment:\n\n  {comment}"), task, project),
            },
        }
    }

    pub fn project_added(project: &Project, member: UserId, sender: UserId) -> Self {
        Self {
            kind: NotificationType::ProjectAdded,
            recipient: member,
            sender: Some(sender),
            title: "Added to project".into(),
            message: format!("You have been added to the project: {}", project.name),
            related: project_ref(project),
            email: EmailContent {
                subject: format!("You were added to {}", project.name),
                body: project_email_body("You have been added to a project.", project),
            },
        }
    }

    pub fn project_updated(project: &Project, member: UserId, sender: UserId) -> Self {
        Self {
            kind: NotificationType::ProjectUpdated,
            recipient: member,
            sender: Some(sender),
            title: "Project updated".into(),
            message: format!("Project \"{}\" was updated", project.name),
            related: project_ref(project),
            email: EmailContent {
                subject: format!("Project updated: {}", project.name),
                body: project_email_body("A project you belong to was updated.", project),
            },
        }
    }

    /// Confirmation for the inviter that an invitation went out.
    pub fn user_invited(invitee: UserId, invitee_email: &str, inviter: UserId) -> Self {
        Self {
            kind: NotificationType::UserInvited,
            recipient: inviter,
            sender: None,
            title: "Invitation sent".into(),
            message: format!("Invitation sent to {invitee_email}"),
            related: RelatedResource {
                resource_type: ResourceType::User,
                resource_id: invitee.into(),
            },
            email: EmailContent {
                subject: "Invitation sent".into(),
                body: format!("Your invitation to {invitee_email} has been sent."),
            },
        }
    }
}

fn task_ref(task: &Task) -> RelatedResource {
    RelatedResource {
        resource_type: ResourceType::Task,
        resource_id: task.id.into(),
    }
}

fn project_ref(project: &Project) -> RelatedResource {
    RelatedResource {
        resource_type: ResourceType::Project,
        resource_id: project.id.into(),
    }
}

fn task_email_body(lead: &str, task: &Task, project: &Project) -> String {
    let due = task
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "none".into());
    format!(
        "{lead}\n\nTask: {}\nProject: {}\nPriority: {}\nStatus: {}\nDue date: {due}\n",
        task.title, project.name, task.priority, task.status
    )
}

fn project_email_body(lead: &str, project: &Project) -> String {
    format!(
        "{lead}\n\nProject: {}\nDescription: {}\nPriority: {}\nEnds: {}\n",
        project.name,
        project.description,
        project.priority,
        project.end_date.format("%Y-%m-%d")
    )
}
