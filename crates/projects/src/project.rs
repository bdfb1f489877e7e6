use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taskforge_auth::Actor;
use taskforge_core::error::require_text;
use taskforge_core::{DomainError, DomainResult, Entity, ProjectId, TenantId, TenantScoped, UserId};

use crate::access::project_access;

// ─────────────────────────────────────────────────────────────────────────────
// Status / Priority
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    Completed,
    OnHold,
    Cancelled,
}

/// Shared by projects and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl core::fmt::Display for Priority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ProjectStatus,
    pub priority: Priority,
    pub manager: UserId,
    pub members: Vec<UserId>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    pub manager: UserId,
    pub members: Vec<UserId>,
    pub tags: Vec<String>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    pub manager: Option<UserId>,
    pub members: Option<Vec<UserId>>,
    pub tags: Option<Vec<String>>,
}

/// What an update changed, for notification fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectChange {
    pub added_members: Vec<UserId>,
    pub fields_changed: bool,
}

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

impl Project {
    pub fn create(tenant_id: TenantId, new: NewProject, now: DateTime<Utc>) -> DomainResult<Self> {
        ensure_dates(new.start_date, new.end_date)?;
        Ok(Self {
            id: ProjectId::new(),
            tenant_id,
            name: require_text("name", &new.name, MAX_NAME_CHARS)?,
            description: require_text("description", &new.description, MAX_DESCRIPTION_CHARS)?,
            start_date: new.start_date,
            end_date: new.end_date,
            status: new.status.unwrap_or_default(),
            priority: new.priority.unwrap_or_default(),
            manager: new.manager,
            members: dedup(new.members),
            tags: normalize_tags(new.tags),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_manager(&self, user: UserId) -> bool {
        self.manager == user
    }

    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    pub fn apply(&mut self, patch: ProjectPatch, now: DateTime<Utc>) -> DomainResult<ProjectChange> {
        let mut next = self.clone();

        if let Some(name) = patch.name {
            next.name = require_text("name", &name, MAX_NAME_CHARS)?;
        }
        if let Some(description) = patch.description {
            next.description = require_text("description", &description, MAX_DESCRIPTION_CHARS)?;
        }
        if let Some(start) = patch.start_date {
            next.start_date = start;
        }
        if let Some(end) = patch.end_date {
            next.end_date = end;
        }
        ensure_dates(next.start_date, next.end_date)?;
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(manager) = patch.manager {
            next.manager = manager;
        }
        if let Some(members) = patch.members {
            next.members = dedup(members);
        }
        if let Some(tags) = patch.tags {
            next.tags = normalize_tags(tags);
        }

        let added_members = next
            .members
            .iter()
            .copied()
            .filter(|m| !self.members.contains(m))
            .collect();

        next.updated_at = self.updated_at;
        let fields_changed = next != *self;
        if fields_changed {
            next.updated_at = now;
        }
        *self = next;

        Ok(ProjectChange {
            added_members,
            fields_changed,
        })
    }
}

impl Entity for Project {
    type Id = ProjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Project {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// List filter. `viewer` restricts results to projects the actor may read.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub priority: Option<Priority>,
    pub viewer: Option<Actor>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        self.status.is_none_or(|s| project.status == s)
            && self.priority.is_none_or(|p| project.priority == p)
            && self.viewer.is_none_or(|a| project_access(&a, project).read)
    }
}

fn ensure_dates(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<()> {
    if end < start {
        return Err(DomainError::validation("end date cannot be before start date"));
    }
    Ok(())
}

pub(crate) fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

pub(crate) fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    dedup(
        tags.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_project(manager: UserId, members: Vec<UserId>) -> NewProject {
        let now = Utc::now();
        NewProject {
            name: "Apollo".into(),
            description: "Moonshot".into(),
            start_date: now,
            end_date: now + Duration::days(30),
            status: None,
            priority: None,
            manager,
            members,
            tags: vec![" alpha ".into(), "alpha".into(), "".into()],
        }
    }

    #[test]
    fn create_applies_defaults_and_dedups() {
        let m = UserId::new();
        let p = Project::create(TenantId::new(), new_project(UserId::new(), vec![m, m]), Utc::now()).unwrap();
        assert_eq!(p.status, ProjectStatus::Planning);
        assert_eq!(p.priority, Priority::Medium);
        assert_eq!(p.members, vec![m]);
        assert_eq!(p.tags, vec!["alpha".to_string()]);
    }

    #[test]
    fn create_rejects_inverted_dates() {
        let mut new = new_project(UserId::new(), vec![]);
        new.end_date = new.start_date - Duration::days(1);
        assert!(matches!(
            Project::create(TenantId::new(), new, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn apply_reports_added_members_only() {
        let (a, b) = (UserId::new(), UserId::new());
        let mut p = Project::create(TenantId::new(), new_project(UserId::new(), vec![a]), Utc::now()).unwrap();

        let change = p
            .apply(
                ProjectPatch {
                    members: Some(vec![a, b]),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(change.added_members, vec![b]);
        assert!(change.fields_changed);
        assert!(p.is_member(b));
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut p = Project::create(TenantId::new(), new_project(UserId::new(), vec![]), Utc::now()).unwrap();
        let before = p.clone();
        let change = p.apply(ProjectPatch::default(), Utc::now() + Duration::hours(1)).unwrap();
        assert_eq!(change, ProjectChange::default());
        assert_eq!(p, before);
    }

    #[test]
    fn failed_patch_leaves_project_untouched() {
        let mut p = Project::create(TenantId::new(), new_project(UserId::new(), vec![]), Utc::now()).unwrap();
        let before = p.clone();
        let res = p.apply(
            ProjectPatch {
                name: Some("renamed".into()),
                end_date: Some(before.start_date - Duration::days(2)),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(res.is_err());
        assert_eq!(p, before);
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(ProjectStatus::OnHold).unwrap(), "on-hold");
    }
}
