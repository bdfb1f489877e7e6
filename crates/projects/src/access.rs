//! Resource access predicate.
//!
//! Every project/task read, write and delete goes through [`project_access`]
//! or [`task_access`]. Controllers and the realtime room-join check never
//! re-derive these rules.
//!
//! Rules, for an actor inside the project's tenant (any other tenant gets
//! [`Access::NONE`]):
//!
//! | role            | read                 | write                | delete           |
//! |-----------------|----------------------|----------------------|------------------|
//! | admin           | yes                  | yes                  | yes              |
//! | project_manager | manager or member    | manager or member    | manager          |
//! | team_member     | manager or member    | no                   | no               |
//!
//! Tasks widen read/write to the task's assignee and delete to its creator.

use serde::Serialize;

use taskforge_auth::{Actor, Role};

use crate::{Project, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Access {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
}

impl Access {
    pub const NONE: Access = Access {
        read: false,
        write: false,
        delete: false,
    };

    pub const FULL: Access = Access {
        read: true,
        write: true,
        delete: true,
    };
}

pub fn project_access(actor: &Actor, project: &Project) -> Access {
    if actor.tenant_id != project.tenant_id {
        return Access::NONE;
    }

    let manager = project.is_manager(actor.user_id);
    let involved = manager || project.is_member(actor.user_id);

    match actor.role {
        Role::Admin => Access::FULL,
        Role::ProjectManager => Access {
            read: involved,
            write: involved,
            delete: manager,
        },
        Role::TeamMember => Access {
            read: involved,
            write: false,
            delete: false,
        },
    }
}

/// Access to a task of `project`. A task that does not belong to `project`
/// (or to the actor's tenant) is treated as inaccessible.
pub fn task_access(actor: &Actor, project: &Project, task: &Task) -> Access {
    if actor.tenant_id != task.tenant_id
        || task.tenant_id != project.tenant_id
        || task.project_id != project.id
    {
        return Access::NONE;
    }

    let admin = actor.is_admin();
    let manager = project.is_manager(actor.user_id);
    let involved = admin
        || manager
        || project.is_member(actor.user_id)
        || task.is_assignee(actor.user_id);

    Access {
        read: involved,
        write: involved,
        delete: admin || manager || task.created_by == actor.user_id,
    }
}

/// New tasks may be created by admins, the project's manager and its members.
pub fn can_create_task(actor: &Actor, project: &Project) -> bool {
    actor.tenant_id == project.tenant_id
        && (actor.is_admin()
            || project.is_manager(actor.user_id)
            || project.is_member(actor.user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use taskforge_core::{ProjectId, TaskId, TenantId, UserId};

    use crate::{Priority, ProjectStatus, TaskStatus};

    fn project(tenant: TenantId, manager: UserId, members: Vec<UserId>) -> Project {
        let now = Utc::now();
        Project {
            id: ProjectId::new(),
            tenant_id: tenant,
            name: "P".into(),
            description: "d".into(),
            start_date: now,
            end_date: now + Duration::days(1),
            status: ProjectStatus::Active,
            priority: Priority::Medium,
            manager,
            members,
            tags: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn task(project: &Project, created_by: UserId, assigned_to: Option<UserId>) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::new(),
            tenant_id: project.tenant_id,
            project_id: project.id,
            title: "T".into(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Low,
            due_date: None,
            assigned_to,
            created_by,
            comments: vec![],
            attachments: vec![],
            tags: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admin_has_full_access_in_own_tenant_only() {
        let tenant = TenantId::new();
        let p = project(tenant, UserId::new(), vec![]);
        let admin = Actor::new(UserId::new(), tenant, Role::Admin);
        assert_eq!(project_access(&admin, &p), Access::FULL);

        let foreign_admin = Actor::new(UserId::new(), TenantId::new(), Role::Admin);
        assert_eq!(project_access(&foreign_admin, &p), Access::NONE);
    }

    #[test]
    fn team_member_reads_but_never_writes_projects() {
        let tenant = TenantId::new();
        let u = UserId::new();
        let p = project(tenant, UserId::new(), vec![u]);
        let member = Actor::new(u, tenant, Role::TeamMember);
        assert_eq!(
            project_access(&member, &p),
            Access {
                read: true,
                write: false,
                delete: false
            }
        );
    }

    #[test]
    fn project_manager_needs_involvement() {
        let tenant = TenantId::new();
        let pm = UserId::new();
        let actor = Actor::new(pm, tenant, Role::ProjectManager);

        assert_eq!(project_access(&actor, &project(tenant, UserId::new(), vec![])), Access::NONE);
        assert_eq!(project_access(&actor, &project(tenant, pm, vec![])), Access::FULL);

        let as_member = project_access(&actor, &project(tenant, UserId::new(), vec![pm]));
        assert!(as_member.read && as_member.write && !as_member.delete);
    }

    #[test]
    fn assignee_can_work_on_task_outside_membership() {
        let tenant = TenantId::new();
        let u = UserId::new();
        let p = project(tenant, UserId::new(), vec![]);
        let t = task(&p, UserId::new(), Some(u));
        let actor = Actor::new(u, tenant, Role::TeamMember);

        let access = task_access(&actor, &p, &t);
        assert!(access.read && access.write && !access.delete);
        assert!(!can_create_task(&actor, &p));
    }

    #[test]
    fn member_cannot_delete_someone_elses_task() {
        let tenant = TenantId::new();
        let u = UserId::new();
        let p = project(tenant, UserId::new(), vec![u]);
        let actor = Actor::new(u, tenant, Role::TeamMember);

        assert!(!task_access(&actor, &p, &task(&p, UserId::new(), None)).delete);
        assert!(task_access(&actor, &p, &task(&p, u, None)).delete);
    }

    #[test]
    fn task_from_another_project_is_inaccessible() {
        let tenant = TenantId::new();
        let p = project(tenant, UserId::new(), vec![]);
        let other = project(tenant, UserId::new(), vec![]);
        let t = task(&other, UserId::new(), None);
        let admin = Actor::new(UserId::new(), tenant, Role::Admin);
        assert_eq!(task_access(&admin, &p, &t), Access::NONE);
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Admin),
            Just(Role::ProjectManager),
            Just(Role::TeamMember)
        ]
    }

    proptest! {
        #[test]
        fn write_implies_read_and_is_deterministic(
            role in role_strategy(),
            same_tenant in any::<bool>(),
            is_manager in any::<bool>(),
            is_member in any::<bool>(),
            is_assignee in any::<bool>(),
            is_creator in any::<bool>(),
        ) {
            let tenant = TenantId::new();
            let user = UserId::new();
            let actor = Actor::new(user, if same_tenant { tenant } else { TenantId::new() }, role);

            let manager = if is_manager { user } else { UserId::new() };
            let members = if is_member { vec![UserId::new(), user] } else { vec![UserId::new()] };
            let p = project(tenant, manager, members);
            let t = task(
                &p,
                if is_creator { user } else { UserId::new() },
                if is_assignee { Some(user) } else { None },
            );

            let pa = project_access(&actor, &p);
            prop_assert_eq!(pa, project_access(&actor, &p));
            prop_assert!(!pa.write || pa.read);
            prop_assert!(!pa.delete || pa.read);

            let ta = task_access(&actor, &p, &t);
            prop_assert_eq!(ta, task_access(&actor, &p, &t));
            prop_assert!(!ta.write || ta.read);
            // Project read always carries over to the project's tasks.
            prop_assert!(!pa.read || ta.read);

            if !same_tenant {
                prop_assert_eq!(pa, Access::NONE);
                prop_assert_eq!(ta, Access::NONE);
                prop_assert!(!can_create_task(&actor, &p));
            }
        }
    }
}
