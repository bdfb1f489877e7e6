//! Projects, tasks and the access predicate every controller consumes.

pub mod access;
pub mod project;
pub mod task;

pub use access::{Access, can_create_task, project_access, task_access};
pub use project::{NewProject, Priority, Project, ProjectChange, ProjectFilter, ProjectPatch, ProjectStatus};
pub use task::{
    Attachment, Comment, NewTask, Task, TaskChange, TaskFilter, TaskPatch, TaskStatus,
};
