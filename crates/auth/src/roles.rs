use core::str::FromStr;

use serde::{Deserialize, Serialize};

use taskforge_core::DomainError;

/// Tenant-scoped role. Determines the default authorization scope of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ProjectManager,
    #[default]
    TeamMember,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::ProjectManager, Role::TeamMember];

    /// Roles allowed to manage projects and invite users.
    pub const MANAGERS: &'static [Role] = &[Role::Admin, Role::ProjectManager];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProjectManager => "project_manager",
            Role::TeamMember => "team_member",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}
