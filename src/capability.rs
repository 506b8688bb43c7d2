//! Role capability model — the single source of truth for "can role R do A?"
//!
//! Every role predicate in the portal goes through [`allows`]. The gate
//! consults it at the path-prefix level; mutation handlers consult it again
//! as a defense-in-depth check before touching the store. Unknown role
//! strings parse to `None` and therefore hold no capabilities (fail-closed).

use serde::{Deserialize, Serialize};

/// Roles assignable to portal principals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }

    /// Parse a role claim string. Anything outside the enumerated set is
    /// rejected rather than defaulted.
    pub fn parse(v: &str) -> Option<Role> {
        match v.to_ascii_lowercase().as_str() {
            "agent" => Some(Role::Agent),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// The page surface an authenticated principal of this role lands on.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Agent => "/dashboard",
            Role::Admin => "/admin",
        }
    }
}

/// Actions gated by role across the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// View the agent dashboard pages.
    ViewDashboard,
    /// View the admin pages.
    ViewAdmin,
    /// Submit a student application with its document.
    SubmitApplication,
    /// List the caller's own applications.
    ViewOwnApplications,
    /// List every application in the system.
    ViewAllApplications,
    /// Change an application's status and admin notes.
    UpdateApplicationStatus,
    /// Browse the partner-university catalogue.
    ViewUniversities,
    /// Create universities or bulk-ingest a roster.
    ManageUniversities,
    /// List, inspect, create, update, or delete agent accounts.
    ManageAgents,
    /// Download the agent roster as CSV.
    ExportAgents,
}

/// Pure role/action predicate. Total over both enums; no hidden state.
pub fn allows(role: Role, action: Action) -> bool {
    match role {
        Role::Agent => matches!(
            action,
            Action::ViewDashboard
                | Action::SubmitApplication
                | Action::ViewOwnApplications
                | Action::ViewUniversities
        ),
        Role::Admin => matches!(
            action,
            Action::ViewAdmin
                | Action::ViewAllApplications
                | Action::UpdateApplicationStatus
                | Action::ViewUniversities
                | Action::ManageUniversities
                | Action::ManageAgents
                | Action::ExportAgents
        ),
    }
}
