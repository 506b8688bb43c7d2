use serde::{Deserialize, Serialize};

// ── Status enums ────────────────────────────────────────────────

/// Lifecycle of an agent account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Suspended,
    Pending,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Suspended => "suspended",
            AgentStatus::Pending => "pending",
        }
    }

    pub fn parse(v: &str) -> Option<AgentStatus> {
        match v.to_ascii_lowercase().as_str() {
            "active" => Some(AgentStatus::Active),
            "suspended" => Some(AgentStatus::Suspended),
            "pending" => Some(AgentStatus::Pending),
            _ => None,
        }
    }
}

/// Review lifecycle of a student application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(v: &str) -> Option<ApplicationStatus> {
        match v.to_ascii_lowercase().as_str() {
            "pending" => Some(ApplicationStatus::Pending),
            "under_review" => Some(ApplicationStatus::UnderReview),
            "accepted" => Some(ApplicationStatus::Accepted),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

// ── Agent ───────────────────────────────────────────────────────

/// An education-consultancy agent account. Credentials never leave the
/// store; this is the API-facing shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: String,
    pub email: String,
    pub name: String,
    pub company: String,
    pub country: String,
    pub phone: String,
    pub status: AgentStatus,
    pub total_applications: u32,
    pub accepted_applications: u32,
    pub created_at: String,
    pub updated_at: String,
    pub last_login: Option<String>,
}

// ── Student application ─────────────────────────────────────────

/// One submitted student application with its supporting document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentApplication {
    pub application_id: String,
    pub agent_email: String,
    pub student_name: String,
    pub email: String,
    pub phone: String,
    pub passport_number: String,
    pub country: String,
    pub course: String,
    pub status: ApplicationStatus,
    pub admin_notes: String,
    pub file_name: String,
    pub file_size: u64,
    /// R2 object key of the uploaded document.
    pub document_key: String,
    pub created_at: String,
    pub updated_at: String,
}

// ── University ──────────────────────────────────────────────────

/// A partner university in the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct University {
    pub id: String,
    pub name: String,
    pub country: String,
    pub programs: Vec<String>,
    pub intakes: Vec<String>,
    pub tuition: String,
    pub requirements: String,
    pub created_at: String,
}
