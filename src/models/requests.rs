use super::{AgentStatus, ApplicationStatus};
use serde::{Deserialize, Serialize};

// ── Auth ────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ── Agent management ────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateAgent {
    pub email: String,
    pub name: String,
    pub password: String,
    pub company: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UpdateAgent {
    pub agent_id: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UpdateAgentStatus {
    pub agent_id: String,
    pub status: AgentStatus,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ResetAgentPassword {
    pub agent_id: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DeleteAgent {
    pub agent_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BulkAgentOp {
    Activate,
    Suspend,
    Delete,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BulkAgentAction {
    pub agent_ids: Vec<String>,
    pub action: BulkAgentOp,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BulkActionAck {
    pub success: bool,
    pub message: String,
    pub affected: usize,
}

// ── Applications ────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UpdateApplicationStatus {
    pub application_id: String,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadAck {
    pub success: bool,
    pub application_id: String,
    pub message: String,
}

// ── Universities ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateUniversity {
    pub name: String,
    pub country: String,
    pub programs: Vec<String>,
    pub intakes: Vec<String>,
    pub tuition: String,
    pub requirements: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BulkUploadAck {
    pub success: bool,
    pub count: usize,
    pub message: String,
}

// ── Generic acknowledgements ────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}
