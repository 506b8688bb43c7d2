//! Spreadsheet sync channel — a best-effort mirror of the application
//! roster, fed through a configured webhook endpoint.
//!
//! Same contract as the email channel: one attempt per operation, failures
//! are logged and dropped, an unconfigured endpoint is a successful no-op.
//! The roster row layout matches the consultancy's review sheet.

use crate::dispatch::{
    build_post_json, fetch_with_timeout, outcome_from_status, read_binding, DeliveryOutcome,
};
use crate::models::StudentApplication;
use serde::{Deserialize, Serialize};
use worker::*;

const URL_BINDING: &str = "SHEETS_WEBHOOK_URL";
const TOKEN_BINDING: &str = "SHEETS_WEBHOOK_TOKEN";

// ── Roster rows ─────────────────────────────────────────────────

/// One spreadsheet row, keyed by application id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterRow {
    pub application_id: String,
    pub agent_email: String,
    pub student_name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub course: String,
    pub status: String,
    pub admin_notes: String,
    pub last_updated: String,
}

impl RosterRow {
    pub fn from_application(app: &StudentApplication) -> RosterRow {
        RosterRow {
            application_id: app.application_id.clone(),
            agent_email: app.agent_email.clone(),
            student_name: app.student_name.clone(),
            email: app.email.clone(),
            phone: app.phone.clone(),
            country: app.country.clone(),
            course: app.course.clone(),
            status: app.status.as_str().to_string(),
            admin_notes: app.admin_notes.clone(),
            last_updated: app.updated_at.clone(),
        }
    }
}

/// One sync operation against the sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SheetOp {
    /// Append a full row for a newly submitted application.
    AppendRow { row: RosterRow },
    /// Update status and notes on the row keyed by `application_id`.
    UpdateRow {
        application_id: String,
        status: String,
        admin_notes: String,
        last_updated: String,
    },
}

impl SheetOp {
    fn describe(&self) -> String {
        match self {
            SheetOp::AppendRow { row } => format!("append {}", row.application_id),
            SheetOp::UpdateRow { application_id, .. } => format!("update {application_id}"),
        }
    }
}

// ── Channel ─────────────────────────────────────────────────────

/// Webhook-backed sheet channel. Missing endpoint means unconfigured.
pub struct SheetsChannel {
    endpoint: Option<String>,
    token: Option<String>,
}

impl SheetsChannel {
    pub fn new(endpoint: Option<String>, token: Option<String>) -> Self {
        Self { endpoint, token }
    }

    pub fn from_env(env: &Env) -> Self {
        Self {
            endpoint: read_binding(env, URL_BINDING),
            token: read_binding(env, TOKEN_BINDING),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Apply one operation. Exactly one attempt; never an `Err`.
    pub async fn apply(&self, op: &SheetOp) -> DeliveryOutcome {
        let Some(endpoint) = &self.endpoint else {
            return DeliveryOutcome::SkippedUnconfigured;
        };
        let request = match build_post_json(endpoint, op, self.token.as_deref()) {
            Ok(request) => request,
            Err(e) => return DeliveryOutcome::Failed(e.to_string()),
        };
        match fetch_with_timeout(request).await {
            Ok(resp) => outcome_from_status(resp.status_code(), "sheet webhook"),
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }
}

/// Run `ops` detached from the response path, logging each outcome.
pub fn sync_detached(env: Env, ops: Vec<SheetOp>) {
    if ops.is_empty() {
        return;
    }
    wasm_bindgen_futures::spawn_local(async move {
        let channel = SheetsChannel::from_env(&env);
        for op in ops {
            match channel.apply(&op).await {
                DeliveryOutcome::Sent => {
                    worker::console_log!("[sheets] {}", op.describe())
                }
                DeliveryOutcome::SkippedUnconfigured => {
                    worker::console_log!("[sheets] channel unconfigured, skipped {}", op.describe())
                }
                DeliveryOutcome::Failed(reason) => {
                    worker::console_error!("[sheets] {} failed: {reason}", op.describe())
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationStatus;

    fn sample_application() -> StudentApplication {
        StudentApplication {
            application_id: "APP1700000000000".into(),
            agent_email: "priya@example.com".into(),
            student_name: "Alice Johnson".into(),
            email: "alice@example.com".into(),
            phone: "+44-7700-900000".into(),
            passport_number: "X1234567".into(),
            country: "Germany".into(),
            course: "Engineering".into(),
            status: ApplicationStatus::Pending,
            admin_notes: String::new(),
            file_name: "transcript.pdf".into(),
            file_size: 1024,
            document_key: "applications/APP1700000000000/transcript.pdf".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    // ── Row construction ───────────────────────────────────────

    #[test]
    fn roster_row_mirrors_application() {
        let row = RosterRow::from_application(&sample_application());
        assert_eq!(row.application_id, "APP1700000000000");
        assert_eq!(row.status, "pending");
        assert_eq!(row.last_updated, "2026-01-01T00:00:00Z");
        // Passport number and the document itself stay out of the sheet.
        let json = serde_json::to_string(&row).unwrap();
        assert!(!json.contains("X1234567"));
        assert!(!json.contains("document_key"));
    }

    // ── Operation wire format ──────────────────────────────────

    #[test]
    fn append_op_tagged_wire_format() {
        let op = SheetOp::AppendRow {
            row: RosterRow::from_application(&sample_application()),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "append_row");
        assert_eq!(json["row"]["student_name"], "Alice Johnson");
    }

    #[test]
    fn update_op_tagged_wire_format() {
        let op = SheetOp::UpdateRow {
            application_id: "APP42".into(),
            status: "accepted".into(),
            admin_notes: "Offer issued".into(),
            last_updated: "2026-02-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "update_row");
        assert_eq!(json["application_id"], "APP42");
        let parsed: SheetOp = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, op);
    }

    // ── Configuration ──────────────────────────────────────────

    #[test]
    fn channel_without_endpoint_is_unconfigured() {
        assert!(!SheetsChannel::new(None, None).is_configured());
        assert!(!SheetsChannel::new(None, Some("token".into())).is_configured());
    }

    #[test]
    fn channel_with_endpoint_is_configured() {
        let channel = SheetsChannel::new(Some("https://hooks.example/sheet".into()), None);
        assert!(channel.is_configured());
    }
}
