//! Side-effect dispatcher — best-effort notifications fired after a mutation
//! has already committed.
//!
//! A [`SideEffectJob`] is one outbound email attempt: one try, no retry, no
//! persistence. The dispatcher is detached from the response path; its only
//! observable failure mode is a log line. An unconfigured channel is a
//! successful no-op, not an error.

use serde::Serialize;
use std::time::Duration;
use worker::*;

use futures_util::future::{select, Either};

/// Outbound calls are capped so a hanging channel can never stall a worker.
pub const DISPATCH_TIMEOUT_MS: u64 = 5_000;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const API_KEY_BINDING: &str = "RESEND_API_KEY";
const FROM_BINDING: &str = "EMAIL_FROM";
const DEFAULT_FROM: &str = "Campus Portal <noreply@campus-portal.example>";

// ── Jobs ────────────────────────────────────────────────────────

/// Notification templates the portal sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// An admin changed an agent account's status.
    AgentStatusChanged,
    /// An agent submitted a new student application.
    StudentUploaded,
    /// An admin changed a student application's status.
    StatusUpdated,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::AgentStatusChanged => "agent_status_changed",
            Template::StudentUploaded => "student_uploaded",
            Template::StatusUpdated => "status_updated",
        }
    }
}

/// One best-effort notification attempt. Ephemeral; owned by the dispatcher
/// and discarded after a single delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SideEffectJob {
    pub to: String,
    pub subject: String,
    pub template: Template,
    pub payload: serde_json::Value,
}

/// Result of one delivery attempt. Never escapes the dispatcher as an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Sent,
    /// Channel credentials absent — deliberate no-op success.
    SkippedUnconfigured,
    Failed(String),
}

// ── Email channel ───────────────────────────────────────────────

/// Transactional email channel (Resend). `api_key: None` means the channel
/// is unconfigured and every delivery short-circuits to a no-op.
pub struct EmailChannel {
    api_key: Option<String>,
    from: String,
}

impl EmailChannel {
    pub fn new(api_key: Option<String>, from: String) -> Self {
        Self { api_key, from }
    }

    pub fn from_env(env: &Env) -> Self {
        let api_key = read_binding(env, API_KEY_BINDING);
        let from = read_binding(env, FROM_BINDING).unwrap_or_else(|| DEFAULT_FROM.to_string());
        Self { api_key, from }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Attempt delivery of one job. Exactly one attempt; all failures are
    /// folded into [`DeliveryOutcome::Failed`].
    pub async fn deliver(&self, job: &SideEffectJob) -> DeliveryOutcome {
        let Some(api_key) = &self.api_key else {
            return DeliveryOutcome::SkippedUnconfigured;
        };

        let body = EmailRequest {
            from: &self.from,
            to: std::slice::from_ref(&job.to),
            subject: &job.subject,
            html: render_html(job.template, &job.payload),
        };
        let request = match build_post_json(RESEND_ENDPOINT, &body, Some(api_key)) {
            Ok(request) => request,
            Err(e) => return DeliveryOutcome::Failed(e.to_string()),
        };

        match fetch_with_timeout(request).await {
            Ok(resp) => outcome_from_status(resp.status_code(), "email API"),
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }
}

/// Map a channel endpoint's HTTP status to a delivery outcome.
pub(crate) fn outcome_from_status(status: u16, channel: &str) -> DeliveryOutcome {
    if (200..300).contains(&status) {
        DeliveryOutcome::Sent
    } else {
        DeliveryOutcome::Failed(format!("{channel} returned status {status}"))
    }
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: String,
}

/// Secrets and vars are interchangeable bindings in local dev.
pub(crate) fn read_binding(env: &Env, name: &str) -> Option<String> {
    env.secret(name)
        .map(|s| s.to_string())
        .or_else(|_| env.var(name).map(|v| v.to_string()))
        .ok()
        .filter(|v| !v.is_empty())
}

// ── Dispatching ─────────────────────────────────────────────────

/// Fire `jobs` without tying their fate to the caller's response. The
/// response to the acting user is already determined when this runs; jobs
/// may interleave, fail independently, or be abandoned on disconnect.
pub fn dispatch_detached(env: Env, jobs: Vec<SideEffectJob>) {
    if jobs.is_empty() {
        return;
    }
    wasm_bindgen_futures::spawn_local(async move {
        let channel = EmailChannel::from_env(&env);
        for job in jobs {
            let outcome = channel.deliver(&job).await;
            log_outcome(&job, &outcome);
        }
    });
}

fn log_outcome(job: &SideEffectJob, outcome: &DeliveryOutcome) {
    match outcome {
        DeliveryOutcome::Sent => {
            worker::console_log!("[notify] sent {} to {}", job.template.as_str(), job.to)
        }
        DeliveryOutcome::SkippedUnconfigured => worker::console_log!(
            "[notify] email channel unconfigured, skipped {} to {}",
            job.template.as_str(),
            job.to
        ),
        DeliveryOutcome::Failed(reason) => worker::console_error!(
            "[notify] {} to {} failed: {reason}",
            job.template.as_str(),
            job.to
        ),
    }
}

/// Send `request` with the dispatcher's bounded timeout.
pub async fn fetch_with_timeout(request: Request) -> Result<Response> {
    // The future must own the Fetch; send() borrows it.
    let fetch = Box::pin(async move { Fetch::Request(request).send().await });
    let timeout = Box::pin(Delay::from(Duration::from_millis(DISPATCH_TIMEOUT_MS)));
    match select(fetch, timeout).await {
        Either::Left((result, _)) => result,
        Either::Right(_) => Err(Error::RustError(format!(
            "outbound call timed out after {DISPATCH_TIMEOUT_MS}ms"
        ))),
    }
}

/// Build a JSON POST with an optional bearer token.
pub fn build_post_json<T: Serialize>(
    url: &str,
    body: &T,
    bearer: Option<&str>,
) -> Result<Request> {
    let headers = Headers::new();
    headers.set("content-type", "application/json")?;
    if let Some(token) = bearer {
        headers.set("authorization", &format!("Bearer {token}"))?;
    }
    let body = serde_json::to_string(body)
        .map_err(|e| Error::RustError(format!("serialize request body: {e}")))?;

    let mut init = RequestInit::new();
    init.with_method(Method::Post)
        .with_headers(headers)
        .with_body(Some(wasm_bindgen::JsValue::from_str(&body)));
    Request::new_with_init(url, &init)
}

// ── Templates ───────────────────────────────────────────────────

/// Render the HTML body for a template from its structured payload. Missing
/// payload fields render as empty strings rather than failing — a malformed
/// payload must not turn into a dispatch error.
pub fn render_html(template: Template, payload: &serde_json::Value) -> String {
    let field = |name: &str| -> String {
        match &payload[name] {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    };

    match template {
        Template::AgentStatusChanged => format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px;\">\
             <h2>Account Status Update</h2>\
             <p>Hello <strong>{}</strong>,</p>\
             <p>{}</p>\
             <p><strong>New Status:</strong> {}</p>\
             <p>If you have any questions, please contact our support team.</p>\
             </div>",
            field("name"),
            field("message"),
            field("status"),
        ),
        Template::StudentUploaded => format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px;\">\
             <h2>New Student Application Uploaded</h2>\
             <p><strong>Application ID:</strong> {}</p>\
             <p><strong>Agent:</strong> {}</p>\
             <p><strong>Student Name:</strong> {}</p>\
             <p><strong>Email:</strong> {}</p>\
             <p><strong>Phone:</strong> {}</p>\
             <p><strong>Preferred Country:</strong> {}</p>\
             <p><strong>Course Interest:</strong> {}</p>\
             <p><strong>Document:</strong> {}</p>\
             <p>Please review this application in the admin portal.</p>\
             </div>",
            field("application_id"),
            field("agent_email"),
            field("student_name"),
            field("email"),
            field("phone"),
            field("country"),
            field("course"),
            field("file_name"),
        ),
        Template::StatusUpdated => format!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px;\">\
             <h2>Application Status Updated</h2>\
             <p><strong>Application ID:</strong> {}</p>\
             <p><strong>Student Name:</strong> {}</p>\
             <p><strong>New Status:</strong> {}</p>\
             <p><strong>Admin Notes:</strong> {}</p>\
             <p>Login to your agent portal to view full details.</p>\
             </div>",
            field("application_id"),
            field("student_name"),
            field("status"),
            field("admin_notes"),
        ),
    }
}

// ── Job builders ────────────────────────────────────────────────

/// Job notifying an agent their account status changed.
pub fn agent_status_changed_job(to: &str, name: &str, status: &str) -> SideEffectJob {
    let message = match status {
        "active" => "Your account has been activated. You can now log in and submit applications.",
        "suspended" => "Your account has been suspended. Please contact support for details.",
        _ => "Your account status has changed.",
    };
    SideEffectJob {
        to: to.to_string(),
        subject: "Your account status has changed".to_string(),
        template: Template::AgentStatusChanged,
        payload: serde_json::json!({
            "name": name,
            "status": status,
            "message": message,
        }),
    }
}

/// Job notifying the admin inbox of a newly submitted application.
pub fn student_uploaded_job(
    to: &str,
    application: &crate::models::StudentApplication,
) -> SideEffectJob {
    SideEffectJob {
        to: to.to_string(),
        subject: format!("New Student Application - {}", application.application_id),
        template: Template::StudentUploaded,
        payload: serde_json::json!({
            "application_id": application.application_id,
            "agent_email": application.agent_email,
            "student_name": application.student_name,
            "email": application.email,
            "phone": application.phone,
            "country": application.country,
            "course": application.course,
            "file_name": application.file_name,
        }),
    }
}

/// Job notifying the submitting agent that an application's status moved.
pub fn status_updated_job(
    to: &str,
    application_id: &str,
    student_name: &str,
    status: &str,
    admin_notes: &str,
) -> SideEffectJob {
    SideEffectJob {
        to: to.to_string(),
        subject: format!("Application Status Update: {application_id}"),
        template: Template::StatusUpdated,
        payload: serde_json::json!({
            "application_id": application_id,
            "student_name": student_name,
            "status": status,
            "admin_notes": admin_notes,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Channel configuration ──────────────────────────────────

    #[test]
    fn channel_without_key_is_unconfigured() {
        let channel = EmailChannel::new(None, DEFAULT_FROM.into());
        assert!(!channel.is_configured());
    }

    #[test]
    fn channel_with_key_is_configured() {
        let channel = EmailChannel::new(Some("re_test_123".into()), DEFAULT_FROM.into());
        assert!(channel.is_configured());
    }

    // ── Delivery outcomes ──────────────────────────────────────

    #[test]
    fn success_statuses_map_to_sent() {
        assert_eq!(outcome_from_status(200, "email API"), DeliveryOutcome::Sent);
        assert_eq!(outcome_from_status(201, "email API"), DeliveryOutcome::Sent);
        assert_eq!(outcome_from_status(299, "email API"), DeliveryOutcome::Sent);
    }

    #[test]
    fn failure_status_maps_to_failed_with_reason() {
        for status in [301, 401, 404, 500] {
            match outcome_from_status(status, "email API") {
                DeliveryOutcome::Failed(reason) => {
                    assert!(reason.contains("email API"));
                    assert!(reason.contains(&status.to_string()));
                }
                other => panic!("expected Failed for status {status}, got {other:?}"),
            }
        }
    }

    // ── Template rendering ─────────────────────────────────────

    #[test]
    fn agent_status_changed_renders_name_and_status() {
        let html = render_html(
            Template::AgentStatusChanged,
            &json!({"name": "Priya", "status": "active", "message": "Welcome back."}),
        );
        assert!(html.contains("Priya"));
        assert!(html.contains("active"));
        assert!(html.contains("Welcome back."));
    }

    #[test]
    fn student_uploaded_renders_application_fields() {
        let html = render_html(
            Template::StudentUploaded,
            &json!({
                "application_id": "APP1700000000000",
                "student_name": "Alice Johnson",
                "course": "Engineering",
                "file_name": "transcript.pdf",
            }),
        );
        assert!(html.contains("APP1700000000000"));
        assert!(html.contains("Alice Johnson"));
        assert!(html.contains("transcript.pdf"));
    }

    #[test]
    fn missing_payload_fields_render_empty_not_error() {
        let html = render_html(Template::StatusUpdated, &json!({}));
        assert!(html.contains("Application Status Updated"));
        assert!(!html.contains("null"));
    }

    #[test]
    fn template_identifiers() {
        assert_eq!(Template::AgentStatusChanged.as_str(), "agent_status_changed");
        assert_eq!(Template::StudentUploaded.as_str(), "student_uploaded");
        assert_eq!(Template::StatusUpdated.as_str(), "status_updated");
    }

    // ── Job builders ───────────────────────────────────────────

    #[test]
    fn agent_status_changed_job_selects_message_by_status() {
        let activated = agent_status_changed_job("a@example.com", "Priya", "active");
        assert!(activated.payload["message"]
            .as_str()
            .unwrap()
            .contains("activated"));

        let suspended = agent_status_changed_job("a@example.com", "Priya", "suspended");
        assert!(suspended.payload["message"]
            .as_str()
            .unwrap()
            .contains("suspended"));
        assert_eq!(suspended.template, Template::AgentStatusChanged);
    }

    #[test]
    fn status_updated_job_carries_notes() {
        let job = status_updated_job(
            "agent@example.com",
            "APP42",
            "Bob Smith",
            "accepted",
            "Congratulations",
        );
        assert_eq!(job.to, "agent@example.com");
        assert!(job.subject.contains("APP42"));
        assert_eq!(job.payload["admin_notes"], "Congratulations");
        assert_eq!(job.payload["status"], "accepted");
    }
}
