//! Application portal worker: agents submit student applications with
//! supporting documents; administrators review them and manage the agent
//! network and university catalogue.
//!
//! Request flow: access gate (page surfaces) → route handler (capability
//! check, validate, mutate) → detached best-effort side effects (email,
//! sheet sync). A handler's response depends only on its own mutation.

use serde::Serialize;
use worker::*;

mod capability;
mod db;
mod dispatch;
mod gate;
mod models;
mod session;
mod sheets;
mod storage;
mod tabular;

use capability::{allows, Action, Role};
use session::Principal;

const D1_BINDING: &str = "DB";
const DOCUMENTS_BUCKET: &str = "DOCUMENTS";
const ADMIN_EMAIL_BINDING: &str = "ADMIN_EMAIL";
const MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Serialize)]
struct HealthResponse<'a> {
    service: &'a str,
    status: &'a str,
}

#[event(fetch)]
pub async fn fetch(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();

    // Page-surface gate: decided once, before any handler runs.
    let path = req.path();
    if gate::protects(&path) {
        let principal = session::resolve_claims(&req, &env).await;
        return match gate::decide(&path, principal.as_ref()) {
            gate::GateDecision::Passthrough => page_shell(&path),
            gate::GateDecision::RedirectLogin => redirect_to(&req, gate::LOGIN_PATH),
            gate::GateDecision::RedirectHome(role) => redirect_to(&req, role.home_path()),
        };
    }

    let router = Router::new();

    router
        // health
        .get("/", |_, _| Response::ok("campus-portal-worker online"))
        .get("/health", |_, _| {
            Response::from_json(&HealthResponse {
                service: "campus-portal",
                status: "ok",
            })
        })
        .get("/login", |_, _| {
            Response::from_html(shell_html("Sign in", "Use your agent credentials to sign in."))
        })
        // auth
        .post_async("/api/auth/login", |mut req, ctx| async move {
            let body: models::LoginRequest = req.json().await?;
            let d1 = ctx.env.d1(D1_BINDING)?;

            let Some(creds) = db::find_agent_credentials(&d1, &body.email).await? else {
                return json_error("Invalid email or password", 401);
            };
            if !session::verify_password(&body.password, &creds.password_hash, &creds.password_salt)
            {
                return json_error("Invalid email or password", 401);
            }
            // Unknown role strings stored in the DB hold no capabilities.
            let Some(role) = Role::parse(&creds.role) else {
                return json_error("Invalid email or password", 401);
            };
            if role == Role::Agent
                && models::AgentStatus::parse(&creds.status) != Some(models::AgentStatus::Active)
            {
                return json_error("Account is not active", 403);
            }

            let principal = Principal {
                id: creds.id.clone(),
                email: creds.email,
                name: creds.name,
                role,
            };
            let session_id = session::create_session(&ctx.env, &principal).await?;
            db::record_agent_login(&d1, &creds.id).await?;

            let headers = Headers::new();
            headers.set("set-cookie", &session::set_cookie_header(&session_id))?;
            Ok(Response::from_json(&serde_json::json!({
                "success": true,
                "user": principal,
            }))?
            .with_headers(headers))
        })
        .post_async("/api/auth/logout", |req, ctx| async move {
            session::destroy_session(&ctx.env, &req).await?;
            let headers = Headers::new();
            headers.set("set-cookie", &session::clear_cookie_header())?;
            Ok(Response::from_json(&serde_json::json!({ "success": true }))?
                .with_headers(headers))
        })
        .get_async("/api/auth/session", |req, ctx| async move {
            match session::resolve_claims(&req, &ctx.env).await {
                Some(principal) => {
                    Response::from_json(&serde_json::json!({ "user": principal }))
                }
                None => Response::from_json(&serde_json::json!({ "user": null })),
            }
        })
        // agent surface
        .post_async("/api/students/upload", |mut req, ctx| async move {
            let Some(principal) = authorize(&req, &ctx.env, Action::SubmitApplication).await
            else {
                return unauthorized();
            };

            let form = req.form_data().await?;
            let required = [
                "student_name",
                "email",
                "phone",
                "passport_number",
                "course_interest",
                "preferred_country",
            ];
            let mut fields = Vec::with_capacity(required.len());
            for name in required {
                match text_field(&form, name) {
                    Some(value) => fields.push(value),
                    None => return json_error("Missing required fields", 400),
                }
            }
            let [student_name, email, phone, passport_number, course, country]: [String; 6] =
                match fields.try_into() {
                    Ok(fields) => fields,
                    Err(_) => return json_error("Missing required fields", 400),
                };

            let Some(FormEntry::File(file)) = form.get("file") else {
                return json_error("No file uploaded", 400);
            };
            let file_name = storage::sanitize_file_name(&file.name());
            if !is_allowed_document(&file_name) {
                return json_error("Only PDF and Word documents are allowed", 400);
            }
            let bytes = file.bytes().await?;
            if bytes.is_empty() {
                return json_error("No file uploaded", 400);
            }
            if bytes.len() > MAX_DOCUMENT_BYTES {
                return json_error("File size exceeds 2MB limit", 400);
            }

            let application_id = new_application_id();
            let document_key = storage::document_key(&application_id, &file_name);
            let bucket = ctx.env.bucket(DOCUMENTS_BUCKET)?;
            let file_size = storage::put_blob(&bucket, &document_key, bytes).await?;

            let now = db::now_iso();
            let application = models::StudentApplication {
                application_id: application_id.clone(),
                agent_email: principal.email.clone(),
                student_name,
                email,
                phone,
                passport_number,
                country,
                course,
                status: models::ApplicationStatus::Pending,
                admin_notes: String::new(),
                file_name,
                file_size,
                document_key,
                created_at: now.clone(),
                updated_at: now,
            };
            let d1 = ctx.env.d1(D1_BINDING)?;
            db::insert_application(&d1, &application).await?;
            db::increment_total_applications(&d1, &principal.email).await?;

            // Mutation committed; everything below is best-effort.
            let mut jobs = Vec::new();
            if let Some(admin_email) = dispatch::read_binding(&ctx.env, ADMIN_EMAIL_BINDING) {
                jobs.push(dispatch::student_uploaded_job(&admin_email, &application));
            }
            dispatch::dispatch_detached(ctx.env.clone(), jobs);
            sheets::sync_detached(
                ctx.env.clone(),
                vec![sheets::SheetOp::AppendRow {
                    row: sheets::RosterRow::from_application(&application),
                }],
            );

            Ok(Response::from_json(&models::UploadAck {
                success: true,
                application_id,
                message: "Student uploaded successfully".into(),
            })?
            .with_status(201))
        })
        .get_async("/api/applications", |req, ctx| async move {
            let Some(principal) = authorize(&req, &ctx.env, Action::ViewOwnApplications).await
            else {
                return unauthorized();
            };
            let url = req.url()?;
            let status = status_filter(&url);
            let search = query_param(&url, "search");
            let d1 = ctx.env.d1(D1_BINDING)?;
            // Reads are always scoped to the caller's own records.
            let applications = db::list_applications(
                &d1,
                Some(&principal.email),
                status.as_deref(),
                search.as_deref(),
            )
            .await?;
            Response::from_json(&serde_json::json!({ "applications": applications }))
        })
        .get_async("/api/universities", |req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ViewUniversities).await.is_none() {
                return unauthorized();
            }
            let d1 = ctx.env.d1(D1_BINDING)?;
            let universities = db::list_universities(&d1).await?;
            Response::from_json(&serde_json::json!({ "universities": universities }))
        })
        // admin: applications
        .get_async("/api/admin/applications", |req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ViewAllApplications).await.is_none() {
                return unauthorized();
            }
            let url = req.url()?;
            let status = status_filter(&url);
            let search = query_param(&url, "search");
            let d1 = ctx.env.d1(D1_BINDING)?;
            let applications =
                db::list_applications(&d1, None, status.as_deref(), search.as_deref()).await?;
            Response::from_json(&serde_json::json!({ "applications": applications }))
        })
        .get_async("/api/admin/applications/document", |req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ViewAllApplications).await.is_none() {
                return unauthorized();
            }
            let url = req.url()?;
            let Some(application_id) = query_param(&url, "id") else {
                return json_error("Missing application id", 400);
            };
            let d1 = ctx.env.d1(D1_BINDING)?;
            let Some(application) = db::get_application(&d1, &application_id).await? else {
                return json_error("Application not found", 404);
            };
            let bucket = ctx.env.bucket(DOCUMENTS_BUCKET)?;
            let Some(bytes) = storage::get_blob(&bucket, &application.document_key).await? else {
                return json_error("Document not found", 404);
            };
            let headers = Headers::new();
            headers.set("content-type", "application/octet-stream")?;
            headers.set(
                "content-disposition",
                &format!("attachment; filename=\"{}\"", application.file_name),
            )?;
            Ok(Response::from_bytes(bytes)?.with_headers(headers))
        })
        .post_async(
            "/api/admin/applications/update-status",
            |mut req, ctx| async move {
                if authorize(&req, &ctx.env, Action::UpdateApplicationStatus)
                    .await
                    .is_none()
                {
                    return unauthorized();
                }
                let body: models::UpdateApplicationStatus = req.json().await?;
                let d1 = ctx.env.d1(D1_BINDING)?;
                let Some(existing) = db::get_application(&d1, &body.application_id).await? else {
                    return json_error("Application not found", 404);
                };
                db::update_application_status(
                    &d1,
                    &body.application_id,
                    body.status,
                    body.admin_notes.as_deref(),
                )
                .await?;
                if body.status == models::ApplicationStatus::Accepted
                    && existing.status != models::ApplicationStatus::Accepted
                {
                    db::increment_accepted_applications(&d1, &existing.agent_email).await?;
                }

                // Mutation committed; notify the agent and mirror the sheet.
                let notes = body
                    .admin_notes
                    .unwrap_or_else(|| existing.admin_notes.clone());
                dispatch::dispatch_detached(
                    ctx.env.clone(),
                    vec![dispatch::status_updated_job(
                        &existing.agent_email,
                        &body.application_id,
                        &existing.student_name,
                        body.status.as_str(),
                        &notes,
                    )],
                );
                sheets::sync_detached(
                    ctx.env.clone(),
                    vec![sheets::SheetOp::UpdateRow {
                        application_id: body.application_id.clone(),
                        status: body.status.as_str().to_string(),
                        admin_notes: notes,
                        last_updated: db::now_iso(),
                    }],
                );

                Response::from_json(&models::Ack {
                    success: true,
                    message: "Application status updated successfully".into(),
                })
            },
        )
        // admin: agents
        .get_async("/api/admin/agents/list", |req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let d1 = ctx.env.d1(D1_BINDING)?;
            let agents = db::list_agents(&d1).await?;
            Response::from_json(&serde_json::json!({ "agents": agents }))
        })
        .get_async("/api/admin/agents/details", |req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let url = req.url()?;
            let Some(agent_id) = query_param(&url, "id") else {
                return json_error("Missing agent id", 400);
            };
            let d1 = ctx.env.d1(D1_BINDING)?;
            match db::get_agent(&d1, &agent_id).await? {
                Some(agent) => Response::from_json(&serde_json::json!({ "agent": agent })),
                None => json_error("Agent not found", 404),
            }
        })
        .post_async("/api/admin/agents/create", |mut req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let body: models::CreateAgent = req.json().await?;
            if body.email.trim().is_empty() || body.name.trim().is_empty() {
                return json_error("Missing required fields", 400);
            }
            if body.password.len() < 6 {
                return json_error("Password must be at least 6 characters", 400);
            }
            let d1 = ctx.env.d1(D1_BINDING)?;
            if db::agent_email_exists(&d1, &body.email).await? {
                return json_error("User already exists", 400);
            }
            let (hash, salt) = session::hash_password(&body.password)?;
            let id = session::random_hex(12)?;
            db::create_agent(&d1, &id, &body, &hash, &salt).await?;
            Response::from_json(&serde_json::json!({
                "success": true,
                "message": "Agent created successfully",
                "agent": { "id": id, "email": body.email, "name": body.name, "role": Role::Agent.as_str() },
            }))
        })
        .post_async("/api/admin/agents/update", |mut req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let body: models::UpdateAgent = req.json().await?;
            let d1 = ctx.env.d1(D1_BINDING)?;
            if db::get_agent(&d1, &body.agent_id).await?.is_none() {
                return json_error("Agent not found", 404);
            }
            db::update_agent_profile(&d1, &body).await?;
            Response::from_json(&models::Ack {
                success: true,
                message: "Agent updated successfully".into(),
            })
        })
        .post_async("/api/admin/agents/update-status", |mut req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let body: models::UpdateAgentStatus = req.json().await?;
            let d1 = ctx.env.d1(D1_BINDING)?;
            let Some(agent) = db::get_agent(&d1, &body.agent_id).await? else {
                return json_error("Agent not found", 404);
            };
            db::update_agent_status(&d1, &body.agent_id, body.status).await?;

            // Mutation committed; the notification's fate is its own.
            dispatch::dispatch_detached(
                ctx.env.clone(),
                vec![dispatch::agent_status_changed_job(
                    &agent.email,
                    &agent.name,
                    body.status.as_str(),
                )],
            );

            Response::from_json(&models::Ack {
                success: true,
                message: "Agent status updated successfully".into(),
            })
        })
        .post_async("/api/admin/agents/reset-password", |mut req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let body: models::ResetAgentPassword = req.json().await?;
            if body.new_password.len() < 6 {
                return json_error("Password must be at least 6 characters", 400);
            }
            let d1 = ctx.env.d1(D1_BINDING)?;
            if db::get_agent(&d1, &body.agent_id).await?.is_none() {
                return json_error("Agent not found", 404);
            }
            let (hash, salt) = session::hash_password(&body.new_password)?;
            db::update_agent_password(&d1, &body.agent_id, &hash, &salt).await?;
            Response::from_json(&models::Ack {
                success: true,
                message: "Password reset successfully".into(),
            })
        })
        .post_async("/api/admin/agents/delete", |mut req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let body: models::DeleteAgent = req.json().await?;
            let d1 = ctx.env.d1(D1_BINDING)?;
            if db::get_agent(&d1, &body.agent_id).await?.is_none() {
                return json_error("Agent not found", 404);
            }
            db::delete_agent(&d1, &body.agent_id).await?;
            Response::from_json(&models::Ack {
                success: true,
                message: "Agent deleted successfully".into(),
            })
        })
        .post_async("/api/admin/agents/bulk-action", |mut req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let body: models::BulkAgentAction = req.json().await?;
            if body.agent_ids.is_empty() {
                return json_error("No agents selected", 400);
            }
            let d1 = ctx.env.d1(D1_BINDING)?;
            let label = match body.action {
                models::BulkAgentOp::Activate => {
                    db::bulk_agent_status(&d1, &body.agent_ids, models::AgentStatus::Active)
                        .await?;
                    "activate"
                }
                models::BulkAgentOp::Suspend => {
                    db::bulk_agent_status(&d1, &body.agent_ids, models::AgentStatus::Suspended)
                        .await?;
                    "suspend"
                }
                models::BulkAgentOp::Delete => {
                    db::bulk_delete_agents(&d1, &body.agent_ids).await?;
                    "delete"
                }
            };
            Response::from_json(&models::BulkActionAck {
                success: true,
                message: format!("Bulk {label} completed"),
                affected: body.agent_ids.len(),
            })
        })
        .get_async("/api/admin/agents/export", |req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ExportAgents).await.is_none() {
                return unauthorized();
            }
            let d1 = ctx.env.d1(D1_BINDING)?;
            let agents = db::list_agents(&d1).await?;
            let csv = tabular::export_agents_csv(&agents);

            let date = db::now_iso();
            let date = date.split('T').next().unwrap_or("export");
            let headers = Headers::new();
            headers.set("content-type", "text/csv")?;
            headers.set(
                "content-disposition",
                &format!("attachment; filename=\"agents-{date}.csv\""),
            )?;
            Ok(Response::ok(csv)?.with_headers(headers))
        })
        // admin: universities
        .post_async("/api/admin/universities/create", |mut req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageUniversities).await.is_none() {
                return unauthorized();
            }
            let body: models::CreateUniversity = req.json().await?;
            if body.name.trim().is_empty() || body.country.trim().is_empty() {
                return json_error("Missing required fields", 400);
            }
            let d1 = ctx.env.d1(D1_BINDING)?;
            let id = session::random_hex(12)?;
            db::insert_university(&d1, &id, &body).await?;
            Response::from_json(&serde_json::json!({
                "success": true,
                "message": "University created successfully",
                "id": id,
            }))
        })
        .post_async(
            "/api/admin/universities/bulk-upload",
            |mut req, ctx| async move {
                if authorize(&req, &ctx.env, Action::ManageUniversities).await.is_none() {
                    return unauthorized();
                }
                let form = req.form_data().await?;
                let Some(FormEntry::File(file)) = form.get("file") else {
                    return json_error("No file uploaded", 400);
                };
                let file_name = file.name();
                let bytes = file.bytes().await?;
                let rows = match tabular::parse_university_upload(&file_name, &bytes) {
                    Ok(rows) => rows,
                    Err(e) => return json_error(&e.to_string(), 400),
                };
                let d1 = ctx.env.d1(D1_BINDING)?;
                for row in &rows {
                    let id = session::random_hex(12)?;
                    db::insert_university(&d1, &id, row).await?;
                }
                Response::from_json(&models::BulkUploadAck {
                    success: true,
                    count: rows.len(),
                    message: format!("Successfully uploaded {} universities", rows.len()),
                })
            },
        )
        // operational
        .post_async("/api/setup-db", |req, ctx| async move {
            if authorize(&req, &ctx.env, Action::ManageAgents).await.is_none() {
                return unauthorized();
            }
            let d1 = ctx.env.d1(D1_BINDING)?;
            db::ensure_schema(&d1).await?;
            Response::from_json(&models::Ack {
                success: true,
                message: "Schema is up to date".into(),
            })
        })
        .run(req, env)
        .await
}

// ── Request helpers ─────────────────────────────────────────────

/// Resolve claims and check the capability in one step. `None` covers both
/// "not authenticated" and "role lacks the capability" — API callers get
/// the same 401 either way.
async fn authorize(req: &Request, env: &Env, action: Action) -> Option<Principal> {
    let principal = session::resolve_claims(req, env).await?;
    allows(principal.role, action).then_some(principal)
}

fn unauthorized() -> Result<Response> {
    json_error("Unauthorized", 401)
}

fn json_error(message: &str, status: u16) -> Result<Response> {
    Ok(Response::from_json(&serde_json::json!({ "error": message }))?.with_status(status))
}

fn redirect_to(req: &Request, path: &str) -> Result<Response> {
    let mut url = req.url()?;
    url.set_path(path);
    url.set_query(None);
    Response::redirect(url)
}

fn page_shell(path: &str) -> Result<Response> {
    if path.starts_with("/admin") {
        Response::from_html(shell_html("Admin", "Review applications and manage the network."))
    } else {
        Response::from_html(shell_html("Dashboard", "Submit and track student applications."))
    }
}

fn shell_html(title: &str, tagline: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>Campus Portal — {title}</title></head>\
         <body><main id=\"app\" data-surface=\"{title}\"><h1>{title}</h1>\
         <p>{tagline}</p></main></body></html>"
    )
}

fn text_field(form: &FormData, name: &str) -> Option<String> {
    match form.get(name) {
        Some(FormEntry::Field(value)) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Status query values outside the enum are ignored rather than erroring.
fn status_filter(url: &Url) -> Option<String> {
    query_param(url, "status")
        .and_then(|s| models::ApplicationStatus::parse(&s))
        .map(|s| s.as_str().to_string())
}

fn is_allowed_document(file_name: &str) -> bool {
    let ext = file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(ext.as_str(), "pdf" | "doc" | "docx")
}

fn new_application_id() -> String {
    format!("APP{}", js_sys::Date::now() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Document validation ────────────────────────────────────

    #[test]
    fn allowed_document_extensions() {
        assert!(is_allowed_document("transcript.pdf"));
        assert!(is_allowed_document("cv.DOC"));
        assert!(is_allowed_document("statement.docx"));
    }

    #[test]
    fn disallowed_document_extensions() {
        assert!(!is_allowed_document("photo.png"));
        assert!(!is_allowed_document("archive.zip"));
        assert!(!is_allowed_document("no_extension"));
    }

    // ── Page shells ────────────────────────────────────────────

    #[test]
    fn shell_html_carries_surface_title() {
        let html = shell_html("Dashboard", "tagline");
        assert!(html.contains("<h1>Dashboard</h1>"));
        assert!(html.contains("tagline"));
    }
}
