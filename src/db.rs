//! D1 access for agents, student applications, and universities.
//!
//! All statements are parameterized; IN-clauses are built from numbered
//! placeholders, never string interpolation. Single-row mutations are
//! atomic at the statement level, which is the commit boundary handlers
//! rely on before any side-effect dispatch.

use crate::models;
use wasm_bindgen::JsValue;
use worker::*;

pub fn now_iso() -> String {
    js_sys::Date::new_0()
        .to_iso_string()
        .as_string()
        .unwrap_or_default()
}

fn opt_str(s: &Option<String>) -> JsValue {
    match s {
        Some(s) => JsValue::from_str(s),
        None => JsValue::NULL,
    }
}

// ── Schema ──────────────────────────────────────────────────────

/// Create the portal tables when absent. Invoked from the setup route.
pub async fn ensure_schema(d1: &D1Database) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'agent',
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            company TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'active',
            total_applications INTEGER NOT NULL DEFAULT 0,
            accepted_applications INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_login TEXT
        )",
        "CREATE TABLE IF NOT EXISTS applications (
            application_id TEXT PRIMARY KEY,
            agent_email TEXT NOT NULL,
            student_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            passport_number TEXT NOT NULL,
            country TEXT NOT NULL,
            course TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            admin_notes TEXT NOT NULL DEFAULT '',
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            document_key TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS universities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            country TEXT NOT NULL,
            programs TEXT NOT NULL DEFAULT '[]',
            intakes TEXT NOT NULL DEFAULT '[]',
            tuition TEXT NOT NULL DEFAULT '',
            requirements TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
    ];
    for sql in statements {
        d1.prepare(sql).bind(&[])?.run().await?;
    }
    Ok(())
}

// ── Agents ──────────────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct AgentRow {
    id: String,
    email: String,
    name: String,
    company: String,
    country: String,
    phone: String,
    status: String,
    total_applications: u32,
    accepted_applications: u32,
    created_at: String,
    updated_at: String,
    last_login: Option<String>,
}

impl AgentRow {
    fn into_agent(self) -> models::Agent {
        models::Agent {
            id: self.id,
            email: self.email,
            name: self.name,
            company: self.company,
            country: self.country,
            phone: self.phone,
            // Unknown stored values land in Pending, which cannot log in.
            status: models::AgentStatus::parse(&self.status)
                .unwrap_or(models::AgentStatus::Pending),
            total_applications: self.total_applications,
            accepted_applications: self.accepted_applications,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login: self.last_login,
        }
    }
}

/// Credential row used only by the login handler.
#[derive(serde::Deserialize)]
pub struct AgentCredentials {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub password_hash: String,
    pub password_salt: String,
}

const AGENT_COLUMNS: &str = "id, email, name, company, country, phone, status, \
     total_applications, accepted_applications, created_at, updated_at, last_login";

pub async fn create_agent(
    d1: &D1Database,
    id: &str,
    body: &models::CreateAgent,
    password_hash: &str,
    password_salt: &str,
) -> Result<()> {
    let now = now_iso();
    d1.prepare(
        "INSERT INTO agents (id, email, name, role, password_hash, password_salt, company, country, phone, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'agent', ?4, ?5, ?6, ?7, ?8, 'active', ?9, ?9)",
    )
    .bind(&[
        JsValue::from_str(id),
        JsValue::from_str(&body.email),
        JsValue::from_str(&body.name),
        JsValue::from_str(password_hash),
        JsValue::from_str(password_salt),
        JsValue::from_str(body.company.as_deref().unwrap_or("")),
        JsValue::from_str(body.country.as_deref().unwrap_or("India")),
        JsValue::from_str(body.phone.as_deref().unwrap_or("")),
        JsValue::from_str(&now),
    ])?
    .run()
    .await?;
    Ok(())
}

pub async fn find_agent_credentials(
    d1: &D1Database,
    email: &str,
) -> Result<Option<AgentCredentials>> {
    d1.prepare(
        "SELECT id, email, name, role, status, password_hash, password_salt
         FROM agents WHERE email = ?1",
    )
    .bind(&[JsValue::from_str(email)])?
    .first(None)
    .await
}

pub async fn agent_email_exists(d1: &D1Database, email: &str) -> Result<bool> {
    let row: Option<serde_json::Value> = d1
        .prepare("SELECT id FROM agents WHERE email = ?1")
        .bind(&[JsValue::from_str(email)])?
        .first(None)
        .await?;
    Ok(row.is_some())
}

pub async fn get_agent(d1: &D1Database, id: &str) -> Result<Option<models::Agent>> {
    let row: Option<AgentRow> = d1
        .prepare(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"))
        .bind(&[JsValue::from_str(id)])?
        .first(None)
        .await?;
    Ok(row.map(AgentRow::into_agent))
}

pub async fn list_agents(d1: &D1Database) -> Result<Vec<models::Agent>> {
    let result = d1
        .prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE role = 'agent' ORDER BY created_at DESC"
        ))
        .bind(&[])?
        .all()
        .await?;
    let rows: Vec<AgentRow> = result.results()?;
    Ok(rows.into_iter().map(AgentRow::into_agent).collect())
}

pub async fn update_agent_profile(d1: &D1Database, body: &models::UpdateAgent) -> Result<()> {
    let now = now_iso();
    d1.prepare(
        "UPDATE agents SET
            name = COALESCE(?2, name),
            company = COALESCE(?3, company),
            country = COALESCE(?4, country),
            phone = COALESCE(?5, phone),
            updated_at = ?6
         WHERE id = ?1",
    )
    .bind(&[
        JsValue::from_str(&body.agent_id),
        opt_str(&body.name),
        opt_str(&body.company),
        opt_str(&body.country),
        opt_str(&body.phone),
        JsValue::from_str(&now),
    ])?
    .run()
    .await?;
    Ok(())
}

pub async fn update_agent_status(
    d1: &D1Database,
    id: &str,
    status: models::AgentStatus,
) -> Result<()> {
    let now = now_iso();
    d1.prepare("UPDATE agents SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(&[
            JsValue::from_str(id),
            JsValue::from_str(status.as_str()),
            JsValue::from_str(&now),
        ])?
        .run()
        .await?;
    Ok(())
}

pub async fn update_agent_password(
    d1: &D1Database,
    id: &str,
    password_hash: &str,
    password_salt: &str,
) -> Result<()> {
    let now = now_iso();
    d1.prepare(
        "UPDATE agents SET password_hash = ?2, password_salt = ?3, updated_at = ?4 WHERE id = ?1",
    )
    .bind(&[
        JsValue::from_str(id),
        JsValue::from_str(password_hash),
        JsValue::from_str(password_salt),
        JsValue::from_str(&now),
    ])?
    .run()
    .await?;
    Ok(())
}

pub async fn delete_agent(d1: &D1Database, id: &str) -> Result<()> {
    d1.prepare("DELETE FROM agents WHERE id = ?1")
        .bind(&[JsValue::from_str(id)])?
        .run()
        .await?;
    Ok(())
}

pub async fn record_agent_login(d1: &D1Database, id: &str) -> Result<()> {
    let now = now_iso();
    d1.prepare("UPDATE agents SET last_login = ?2 WHERE id = ?1")
        .bind(&[JsValue::from_str(id), JsValue::from_str(&now)])?
        .run()
        .await?;
    Ok(())
}

pub async fn bulk_agent_status(
    d1: &D1Database,
    ids: &[String],
    status: models::AgentStatus,
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders: Vec<String> = (3..ids.len() + 3).map(|i| format!("?{i}")).collect();
    let query = format!(
        "UPDATE agents SET status = ?1, updated_at = ?2 WHERE id IN ({})",
        placeholders.join(", ")
    );
    let mut bindings = vec![
        JsValue::from_str(status.as_str()),
        JsValue::from_str(&now_iso()),
    ];
    bindings.extend(ids.iter().map(|id| JsValue::from_str(id)));
    d1.prepare(&query).bind(&bindings)?.run().await?;
    Ok(())
}

pub async fn bulk_delete_agents(d1: &D1Database, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let query = format!(
        "DELETE FROM agents WHERE id IN ({})",
        placeholders.join(", ")
    );
    let bindings: Vec<JsValue> = ids.iter().map(|id| JsValue::from_str(id)).collect();
    d1.prepare(&query).bind(&bindings)?.run().await?;
    Ok(())
}

pub async fn increment_total_applications(d1: &D1Database, agent_email: &str) -> Result<()> {
    d1.prepare("UPDATE agents SET total_applications = total_applications + 1 WHERE email = ?1")
        .bind(&[JsValue::from_str(agent_email)])?
        .run()
        .await?;
    Ok(())
}

pub async fn increment_accepted_applications(d1: &D1Database, agent_email: &str) -> Result<()> {
    d1.prepare(
        "UPDATE agents SET accepted_applications = accepted_applications + 1 WHERE email = ?1",
    )
    .bind(&[JsValue::from_str(agent_email)])?
    .run()
    .await?;
    Ok(())
}

// ── Applications ────────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ApplicationRow {
    application_id: String,
    agent_email: String,
    student_name: String,
    email: String,
    phone: String,
    passport_number: String,
    country: String,
    course: String,
    status: String,
    admin_notes: String,
    file_name: String,
    file_size: u64,
    document_key: String,
    created_at: String,
    updated_at: String,
}

impl ApplicationRow {
    fn into_application(self) -> models::StudentApplication {
        models::StudentApplication {
            application_id: self.application_id,
            agent_email: self.agent_email,
            student_name: self.student_name,
            email: self.email,
            phone: self.phone,
            passport_number: self.passport_number,
            country: self.country,
            course: self.course,
            status: models::ApplicationStatus::parse(&self.status)
                .unwrap_or(models::ApplicationStatus::Pending),
            admin_notes: self.admin_notes,
            file_name: self.file_name,
            file_size: self.file_size,
            document_key: self.document_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub async fn insert_application(d1: &D1Database, app: &models::StudentApplication) -> Result<()> {
    d1.prepare(
        "INSERT INTO applications (application_id, agent_email, student_name, email, phone, passport_number, country, course, status, admin_notes, file_name, file_size, document_key, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )
    .bind(&[
        JsValue::from_str(&app.application_id),
        JsValue::from_str(&app.agent_email),
        JsValue::from_str(&app.student_name),
        JsValue::from_str(&app.email),
        JsValue::from_str(&app.phone),
        JsValue::from_str(&app.passport_number),
        JsValue::from_str(&app.country),
        JsValue::from_str(&app.course),
        JsValue::from_str(app.status.as_str()),
        JsValue::from_str(&app.admin_notes),
        JsValue::from_str(&app.file_name),
        JsValue::from_f64(app.file_size as f64),
        JsValue::from_str(&app.document_key),
        JsValue::from_str(&app.created_at),
        JsValue::from_str(&app.updated_at),
    ])?
    .run()
    .await?;
    Ok(())
}

pub async fn get_application(
    d1: &D1Database,
    application_id: &str,
) -> Result<Option<models::StudentApplication>> {
    let row: Option<ApplicationRow> = d1
        .prepare("SELECT * FROM applications WHERE application_id = ?1")
        .bind(&[JsValue::from_str(application_id)])?
        .first(None)
        .await?;
    Ok(row.map(ApplicationRow::into_application))
}

/// List applications, optionally scoped to one agent and filtered by status
/// and/or a case-insensitive search over student name and email.
pub async fn list_applications(
    d1: &D1Database,
    agent_email: Option<&str>,
    status: Option<&str>,
    search: Option<&str>,
) -> Result<Vec<models::StudentApplication>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut bindings: Vec<JsValue> = Vec::new();

    if let Some(email) = agent_email {
        bindings.push(JsValue::from_str(email));
        clauses.push(format!("agent_email = ?{}", bindings.len()));
    }
    if let Some(status) = status {
        bindings.push(JsValue::from_str(status));
        clauses.push(format!("status = ?{}", bindings.len()));
    }
    if let Some(search) = search {
        let pattern = format!("%{}%", search.to_ascii_lowercase());
        bindings.push(JsValue::from_str(&pattern));
        let n = bindings.len();
        clauses.push(format!(
            "(lower(student_name) LIKE ?{n} OR lower(email) LIKE ?{n})"
        ));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let query = format!("SELECT * FROM applications{where_clause} ORDER BY created_at DESC");

    let result = d1.prepare(&query).bind(&bindings)?.all().await?;
    let rows: Vec<ApplicationRow> = result.results()?;
    Ok(rows
        .into_iter()
        .map(ApplicationRow::into_application)
        .collect())
}

pub async fn update_application_status(
    d1: &D1Database,
    application_id: &str,
    status: models::ApplicationStatus,
    admin_notes: Option<&str>,
) -> Result<()> {
    let now = now_iso();
    d1.prepare(
        "UPDATE applications SET status = ?2, admin_notes = COALESCE(?3, admin_notes), updated_at = ?4
         WHERE application_id = ?1",
    )
    .bind(&[
        JsValue::from_str(application_id),
        JsValue::from_str(status.as_str()),
        match admin_notes {
            Some(notes) => JsValue::from_str(notes),
            None => JsValue::NULL,
        },
        JsValue::from_str(&now),
    ])?
    .run()
    .await?;
    Ok(())
}

// ── Universities ────────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct UniversityRow {
    id: String,
    name: String,
    country: String,
    programs: String,
    intakes: String,
    tuition: String,
    requirements: String,
    created_at: String,
}

impl UniversityRow {
    fn into_university(self) -> models::University {
        models::University {
            id: self.id,
            name: self.name,
            country: self.country,
            programs: serde_json::from_str(&self.programs).unwrap_or_default(),
            intakes: serde_json::from_str(&self.intakes).unwrap_or_default(),
            tuition: self.tuition,
            requirements: self.requirements,
            created_at: self.created_at,
        }
    }
}

pub async fn insert_university(
    d1: &D1Database,
    id: &str,
    body: &models::CreateUniversity,
) -> Result<()> {
    let now = now_iso();
    let programs = serde_json::to_string(&body.programs)
        .map_err(|e| Error::RustError(format!("serialize programs: {e}")))?;
    let intakes = serde_json::to_string(&body.intakes)
        .map_err(|e| Error::RustError(format!("serialize intakes: {e}")))?;
    d1.prepare(
        "INSERT INTO universities (id, name, country, programs, intakes, tuition, requirements, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(&[
        JsValue::from_str(id),
        JsValue::from_str(&body.name),
        JsValue::from_str(&body.country),
        JsValue::from_str(&programs),
        JsValue::from_str(&intakes),
        JsValue::from_str(&body.tuition),
        JsValue::from_str(&body.requirements),
        JsValue::from_str(&now),
    ])?
    .run()
    .await?;
    Ok(())
}

pub async fn list_universities(d1: &D1Database) -> Result<Vec<models::University>> {
    let result = d1
        .prepare("SELECT * FROM universities ORDER BY name ASC")
        .bind(&[])?
        .all()
        .await?;
    let rows: Vec<UniversityRow> = result.results()?;
    Ok(rows
        .into_iter()
        .map(UniversityRow::into_university)
        .collect())
}
