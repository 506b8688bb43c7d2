use super::*;

// ── Entity round-trips ──────────────────────────────────────────

#[test]
fn agent_round_trip() {
    let agent = Agent {
        id: "a1".into(),
        email: "priya@example.com".into(),
        name: "Priya Sharma".into(),
        company: "Global Study Partners".into(),
        country: "India".into(),
        phone: "+91-98000-00000".into(),
        status: AgentStatus::Active,
        total_applications: 12,
        accepted_applications: 4,
        created_at: "2026-01-01T00:00:00Z".into(),
        updated_at: "2026-01-02T00:00:00Z".into(),
        last_login: Some("2026-01-03T08:00:00Z".into()),
    };
    let json = serde_json::to_string(&agent).unwrap();
    let parsed: Agent = serde_json::from_str(&json).unwrap();
    assert_eq!(agent, parsed);
}

#[test]
fn student_application_round_trip() {
    let app = StudentApplication {
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
        file_size: 204_800,
        document_key: "applications/APP1700000000000/transcript.pdf".into(),
        created_at: "2026-01-01T00:00:00Z".into(),
        updated_at: "2026-01-01T00:00:00Z".into(),
    };
    let json = serde_json::to_string(&app).unwrap();
    let parsed: StudentApplication = serde_json::from_str(&json).unwrap();
    assert_eq!(app, parsed);
}

#[test]
fn university_round_trip() {
    let uni = University {
        id: "u1".into(),
        name: "Technical University of Munich".into(),
        country: "Germany".into(),
        programs: vec!["Engineering".into(), "Computer Science".into()],
        intakes: vec!["October".into(), "April".into()],
        tuition: "EUR 0 (semester fees apply)".into(),
        requirements: "IELTS 6.5".into(),
        created_at: "2026-01-01T00:00:00Z".into(),
    };
    let json = serde_json::to_string(&uni).unwrap();
    let parsed: University = serde_json::from_str(&json).unwrap();
    assert_eq!(uni, parsed);
}

// ── Status enums ────────────────────────────────────────────────

#[test]
fn agent_status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&AgentStatus::Suspended).unwrap(),
        "\"suspended\""
    );
}

#[test]
fn agent_status_parse_round_trip() {
    for status in [
        AgentStatus::Active,
        AgentStatus::Suspended,
        AgentStatus::Pending,
    ] {
        assert_eq!(AgentStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(AgentStatus::parse("banned"), None);
}

#[test]
fn application_status_parse_round_trip() {
    for status in [
        ApplicationStatus::Pending,
        ApplicationStatus::UnderReview,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
    ] {
        assert_eq!(ApplicationStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(ApplicationStatus::parse("approved"), None);
}

#[test]
fn application_status_under_review_wire_format() {
    assert_eq!(
        serde_json::to_string(&ApplicationStatus::UnderReview).unwrap(),
        "\"under_review\""
    );
}

// ── Request types ───────────────────────────────────────────────

#[test]
fn bulk_agent_action_round_trip() {
    let action = BulkAgentAction {
        agent_ids: vec!["a1".into(), "a2".into()],
        action: BulkAgentOp::Suspend,
    };
    let json = serde_json::to_string(&action).unwrap();
    assert!(json.contains("\"suspend\""));
    let parsed: BulkAgentAction = serde_json::from_str(&json).unwrap();
    assert_eq!(action, parsed);
}

#[test]
fn update_application_status_optional_notes() {
    let json = r#"{"application_id":"APP42","status":"accepted"}"#;
    let parsed: UpdateApplicationStatus = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.status, ApplicationStatus::Accepted);
    assert_eq!(parsed.admin_notes, None);
}

#[test]
fn create_agent_optional_fields_default_to_none() {
    let json = r#"{"email":"a@example.com","name":"A","password":"secret1"}"#;
    let parsed: CreateAgent = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.company, None);
    assert_eq!(parsed.country, None);
    assert_eq!(parsed.phone, None);
}
