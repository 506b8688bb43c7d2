//! Session claims and credential handling.
//!
//! Claims resolution is an explicit `(request credentials) -> Option<Principal>`
//! lookup: cookie → KV session record → principal. Every failure along the
//! way (missing cookie, expired or deleted session, garbled JSON) collapses
//! to `None` — an unauthenticated caller, never an error.

use crate::capability::Role;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use worker::*;

const SESSION_KV_BINDING: &str = "SESSIONS_KV";
const SESSION_KEY_PREFIX: &str = "session:";
pub const SESSION_COOKIE: &str = "portal_session";
/// Sessions live 30 days, matching the login surface's "keep me signed in".
const SESSION_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
// PBKDF2 rounds are capped by the Workers per-request CPU budget.
const PBKDF2_ROUNDS: u32 = 10_000;

/// Authenticated identity attached to a request. Immutable for the lifetime
/// of its session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

// ── Claims resolution ───────────────────────────────────────────

/// Resolve the caller's claims, treating every failure as "no principal".
pub async fn resolve_claims(req: &Request, env: &Env) -> Option<Principal> {
    let header = req.headers().get("cookie").ok()??;
    let session_id = session_id_from_cookie_header(&header)?;
    let kv = env.kv(SESSION_KV_BINDING).ok()?;
    let stored = kv
        .get(&session_key(&session_id))
        .text()
        .await
        .ok()
        .flatten()?;
    serde_json::from_str(&stored).ok()
}

/// Pull the session id out of a `Cookie` request header.
pub fn session_id_from_cookie_header(header: &str) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(prefix.as_str()))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn session_key(session_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{session_id}")
}

// ── Session lifecycle ───────────────────────────────────────────

/// Mint a session for `principal` and return its opaque id.
pub async fn create_session(env: &Env, principal: &Principal) -> Result<String> {
    let session_id = random_hex(16)?;
    let kv = env.kv(SESSION_KV_BINDING)?;
    let record = serde_json::to_string(principal)
        .map_err(|e| Error::RustError(format!("serialize principal: {e}")))?;
    kv.put(&session_key(&session_id), record)?
        .expiration_ttl(SESSION_TTL_SECONDS)
        .execute()
        .await?;
    Ok(session_id)
}

/// Drop the caller's session record, if any. Missing cookies are a no-op.
pub async fn destroy_session(env: &Env, req: &Request) -> Result<()> {
    let Some(header) = req.headers().get("cookie")? else {
        return Ok(());
    };
    let Some(session_id) = session_id_from_cookie_header(&header) else {
        return Ok(());
    };
    let kv = env.kv(SESSION_KV_BINDING)?;
    kv.delete(&session_key(&session_id)).await?;
    Ok(())
}

/// `Set-Cookie` value establishing the session.
pub fn set_cookie_header(session_id: &str) -> String {
    format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={SESSION_TTL_SECONDS}"
    )
}

/// `Set-Cookie` value clearing the session.
pub fn clear_cookie_header() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0")
}

// ── Credentials ─────────────────────────────────────────────────

/// Hash a password with a fresh random salt. Returns `(hash_hex, salt_hex)`.
pub fn hash_password(password: &str) -> Result<(String, String)> {
    let mut salt = [0u8; 16];
    getrandom::getrandom(&mut salt)
        .map_err(|e| Error::RustError(format!("failed to generate salt: {e}")))?;
    let digest = derive(password, &salt);
    Ok((hex::encode(digest), hex::encode(salt)))
}

/// Verify a password against a stored hex hash and salt.
pub fn verify_password(password: &str, hash_hex: &str, salt_hex: &str) -> bool {
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };
    let digest = derive(password, &salt);
    constant_time_eq(&digest, &expected)
}

fn derive(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut out);
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Random hex string of `bytes * 2` characters, used for session and
/// application ids.
pub fn random_hex(bytes: usize) -> Result<String> {
    let mut buf = vec![0u8; bytes];
    getrandom::getrandom(&mut buf)
        .map_err(|e| Error::RustError(format!("failed to generate id: {e}")))?;
    Ok(hex::encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Cookie parsing ─────────────────────────────────────────

    #[test]
    fn cookie_header_single_pair() {
        assert_eq!(
            session_id_from_cookie_header("portal_session=abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn cookie_header_among_other_cookies() {
        let header = "theme=dark; portal_session=deadbeef; locale=en";
        assert_eq!(
            session_id_from_cookie_header(header).as_deref(),
            Some("deadbeef")
        );
    }

    #[test]
    fn cookie_header_without_session_yields_none() {
        assert_eq!(session_id_from_cookie_header("theme=dark"), None);
        assert_eq!(session_id_from_cookie_header(""), None);
    }

    #[test]
    fn cookie_header_empty_value_yields_none() {
        assert_eq!(session_id_from_cookie_header("portal_session="), None);
    }

    #[test]
    fn cookie_name_must_match_exactly() {
        assert_eq!(session_id_from_cookie_header("xportal_session=abc"), None);
    }

    // ── Cookie building ────────────────────────────────────────

    #[test]
    fn set_cookie_is_http_only_and_scoped_to_root() {
        let header = set_cookie_header("abc");
        assert!(header.starts_with("portal_session=abc;"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Path=/"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_cookie_header().contains("Max-Age=0"));
    }

    // ── Password hashing ───────────────────────────────────────

    #[test]
    fn hash_then_verify_round_trip() {
        let (hash, salt) = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hash, &salt));
    }

    #[test]
    fn wrong_password_fails() {
        let (hash, salt) = hash_password("s3cret-pass").unwrap();
        assert!(!verify_password("other-pass", &hash, &salt));
    }

    #[test]
    fn salts_are_unique_per_hash() {
        let (_, salt_a) = hash_password("pw").unwrap();
        let (_, salt_b) = hash_password("pw").unwrap();
        assert_ne!(salt_a, salt_b);
    }

    #[test]
    fn malformed_stored_values_fail_verification() {
        assert!(!verify_password("pw", "not-hex", "also-not-hex"));
        assert!(!verify_password("pw", "", ""));
    }

    // ── Principal serde ────────────────────────────────────────

    #[test]
    fn principal_round_trip() {
        let p = Principal {
            id: "a1".into(),
            email: "agent@example.com".into(),
            name: "Test Agent".into(),
            role: Role::Agent,
        };
        let json = serde_json::to_string(&p).unwrap();
        let parsed: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(p, parsed);
    }

    #[test]
    fn principal_role_claim_serializes_snake_case() {
        let p = Principal {
            id: "u9".into(),
            email: "ops@example.com".into(),
            name: "Ops".into(),
            role: Role::Admin,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["role"], "admin");
    }

    // ── Helpers ────────────────────────────────────────────────

    #[test]
    fn random_hex_length() {
        let id = random_hex(16).unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
