//! Access gate for the portal's page surfaces.
//!
//! Runs once per request, before routing. For a path under a protected
//! prefix it either lets the request through, redirects an unauthenticated
//! caller to the login page, or redirects an authenticated caller with the
//! wrong role to that role's own home surface. The decision is a single
//! pass over a static table; the gate never produces an error response.

use crate::capability::{allows, Action, Role};
use crate::session::Principal;

/// Where unauthenticated callers of protected pages are sent.
pub const LOGIN_PATH: &str = "/login";

/// One entry of the static route-policy table: a path prefix and the
/// capability a caller must hold to enter it.
struct RoutePolicy {
    prefix: &'static str,
    required: Action,
}

/// Read-only for the life of the process; admin pages are admin-only and
/// the agent dashboard is agent-only.
const ROUTE_POLICIES: &[RoutePolicy] = &[
    RoutePolicy {
        prefix: "/admin",
        required: Action::ViewAdmin,
    },
    RoutePolicy {
        prefix: "/dashboard",
        required: Action::ViewDashboard,
    },
];

/// Outcome of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed to the handler. The caller's principal is left untouched;
    /// handlers see the claim exactly as resolved.
    Passthrough,
    /// No resolvable principal on a protected path.
    RedirectLogin,
    /// Authenticated, but the role does not match the prefix. Send the
    /// caller to their own home surface, never to login or an error page.
    RedirectHome(Role),
}

/// Whether `path` falls under any protected prefix. Callers use this to
/// skip claims resolution entirely for public paths.
pub fn protects(path: &str) -> bool {
    matched_policy(path).is_some()
}

/// Decide the gate outcome for `path` given the resolved claims.
///
/// Claims-resolution failures upstream must be represented as `None`; the
/// gate treats them identically to an absent session.
pub fn decide(path: &str, principal: Option<&Principal>) -> GateDecision {
    let Some(policy) = matched_policy(path) else {
        return GateDecision::Passthrough;
    };
    match principal {
        None => GateDecision::RedirectLogin,
        Some(p) if allows(p.role, policy.required) => GateDecision::Passthrough,
        Some(p) => GateDecision::RedirectHome(p.role),
    }
}

fn matched_policy(path: &str) -> Option<&'static RoutePolicy> {
    ROUTE_POLICIES.iter().find(|policy| {
        path == policy.prefix
            || path
                .strip_prefix(policy.prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: "a1".into(),
            email: "agent@example.com".into(),
            name: "Test Agent".into(),
            role,
        }
    }

    // ── Prefix matching ────────────────────────────────────────

    #[test]
    fn public_paths_are_unprotected() {
        assert!(!protects("/"));
        assert!(!protects("/login"));
        assert!(!protects("/api/auth/login"));
        assert!(!protects("/health"));
    }

    #[test]
    fn admin_and_dashboard_prefixes_are_protected() {
        assert!(protects("/admin"));
        assert!(protects("/admin/agents"));
        assert!(protects("/admin/universities/bulk"));
        assert!(protects("/dashboard"));
        assert!(protects("/dashboard/upload-students"));
    }

    #[test]
    fn prefix_match_requires_a_path_boundary() {
        // "/administrator" is not under "/admin".
        assert!(!protects("/administrator"));
        assert!(!protects("/dashboards"));
    }

    // ── Unauthenticated callers ────────────────────────────────

    #[test]
    fn unauthenticated_admin_request_redirects_to_login() {
        assert_eq!(decide("/admin/agents", None), GateDecision::RedirectLogin);
        assert_eq!(decide("/admin", None), GateDecision::RedirectLogin);
    }

    #[test]
    fn unauthenticated_dashboard_request_redirects_to_login() {
        assert_eq!(decide("/dashboard", None), GateDecision::RedirectLogin);
        assert_eq!(
            decide("/dashboard/profile", None),
            GateDecision::RedirectLogin
        );
    }

    #[test]
    fn unauthenticated_public_path_passes_through() {
        assert_eq!(decide("/", None), GateDecision::Passthrough);
        assert_eq!(decide("/login", None), GateDecision::Passthrough);
    }

    // ── Role mismatches redirect home, never to login ──────────

    #[test]
    fn agent_on_admin_path_goes_to_dashboard() {
        let p = principal(Role::Agent);
        assert_eq!(
            decide("/admin", Some(&p)),
            GateDecision::RedirectHome(Role::Agent)
        );
        assert_eq!(
            decide("/admin/applications", Some(&p)),
            GateDecision::RedirectHome(Role::Agent)
        );
        assert_eq!(Role::Agent.home_path(), "/dashboard");
    }

    #[test]
    fn admin_on_dashboard_path_goes_to_admin() {
        let p = principal(Role::Admin);
        assert_eq!(
            decide("/dashboard/upload-students", Some(&p)),
            GateDecision::RedirectHome(Role::Admin)
        );
        assert_eq!(Role::Admin.home_path(), "/admin");
    }

    // ── Matching roles pass through unchanged ──────────────────

    #[test]
    fn admin_passes_admin_paths() {
        let p = principal(Role::Admin);
        assert_eq!(decide("/admin", Some(&p)), GateDecision::Passthrough);
        assert_eq!(
            decide("/admin/settings", Some(&p)),
            GateDecision::Passthrough
        );
    }

    #[test]
    fn agent_passes_dashboard_paths() {
        let p = principal(Role::Agent);
        assert_eq!(decide("/dashboard", Some(&p)), GateDecision::Passthrough);
        assert_eq!(
            decide("/dashboard/universities", Some(&p)),
            GateDecision::Passthrough
        );
    }

    #[test]
    fn principal_is_not_consumed_by_the_gate() {
        let p = principal(Role::Agent);
        let before = p.clone();
        let _ = decide("/dashboard", Some(&p));
        assert_eq!(p, before);
    }
}
