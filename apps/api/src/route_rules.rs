//! Route permission table served by the API.

use std::str::FromStr;

use gatehouse_application::{GatePolicy, RouteRuleTable};
use gatehouse_core::AppResult;
use gatehouse_domain::{PermissionId, PermissionMode, RoutePattern, RouteRule};

use crate::api_config::ApiConfig;

/// Reachable without a session.
const PUBLIC_ROUTES: &[&str] = &["/health", "/api/auth/login", "/auth/[...rest]"];

/// Always validated against the session store.
const STRICT_ROUTES: &[&str] = &[
    "/api/security/roles/[roleId]/[[...rest]]",
    "/api/security/subjects/[subjectId]/[[...rest]]",
];

struct RouteRuleDeclaration {
    pattern: &'static str,
    permissions: &'static [&'static str],
    mode: PermissionMode,
    priority: i32,
}

const ROUTE_RULES: &[RouteRuleDeclaration] = &[
    RouteRuleDeclaration {
        pattern: "/api/audit/[...rest]",
        permissions: &["audit:read"],
        mode: PermissionMode::Any,
        priority: 0,
    },
    RouteRuleDeclaration {
        pattern: "/api/security/[...rest]",
        permissions: &["role:read", "role:manage"],
        mode: PermissionMode::Any,
        priority: 0,
    },
    RouteRuleDeclaration {
        pattern: "/api/security/roles/[roleId]/permissions/[[...rest]]",
        permissions: &["role:read", "role:manage"],
        mode: PermissionMode::All,
        priority: 0,
    },
    RouteRuleDeclaration {
        pattern: "/api/security/subjects/[subjectId]/roles/[roleId]",
        permissions: &["role:read", "role:manage"],
        mode: PermissionMode::All,
        priority: 0,
    },
    RouteRuleDeclaration {
        pattern: "/api/security/subjects/[subjectId]/sessions",
        permissions: &["session:revoke"],
        mode: PermissionMode::Any,
        priority: 10,
    },
];

/// Builds the validated rule table; any malformed declaration aborts start-up.
pub fn build_route_rules() -> AppResult<RouteRuleTable> {
    RouteRuleTable::from_declarations(ROUTE_RULES.iter().map(|declaration| {
        let permissions = declaration
            .permissions
            .iter()
            .map(|value| PermissionId::from_str(value))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(
            RouteRule::new(RoutePattern::parse(declaration.pattern)?, permissions)
                .with_mode(declaration.mode)
                .with_priority(declaration.priority),
        )
    }))
}

/// Builds the gate policy from the static route lists and runtime flags.
pub fn build_gate_policy(config: &ApiConfig) -> AppResult<GatePolicy> {
    Ok(GatePolicy {
        public_routes: parse_patterns(PUBLIC_ROUTES)?,
        strict_routes: parse_patterns(STRICT_ROUTES)?,
        strict_globally: config.strict_session_validation,
        expose_missing_permissions: config.expose_missing_permissions,
        ..GatePolicy::default()
    })
}

pub(crate) fn parse_patterns(raw: &[&str]) -> AppResult<Vec<RoutePattern>> {
    raw.iter().map(|value| RoutePattern::parse(value)).collect()
}
