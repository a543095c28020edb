//! Per-request authorization decision.
//!
//! The gate composes session validation and route-permission matching. It
//! performs no writes; callers decide whether a denial is audited.

use std::sync::Arc;

use tracing::debug;
use url::form_urlencoded;

use gatehouse_core::{AppResult, AuthenticatedSubject, SubjectId};
use gatehouse_domain::{AuthorizationOutcome, PermissionId, PermissionSet, RoutePattern};

use crate::route_rules::matches_any;
use crate::{
    PermissionResolver, RouteRuleTable, SessionService, SessionValidationError, ValidationMode,
};

/// Static gate configuration, loaded once at start-up.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    /// Routes reachable without authentication.
    pub public_routes: Vec<RoutePattern>,
    /// Routes that always require strict session validation.
    pub strict_routes: Vec<RoutePattern>,
    /// Makes every protected route strict.
    pub strict_globally: bool,
    /// Sign-in page receiving unauthenticated callers.
    pub sign_in_path: String,
    /// Error page receiving denied callers.
    pub error_path: String,
    /// Appends the missing permissions to denial redirects. Development only.
    pub expose_missing_permissions: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            public_routes: Vec::new(),
            strict_routes: Vec::new(),
            strict_globally: false,
            sign_in_path: "/auth/signin".to_owned(),
            error_path: "/auth/error".to_owned(),
            expose_missing_permissions: false,
        }
    }
}

impl GatePolicy {
    /// Returns whether a path needs the session record check.
    #[must_use]
    pub fn is_strict(&self, path: &str) -> bool {
        self.strict_globally || matches_any(&self.strict_routes, path)
    }

    /// Returns whether a path is reachable without authentication.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        matches_any(&self.public_routes, path)
    }
}

/// Incoming request as seen by the gate.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// Request path.
    pub path: &'a str,
    /// Raw query string without the leading `?`.
    pub query: Option<&'a str>,
    /// Stateless token presented by the caller.
    pub stamp: Option<&'a str>,
}

/// Authenticated caller, with its permissions when the gate needed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Validated session identity.
    pub subject: AuthenticatedSubject,
    /// Effective permissions at request time; `None` on routes that only
    /// need authentication, where the gate never consults the resolver.
    pub permissions: Option<PermissionSet>,
}

impl Principal {
    /// Returns the authenticated subject id.
    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject.subject_id()
    }
}

/// Stable denial reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// Missing, invalid or expired stateless token.
    Unauthenticated,
    /// Valid token whose session record was revoked or expired.
    SessionInvalidated,
    /// The session store could not be consulted.
    SessionValidationFailed,
    /// Authenticated but the route rule is not satisfied.
    InsufficientPermissions,
}

impl DenyReason {
    /// Returns the value used in error redirects and audit entries.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::SessionInvalidated => "session_invalidated",
            Self::SessionValidationFailed => "session_validation_failed",
            Self::InsufficientPermissions => "insufficient_permissions",
        }
    }
}

/// Denial with its redirect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDenial {
    /// Why the request was denied.
    pub reason: DenyReason,
    /// Where the caller should be sent.
    pub redirect_to: String,
    /// Caller, when it was authenticated.
    pub subject_id: Option<SubjectId>,
    /// Missing permissions, for internal diagnostics only.
    pub missing_permissions: Vec<PermissionId>,
}

/// Terminal gate decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed; `None` for public routes.
    Allow(Option<Principal>),
    /// Stop and redirect.
    Deny(GateDenial),
}

/// Single entry point invoked per incoming request.
#[derive(Clone)]
pub struct AuthorizationGate {
    sessions: SessionService,
    rules: Arc<RouteRuleTable>,
    permissions: Arc<dyn PermissionResolver>,
    policy: Arc<GatePolicy>,
}

impl AuthorizationGate {
    /// Creates a gate from its collaborators.
    #[must_use]
    pub fn new(
        sessions: SessionService,
        rules: Arc<RouteRuleTable>,
        permissions: Arc<dyn PermissionResolver>,
        policy: GatePolicy,
    ) -> Self {
        Self {
            sessions,
            rules,
            permissions,
            policy: Arc::new(policy),
        }
    }

    /// Returns the gate policy.
    #[must_use]
    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Decides whether a request may proceed.
    ///
    /// The permission resolver is consulted only when the matched rule
    /// requires permissions. Its errors are returned as-is; the caller must
    /// turn them into a denial.
    pub async fn evaluate(&self, request: GateRequest<'_>) -> AppResult<GateDecision> {
        if self.policy.is_public(request.path) {
            return Ok(GateDecision::Allow(None));
        }

        let Some(stamp) = request.stamp.filter(|stamp| !stamp.trim().is_empty()) else {
            return Ok(self.deny_unauthenticated(request));
        };

        let mode = ValidationMode {
            strict: self.policy.is_strict(request.path),
        };

        let subject = match self.sessions.validate(stamp, mode).await {
            Ok(subject) => subject,
            Err(SessionValidationError::Unauthenticated(rejection)) => {
                debug!(path = request.path, rejection = %rejection, "stateless token rejected");
                return Ok(self.deny_unauthenticated(request));
            }
            Err(SessionValidationError::SessionRevoked) => {
                return Ok(self.deny_with_error(DenyReason::SessionInvalidated, None, Vec::new()));
            }
            Err(SessionValidationError::ValidationUnavailable(_)) => {
                return Ok(self.deny_with_error(
                    DenyReason::SessionValidationFailed,
                    None,
                    Vec::new(),
                ));
            }
        };

        let Some(rule) = self
            .rules
            .match_route(request.path)
            .filter(|rule| !rule.required_permissions().is_empty())
        else {
            return Ok(GateDecision::Allow(Some(Principal {
                subject,
                permissions: None,
            })));
        };

        let permissions = self.permissions.permissions_for(subject.subject_id()).await?;
        match RouteRuleTable::authorize(rule, &permissions) {
            AuthorizationOutcome::Granted => Ok(GateDecision::Allow(Some(Principal {
                subject,
                permissions: Some(permissions),
            }))),
            AuthorizationOutcome::Denied { missing } => Ok(self.deny_with_error(
                DenyReason::InsufficientPermissions,
                Some(subject.subject_id()),
                missing,
            )),
        }
    }

    /// Returns the caller's effective permissions, resolving them when the
    /// gate allowed the request without doing so.
    pub async fn effective_permissions(&self, principal: &Principal) -> AppResult<PermissionSet> {
        match &principal.permissions {
            Some(permissions) => Ok(permissions.clone()),
            None => self.permissions.permissions_for(principal.subject_id()).await,
        }
    }

    fn deny_unauthenticated(&self, request: GateRequest<'_>) -> GateDecision {
        let destination = match request.query.filter(|query| !query.is_empty()) {
            Some(query) => format!("{}?{query}", request.path),
            None => request.path.to_owned(),
        };
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("callbackUrl", destination.as_str())
            .finish();

        GateDecision::Deny(GateDenial {
            reason: DenyReason::Unauthenticated,
            redirect_to: format!("{}?{query}", self.policy.sign_in_path),
            subject_id: None,
            missing_permissions: Vec::new(),
        })
    }

    fn deny_with_error(
        &self,
        reason: DenyReason,
        subject_id: Option<SubjectId>,
        missing_permissions: Vec<PermissionId>,
    ) -> GateDecision {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("error", reason.as_str());
        if self.policy.expose_missing_permissions && !missing_permissions.is_empty() {
            let missing = missing_permissions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            query.append_pair("missing", missing.as_str());
        }

        GateDecision::Deny(GateDenial {
            reason,
            redirect_to: format!("{}?{}", self.policy.error_path, query.finish()),
            subject_id,
            missing_permissions,
        })
    }
}
