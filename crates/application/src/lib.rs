//! Application services and ports.

#![forbid(unsafe_code)]

mod access_admin_service;
mod access_ports;
mod audit_ports;
mod audit_recorder;
mod authentication_service;
mod authorization_gate;
mod event_bus;
mod request_context;
mod route_rules;
mod session_ports;
mod session_service;

#[cfg(test)]
mod test_support;

pub use access_admin_service::AccessAdminService;
pub use access_ports::{
    AccessAdminRepository, CreateRoleInput, IdentityRecord, IdentityRepository, PasswordHasher,
    PermissionResolver, RoleRecord, UpdateRoleInput,
};
pub use audit_ports::{
    ActorActivity, AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogPagination,
    AuditLogRepository, AuditStats, DEFAULT_AUDIT_PAGE_SIZE, MAX_AUDIT_OFFSET,
    MAX_AUDIT_PAGE_SIZE, NewAuditLogEntry,
};
pub use audit_recorder::{AuditRecorder, TOP_ACTOR_LIMIT, project_event};
pub use authentication_service::{AuthenticationService, SignedIn};
pub use authorization_gate::{
    AuthorizationGate, DenyReason, GateDecision, GateDenial, GatePolicy, GateRequest, Principal,
};
pub use event_bus::{
    DispatchSummary, EventBus, EventListener, SubscriptionHandle, TracingEventListener,
};
pub use request_context::RequestContext;
pub use route_rules::{RouteRuleTable, matches_any};
pub use session_ports::{
    SessionRepository, SessionTokenClaims, SessionTokenCodec, TokenRejection,
};
pub use session_service::{
    IssuedSession, SessionConfig, SessionService, SessionValidationError, ValidationMode,
};
