use gatehouse_application::{
    AccessAdminService, AuditRecorder, AuthenticationService, AuthorizationGate, EventBus,
};

/// Session cookie attributes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age_seconds: i64,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gate: AuthorizationGate,
    pub authentication_service: AuthenticationService,
    pub access_admin_service: AccessAdminService,
    pub audit_recorder: AuditRecorder,
    pub event_bus: EventBus,
    pub cookie: CookieSettings,
    pub frontend_url: String,
}
