mod audit;
mod auth;
mod security;

use serde::Serialize;
use ts_rs::TS;

pub use audit::{
    ActorActivityResponse, AuditLogEntryResponse, AuditLogPageResponse, AuditLogQuery,
    AuditStatsResponse,
};
pub use auth::{AuthLoginRequest, AuthLoginResponse, PrincipalResponse};
pub use security::{
    CreateRoleRequest, GrantPermissionRequest, MutationResponse, RoleResponse,
    SessionRevocationResponse, UpdateRoleRequest,
};

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Gate denial answered to JSON clients.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-denied-response.ts"
)]
pub struct AccessDeniedResponse {
    pub error: String,
    pub redirect_to: String,
}
