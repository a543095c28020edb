//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod event;
mod permission;
mod route;
mod session;

pub use event::{
    AccessDeniedPayload, AuthenticationPayload, Event, EventArea, EventKind, EventMetadata,
    EventPayload, RoleAssignmentPayload, RolePayload, RolePermissionPayload,
    SessionRevocationPayload,
};
pub use permission::{PermissionId, PermissionSet};
pub use route::{
    AuthorizationOutcome, PermissionMode, RoutePattern, RouteRule, RouteSegment, normalize_path,
    path_segments,
};
pub use session::{SessionRecord, SessionToken};
