use chrono::{DateTime, Utc};
use gatehouse_core::{AppError, CorrelationId, SubjectId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::PermissionId;

/// Domain happenings published on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A role was created.
    RoleCreated,
    /// A role's name or description changed.
    RoleUpdated,
    /// A role was deleted.
    RoleDeleted,
    /// A permission was granted to a role.
    PermissionGranted,
    /// A permission was revoked from a role.
    PermissionRevoked,
    /// A role was assigned to a subject.
    RoleAssigned,
    /// A role was removed from a subject.
    RoleUnassigned,
    /// A subject authenticated and received a session.
    UserLoggedIn,
    /// A login attempt was rejected.
    LoginFailed,
    /// A subject ended its own session.
    UserLoggedOut,
    /// An administrator revoked a subject's sessions.
    SessionsRevoked,
    /// The authorization gate denied a request.
    AccessDenied,
}

impl EventKind {
    /// Returns a stable storage value, used as the audit action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "role.created",
            Self::RoleUpdated => "role.updated",
            Self::RoleDeleted => "role.deleted",
            Self::PermissionGranted => "permission.granted",
            Self::PermissionRevoked => "permission.revoked",
            Self::RoleAssigned => "role.assigned",
            Self::RoleUnassigned => "role.unassigned",
            Self::UserLoggedIn => "auth.login",
            Self::LoginFailed => "auth.login_failed",
            Self::UserLoggedOut => "auth.logout",
            Self::SessionsRevoked => "session.revoked",
            Self::AccessDenied => "access.denied",
        }
    }

    /// Returns the application module the event belongs to.
    #[must_use]
    pub fn module(&self) -> &'static str {
        match self {
            Self::RoleCreated | Self::RoleUpdated | Self::RoleDeleted => "role",
            Self::PermissionGranted | Self::PermissionRevoked => "permission",
            Self::RoleAssigned | Self::RoleUnassigned => "assignment",
            Self::UserLoggedIn | Self::LoginFailed | Self::UserLoggedOut => "auth",
            Self::SessionsRevoked => "session",
            Self::AccessDenied => "access",
        }
    }

    /// Returns all known kinds.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[EventKind] = &[
            EventKind::RoleCreated,
            EventKind::RoleUpdated,
            EventKind::RoleDeleted,
            EventKind::PermissionGranted,
            EventKind::PermissionRevoked,
            EventKind::RoleAssigned,
            EventKind::RoleUnassigned,
            EventKind::UserLoggedIn,
            EventKind::LoginFailed,
            EventKind::UserLoggedOut,
            EventKind::SessionsRevoked,
            EventKind::AccessDenied,
        ];

        ALL
    }

    /// Returns whether the payload shape belongs to this kind.
    #[must_use]
    pub fn accepts(&self, payload: &EventPayload) -> bool {
        matches!(
            (self, payload),
            (
                Self::RoleCreated | Self::RoleUpdated | Self::RoleDeleted,
                EventPayload::Role(_)
            ) | (
                Self::PermissionGranted | Self::PermissionRevoked,
                EventPayload::RolePermission(_)
            ) | (
                Self::RoleAssigned | Self::RoleUnassigned,
                EventPayload::RoleAssignment(_)
            ) | (
                Self::UserLoggedIn | Self::LoginFailed | Self::UserLoggedOut,
                EventPayload::Authentication(_)
            ) | (Self::SessionsRevoked, EventPayload::SessionRevocation(_))
                | (Self::AccessDenied, EventPayload::AccessDenied(_))
        )
    }
}

/// Application surface that raised an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventArea {
    /// Administrative console.
    #[default]
    Admin,
    /// Sign-in and sign-out flows.
    Auth,
    /// Programmatic API callers.
    Api,
    /// Background processes.
    System,
}

impl EventArea {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Auth => "auth",
            Self::Api => "api",
            Self::System => "system",
        }
    }
}

/// Role lifecycle payload with optional state snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePayload {
    /// Role identifier.
    pub role_id: Uuid,
    /// Role name at the time of the event.
    pub name: String,
    /// Snapshot before the mutation.
    pub before: Option<Value>,
    /// Snapshot after the mutation.
    pub after: Option<Value>,
}

/// Permission grant or revocation on a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePermissionPayload {
    /// Role identifier.
    pub role_id: Uuid,
    /// Role name.
    pub role_name: String,
    /// Permission granted or revoked.
    pub permission: PermissionId,
}

/// Role assignment or unassignment on a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignmentPayload {
    /// Subject receiving or losing the role.
    pub subject_id: SubjectId,
    /// Role identifier.
    pub role_id: Uuid,
    /// Role name.
    pub role_name: String,
}

/// Login and logout outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationPayload {
    /// Authenticated subject, when known.
    pub subject_id: Option<SubjectId>,
    /// Login name presented by the caller.
    pub login: Option<String>,
    /// Failure or degradation reason.
    pub reason: Option<String>,
}

/// Administrative session revocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRevocationPayload {
    /// Subject whose sessions were revoked.
    pub subject_id: SubjectId,
    /// Number of session records deleted.
    pub revoked_sessions: u64,
}

/// Authorization gate denial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDeniedPayload {
    /// Caller, when authenticated.
    pub subject_id: Option<SubjectId>,
    /// Requested path.
    pub path: String,
    /// Stable denial reason.
    pub reason: String,
    /// Permissions the caller lacked.
    pub missing_permissions: Vec<PermissionId>,
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Role lifecycle.
    Role(RolePayload),
    /// Role permission change.
    RolePermission(RolePermissionPayload),
    /// Subject role change.
    RoleAssignment(RoleAssignmentPayload),
    /// Authentication flow.
    Authentication(AuthenticationPayload),
    /// Session revocation.
    SessionRevocation(SessionRevocationPayload),
    /// Access denial.
    AccessDenied(AccessDeniedPayload),
}

/// Caller-supplied event context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Occurrence time; defaults to dispatch time.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Request correlation identifier.
    pub correlation_id: CorrelationId,
    /// Acting subject, `None` for system actions.
    pub actor_id: Option<SubjectId>,
    /// Surface that raised the event.
    pub area: EventArea,
    /// Caller address, when the event stems from a request.
    pub source_address: Option<String>,
    /// Caller user-agent, when the event stems from a request.
    pub client_descriptor: Option<String>,
}

impl EventMetadata {
    /// Creates metadata for an area with a fresh correlation id.
    #[must_use]
    pub fn new(area: EventArea) -> Self {
        Self {
            area,
            ..Self::default()
        }
    }

    /// Sets the acting subject.
    #[must_use]
    pub fn with_actor(mut self, actor_id: SubjectId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Reuses an existing correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Attaches request forensics.
    #[must_use]
    pub fn with_request_context(
        mut self,
        source_address: Option<String>,
        client_descriptor: Option<String>,
    ) -> Self {
        self.source_address = source_address;
        self.client_descriptor = client_descriptor;
        self
    }

    /// Pins the occurrence time.
    #[must_use]
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

/// Immutable fact dispatched to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    id: Uuid,
    kind: EventKind,
    payload: EventPayload,
    metadata: EventMetadata,
    occurred_at: DateTime<Utc>,
}

impl Event {
    /// Builds an event, defaulting the occurrence time to `dispatched_at`.
    pub fn new(
        kind: EventKind,
        payload: EventPayload,
        metadata: EventMetadata,
        dispatched_at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        if !kind.accepts(&payload) {
            return Err(AppError::Validation(format!(
                "payload does not match event kind '{}'",
                kind.as_str()
            )));
        }

        let occurred_at = metadata.occurred_at.unwrap_or(dispatched_at);
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            metadata,
            occurred_at,
        })
    }

    /// Returns the event identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the kind-specific payload.
    #[must_use]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Returns the caller-supplied metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Returns the resolved occurrence time.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
