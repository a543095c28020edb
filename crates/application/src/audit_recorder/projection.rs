use serde_json::{Value, json};

use gatehouse_domain::{Event, EventKind, EventPayload};

use crate::NewAuditLogEntry;

/// Maps an event onto the audit row describing it.
#[must_use]
pub fn project_event(event: &Event) -> NewAuditLogEntry {
    let metadata = event.metadata();
    let projection = project_payload(event.kind(), event.payload());

    let mut details = json!({
        "event_id": event.id(),
        "area": metadata.area.as_str(),
    });
    if let (Value::Object(details), Value::Object(extra)) = (&mut details, projection.details) {
        details.extend(extra);
    }

    NewAuditLogEntry {
        actor_id: metadata.actor_id,
        action: event.kind().as_str().to_owned(),
        module: event.kind().module().to_owned(),
        entity_type: Some(projection.entity_type.to_owned()),
        entity_id: projection.entity_id,
        before_state: projection.before_state,
        after_state: projection.after_state,
        source_address: metadata.source_address.clone(),
        client_descriptor: metadata.client_descriptor.clone(),
        correlation_id: metadata.correlation_id,
        occurred_at: event.occurred_at(),
        metadata: details,
    }
}

struct Projection {
    entity_type: &'static str,
    entity_id: Option<String>,
    before_state: Option<Value>,
    after_state: Option<Value>,
    details: Value,
}

fn project_payload(kind: EventKind, payload: &EventPayload) -> Projection {
    match payload {
        EventPayload::Role(role) => Projection {
            entity_type: "role",
            entity_id: Some(role.role_id.to_string()),
            before_state: role.before.clone(),
            after_state: role.after.clone(),
            details: json!({ "role_name": role.name }),
        },
        EventPayload::RolePermission(grant) => {
            let state = json!({ "permission": grant.permission.to_string() });
            let (before_state, after_state) = match kind {
                EventKind::PermissionRevoked => (Some(state), None),
                _ => (None, Some(state)),
            };
            Projection {
                entity_type: "role",
                entity_id: Some(grant.role_id.to_string()),
                before_state,
                after_state,
                details: json!({ "role_name": grant.role_name }),
            }
        }
        EventPayload::RoleAssignment(assignment) => {
            let state = json!({
                "role_id": assignment.role_id,
                "role_name": assignment.role_name,
            });
            let (before_state, after_state) = match kind {
                EventKind::RoleUnassigned => (Some(state), None),
                _ => (None, Some(state)),
            };
            Projection {
                entity_type: "subject",
                entity_id: Some(assignment.subject_id.to_string()),
                before_state,
                after_state,
                details: json!({}),
            }
        }
        EventPayload::Authentication(auth) => Projection {
            entity_type: "subject",
            entity_id: auth.subject_id.map(|subject_id| subject_id.to_string()),
            before_state: None,
            after_state: None,
            details: json!({ "login": auth.login, "reason": auth.reason }),
        },
        EventPayload::SessionRevocation(revocation) => Projection {
            entity_type: "subject",
            entity_id: Some(revocation.subject_id.to_string()),
            before_state: None,
            after_state: None,
            details: json!({ "revoked_sessions": revocation.revoked_sessions }),
        },
        EventPayload::AccessDenied(denied) => Projection {
            entity_type: "route",
            entity_id: Some(denied.path.clone()),
            before_state: None,
            after_state: None,
            details: json!({
                "reason": denied.reason,
                "subject_id": denied.subject_id,
                "missing_permissions": denied
                    .missing_permissions
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            }),
        },
    }
}
