//! Role and assignment administration.
//!
//! Route rules guard these operations at the gate; the service itself only
//! performs the mutation and publishes the matching event. No event is
//! published when a mutation changes nothing.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use gatehouse_core::{AppError, AppResult, NonEmptyString, SubjectId};
use gatehouse_domain::{
    EventArea, EventKind, EventPayload, PermissionId, RoleAssignmentPayload, RolePayload,
    RolePermissionPayload, SessionRevocationPayload,
};

use crate::{
    AccessAdminRepository, CreateRoleInput, EventBus, RequestContext, RoleRecord, SessionService,
    UpdateRoleInput,
};

/// Administrative service for roles, grants and sessions.
#[derive(Clone)]
pub struct AccessAdminService {
    repository: Arc<dyn AccessAdminRepository>,
    sessions: SessionService,
    events: EventBus,
}

impl AccessAdminService {
    /// Creates the service from its collaborators.
    #[must_use]
    pub fn new(
        repository: Arc<dyn AccessAdminRepository>,
        sessions: SessionService,
        events: EventBus,
    ) -> Self {
        Self {
            repository,
            sessions,
            events,
        }
    }

    /// Lists every role with its permissions.
    pub async fn list_roles(&self) -> AppResult<Vec<RoleRecord>> {
        self.repository.list_roles().await
    }

    /// Creates a role.
    pub async fn create_role(
        &self,
        actor: SubjectId,
        input: CreateRoleInput,
        context: &RequestContext,
    ) -> AppResult<RoleRecord> {
        let name = NonEmptyString::new(input.name.trim())?;
        let role = self
            .repository
            .create_role(CreateRoleInput {
                name: name.as_str().to_owned(),
                ..input
            })
            .await?;

        self.publish(
            EventKind::RoleCreated,
            EventPayload::Role(RolePayload {
                role_id: role.role_id,
                name: role.name.clone(),
                before: None,
                after: Some(snapshot(&role)?),
            }),
            actor,
            context,
        )
        .await?;

        Ok(role)
    }

    /// Replaces a role's name and description.
    ///
    /// Returns the role as stored afterwards; an unchanged role publishes
    /// nothing.
    pub async fn update_role(
        &self,
        actor: SubjectId,
        role_id: Uuid,
        input: UpdateRoleInput,
        context: &RequestContext,
    ) -> AppResult<RoleRecord> {
        let before = self.require_role(role_id).await?;
        let name = NonEmptyString::new(input.name.trim())?;
        let description = input
            .description
            .map(|description| description.trim().to_owned())
            .filter(|description| !description.is_empty());

        if before.name == name.as_str() && before.description == description {
            return Ok(before);
        }

        let updated = self
            .repository
            .update_role(
                role_id,
                UpdateRoleInput {
                    name: name.as_str().to_owned(),
                    description,
                },
            )
            .await?;
        if !updated {
            return Err(role_not_found(role_id));
        }
        let after = self.require_role(role_id).await?;

        self.publish(
            EventKind::RoleUpdated,
            EventPayload::Role(RolePayload {
                role_id,
                name: after.name.clone(),
                before: Some(snapshot(&before)?),
                after: Some(snapshot(&after)?),
            }),
            actor,
            context,
        )
        .await?;

        Ok(after)
    }

    /// Deletes a role together with its grants and assignments.
    pub async fn delete_role(
        &self,
        actor: SubjectId,
        role_id: Uuid,
        context: &RequestContext,
    ) -> AppResult<()> {
        let role = self.require_role(role_id).await?;
        if !self.repository.delete_role(role_id).await? {
            return Err(role_not_found(role_id));
        }

        self.publish(
            EventKind::RoleDeleted,
            EventPayload::Role(RolePayload {
                role_id,
                name: role.name.clone(),
                before: Some(snapshot(&role)?),
                after: None,
            }),
            actor,
            context,
        )
        .await
    }

    /// Grants a permission to a role; returns whether it was newly granted.
    pub async fn grant_permission(
        &self,
        actor: SubjectId,
        role_id: Uuid,
        permission: PermissionId,
        context: &RequestContext,
    ) -> AppResult<bool> {
        let role = self.require_role(role_id).await?;
        let changed = self.repository.grant_permission(role_id, &permission).await?;
        if changed {
            self.publish(
                EventKind::PermissionGranted,
                EventPayload::RolePermission(RolePermissionPayload {
                    role_id,
                    role_name: role.name,
                    permission,
                }),
                actor,
                context,
            )
            .await?;
        }

        Ok(changed)
    }

    /// Revokes a permission from a role; returns whether it was held.
    pub async fn revoke_permission(
        &self,
        actor: SubjectId,
        role_id: Uuid,
        permission: PermissionId,
        context: &RequestContext,
    ) -> AppResult<bool> {
        let role = self.require_role(role_id).await?;
        let changed = self
            .repository
            .revoke_permission(role_id, &permission)
            .await?;
        if changed {
            self.publish(
                EventKind::PermissionRevoked,
                EventPayload::RolePermission(RolePermissionPayload {
                    role_id,
                    role_name: role.name,
                    permission,
                }),
                actor,
                context,
            )
            .await?;
        }

        Ok(changed)
    }

    /// Assigns a role to a subject; returns whether it was newly assigned.
    pub async fn assign_role(
        &self,
        actor: SubjectId,
        subject_id: SubjectId,
        role_id: Uuid,
        context: &RequestContext,
    ) -> AppResult<bool> {
        let role = self.require_role(role_id).await?;
        let changed = self.repository.assign_role(subject_id, role_id).await?;
        if changed {
            self.publish(
                EventKind::RoleAssigned,
                EventPayload::RoleAssignment(RoleAssignmentPayload {
                    subject_id,
                    role_id,
                    role_name: role.name,
                }),
                actor,
                context,
            )
            .await?;
        }

        Ok(changed)
    }

    /// Removes a role from a subject; returns whether it was assigned.
    pub async fn unassign_role(
        &self,
        actor: SubjectId,
        subject_id: SubjectId,
        role_id: Uuid,
        context: &RequestContext,
    ) -> AppResult<bool> {
        let role = self.require_role(role_id).await?;
        let changed = self.repository.unassign_role(subject_id, role_id).await?;
        if changed {
            self.publish(
                EventKind::RoleUnassigned,
                EventPayload::RoleAssignment(RoleAssignmentPayload {
                    subject_id,
                    role_id,
                    role_name: role.name,
                }),
                actor,
                context,
            )
            .await?;
        }

        Ok(changed)
    }

    /// Deletes every session record of a subject, forcing re-authentication
    /// on strict routes immediately and everywhere once the tokens expire.
    pub async fn revoke_subject_sessions(
        &self,
        actor: SubjectId,
        subject_id: SubjectId,
        context: &RequestContext,
    ) -> AppResult<u64> {
        let revoked_sessions = self.sessions.terminate_subject_sessions(subject_id).await?;
        self.publish(
            EventKind::SessionsRevoked,
            EventPayload::SessionRevocation(SessionRevocationPayload {
                subject_id,
                revoked_sessions,
            }),
            actor,
            context,
        )
        .await?;

        Ok(revoked_sessions)
    }

    async fn require_role(&self, role_id: Uuid) -> AppResult<RoleRecord> {
        self.repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| role_not_found(role_id))
    }

    async fn publish(
        &self,
        kind: EventKind,
        payload: EventPayload,
        actor: SubjectId,
        context: &RequestContext,
    ) -> AppResult<()> {
        self.events
            .dispatch(
                kind,
                payload,
                Some(context.event_metadata(EventArea::Admin, Some(actor))),
            )
            .await
            .map(|_| ())
    }
}

fn role_not_found(role_id: Uuid) -> AppError {
    AppError::NotFound(format!("role '{role_id}' does not exist"))
}

fn snapshot(role: &RoleRecord) -> AppResult<Value> {
    serde_json::to_value(role)
        .map_err(|error| AppError::Internal(format!("failed to snapshot role: {error}")))
}
