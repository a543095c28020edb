use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use gatehouse_core::{AppResult, SubjectId};
use gatehouse_domain::{PermissionId, PermissionSet};

/// Port resolving a subject's effective permissions from its role assignments.
#[async_trait]
pub trait PermissionResolver: Send + Sync {
    /// Returns the effective permission set of a subject.
    async fn permissions_for(&self, subject_id: SubjectId) -> AppResult<PermissionSet>;
}

/// Identity projection used by primary authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Stable principal identifier.
    pub subject_id: SubjectId,
    /// Login name (email).
    pub login: String,
    /// Display name.
    pub display_name: String,
    /// Disabled identities cannot sign in.
    pub is_active: bool,
}

/// Repository port for identities and their credentials.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Finds an identity by its subject identifier.
    async fn find_by_subject_id(&self, subject_id: SubjectId) -> AppResult<Option<IdentityRecord>>;

    /// Finds an identity by login name (case-insensitive).
    async fn find_by_login(&self, login: &str) -> AppResult<Option<IdentityRecord>>;

    /// Returns the stored password hash of a subject, if any.
    async fn find_credential(&self, subject_id: SubjectId) -> AppResult<Option<String>>;
}

/// Port for password hashing operations.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;

    /// Spends the cost of one verification without a stored hash, so a
    /// rejected login takes as long as a wrong password.
    fn equalize_timing(&self, password: &str);
}

/// Role with its granted permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    /// Stable role identifier.
    pub role_id: Uuid,
    /// Unique role name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Granted permissions.
    pub permissions: Vec<PermissionId>,
}

/// Input for role creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial permissions.
    pub permissions: Vec<PermissionId>,
}

/// Replacement name and description for an existing role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// New unique role name.
    pub name: String,
    /// New description; `None` clears it.
    pub description: Option<String>,
}

/// Repository port for role and assignment administration.
#[async_trait]
pub trait AccessAdminRepository: Send + Sync {
    /// Lists all roles with their permissions.
    async fn list_roles(&self) -> AppResult<Vec<RoleRecord>>;

    /// Finds one role.
    async fn find_role(&self, role_id: Uuid) -> AppResult<Option<RoleRecord>>;

    /// Creates a role and attaches its permissions.
    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleRecord>;

    /// Renames or re-describes a role; returns whether it existed.
    async fn update_role(&self, role_id: Uuid, input: UpdateRoleInput) -> AppResult<bool>;

    /// Deletes a role; returns whether it existed.
    async fn delete_role(&self, role_id: Uuid) -> AppResult<bool>;

    /// Grants a permission to a role; returns whether anything changed.
    async fn grant_permission(&self, role_id: Uuid, permission: &PermissionId) -> AppResult<bool>;

    /// Revokes a permission from a role; returns whether anything changed.
    async fn revoke_permission(&self, role_id: Uuid, permission: &PermissionId)
    -> AppResult<bool>;

    /// Assigns a role to a subject; returns whether anything changed.
    async fn assign_role(&self, subject_id: SubjectId, role_id: Uuid) -> AppResult<bool>;

    /// Removes a role from a subject; returns whether anything changed.
    async fn unassign_role(&self, subject_id: SubjectId, role_id: Uuid) -> AppResult<bool>;
}
