//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_credential_hasher;
mod cached_permission_resolver;
mod in_memory_audit_log_repository;
mod in_memory_session_repository;
mod jwt_session_token_codec;
mod postgres_access_admin_repository;
mod postgres_audit_log_repository;
mod postgres_identity_repository;
mod postgres_permission_resolver;
mod postgres_session_repository;

#[cfg(test)]
mod postgres_test_support;

pub use argon2_credential_hasher::{Argon2CredentialHasher, HashCost};
pub use cached_permission_resolver::{CachedPermissionResolver, PermissionCacheInvalidator};
pub use in_memory_audit_log_repository::InMemoryAuditLogRepository;
pub use in_memory_session_repository::InMemorySessionRepository;
pub use jwt_session_token_codec::{JwtSessionTokenCodec, MIN_SECRET_LENGTH};
pub use postgres_access_admin_repository::PostgresAccessAdminRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_identity_repository::PostgresIdentityRepository;
pub use postgres_permission_resolver::PostgresPermissionResolver;
pub use postgres_session_repository::PostgresSessionRepository;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
