use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;

use gatehouse_core::{AppError, AppResult, SubjectId};
use gatehouse_domain::{Event, PermissionId, PermissionSet, SessionRecord, SessionToken};
use uuid::Uuid;

use crate::{
    AccessAdminRepository, ActorActivity, AuditLogEntry, AuditLogFilter, AuditLogPage,
    AuditLogPagination, AuditLogRepository, AuditStats, CreateRoleInput, EventListener,
    IdentityRecord, IdentityRepository, NewAuditLogEntry, PasswordHasher, PermissionResolver,
    RoleRecord, SessionRepository, SessionTokenClaims, SessionTokenCodec, TokenRejection,
    UpdateRoleInput,
};

/// Signs tokens as `v1.<subject>.<sid>.<exp>.ok`; anything else fails to verify.
pub(crate) struct FakeTokenCodec;

impl FakeTokenCodec {
    pub(crate) fn stamp(subject_id: SubjectId, session_token: &str, expires_at: DateTime<Utc>) -> String {
        format!(
            "v1.{subject_id}.{session_token}.{}.ok",
            expires_at.timestamp()
        )
    }
}

impl SessionTokenCodec for FakeTokenCodec {
    fn issue(&self, claims: &SessionTokenClaims) -> AppResult<String> {
        Ok(Self::stamp(
            claims.subject_id,
            claims.session_token.as_str(),
            claims.expires_at,
        ))
    }

    fn verify(&self, stamp: &str) -> Result<SessionTokenClaims, TokenRejection> {
        let parts: Vec<&str> = stamp.split('.').collect();
        let [version, subject, session_token, expires_at, signature] = parts.as_slice() else {
            return Err(TokenRejection::Malformed);
        };
        if *version != "v1" {
            return Err(TokenRejection::Malformed);
        }
        if *signature != "ok" {
            return Err(TokenRejection::BadSignature);
        }

        let subject_id = subject
            .parse::<SubjectId>()
            .map_err(|_| TokenRejection::Malformed)?;
        let expires_at = expires_at
            .parse::<i64>()
            .ok()
            .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
            .ok_or(TokenRejection::Malformed)?;
        if expires_at <= Utc::now() {
            return Err(TokenRejection::Expired);
        }

        Ok(SessionTokenClaims {
            subject_id,
            session_token: (*session_token).to_owned(),
            issued_at: Utc::now(),
            expires_at,
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeSessionRepository {
    pub(crate) records: Mutex<HashMap<String, SessionRecord>>,
    pub(crate) fail_writes: AtomicBool,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) read_delay_ms: AtomicU64,
}

impl FakeSessionRepository {
    pub(crate) async fn insert(&self, record: SessionRecord) {
        self.records
            .lock()
            .await
            .insert(record.token.as_str().to_owned(), record);
    }
}

#[async_trait]
impl SessionRepository for FakeSessionRepository {
    async fn create(&self, record: SessionRecord) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("session store offline".to_owned()));
        }
        self.insert(record).await;
        Ok(())
    }

    async fn find_by_token(&self, token: &SessionToken) -> AppResult<Option<SessionRecord>> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("session store offline".to_owned()));
        }

        Ok(self.records.lock().await.get(token.as_str()).cloned())
    }

    async fn delete_by_token(&self, token: &SessionToken) -> AppResult<bool> {
        Ok(self.records.lock().await.remove(token.as_str()).is_some())
    }

    async fn delete_by_subject(&self, subject_id: SubjectId) -> AppResult<u64> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.subject_id != subject_id);
        Ok((before - records.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakePermissionResolver {
    pub(crate) grants: HashMap<SubjectId, PermissionSet>,
    pub(crate) fail: bool,
}

#[async_trait]
impl PermissionResolver for FakePermissionResolver {
    async fn permissions_for(&self, subject_id: SubjectId) -> AppResult<PermissionSet> {
        if self.fail {
            return Err(AppError::Internal("permission store offline".to_owned()));
        }
        Ok(self.grants.get(&subject_id).cloned().unwrap_or_default())
    }
}

/// Listener that remembers every event it sees, optionally failing or panicking.
pub(crate) struct RecordingListener {
    pub(crate) name: String,
    pub(crate) seen: Mutex<Vec<Event>>,
    pub(crate) fail: bool,
    pub(crate) panic: bool,
}

impl RecordingListener {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            seen: Mutex::new(Vec::new()),
            fail: false,
            panic: false,
        })
    }

    pub(crate) fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            seen: Mutex::new(Vec::new()),
            fail: true,
            panic: false,
        })
    }

    pub(crate) fn panicking(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            seen: Mutex::new(Vec::new()),
            fail: false,
            panic: true,
        })
    }

    pub(crate) async fn count(&self) -> usize {
        self.seen.lock().await.len()
    }
}

#[async_trait]
impl EventListener for RecordingListener {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    async fn handle(&self, event: &Event) -> AppResult<()> {
        self.seen.lock().await.push(event.clone());
        if self.panic {
            panic!("listener {} exploded", self.name);
        }
        if self.fail {
            return Err(AppError::Internal(format!("listener {} failed", self.name)));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditLogRepository {
    pub(crate) entries: Mutex<Vec<AuditLogEntry>>,
    pub(crate) fail_writes: AtomicBool,
}

impl FakeAuditLogRepository {
    async fn matching(&self, filter: &AuditLogFilter) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| filter.matches(&entry.entry))
            .cloned()
            .collect();
        entries.sort_by(|left, right| right.entry.occurred_at.cmp(&left.entry.occurred_at));
        entries
    }
}

#[async_trait]
impl AuditLogRepository for FakeAuditLogRepository {
    async fn insert(&self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("audit store offline".to_owned()));
        }
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            entry,
        };
        self.entries.lock().await.push(entry.clone());
        Ok(entry)
    }

    async fn query(
        &self,
        filter: &AuditLogFilter,
        pagination: AuditLogPagination,
    ) -> AppResult<AuditLogPage> {
        let entries = self.matching(filter).await;
        let total = entries.len() as u64;
        let page = entries
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .collect();
        Ok(AuditLogPage::new(page, total, pagination))
    }

    async fn aggregate(&self, filter: &AuditLogFilter, top_actors: usize) -> AppResult<AuditStats> {
        let mut stats = AuditStats::default();
        let mut actors: HashMap<SubjectId, u64> = HashMap::new();
        for entry in self.matching(filter).await {
            stats.total_count += 1;
            *stats.count_by_action.entry(entry.entry.action).or_default() += 1;
            *stats.count_by_module.entry(entry.entry.module).or_default() += 1;
            if let Some(actor_id) = entry.entry.actor_id {
                *actors.entry(actor_id).or_default() += 1;
            }
        }
        let mut actors: Vec<ActorActivity> = actors
            .into_iter()
            .map(|(actor_id, count)| ActorActivity { actor_id, count })
            .collect();
        actors.sort_by(|left, right| right.count.cmp(&left.count).then(left.actor_id.cmp(&right.actor_id)));
        actors.truncate(top_actors);
        stats.top_actors = actors;
        Ok(stats)
    }
}

/// Stores passwords as `hashed:<password>`.
#[derive(Default)]
pub(crate) struct FakePasswordHasher {
    pub(crate) timing_equalizations: AtomicUsize,
}

impl PasswordHasher for FakePasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("hashed:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("hashed:{password}"))
    }

    fn equalize_timing(&self, _password: &str) {
        self.timing_equalizations.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct FakeIdentityRepository {
    pub(crate) identities: Vec<(IdentityRecord, Option<String>)>,
}

impl FakeIdentityRepository {
    pub(crate) fn with_identity(login: &str, password: Option<&str>, is_active: bool) -> (Self, SubjectId) {
        let subject_id = SubjectId::new();
        let identity = IdentityRecord {
            subject_id,
            login: login.to_owned(),
            display_name: login.to_owned(),
            is_active,
        };
        let credential = password.map(|password| format!("hashed:{password}"));
        (
            Self {
                identities: vec![(identity, credential)],
            },
            subject_id,
        )
    }
}

#[async_trait]
impl IdentityRepository for FakeIdentityRepository {
    async fn find_by_subject_id(&self, subject_id: SubjectId) -> AppResult<Option<IdentityRecord>> {
        Ok(self
            .identities
            .iter()
            .find(|(identity, _)| identity.subject_id == subject_id)
            .map(|(identity, _)| identity.clone()))
    }

    async fn find_by_login(&self, login: &str) -> AppResult<Option<IdentityRecord>> {
        Ok(self
            .identities
            .iter()
            .find(|(identity, _)| identity.login.eq_ignore_ascii_case(login))
            .map(|(identity, _)| identity.clone()))
    }

    async fn find_credential(&self, subject_id: SubjectId) -> AppResult<Option<String>> {
        Ok(self
            .identities
            .iter()
            .find(|(identity, _)| identity.subject_id == subject_id)
            .and_then(|(_, credential)| credential.clone()))
    }
}

#[derive(Default)]
pub(crate) struct FakeAccessAdminRepository {
    pub(crate) roles: Mutex<Vec<RoleRecord>>,
    pub(crate) assignments: Mutex<HashSet<(SubjectId, Uuid)>>,
}

#[async_trait]
impl AccessAdminRepository for FakeAccessAdminRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleRecord>> {
        Ok(self.roles.lock().await.clone())
    }

    async fn find_role(&self, role_id: Uuid) -> AppResult<Option<RoleRecord>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| role.role_id == role_id)
            .cloned())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleRecord> {
        let mut roles = self.roles.lock().await;
        if roles.iter().any(|role| role.name == input.name) {
            return Err(AppError::Conflict(format!("role '{}' already exists", input.name)));
        }
        let role = RoleRecord {
            role_id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            permissions: input.permissions,
        };
        roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, role_id: Uuid, input: UpdateRoleInput) -> AppResult<bool> {
        let mut roles = self.roles.lock().await;
        if roles
            .iter()
            .any(|role| role.role_id != role_id && role.name == input.name)
        {
            return Err(AppError::Conflict(format!("role '{}' already exists", input.name)));
        }
        let Some(role) = roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Ok(false);
        };
        role.name = input.name;
        role.description = input.description;
        Ok(true)
    }

    async fn delete_role(&self, role_id: Uuid) -> AppResult<bool> {
        let mut roles = self.roles.lock().await;
        let before = roles.len();
        roles.retain(|role| role.role_id != role_id);
        self.assignments
            .lock()
            .await
            .retain(|(_, assigned)| *assigned != role_id);
        Ok(before != roles.len())
    }

    async fn grant_permission(&self, role_id: Uuid, permission: &PermissionId) -> AppResult<bool> {
        let mut roles = self.roles.lock().await;
        let Some(role) = roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        };
        if role.permissions.contains(permission) {
            return Ok(false);
        }
        role.permissions.push(permission.clone());
        Ok(true)
    }

    async fn revoke_permission(&self, role_id: Uuid, permission: &PermissionId) -> AppResult<bool> {
        let mut roles = self.roles.lock().await;
        let Some(role) = roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        };
        let before = role.permissions.len();
        role.permissions.retain(|granted| granted != permission);
        Ok(before != role.permissions.len())
    }

    async fn assign_role(&self, subject_id: SubjectId, role_id: Uuid) -> AppResult<bool> {
        Ok(self.assignments.lock().await.insert((subject_id, role_id)))
    }

    async fn unassign_role(&self, subject_id: SubjectId, role_id: Uuid) -> AppResult<bool> {
        Ok(self.assignments.lock().await.remove(&(subject_id, role_id)))
    }
}
