use std::sync::Arc;

use tracing::info;

use gatehouse_core::{AppError, AppResult, AuthenticatedSubject, SubjectId};
use gatehouse_domain::{AuthenticationPayload, EventArea, EventKind, EventPayload, SessionToken};

use crate::{
    EventBus, IdentityRecord, IdentityRepository, IssuedSession, PasswordHasher, RequestContext,
    SessionService,
};

/// Successful sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    /// Authenticated identity.
    pub identity: IdentityRecord,
    /// Issued session and its stateless token.
    pub session: IssuedSession,
}

/// Password sign-in and sign-out.
#[derive(Clone)]
pub struct AuthenticationService {
    identities: Arc<dyn IdentityRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    sessions: SessionService,
    events: EventBus,
}

impl AuthenticationService {
    /// Creates the service from its collaborators.
    #[must_use]
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        sessions: SessionService,
        events: EventBus,
    ) -> Self {
        Self {
            identities,
            password_hasher,
            sessions,
            events,
        }
    }

    /// Verifies credentials and opens a session.
    ///
    /// Every failure yields the same `Unauthorized` error so callers cannot
    /// tell unknown logins from wrong passwords.
    pub async fn login(
        &self,
        login: &str,
        password: &str,
        context: &RequestContext,
    ) -> AppResult<SignedIn> {
        let login = login.trim();
        let Some(identity) = self.identities.find_by_login(login).await? else {
            self.password_hasher.equalize_timing(password);
            return self.reject(login, None, "unknown_login", context).await;
        };

        if !identity.is_active {
            self.password_hasher.equalize_timing(password);
            return self
                .reject(login, Some(identity.subject_id), "inactive", context)
                .await;
        }

        let Some(stored_hash) = self.identities.find_credential(identity.subject_id).await? else {
            self.password_hasher.equalize_timing(password);
            return self
                .reject(login, Some(identity.subject_id), "no_credential", context)
                .await;
        };

        if !self.password_hasher.verify_password(password, &stored_hash)? {
            return self
                .reject(login, Some(identity.subject_id), "invalid_password", context)
                .await;
        }

        let session = self.sessions.create_session(identity.subject_id, context).await?;
        let reason = (!session.revocable).then(|| "session_not_revocable".to_owned());
        self.events
            .dispatch(
                EventKind::UserLoggedIn,
                EventPayload::Authentication(AuthenticationPayload {
                    subject_id: Some(identity.subject_id),
                    login: Some(identity.login.clone()),
                    reason,
                }),
                Some(context.event_metadata(EventArea::Auth, Some(identity.subject_id))),
            )
            .await?;

        info!(subject_id = %identity.subject_id, revocable = session.revocable, "subject signed in");
        Ok(SignedIn { identity, session })
    }

    /// Ends the caller's session; returns whether a record was deleted.
    pub async fn logout(
        &self,
        subject: &AuthenticatedSubject,
        context: &RequestContext,
    ) -> AppResult<bool> {
        let token = SessionToken::new(subject.session_token())?;
        let deleted = self.sessions.terminate_session(&token).await?;

        self.events
            .dispatch(
                EventKind::UserLoggedOut,
                EventPayload::Authentication(AuthenticationPayload {
                    subject_id: Some(subject.subject_id()),
                    login: None,
                    reason: None,
                }),
                Some(context.event_metadata(EventArea::Auth, Some(subject.subject_id()))),
            )
            .await?;

        Ok(deleted)
    }

    /// Returns the identity behind an authenticated subject.
    pub async fn current_identity(&self, subject_id: SubjectId) -> AppResult<IdentityRecord> {
        self.identities
            .find_by_subject_id(subject_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subject '{subject_id}' does not exist")))
    }

    async fn reject<T>(
        &self,
        login: &str,
        subject_id: Option<SubjectId>,
        reason: &str,
        context: &RequestContext,
    ) -> AppResult<T> {
        self.events
            .dispatch(
                EventKind::LoginFailed,
                EventPayload::Authentication(AuthenticationPayload {
                    subject_id,
                    login: Some(login.to_owned()),
                    reason: Some(reason.to_owned()),
                }),
                Some(context.event_metadata(EventArea::Auth, None)),
            )
            .await?;

        Err(AppError::Unauthorized("invalid credentials".to_owned()))
    }
}

#[cfg(test)]
mod tests;
