use std::sync::Arc;
use std::sync::atomic::Ordering;

use gatehouse_core::{AppError, AuthenticatedSubject};
use gatehouse_domain::{EventKind, EventPayload};

use crate::test_support::{
    FakeIdentityRepository, FakePasswordHasher, FakeSessionRepository, FakeTokenCodec,
    RecordingListener,
};
use crate::{EventBus, RequestContext, SessionConfig, SessionService, ValidationMode};

use super::AuthenticationService;

struct Fixture {
    service: AuthenticationService,
    sessions: SessionService,
    repository: Arc<FakeSessionRepository>,
    hasher: Arc<FakePasswordHasher>,
    events: Arc<RecordingListener>,
}

fn fixture(identities: FakeIdentityRepository) -> Fixture {
    let repository = Arc::new(FakeSessionRepository::default());
    let sessions = SessionService::new(
        repository.clone(),
        Arc::new(FakeTokenCodec),
        SessionConfig::default(),
    );
    let hasher = Arc::new(FakePasswordHasher::default());
    let bus = EventBus::new();
    let events = RecordingListener::new("auth");
    bus.subscribe_all(events.clone());

    Fixture {
        service: AuthenticationService::new(
            Arc::new(identities),
            hasher.clone(),
            sessions.clone(),
            bus,
        ),
        sessions,
        repository,
        hasher,
        events,
    }
}

async fn kinds(listener: &RecordingListener) -> Vec<EventKind> {
    listener
        .seen
        .lock()
        .await
        .iter()
        .map(|event| event.kind())
        .collect()
}

#[tokio::test]
async fn valid_credentials_open_a_strictly_valid_session() {
    let (identities, subject_id) =
        FakeIdentityRepository::with_identity("alice@example.com", Some("secret"), true);
    let fixture = fixture(identities);

    let signed_in = fixture
        .service
        .login(" Alice@Example.com ", "secret", &RequestContext::default())
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(signed_in.identity.subject_id, subject_id);
    assert!(signed_in.session.revocable);
    let validated = fixture
        .sessions
        .validate(signed_in.session.stamp.as_str(), ValidationMode::STRICT)
        .await;
    assert!(matches!(validated, Ok(subject) if subject.subject_id() == subject_id));
    assert_eq!(kinds(&fixture.events).await, vec![EventKind::UserLoggedIn]);
}

#[tokio::test]
async fn wrong_password_and_unknown_login_fail_identically() {
    let (identities, _) =
        FakeIdentityRepository::with_identity("alice@example.com", Some("secret"), true);
    let fixture = fixture(identities);

    let wrong = fixture
        .service
        .login("alice@example.com", "guess", &RequestContext::default())
        .await;
    let unknown = fixture
        .service
        .login("mallory@example.com", "guess", &RequestContext::default())
        .await;

    let (Err(AppError::Unauthorized(first)), Err(AppError::Unauthorized(second))) = (wrong, unknown)
    else {
        panic!("both logins should be rejected");
    };
    assert_eq!(first, second);
    assert_eq!(
        kinds(&fixture.events).await,
        vec![EventKind::LoginFailed, EventKind::LoginFailed]
    );
    // Only the unknown login lacks a stored hash to verify against.
    assert_eq!(fixture.hasher.timing_equalizations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn inactive_identity_cannot_sign_in() {
    let (identities, _) =
        FakeIdentityRepository::with_identity("bob@example.com", Some("secret"), false);
    let fixture = fixture(identities);

    let result = fixture
        .service
        .login("bob@example.com", "secret", &RequestContext::default())
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
    assert_eq!(fixture.hasher.timing_equalizations.load(Ordering::SeqCst), 1);

    let seen = fixture.events.seen.lock().await;
    let reason = seen.first().and_then(|event| match event.payload() {
        EventPayload::Authentication(payload) => payload.reason.clone(),
        _ => None,
    });
    assert_eq!(reason.as_deref(), Some("inactive"));
}

#[tokio::test]
async fn unpersisted_session_is_flagged_in_the_login_event() {
    let (identities, _) =
        FakeIdentityRepository::with_identity("alice@example.com", Some("secret"), true);
    let fixture = fixture(identities);
    fixture.repository.fail_writes.store(true, Ordering::SeqCst);

    let signed_in = fixture
        .service
        .login("alice@example.com", "secret", &RequestContext::default())
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert!(!signed_in.session.revocable);

    let seen = fixture.events.seen.lock().await;
    let reason = seen.first().and_then(|event| match event.payload() {
        EventPayload::Authentication(payload) => payload.reason.clone(),
        _ => None,
    });
    assert_eq!(reason.as_deref(), Some("session_not_revocable"));
}

#[tokio::test]
async fn logout_revokes_the_session_record() {
    let (identities, subject_id) =
        FakeIdentityRepository::with_identity("alice@example.com", Some("secret"), true);
    let fixture = fixture(identities);
    let signed_in = fixture
        .service
        .login("alice@example.com", "secret", &RequestContext::default())
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    let subject = AuthenticatedSubject::new(subject_id, signed_in.session.token.as_str());
    let deleted = fixture
        .service
        .logout(&subject, &RequestContext::default())
        .await;
    assert!(matches!(deleted, Ok(true)));

    let validated = fixture
        .sessions
        .validate(signed_in.session.stamp.as_str(), ValidationMode::STRICT)
        .await;
    assert!(validated.is_err());
    assert_eq!(
        kinds(&fixture.events).await,
        vec![EventKind::UserLoggedIn, EventKind::UserLoggedOut]
    );
}

#[tokio::test]
async fn current_identity_reports_missing_subjects() {
    let (identities, subject_id) =
        FakeIdentityRepository::with_identity("alice@example.com", Some("secret"), true);
    let fixture = fixture(identities);

    assert!(fixture.service.current_identity(subject_id).await.is_ok());
    assert!(matches!(
        fixture
            .service
            .current_identity(gatehouse_core::SubjectId::new())
            .await,
        Err(AppError::NotFound(_))
    ));
}
