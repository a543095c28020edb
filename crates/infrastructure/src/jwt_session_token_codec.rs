//! HS256 JWT implementation of the stateless session token.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gatehouse_application::{SessionTokenClaims, SessionTokenCodec, TokenRejection};
use gatehouse_core::{AppError, AppResult, SubjectId};

/// Minimum secret length accepted for HMAC signing.
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: Uuid,
    sid: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct JwtSessionTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtSessionTokenCodec {
    /// Creates a codec; the secret must be at least `MIN_SECRET_LENGTH` bytes.
    pub fn new(secret: &str, issuer: impl Into<String>) -> AppResult<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::Validation(format!(
                "session token secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;
        validation
    }
}

impl SessionTokenCodec for JwtSessionTokenCodec {
    fn issue(&self, claims: &SessionTokenClaims) -> AppResult<String> {
        let claims = SessionClaims {
            sub: claims.subject_id.as_uuid(),
            sid: claims.session_token.clone(),
            iss: self.issuer.clone(),
            iat: claims.issued_at.timestamp(),
            exp: claims.expires_at.timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign session token: {error}")))
    }

    fn verify(&self, stamp: &str) -> Result<SessionTokenClaims, TokenRejection> {
        let data = jsonwebtoken::decode::<SessionClaims>(stamp, &self.decoding_key, &self.validation())
            .map_err(|error| match error.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAlgorithm => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            })?;
        let claims = data.claims;

        let expires_at = timestamp(claims.exp)?;
        if expires_at <= Utc::now() {
            return Err(TokenRejection::Expired);
        }
        if claims.sid.is_empty() {
            return Err(TokenRejection::Malformed);
        }

        Ok(SessionTokenClaims {
            subject_id: SubjectId::from_uuid(claims.sub),
            session_token: claims.sid,
            issued_at: timestamp(claims.iat)?,
            expires_at,
        })
    }
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, TokenRejection> {
    DateTime::from_timestamp(seconds, 0).ok_or(TokenRejection::Malformed)
}
