use gatehouse_application::{IdentityRecord, SignedIn};
use gatehouse_domain::PermissionSet;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for password login.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/auth-login-request.ts"
)]
pub struct AuthLoginRequest {
    pub login: String,
    pub password: String,
}

/// Successful login. `token` is the bearer form of the session cookie.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/auth-login-response.ts"
)]
pub struct AuthLoginResponse {
    pub subject_id: String,
    pub display_name: String,
    pub token: String,
    pub expires_at: String,
    pub revocable: bool,
}

impl From<&SignedIn> for AuthLoginResponse {
    fn from(value: &SignedIn) -> Self {
        Self {
            subject_id: value.identity.subject_id.to_string(),
            display_name: value.identity.display_name.clone(),
            token: value.session.stamp.clone(),
            expires_at: value.session.expires_at.to_rfc3339(),
            revocable: value.session.revocable,
        }
    }
}

/// Authenticated caller with its effective permissions.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/principal-response.ts"
)]
pub struct PrincipalResponse {
    pub subject_id: String,
    pub login: String,
    pub display_name: String,
    pub permissions: Vec<String>,
}

impl PrincipalResponse {
    pub fn new(identity: IdentityRecord, permissions: &PermissionSet) -> Self {
        Self {
            subject_id: identity.subject_id.to_string(),
            login: identity.login,
            display_name: identity.display_name,
            permissions: permissions
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}
