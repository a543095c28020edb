use gatehouse_core::{AppError, AppResult};
use gatehouse_domain::SessionToken;

/// Generates a cryptographically random, hex encoded session token.
pub(super) fn generate_session_token() -> AppResult<SessionToken> {
    use std::fmt::Write;

    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to generate session token: {error}")))?;

    let raw_token = bytes
        .iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        });

    SessionToken::new(raw_token)
}
