//! CSRF (Cross-Site Request Forgery) protection
//!
//! Every state-changing route takes a `csrf_token` form field and checks
//! it against the token stored in the session. The token is generated
//! once per session when the client context is built, and templates embed
//! it in each form as a hidden field via `client.get_csrf_token()`.

use actix_web::{error, Error};
use rand::{distributions::Alphanumeric, Rng};

pub const CSRF_TOKEN_LENGTH: usize = 32;
const CSRF_SESSION_KEY: &str = "csrf_token";

/// Generate a new CSRF token
pub fn generate_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Get or create CSRF token for the current session
///
/// This is automatically called when ClientCtx is created from session,
/// ensuring every request has a CSRF token available.
pub fn get_or_create_csrf_token(session: &actix_session::Session) -> Result<String, Error> {
    match session.get::<String>(CSRF_SESSION_KEY) {
        Ok(Some(token)) => Ok(token),
        _ => {
            let token = generate_csrf_token();
            session
                .insert(CSRF_SESSION_KEY, token.clone())
                .map_err(|_| error::ErrorInternalServerError("Failed to store CSRF token"))?;
            Ok(token)
        }
    }
}

/// Validate a CSRF token from form data against the session's token.
/// Call this at the beginning of any handler that processes a
/// state-changing request.
pub fn validate_csrf_token(
    session: &actix_session::Session,
    provided_token: &str,
) -> Result<(), Error> {
    let expected_token = session
        .get::<String>(CSRF_SESSION_KEY)
        .map_err(|_| error::ErrorInternalServerError("Failed to get CSRF token"))?
        .ok_or_else(|| error::ErrorForbidden("CSRF token not found in session"))?;

    if provided_token != expected_token {
        log::warn!("CSRF token validation failed");
        return Err(error::ErrorForbidden("Invalid CSRF token"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_distinct_alphanumeric() {
        let one = generate_csrf_token();
        let two = generate_csrf_token();

        assert_eq!(one.len(), CSRF_TOKEN_LENGTH);
        assert_eq!(two.len(), CSRF_TOKEN_LENGTH);
        assert_ne!(one, two);
        assert!(one.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(two.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
