use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State};
use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
use tracing::info;

use warbler_types::api::{CreateAccountRequest, LogInRequest, UserResponse};
use warbler_types::envelope::{Empty, Envelope};
use warbler_types::session::SessionData;

use crate::convert;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::{SESSION_COOKIE, session_cookie};
use crate::state::{AppState, blocking};

pub const MIN_PASSWORD_LEN: usize = 4;

pub async fn create_account(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateAccountRequest>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::invalid("name is required"));
    }
    validate_email(&email)?;
    validate_password(&req.password)?;

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password).map_err(ApiError::from)).await?;

    let user_id = state
        .db(move |db| db.create_user(&name, &email, &password_hash))
        .await?
        .ok_or(ApiError::EmailTaken)?;

    info!("Account {} created", user_id);
    Ok(Json(Envelope::ok(Empty {})))
}

pub async fn log_in(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    JsonBody(req): JsonBody<LogInRequest>,
) -> Result<(PrivateCookieJar, Json<Envelope<UserResponse>>), ApiError> {
    let email = req.email.trim().to_string();
    let user = state
        .db(move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let password = req.password;
    let stored = user.password.clone();
    let matches = blocking(move || verify_password(&password, &stored).map_err(ApiError::from)).await?;
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    let jar = jar.add(session_cookie(&SessionData::new(user.id))?);
    info!("User {} logged in", user.id);

    Ok((
        jar,
        Json(Envelope::ok(UserResponse {
            user: convert::user_profile(user),
        })),
    ))
}

pub async fn log_out(jar: PrivateCookieJar) -> (PrivateCookieJar, Json<Envelope<Empty>>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(Envelope::ok(Empty {})))
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ApiError::invalid("email is not valid")),
    }
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored PHC hash string.
pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_error_not_a_mismatch() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn email_and_password_rules() {
        assert!(validate_email("a@b").is_ok());
        assert!(validate_email("ab").is_err());
        assert!(validate_email("@b").is_err());
        assert!(validate_email("a@").is_err());

        assert!(validate_password("abcd").is_ok());
        assert!(validate_password("abc").is_err());
    }
}
