use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};

use warbler_types::session::SessionData;

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "warbler_session";

/// Decode the session from the encrypted cookie, if present and intact.
pub fn read_session(jar: &PrivateCookieJar) -> Option<SessionData> {
    let cookie = jar.get(SESSION_COOKIE)?;
    serde_json::from_str(cookie.value()).ok()
}

pub fn session_cookie(session: &SessionData) -> Result<Cookie<'static>, ApiError> {
    let value = serde_json::to_string(session).map_err(|e| anyhow::anyhow!(e))?;

    Ok(Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build())
}

/// Reject requests without a valid session before the handler runs; on
/// success the decoded `SessionData` is available as an extension.
pub async fn require_session(
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = read_session(&jar).ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
