//! Route guard: decides where a view should go given the session state.

use warbler_types::api::UserResponse;

use crate::error::ClientError;

pub const LOG_IN_ROUTE: &str = "/log-in";
pub const HOME_ROUTE: &str = "/";

const PUBLIC_ROUTES: &[&str] = &[LOG_IN_ROUTE, "/create-account"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The `me` request has not come back yet.
    Loading,
    LoggedIn,
    LoggedOut,
}

impl SessionStatus {
    /// Anything other than a successful `me` counts as logged out.
    pub fn from_me(me: &Result<UserResponse, ClientError>) -> Self {
        match me {
            Ok(_) => SessionStatus::LoggedIn,
            Err(_) => SessionStatus::LoggedOut,
        }
    }
}

pub fn is_public(route: &str) -> bool {
    PUBLIC_ROUTES.contains(&route)
}

/// Where to redirect, if anywhere. Nothing happens while loading.
pub fn redirect_for(status: SessionStatus, route: &str) -> Option<&'static str> {
    match status {
        SessionStatus::Loading => None,
        SessionStatus::LoggedOut if !is_public(route) => Some(LOG_IN_ROUTE),
        SessionStatus::LoggedIn if is_public(route) => Some(HOME_ROUTE),
        _ => None,
    }
}
