use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::middleware::require_session;
use crate::state::AppState;
use crate::{auth, comments, tweets, users};

/// Assemble the full API. Each path accepts exactly one method; anything
/// else gets 405 before the session gate runs.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/user/create-account", post(auth::create_account))
        .route("/api/user/log-in", post(auth::log_in))
        .route("/api/user/log-out", post(auth::log_out));

    // Gated per method handler: a wrong method still gets 405.
    let session = middleware::from_fn_with_state(state.clone(), require_session);

    let protected_routes = Router::new()
        .route("/api/user/me", get(users::me).route_layer(session.clone()))
        .route("/api/user/edit", post(users::edit_profile).route_layer(session.clone()))
        .route(
            "/api/user/change-password",
            post(users::change_password).route_layer(session.clone()),
        )
        .route("/api/user/{id}", get(users::profile).route_layer(session.clone()))
        .route("/api/tweet", post(tweets::create_tweet).route_layer(session.clone()))
        .route("/api/tweet/all", get(tweets::feed).route_layer(session.clone()))
        .route(
            "/api/tweet/{tweet_id}",
            get(tweets::tweet_detail).route_layer(session.clone()),
        )
        .route(
            "/api/tweet/{tweet_id}/delete",
            delete(tweets::delete_tweet).route_layer(session.clone()),
        )
        .route(
            "/api/tweet/{tweet_id}/like",
            post(tweets::toggle_tweet_like).route_layer(session.clone()),
        )
        .route(
            "/api/tweet/{tweet_id}/comment",
            post(comments::create_comment).route_layer(session.clone()),
        )
        .route(
            "/api/tweet/{tweet_id}/comment/{comment_id}/delete",
            delete(comments::delete_comment).route_layer(session.clone()),
        )
        .route(
            "/api/tweet/{tweet_id}/comment/{comment_id}/like",
            post(comments::toggle_comment_like).route_layer(session),
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
