use axum::{Extension, Json, extract::State};
use tracing::info;

use warbler_types::api::{ChangePasswordRequest, EditProfileRequest, ProfileResponse, UserResponse};
use warbler_types::envelope::{Empty, Envelope};
use warbler_types::models::UserId;
use warbler_types::session::SessionData;

use crate::auth::{hash_password, validate_password, verify_password};
use crate::convert;
use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams};
use crate::state::{AppState, blocking};

pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Envelope<UserResponse>>, ApiError> {
    let user_id = session.user_id();
    let user = state
        .db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(Envelope::ok(UserResponse {
        user: convert::user_profile(user),
    })))
}

pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(session): Extension<SessionData>,
    JsonBody(req): JsonBody<EditProfileRequest>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::invalid("name is required"));
    }
    let avatar = non_blank(req.avatar);
    let bio = non_blank(req.bio);

    let user_id = session.user_id();
    let updated = state
        .db(move |db| db.update_profile(user_id, &name, avatar.as_deref(), bio.as_deref()))
        .await?;
    if !updated {
        return Err(ApiError::NotFound("user"));
    }

    info!("User {} edited their profile", user_id);
    Ok(Json(Envelope::ok(Empty {})))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<SessionData>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let user_id = session.user_id();
    let user = state
        .db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    validate_password(&req.new_password)?;

    let ChangePasswordRequest { password, new_password } = req;
    let new_hash = blocking(move || {
        if !verify_password(&password, &user.password)? {
            return Err(ApiError::InvalidCredentials);
        }
        Ok(hash_password(&new_password)?)
    })
    .await?;

    let updated = state.db(move |db| db.update_password(user_id, &new_hash)).await?;
    if !updated {
        return Err(ApiError::NotFound("user"));
    }

    info!("User {} changed their password", user_id);
    Ok(Json(Envelope::ok(Empty {})))
}

/// A user's profile: their tweets and the tweets they liked, each flagged
/// with whether the viewer likes it.
pub async fn profile(
    State(state): State<AppState>,
    PathParams(id): PathParams<UserId>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Envelope<ProfileResponse>>, ApiError> {
    let viewer = session.user_id();

    let (user, tweets, liked_tweets) = state
        .db(move |db| {
            let Some(user) = db.get_user_by_id(id)? else {
                return Ok(None);
            };
            let tweets = db.list_tweets_by_author(id)?;
            let liked_tweets = db.list_tweets_liked_by(id)?;

            let ids: Vec<i64> = tweets.iter().chain(&liked_tweets).map(|t| t.id).collect();
            let files = db.files_for_tweets(&ids)?;
            let viewer_likes = db.liked_tweet_ids(viewer)?;

            Ok(Some((
                convert::user_profile(user),
                convert::tweet_summaries(tweets, &files, &viewer_likes),
                convert::tweet_summaries(liked_tweets, &files, &viewer_likes),
            )))
        })
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(Envelope::ok(ProfileResponse {
        user,
        tweets,
        liked_tweets,
    })))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
