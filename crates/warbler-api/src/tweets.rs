use axum::{Extension, Json, extract::State};
use tracing::info;

use warbler_types::MAX_TWEET_IMAGES;
use warbler_types::api::{CreateTweetRequest, CreatedTweetResponse, FeedResponse, LikeResponse, TweetResponse};
use warbler_types::envelope::{Empty, Envelope};
use warbler_types::models::TweetId;
use warbler_types::session::SessionData;

use crate::convert;
use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams};
use crate::policy::{self, Action, Actor, Resource};
use crate::state::AppState;

pub async fn create_tweet(
    State(state): State<AppState>,
    Extension(session): Extension<SessionData>,
    JsonBody(req): JsonBody<CreateTweetRequest>,
) -> Result<Json<Envelope<CreatedTweetResponse>>, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::invalid("content is required"));
    }
    if req.urls.len() > MAX_TWEET_IMAGES {
        return Err(ApiError::invalid(format!(
            "a tweet can carry at most {MAX_TWEET_IMAGES} images"
        )));
    }
    if req.urls.iter().any(|url| url.trim().is_empty()) {
        return Err(ApiError::invalid("image url is empty"));
    }

    let author_id = session.user_id();
    let urls = req.urls;
    let row = state
        .db(move |db| db.create_tweet(author_id, &content, &urls))
        .await?;

    info!("User {} posted tweet {} with {} image(s)", author_id, row.id, row.urls.len());
    Ok(Json(Envelope::ok(CreatedTweetResponse {
        tweet: convert::new_tweet(row),
    })))
}

/// Every tweet, most recently updated first, with the viewer's like flag.
pub async fn feed(
    State(state): State<AppState>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Envelope<FeedResponse>>, ApiError> {
    let viewer = session.user_id();

    let tweets = state
        .db(move |db| {
            let rows = db.list_feed()?;
            let ids: Vec<i64> = rows.iter().map(|t| t.id).collect();
            let files = db.files_for_tweets(&ids)?;
            let liked = db.liked_tweet_ids(viewer)?;
            Ok(convert::tweet_summaries(rows, &files, &liked))
        })
        .await?;

    Ok(Json(Envelope::ok(FeedResponse { tweets })))
}

pub async fn tweet_detail(
    State(state): State<AppState>,
    PathParams(tweet_id): PathParams<TweetId>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Envelope<TweetResponse>>, ApiError> {
    let viewer = session.user_id();

    let tweet = state
        .db(move |db| {
            let Some(row) = db.get_tweet(tweet_id)? else {
                return Ok(None);
            };
            let files = db.files_for_tweets(&[tweet_id])?.remove(&tweet_id).unwrap_or_default();
            let comments = db.list_comments(tweet_id)?;
            let comment_likes = db.comment_likes_for_tweet(tweet_id)?;
            let likers = db.tweet_likers(tweet_id)?;
            Ok(Some(convert::tweet_detail(row, files, comments, comment_likes, likers, viewer)))
        })
        .await?
        .ok_or(ApiError::NotFound("tweet"))?;

    Ok(Json(Envelope::ok(TweetResponse { tweet })))
}

pub async fn delete_tweet(
    State(state): State<AppState>,
    PathParams(tweet_id): PathParams<TweetId>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let actor = Actor {
        user_id: session.user_id(),
    };

    let author_id = state
        .db(move |db| db.get_tweet_owner(tweet_id))
        .await?
        .ok_or(ApiError::NotFound("tweet"))?;

    policy::evaluate(actor, Resource::Tweet { author_id }, Action::Delete).into_result()?;

    let deleted = state
        .db(move |db| db.delete_tweet(tweet_id, actor.user_id))
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("tweet"));
    }

    info!("User {} deleted tweet {}", actor.user_id, tweet_id);
    Ok(Json(Envelope::ok(Empty {})))
}

/// Like the tweet if the caller has not, otherwise unlike it.
pub async fn toggle_tweet_like(
    State(state): State<AppState>,
    PathParams(tweet_id): PathParams<TweetId>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Envelope<LikeResponse>>, ApiError> {
    let user_id = session.user_id();

    let toggled = state
        .db(move |db| db.toggle_tweet_like(tweet_id, user_id))
        .await?
        .ok_or(ApiError::NotFound("tweet"))?;

    Ok(Json(Envelope::ok(LikeResponse {
        is_liked: toggled.liked,
        likes: toggled.likes,
    })))
}
