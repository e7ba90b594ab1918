use axum::{Extension, Json, extract::State};
use tracing::info;

use warbler_types::api::{CreateCommentRequest, CreatedCommentResponse, LikeResponse};
use warbler_types::envelope::{Empty, Envelope};
use warbler_types::models::{CommentId, TweetId};
use warbler_types::session::SessionData;

use crate::convert;
use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams};
use crate::policy::{self, Action, Actor, Resource};
use crate::state::AppState;

pub async fn create_comment(
    State(state): State<AppState>,
    PathParams(tweet_id): PathParams<TweetId>,
    Extension(session): Extension<SessionData>,
    JsonBody(req): JsonBody<CreateCommentRequest>,
) -> Result<Json<Envelope<CreatedCommentResponse>>, ApiError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::invalid("comment text is required"));
    }
    let file = req.file.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());

    let author_id = session.user_id();
    let row = state
        .db(move |db| db.create_comment(tweet_id, author_id, &text, file.as_deref()))
        .await?
        .ok_or(ApiError::NotFound("tweet"))?;

    info!("User {} commented {} on tweet {}", author_id, row.id, tweet_id);
    Ok(Json(Envelope::ok(CreatedCommentResponse {
        comment: convert::new_comment(row),
    })))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    PathParams((tweet_id, comment_id)): PathParams<(TweetId, CommentId)>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let actor = Actor {
        user_id: session.user_id(),
    };

    authorize(&state, actor, tweet_id, comment_id, Action::Delete).await?;

    let deleted = state
        .db(move |db| db.delete_comment(comment_id, actor.user_id))
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("comment"));
    }

    info!("User {} deleted comment {} on tweet {}", actor.user_id, comment_id, tweet_id);
    Ok(Json(Envelope::ok(Empty {})))
}

pub async fn toggle_comment_like(
    State(state): State<AppState>,
    PathParams((tweet_id, comment_id)): PathParams<(TweetId, CommentId)>,
    Extension(session): Extension<SessionData>,
) -> Result<Json<Envelope<LikeResponse>>, ApiError> {
    let actor = Actor {
        user_id: session.user_id(),
    };

    authorize(&state, actor, tweet_id, comment_id, Action::Like).await?;

    let toggled = state
        .db(move |db| db.toggle_comment_like(tweet_id, comment_id, actor.user_id))
        .await?
        .ok_or(ApiError::NotFound("comment"))?;

    Ok(Json(Envelope::ok(LikeResponse {
        is_liked: toggled.liked,
        likes: toggled.likes,
    })))
}

/// Load the comment's ownership facts and run them through the policy.
async fn authorize(
    state: &AppState,
    actor: Actor,
    via_tweet: TweetId,
    comment_id: CommentId,
    action: Action,
) -> Result<(), ApiError> {
    let owner = state
        .db(move |db| db.get_comment_owner(comment_id))
        .await?
        .ok_or(ApiError::NotFound("comment"))?;

    let resource = Resource::Comment {
        author_id: owner.author_id,
        tweet_id: owner.tweet_id,
        via_tweet,
    };
    policy::evaluate(actor, resource, action).into_result()?;
    Ok(())
}
