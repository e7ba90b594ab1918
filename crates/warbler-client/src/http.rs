use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use warbler_types::api::{
    ChangePasswordRequest, CreateAccountRequest, CreateCommentRequest, CreateTweetRequest,
    CreatedCommentResponse, CreatedTweetResponse, EditProfileRequest, FeedResponse, LikeResponse,
    LogInRequest, ProfileResponse, TweetResponse, UserResponse,
};
use warbler_types::envelope::{Empty, ErrorBody};
use warbler_types::models::{CommentId, TweetId, UserId};

use crate::error::ClientError;
use crate::paths;

/// Thin typed wrapper over the JSON API. Keeps the session cookie in its
/// own cookie store, so one `ApiClient` is one logged-in user.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    // -- Users --

    pub async fn create_account(&self, req: &CreateAccountRequest) -> Result<(), ClientError> {
        self.send::<_, Empty>(Method::POST, paths::CREATE_ACCOUNT, Some(req)).await?;
        Ok(())
    }

    pub async fn log_in(&self, req: &LogInRequest) -> Result<UserResponse, ClientError> {
        self.send(Method::POST, paths::LOG_IN, Some(req)).await
    }

    pub async fn log_out(&self) -> Result<(), ClientError> {
        self.send::<(), Empty>(Method::POST, paths::LOG_OUT, None).await?;
        Ok(())
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        self.get(paths::ME).await
    }

    pub async fn edit_profile(&self, req: &EditProfileRequest) -> Result<(), ClientError> {
        self.send::<_, Empty>(Method::POST, paths::EDIT_PROFILE, Some(req)).await?;
        Ok(())
    }

    pub async fn change_password(&self, req: &ChangePasswordRequest) -> Result<(), ClientError> {
        self.send::<_, Empty>(Method::POST, paths::CHANGE_PASSWORD, Some(req)).await?;
        Ok(())
    }

    pub async fn profile(&self, id: UserId) -> Result<ProfileResponse, ClientError> {
        self.get(&paths::profile(id)).await
    }

    // -- Tweets --

    pub async fn feed(&self) -> Result<FeedResponse, ClientError> {
        self.get(paths::FEED).await
    }

    pub async fn tweet(&self, id: TweetId) -> Result<TweetResponse, ClientError> {
        self.get(&paths::tweet(id)).await
    }

    pub async fn create_tweet(&self, req: &CreateTweetRequest) -> Result<CreatedTweetResponse, ClientError> {
        self.send(Method::POST, paths::CREATE_TWEET, Some(req)).await
    }

    pub async fn delete_tweet(&self, id: TweetId) -> Result<(), ClientError> {
        self.send::<(), Empty>(Method::DELETE, &paths::delete_tweet(id), None).await?;
        Ok(())
    }

    pub async fn toggle_tweet_like(&self, id: TweetId) -> Result<LikeResponse, ClientError> {
        self.send::<(), _>(Method::POST, &paths::like_tweet(id), None).await
    }

    // -- Comments --

    pub async fn create_comment(
        &self,
        tweet: TweetId,
        req: &CreateCommentRequest,
    ) -> Result<CreatedCommentResponse, ClientError> {
        self.send(Method::POST, &paths::comment(tweet), Some(req)).await
    }

    pub async fn delete_comment(&self, tweet: TweetId, comment: CommentId) -> Result<(), ClientError> {
        self.send::<(), Empty>(Method::DELETE, &paths::delete_comment(tweet, comment), None)
            .await?;
        Ok(())
    }

    pub async fn toggle_comment_like(&self, tweet: TweetId, comment: CommentId) -> Result<LikeResponse, ClientError> {
        self.send::<(), _>(Method::POST, &paths::like_comment(tweet, comment), None).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("{} {}", method, path);

        let mut req = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }

        let value: Value = resp.json().await?;
        decode(value)
    }
}

/// Split an envelope into its payload or a `Rejected` error.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    if value.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(serde_json::from_value(value)?);
    }

    let body: ErrorBody = serde_json::from_value(value)?;
    Err(ClientError::Rejected {
        code: body.code,
        message: body.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warbler_types::envelope::ErrorCode;

    #[test]
    fn ok_envelope_decodes_payload() {
        let like: LikeResponse = decode(json!({ "ok": true, "isLiked": true, "likes": 3 })).unwrap();
        assert_eq!(like, LikeResponse { is_liked: true, likes: 3 });
    }

    #[test]
    fn rejected_envelope_carries_code() {
        let err = decode::<LikeResponse>(json!({ "ok": false, "error": "nope", "code": "forbidden" }))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Forbidden));
        assert!(matches!(err, ClientError::Rejected { ref message, .. } if message == "nope"));
    }

    #[test]
    fn envelope_without_ok_is_malformed() {
        let err = decode::<LikeResponse>(json!({ "isLiked": true })).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
