//! Endpoint paths. Read endpoints double as cache keys.

use warbler_types::models::{CommentId, TweetId, UserId};

pub const CREATE_ACCOUNT: &str = "/api/user/create-account";
pub const LOG_IN: &str = "/api/user/log-in";
pub const LOG_OUT: &str = "/api/user/log-out";
pub const ME: &str = "/api/user/me";
pub const EDIT_PROFILE: &str = "/api/user/edit";
pub const CHANGE_PASSWORD: &str = "/api/user/change-password";
pub const FEED: &str = "/api/tweet/all";
pub const CREATE_TWEET: &str = "/api/tweet";

pub fn profile(id: UserId) -> String {
    format!("/api/user/{id}")
}

pub fn tweet(id: TweetId) -> String {
    format!("/api/tweet/{id}")
}

pub fn delete_tweet(id: TweetId) -> String {
    format!("/api/tweet/{id}/delete")
}

pub fn like_tweet(id: TweetId) -> String {
    format!("/api/tweet/{id}/like")
}

pub fn comment(tweet: TweetId) -> String {
    format!("/api/tweet/{tweet}/comment")
}

pub fn delete_comment(tweet: TweetId, comment: CommentId) -> String {
    format!("/api/tweet/{tweet}/comment/{comment}/delete")
}

pub fn like_comment(tweet: TweetId, comment: CommentId) -> String {
    format!("/api/tweet/{tweet}/comment/{comment}/like")
}
