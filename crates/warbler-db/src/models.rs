//! Database row types, mapped directly from SQLite rows.
//! Kept apart from the warbler-types wire models.

pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
}

/// A tweet joined with its author card and denormalized counters.
pub struct TweetRow {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub author_name: String,
    pub author_email: String,
    pub author_avatar: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
}

pub struct FileRow {
    pub tweet_id: i64,
    pub url: String,
}

pub struct CreatedTweetRow {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub urls: Vec<String>,
}

pub struct CommentRow {
    pub id: i64,
    pub tweet_id: i64,
    pub text: String,
    pub file: Option<String>,
    pub created_at: String,
    pub author_id: i64,
    pub author_name: String,
    pub author_email: String,
    pub author_avatar: Option<String>,
}

pub struct CreatedCommentRow {
    pub id: i64,
    pub text: String,
    pub file: Option<String>,
    pub created_at: String,
}

/// Who wrote a comment and which tweet it hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentOwnerRow {
    pub author_id: i64,
    pub tweet_id: i64,
}

pub struct CommentLikeRow {
    pub comment_id: i64,
    pub user_id: i64,
}

pub struct LikerRow {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

/// Result of a like toggle: `liked` is the caller's state afterwards,
/// `likes` the target's total after the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes: i64,
}
