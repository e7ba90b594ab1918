//! Row → wire model conversion shared by the handlers.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use warbler_db::models::{
    CommentLikeRow, CommentRow, CreatedCommentRow, CreatedTweetRow, LikerRow, TweetRow, UserRow,
};
use warbler_types::models::{
    Author, CommentLiker, CommentView, Counts, FileUrl, Liker, NewComment, NewTweet, TweetDetail,
    TweetSummary, UserProfile,
};

/// Parse a stored timestamp. Rows written by this schema are RFC 3339; plain
/// `YYYY-MM-DD HH:MM:SS` (SQLite's `datetime('now')`) is accepted as UTC.
pub fn parse_timestamp(raw: &str, what: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {} {}: {}", raw, what, id, e);
            DateTime::default()
        })
}

pub fn user_profile(row: UserRow) -> UserProfile {
    UserProfile {
        created_at: parse_timestamp(&row.created_at, "user", row.id),
        id: row.id,
        name: row.name,
        email: row.email,
        avatar: row.avatar,
        bio: row.bio,
    }
}

fn file_urls(urls: Vec<String>) -> Vec<FileUrl> {
    urls.into_iter().map(|url| FileUrl { url }).collect()
}

/// Attach files and the viewer's like flag to listed tweets.
pub fn tweet_summaries(
    rows: Vec<TweetRow>,
    files: &HashMap<i64, Vec<String>>,
    liked: &HashSet<i64>,
) -> Vec<TweetSummary> {
    rows.into_iter()
        .map(|row| TweetSummary {
            created_at: parse_timestamp(&row.created_at, "tweet", row.id),
            updated_at: parse_timestamp(&row.updated_at, "tweet", row.id),
            author: Author {
                id: row.author_id,
                name: row.author_name,
                email: row.author_email,
                avatar: row.author_avatar,
            },
            files: file_urls(files.get(&row.id).cloned().unwrap_or_default()),
            count: Counts {
                likes: row.like_count,
                comments: row.comment_count,
            },
            is_liked: liked.contains(&row.id),
            id: row.id,
            content: row.content,
            author_id: row.author_id,
        })
        .collect()
}

pub fn tweet_detail(
    row: TweetRow,
    files: Vec<String>,
    comments: Vec<CommentRow>,
    comment_likes: Vec<CommentLikeRow>,
    likers: Vec<LikerRow>,
    viewer: i64,
) -> TweetDetail {
    let mut likes_by_comment: HashMap<i64, Vec<CommentLiker>> = HashMap::new();
    for like in comment_likes {
        likes_by_comment
            .entry(like.comment_id)
            .or_default()
            .push(CommentLiker { user_id: like.user_id });
    }

    let comments = comments
        .into_iter()
        .map(|c| {
            let likes = likes_by_comment.remove(&c.id).unwrap_or_default();
            CommentView {
                created_at: parse_timestamp(&c.created_at, "comment", c.id),
                author: Author {
                    id: c.author_id,
                    name: c.author_name,
                    email: c.author_email,
                    avatar: c.author_avatar,
                },
                is_liked: likes.iter().any(|l| l.user_id == viewer),
                likes,
                id: c.id,
                text: c.text,
                file: c.file,
            }
        })
        .collect();

    let likes: Vec<Liker> = likers
        .into_iter()
        .map(|l| Liker {
            user: Author {
                id: l.user_id,
                name: l.name,
                email: l.email,
                avatar: l.avatar,
            },
        })
        .collect();

    TweetDetail {
        created_at: parse_timestamp(&row.created_at, "tweet", row.id),
        updated_at: parse_timestamp(&row.updated_at, "tweet", row.id),
        author: Author {
            id: row.author_id,
            name: row.author_name,
            email: row.author_email,
            avatar: row.author_avatar,
        },
        files: file_urls(files),
        is_liked: likes.iter().any(|l| l.user.id == viewer),
        likes,
        comments,
        id: row.id,
        content: row.content,
        author_id: row.author_id,
    }
}

pub fn new_tweet(row: CreatedTweetRow) -> NewTweet {
    NewTweet {
        created_at: parse_timestamp(&row.created_at, "tweet", row.id),
        updated_at: parse_timestamp(&row.updated_at, "tweet", row.id),
        files: file_urls(row.urls),
        id: row.id,
        content: row.content,
        author_id: row.author_id,
    }
}

pub fn new_comment(row: CreatedCommentRow) -> NewComment {
    NewComment {
        created_at: parse_timestamp(&row.created_at, "comment", row.id),
        id: row.id,
        text: row.text,
        file: row.file,
    }
}
