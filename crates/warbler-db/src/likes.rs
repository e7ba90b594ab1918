use anyhow::Result;
use rusqlite::{Connection, TransactionBehavior, params};

use crate::models::{LikeToggle, LikerRow};
use crate::queries::OptionalExt;
use crate::Database;

/// Table layout for one kind of like.
struct LikeTable {
    table: &'static str,
    target_column: &'static str,
}

const TWEET_LIKES: LikeTable = LikeTable {
    table: "tweet_likes",
    target_column: "tweet_id",
};

const COMMENT_LIKES: LikeTable = LikeTable {
    table: "comment_likes",
    target_column: "comment_id",
};

impl Database {
    /// Toggle `user_id`'s like on a tweet.
    /// Returns `None` if the tweet does not exist.
    pub fn toggle_tweet_like(&self, tweet_id: i64, user_id: i64) -> Result<Option<LikeToggle>> {
        self.with_conn_mut(|conn| {
            toggle(
                conn,
                &TWEET_LIKES,
                ("SELECT 1 FROM tweets WHERE id = ?1", params![tweet_id]),
                tweet_id,
                user_id,
            )
        })
    }

    /// Toggle `user_id`'s like on a comment of `tweet_id`.
    /// Returns `None` if the comment does not exist under that tweet.
    pub fn toggle_comment_like(
        &self,
        tweet_id: i64,
        comment_id: i64,
        user_id: i64,
    ) -> Result<Option<LikeToggle>> {
        self.with_conn_mut(|conn| {
            toggle(
                conn,
                &COMMENT_LIKES,
                (
                    "SELECT 1 FROM comments WHERE id = ?1 AND tweet_id = ?2",
                    params![comment_id, tweet_id],
                ),
                comment_id,
                user_id,
            )
        })
    }

    /// Users who liked a tweet, in the order they liked it.
    pub fn tweet_likers(&self, tweet_id: i64) -> Result<Vec<LikerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.email, u.avatar
                 FROM tweet_likes l
                 JOIN users u ON u.id = l.user_id
                 WHERE l.tweet_id = ?1
                 ORDER BY l.id",
            )?;

            let rows = stmt
                .query_map([tweet_id], |row| {
                    Ok(LikerRow {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        avatar: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

/// Delete-else-insert inside one write transaction. The insert is
/// `OR IGNORE` against the UNIQUE(target, user) constraint, so a duplicate
/// that slipped in from elsewhere counts as "liked" rather than an error.
fn toggle(
    conn: &mut Connection,
    likes: &LikeTable,
    (exists_sql, exists_params): (&str, &[&dyn rusqlite::ToSql]),
    target_id: i64,
    user_id: i64,
) -> Result<Option<LikeToggle>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let exists = tx
        .query_row(exists_sql, exists_params, |_| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        return Ok(None);
    }

    let LikeTable { table, target_column } = likes;

    let removed = tx.execute(
        &format!("DELETE FROM {table} WHERE {target_column} = ?1 AND user_id = ?2"),
        params![target_id, user_id],
    )?;

    let liked = if removed == 0 {
        tx.execute(
            &format!("INSERT OR IGNORE INTO {table} ({target_column}, user_id) VALUES (?1, ?2)"),
            params![target_id, user_id],
        )?;
        true
    } else {
        false
    };

    let total: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE {target_column} = ?1"),
        [target_id],
        |row| row.get(0),
    )?;

    tx.commit()?;

    Ok(Some(LikeToggle { liked, likes: total }))
}
