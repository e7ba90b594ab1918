use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rusqlite::{Connection, TransactionBehavior, params};

use crate::models::{CreatedTweetRow, FileRow, TweetRow};
use crate::queries::OptionalExt;
use crate::Database;

/// Tweet with author card and counters. Callers append WHERE and ORDER BY.
const TWEET_SELECT: &str = "
    SELECT t.id, t.content, t.author_id, t.created_at, t.updated_at,
           u.name, u.email, u.avatar,
           (SELECT COUNT(*) FROM tweet_likes l WHERE l.tweet_id = t.id),
           (SELECT COUNT(*) FROM comments c WHERE c.tweet_id = t.id)
    FROM tweets t
    JOIN users u ON u.id = t.author_id";

const NEWEST_FIRST: &str = "ORDER BY t.updated_at DESC, t.id DESC";

impl Database {
    /// Insert a tweet and one file row per URL in a single transaction.
    pub fn create_tweet(&self, author_id: i64, content: &str, urls: &[String]) -> Result<CreatedTweetRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            tx.execute(
                "INSERT INTO tweets (content, author_id) VALUES (?1, ?2)",
                params![content, author_id],
            )?;
            let id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare("INSERT INTO files (url, tweet_id) VALUES (?1, ?2)")?;
                for url in urls {
                    stmt.execute(params![url, id])?;
                }
            }

            let (created_at, updated_at): (String, String) = tx.query_row(
                "SELECT created_at, updated_at FROM tweets WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            tx.commit()?;

            Ok(CreatedTweetRow {
                id,
                content: content.to_string(),
                author_id,
                created_at,
                updated_at,
                urls: urls.to_vec(),
            })
        })
    }

    /// Every tweet, most recently updated first. Unpaginated.
    pub fn list_feed(&self) -> Result<Vec<TweetRow>> {
        self.with_conn(|conn| query_tweets(conn, &format!("{TWEET_SELECT} {NEWEST_FIRST}"), params![]))
    }

    pub fn list_tweets_by_author(&self, author_id: i64) -> Result<Vec<TweetRow>> {
        self.with_conn(|conn| {
            let sql = format!("{TWEET_SELECT} WHERE t.author_id = ?1 {NEWEST_FIRST}");
            query_tweets(conn, &sql, params![author_id])
        })
    }

    pub fn list_tweets_liked_by(&self, user_id: i64) -> Result<Vec<TweetRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{TWEET_SELECT}
                 WHERE t.id IN (SELECT tweet_id FROM tweet_likes WHERE user_id = ?1)
                 {NEWEST_FIRST}"
            );
            query_tweets(conn, &sql, params![user_id])
        })
    }

    pub fn get_tweet(&self, id: i64) -> Result<Option<TweetRow>> {
        self.with_conn(|conn| {
            let sql = format!("{TWEET_SELECT} WHERE t.id = ?1");
            Ok(query_tweets(conn, &sql, params![id])?.into_iter().next())
        })
    }

    /// Author of a tweet, or `None` if it does not exist.
    pub fn get_tweet_owner(&self, id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT author_id FROM tweets WHERE id = ?1", [id], |row| row.get(0))
                .optional()
        })
    }

    /// Delete a tweet only if `author_id` still owns it. Files, comments and
    /// likes go with it via ON DELETE CASCADE.
    pub fn delete_tweet(&self, id: i64, author_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tweets WHERE id = ?1 AND author_id = ?2",
                params![id, author_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Batch-fetch file URLs for a set of tweets, in insertion order.
    pub fn files_for_tweets(&self, tweet_ids: &[i64]) -> Result<HashMap<i64, Vec<String>>> {
        if tweet_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=tweet_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT tweet_id, url FROM files WHERE tweet_id IN ({}) ORDER BY id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(tweet_ids.iter()), |row| {
                    Ok(FileRow {
                        tweet_id: row.get(0)?,
                        url: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut files: HashMap<i64, Vec<String>> = HashMap::new();
            for row in rows {
                files.entry(row.tweet_id).or_default().push(row.url);
            }
            Ok(files)
        })
    }

    /// Ids of every tweet `user_id` currently likes.
    pub fn liked_tweet_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT tweet_id FROM tweet_likes WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<i64>, _>>()?;
            Ok(ids)
        })
    }
}

fn query_tweets(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<TweetRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(TweetRow {
                id: row.get(0)?,
                content: row.get(1)?,
                author_id: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
                author_name: row.get(5)?,
                author_email: row.get(6)?,
                author_avatar: row.get(7)?,
                like_count: row.get(8)?,
                comment_count: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
