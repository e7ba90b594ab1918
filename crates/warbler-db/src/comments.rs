use anyhow::Result;
use rusqlite::{TransactionBehavior, params};

use crate::models::{CommentLikeRow, CommentOwnerRow, CommentRow, CreatedCommentRow};
use crate::queries::OptionalExt;
use crate::Database;

impl Database {
    /// Attach a comment to a tweet. Returns `None` if the tweet does not exist.
    pub fn create_comment(
        &self,
        tweet_id: i64,
        author_id: i64,
        text: &str,
        file: Option<&str>,
    ) -> Result<Option<CreatedCommentRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists = tx
                .query_row("SELECT 1 FROM tweets WHERE id = ?1", [tweet_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO comments (text, file, tweet_id, author_id) VALUES (?1, ?2, ?3, ?4)",
                params![text, file, tweet_id, author_id],
            )?;
            let id = tx.last_insert_rowid();
            let created_at: String =
                tx.query_row("SELECT created_at FROM comments WHERE id = ?1", [id], |row| row.get(0))?;

            tx.commit()?;

            Ok(Some(CreatedCommentRow {
                id,
                text: text.to_string(),
                file: file.map(str::to_string),
                created_at,
            }))
        })
    }

    /// Comments on a tweet with their authors, newest first.
    pub fn list_comments(&self, tweet_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.tweet_id, c.text, c.file, c.created_at,
                        u.id, u.name, u.email, u.avatar
                 FROM comments c
                 JOIN users u ON u.id = c.author_id
                 WHERE c.tweet_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC",
            )?;

            let rows = stmt
                .query_map([tweet_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        tweet_id: row.get(1)?,
                        text: row.get(2)?,
                        file: row.get(3)?,
                        created_at: row.get(4)?,
                        author_id: row.get(5)?,
                        author_name: row.get(6)?,
                        author_email: row.get(7)?,
                        author_avatar: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Likes on every comment of a tweet, oldest like first.
    pub fn comment_likes_for_tweet(&self, tweet_id: i64) -> Result<Vec<CommentLikeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cl.comment_id, cl.user_id
                 FROM comment_likes cl
                 JOIN comments c ON c.id = cl.comment_id
                 WHERE c.tweet_id = ?1
                 ORDER BY cl.id",
            )?;

            let rows = stmt
                .query_map([tweet_id], |row| {
                    Ok(CommentLikeRow {
                        comment_id: row.get(0)?,
                        user_id: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_comment_owner(&self, id: i64) -> Result<Option<CommentOwnerRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT author_id, tweet_id FROM comments WHERE id = ?1",
                [id],
                |row| {
                    Ok(CommentOwnerRow {
                        author_id: row.get(0)?,
                        tweet_id: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Delete a comment only if `author_id` still owns it.
    pub fn delete_comment(&self, id: i64, author_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM comments WHERE id = ?1 AND author_id = ?2",
                params![id, author_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn comments_list_newest_first_and_report_owner() {
        let db = Database::open_in_memory().unwrap();
        let ann = db.create_user("ann", "ann@example.com", "h").unwrap().unwrap();
        let bo = db.create_user("bo", "bo@example.com", "h").unwrap().unwrap();
        let tweet = db.create_tweet(ann, "post", &[]).unwrap();

        let older = db.create_comment(tweet.id, bo, "one", None).unwrap().unwrap();
        let newer = db
            .create_comment(tweet.id, ann, "two", Some("https://img/c.png"))
            .unwrap()
            .unwrap();

        let listed: Vec<i64> = db.list_comments(tweet.id).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(listed, vec![newer.id, older.id]);

        let owner = db.get_comment_owner(older.id).unwrap().unwrap();
        assert_eq!(owner.author_id, bo);
        assert_eq!(owner.tweet_id, tweet.id);
    }

    #[test]
    fn comment_on_missing_tweet_is_none() {
        let db = Database::open_in_memory().unwrap();
        let ann = db.create_user("ann", "ann@example.com", "h").unwrap().unwrap();
        assert!(db.create_comment(999, ann, "hello?", None).unwrap().is_none());
    }

    #[test]
    fn only_author_can_delete_comment() {
        let db = Database::open_in_memory().unwrap();
        let ann = db.create_user("ann", "ann@example.com", "h").unwrap().unwrap();
        let bo = db.create_user("bo", "bo@example.com", "h").unwrap().unwrap();
        let tweet = db.create_tweet(ann, "post", &[]).unwrap();
        let comment = db.create_comment(tweet.id, bo, "hi", None).unwrap().unwrap();

        assert!(!db.delete_comment(comment.id, ann).unwrap());
        assert!(db.delete_comment(comment.id, bo).unwrap());
        assert!(db.get_comment_owner(comment.id).unwrap().is_none());
    }
}
