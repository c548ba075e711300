// Repository pattern - isolates all comment persistence
use std::collections::HashMap;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use thiserror::Error;

use crate::comments::domain::{
    Author, Comment, CommentError, LikeToggle, NewComment, MAX_REPLY_DEPTH,
};
use crate::db;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Comment(#[from] CommentError),
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a validated comment. The blog must exist and a parent, if
    /// given, must be a live comment on the same blog with fewer than
    /// `MAX_REPLY_DEPTH` ancestors.
    async fn create(&self, author_id: &str, new: &NewComment) -> Result<Comment, RepositoryError>;

    /// Load a comment that has not been soft-deleted.
    async fn find_live(&self, id: &str) -> Result<Option<Comment>, RepositoryError>;

    /// All live comments of a blog, newest first.
    async fn list_live_for_blog(&self, blog_id: &str) -> Result<Vec<Comment>, RepositoryError>;

    /// Mark a live comment deleted and return the updated record.
    async fn soft_delete(&self, id: &str) -> Result<Comment, RepositoryError>;

    /// Flip `user_id`'s membership in the comment's likes.
    async fn toggle_like(&self, id: &str, user_id: &str) -> Result<LikeToggle, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteCommentRepository {
    pool: DbPool,
}

impl SqliteCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COMMENT: &str = "SELECT c.id, c.content, c.author_id, u.id, u.name, u.email,
            c.blog_id, c.parent_id, c.is_deleted, c.created_at, c.updated_at
     FROM comments c
     LEFT JOIN users u ON u.id = c.author_id";

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let author = match row.get::<_, Option<String>>(3)? {
        Some(id) => Some(Author {
            id,
            name: row.get(4)?,
            email: row.get(5)?,
        }),
        None => None,
    };

    Ok(Comment {
        id: row.get(0)?,
        content: row.get(1)?,
        author_id: row.get(2)?,
        author,
        blog_id: row.get(6)?,
        parent_id: row.get(7)?,
        likes: Vec::new(),
        like_count: 0,
        is_deleted: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn load_likes(conn: &Connection, comment_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM comment_likes WHERE comment_id = ?1 ORDER BY created_at, user_id",
    )?;
    let likes = stmt
        .query_map(params![comment_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(likes)
}

fn with_likes(mut comment: Comment, likes: Vec<String>) -> Comment {
    comment.like_count = likes.len();
    comment.likes = likes;
    comment
}

/// Level a reply to `parent_id` would sit at: the length of its ancestor
/// chain. The walk stops one step past the limit.
fn reply_depth(conn: &Connection, parent_id: &str) -> rusqlite::Result<usize> {
    let depth: Option<i64> = conn.query_row(
        "WITH RECURSIVE ancestry(id, parent_id, depth) AS (
             SELECT id, parent_id, 1 FROM comments WHERE id = ?1
             UNION ALL
             SELECT c.id, c.parent_id, a.depth + 1
             FROM comments c JOIN ancestry a ON c.id = a.parent_id
             WHERE a.depth <= ?2
         )
         SELECT MAX(depth) FROM ancestry",
        params![parent_id, MAX_REPLY_DEPTH as i64],
        |r| r.get(0),
    )?;
    Ok(depth.unwrap_or(0).max(0) as usize)
}

/// Fetch by id regardless of the deleted flag.
fn fetch(conn: &Connection, id: &str) -> rusqlite::Result<Option<Comment>> {
    let comment = conn
        .query_row(
            &format!("{} WHERE c.id = ?1", SELECT_COMMENT),
            params![id],
            comment_from_row,
        )
        .optional()?;

    match comment {
        Some(comment) => {
            let likes = load_likes(conn, id)?;
            Ok(Some(with_likes(comment, likes)))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn create(&self, author_id: &str, new: &NewComment) -> Result<Comment, RepositoryError> {
        let mut conn = self.pool.get()?;

        // The parent checks and the insert share one write lock, so a parent
        // deleted in between cannot gain a reply.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let blog_exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM blogs WHERE id = ?1",
            params![new.blog_id],
            |r| r.get(0),
        )?;
        if !blog_exists {
            return Err(CommentError::BlogNotFound.into());
        }

        if let Some(parent_id) = &new.parent_id {
            let parent_ok: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM comments
                 WHERE id = ?1 AND blog_id = ?2 AND is_deleted = 0",
                params![parent_id, new.blog_id],
                |r| r.get(0),
            )?;
            if !parent_ok {
                return Err(CommentError::ParentNotFound.into());
            }

            if reply_depth(&tx, parent_id)? > MAX_REPLY_DEPTH {
                return Err(CommentError::TooDeep.into());
            }
        }

        let id = db::new_id();
        let now = db::timestamp();
        tx.execute(
            "INSERT INTO comments (id, blog_id, author_id, parent_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, new.blog_id, author_id, new.parent_id, new.content, now],
        )?;

        let created = fetch(&tx, &id)?;
        tx.commit()?;

        tracing::debug!(comment_id = %id, blog_id = %new.blog_id, "Comment created");

        created.ok_or_else(|| CommentError::NotFound.into())
    }
    async fn find_live(&self, id: &str) -> Result<Option<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(fetch(&conn, id)?.filter(|c| !c.is_deleted))
    }

    async fn list_live_for_blog(&self, blog_id: &str) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut likes: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT l.comment_id, l.user_id
                 FROM comment_likes l
                 JOIN comments c ON c.id = l.comment_id
                 WHERE c.blog_id = ?1 AND c.is_deleted = 0
                 ORDER BY l.created_at, l.user_id",
            )?;
            let rows = stmt.query_map(params![blog_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (comment_id, user_id) = row?;
                likes.entry(comment_id).or_default().push(user_id);
            }
        }

        let mut stmt = conn.prepare(&format!(
            "{} WHERE c.blog_id = ?1 AND c.is_deleted = 0
             ORDER BY c.created_at DESC, c.id DESC",
            SELECT_COMMENT
        ))?;
        let comments = stmt
            .query_map(params![blog_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|c| {
                let l = likes.remove(&c.id).unwrap_or_default();
                with_likes(c, l)
            })
            .collect();

        Ok(comments)
    }

    async fn soft_delete(&self, id: &str) -> Result<Comment, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE comments SET is_deleted = 1, updated_at = ?2
             WHERE id = ?1 AND is_deleted = 0",
            params![id, db::timestamp()],
        )?;
        if rows == 0 {
            return Err(CommentError::NotFound.into());
        }

        fetch(&conn, id)?.ok_or_else(|| CommentError::NotFound.into())
    }

    async fn toggle_like(&self, id: &str, user_id: &str) -> Result<LikeToggle, RepositoryError> {
        let mut conn = self.pool.get()?;

        // IMMEDIATE takes the write lock up front, so the membership test and
        // the flip cannot interleave with another writer.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let live: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM comments WHERE id = ?1 AND is_deleted = 0",
            params![id],
            |r| r.get(0),
        )?;
        if !live {
            return Err(CommentError::NotFound.into());
        }

        let removed = tx.execute(
            "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if removed == 0 {
            tx.execute(
                "INSERT INTO comment_likes (comment_id, user_id) VALUES (?1, ?2)",
                params![id, user_id],
            )?;
        }

        let likes = load_likes(&tx, id)?;
        tx.commit()?;

        Ok(LikeToggle {
            comment_id: id.to_string(),
            like_count: likes.len(),
            likes,
            is_liked: removed == 0,
        })
    }
}
