// Saved posts: a per-user set of blog ids, flipped the same way comment
// likes are.

use axum::extract::{Path, State};
use rusqlite::{params, Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::models::Blog;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::response::ApiReply;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkToggle {
    pub blog_id: String,
    pub is_bookmarked: bool,
}

/// Flip `blog_id` in the user's bookmarks inside one write transaction.
pub fn toggle(conn: &mut Connection, user_id: &str, blog_id: &str) -> AppResult<BookmarkToggle> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM blogs WHERE id = ?1",
        params![blog_id],
        |r| r.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound("Blog not found".into()));
    }

    let removed = tx.execute(
        "DELETE FROM bookmarks WHERE user_id = ?1 AND blog_id = ?2",
        params![user_id, blog_id],
    )?;
    if removed == 0 {
        tx.execute(
            "INSERT INTO bookmarks (user_id, blog_id) VALUES (?1, ?2)",
            params![user_id, blog_id],
        )?;
    }
    tx.commit()?;

    Ok(BookmarkToggle {
        blog_id: blog_id.to_string(),
        is_bookmarked: removed == 0,
    })
}

pub fn saved_posts(conn: &Connection, user_id: &str) -> AppResult<Vec<Blog>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.title, b.content, b.image, b.created_at, b.updated_at
         FROM bookmarks k
         JOIN blogs b ON b.id = k.blog_id
         WHERE k.user_id = ?1
         ORDER BY k.created_at DESC, b.id DESC",
    )?;
    let blogs = stmt
        .query_map(params![user_id], Blog::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(blogs)
}

/// POST /api/v1/auth/bookmark/{blog_id}
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(blog_id): Path<String>,
) -> AppResult<ApiReply<BookmarkToggle>> {
    let mut conn = state.db.get()?;
    let result = toggle(&mut conn, &user.id, &blog_id)?;
    let message = if result.is_bookmarked {
        "Post saved successfully"
    } else {
        "Post removed from saved posts"
    };
    Ok(ApiReply::ok(message, result))
}

/// GET /api/v1/auth/saved-posts
pub async fn list_saved_posts(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiReply<Vec<Blog>>> {
    let conn = state.db.get()?;
    let blogs = saved_posts(&conn, &user.id)?;
    Ok(ApiReply::ok("Saved posts fetched successfully", blogs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_blog, insert_user, migrated_pool};

    #[test]
    fn toggle_alternates_and_lists() {
        let pool = migrated_pool();
        insert_user(&pool, "u1", "Ann", false);
        insert_blog(&pool, "b1");
        let mut conn = pool.get().unwrap();

        assert!(toggle(&mut conn, "u1", "b1").unwrap().is_bookmarked);
        let saved = saved_posts(&conn, "u1").unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, "b1");

        assert!(!toggle(&mut conn, "u1", "b1").unwrap().is_bookmarked);
        assert!(saved_posts(&conn, "u1").unwrap().is_empty());
    }

    #[test]
    fn unknown_blog_is_not_found() {
        let pool = migrated_pool();
        insert_user(&pool, "u1", "Ann", false);
        let mut conn = pool.get().unwrap();
        assert!(matches!(
            toggle(&mut conn, "u1", "missing"),
            Err(AppError::NotFound(_))
        ));
    }
}
