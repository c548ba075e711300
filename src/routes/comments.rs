use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;

use crate::comments::{
    self, Comment, CommentError, CommentRepository, CreateCommentRequest, LikeToggle,
    RepositoryError, SqliteCommentRepository, ThreadNode,
};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::response::ApiReply;
use crate::state::AppState;

// -- Error conversion --

impl From<CommentError> for AppError {
    fn from(err: CommentError) -> Self {
        let message = err.to_string();
        match err {
            CommentError::MissingFields
            | CommentError::ContentTooLong
            | CommentError::ParentNotFound
            | CommentError::TooDeep => AppError::BadRequest(message),
            CommentError::BlogNotFound | CommentError::NotFound => AppError::NotFound(message),
            CommentError::Forbidden => AppError::Forbidden(message),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::Comment(e) => e.into(),
        }
    }
}

// -- Router --

pub fn router() -> Router<AppState> {
    // GET takes a blog id, DELETE a comment id; both share the one path slot.
    Router::new()
        .route("/comments", post(create_comment))
        .route("/comments/{id}", get(list_comments).delete(delete_comment))
        .route("/comments/{id}/like", post(toggle_like))
}

fn repo(state: &AppState) -> SqliteCommentRepository {
    SqliteCommentRepository::new(state.db.clone())
}

// -- Handlers --

/// POST /api/v1/comments
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> AppResult<ApiReply<Comment>> {
    let new = req.validate()?;
    let comment = repo(&state).create(&user.id, &new).await?;
    Ok(ApiReply::created("Comment created successfully", comment))
}

/// GET /api/v1/comments/{blog_id}
async fn list_comments(
    State(state): State<AppState>,
    Path(blog_id): Path<String>,
) -> AppResult<ApiReply<Vec<ThreadNode<Comment>>>> {
    let forest = comments::thread_for_blog(&repo(&state), &blog_id).await?;
    Ok(ApiReply::ok("Comments fetched successfully", forest))
}

/// DELETE /api/v1/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiReply<Comment>> {
    let deleted = comments::delete_comment(&repo(&state), &id, &user.id, user.is_admin).await?;
    tracing::info!(comment_id = %id, by = %user.id, "Comment deleted");
    Ok(ApiReply::ok("Comment deleted successfully", deleted))
}

/// POST /api/v1/comments/{id}/like
async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiReply<LikeToggle>> {
    let toggle = repo(&state).toggle_like(&id, &user.id).await?;
    Ok(ApiReply::ok(toggle.message(), toggle))
}
