pub mod domain;
pub mod repository;
pub mod tree;

pub use domain::{
    can_delete, Author, Comment, CommentError, CreateCommentRequest, LikeToggle, NewComment,
    MAX_REPLY_DEPTH,
};
pub use repository::{CommentRepository, RepositoryError, SqliteCommentRepository};
pub use tree::{assemble, ThreadNode, Threaded};

/// Soft-delete a comment on behalf of `actor_id`. Existence is checked before
/// ownership, so a missing comment is reported as not found even to strangers.
pub async fn delete_comment<R: CommentRepository + ?Sized>(
    repo: &R,
    id: &str,
    actor_id: &str,
    actor_is_admin: bool,
) -> Result<Comment, RepositoryError> {
    let comment = repo.find_live(id).await?.ok_or(CommentError::NotFound)?;

    if !can_delete(&comment, actor_id, actor_is_admin) {
        tracing::info!(comment_id = %id, actor = %actor_id, "Delete refused: not owner or admin");
        return Err(CommentError::Forbidden.into());
    }

    repo.soft_delete(id).await
}

/// Live comments of a blog as a reply forest, at most `MAX_REPLY_DEPTH`
/// levels deep.
pub async fn thread_for_blog<R: CommentRepository + ?Sized>(
    repo: &R,
    blog_id: &str,
) -> Result<Vec<ThreadNode<Comment>>, RepositoryError> {
    let comments = repo.list_live_for_blog(blog_id).await?;
    Ok(assemble(comments, MAX_REPLY_DEPTH))
}
