// Comment domain - pure types, validation and the delete policy.
// Nothing here touches the database.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comments::tree::Threaded;

pub const MAX_CONTENT_CHARS: usize = 1000;

/// Deepest reply level accepted on create; top-level comments are level 0.
pub const MAX_REPLY_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub author_id: String,
    /// `None` when the author account no longer exists.
    pub author: Option<Author>,
    pub blog_id: String,
    pub parent_id: Option<String>,
    pub likes: Vec<String>,
    pub like_count: usize,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Threaded for Comment {
    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// Result of a like flip; `is_liked` is the caller's state afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub comment_id: String,
    pub likes: Vec<String>,
    pub like_count: usize,
    pub is_liked: bool,
}

impl LikeToggle {
    pub fn message(&self) -> &'static str {
        if self.is_liked {
            "Comment liked successfully"
        } else {
            "Comment unliked successfully"
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub blog_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// A validated creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub content: String,
    pub blog_id: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    #[error("Content and blogId are required")]
    MissingFields,

    #[error("Comment cannot exceed 1000 characters")]
    ContentTooLong,

    #[error("Blog not found")]
    BlogNotFound,

    #[error("Parent comment not found on this blog")]
    ParentNotFound,

    #[error("Replies cannot be nested more than 32 levels deep")]
    TooDeep,

    #[error("Comment not found")]
    NotFound,

    #[error("You are not authorized to delete this comment")]
    Forbidden,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateCommentRequest {
    pub fn validate(self) -> Result<NewComment, CommentError> {
        let content = non_blank(self.content).ok_or(CommentError::MissingFields)?;
        let blog_id = non_blank(self.blog_id).ok_or(CommentError::MissingFields)?;

        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(CommentError::ContentTooLong);
        }

        Ok(NewComment {
            content,
            blog_id,
            parent_id: non_blank(self.parent_id),
        })
    }
}

/// Owners and administrators may delete a comment.
pub fn can_delete(comment: &Comment, user_id: &str, is_admin: bool) -> bool {
    is_admin || comment.author_id == user_id
}
