use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Router;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::db::models::Blog;
use crate::db::{new_id, timestamp};
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, ApiJson};
use crate::response::ApiReply;
use crate::state::AppState;

// --- Request types ---

#[derive(Debug, Default, Deserialize)]
pub struct BlogInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ValidBlog {
    pub title: String,
    pub content: String,
    pub image: String,
}

impl BlogInput {
    pub fn validate(self) -> AppResult<ValidBlog> {
        let field = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        match (field(self.title), field(self.content), field(self.image)) {
            (Some(title), Some(content), Some(image)) => Ok(ValidBlog {
                title,
                content,
                image,
            }),
            _ => Err(AppError::BadRequest(
                "Title, content, and image are required".into(),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

/// Result ordering for listings and search. Unknown values mean newest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlogSort {
    #[default]
    Newest,
    Oldest,
    Title,
}

impl BlogSort {
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("oldest") => BlogSort::Oldest,
            Some("title") => BlogSort::Title,
            _ => BlogSort::Newest,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            BlogSort::Newest => "created_at DESC, id DESC",
            BlogSort::Oldest => "created_at ASC, id ASC",
            BlogSort::Title => "title ASC, id ASC",
        }
    }
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs).post(create_blog))
        .route("/blogs/count", get(count_blogs))
        .route("/blogs/search", get(search_blogs))
        .route(
            "/blogs/{id}",
            get(get_blog).put(update_blog).delete(delete_blog),
        )
}

// --- Handlers ---

async fn create_blog(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(input): ApiJson<BlogInput>,
) -> AppResult<ApiReply<Blog>> {
    let blog = input.validate()?;

    let conn = state.db.get()?;
    let id = new_id();
    let now = timestamp();
    conn.execute(
        "INSERT INTO blogs (id, title, content, image, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, blog.title, blog.content, blog.image, now],
    )?;

    let created = find_blog(&conn, &id)?;
    tracing::info!(blog_id = %id, by = %admin.id, "Blog created");
    Ok(ApiReply::created("Blog created successfully", created))
}

async fn list_blogs(State(state): State<AppState>) -> AppResult<ApiReply<Vec<Blog>>> {
    let conn = state.db.get()?;
    let blogs = query_blogs(&conn, None, BlogSort::Newest)?;
    Ok(ApiReply::ok("Blogs fetched successfully", blogs))
}

async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiReply<Blog>> {
    let conn = state.db.get()?;
    let blog = find_blog(&conn, &id)?;
    Ok(ApiReply::ok("Blog fetched successfully", blog))
}

async fn update_blog(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<BlogInput>,
) -> AppResult<ApiReply<Blog>> {
    let blog = input.validate()?;

    let conn = state.db.get()?;
    let rows = conn.execute(
        "UPDATE blogs SET title = ?2, content = ?3, image = ?4, updated_at = ?5 WHERE id = ?1",
        params![id, blog.title, blog.content, blog.image, timestamp()],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound("Blog not found".into()));
    }

    let updated = find_blog(&conn, &id)?;
    tracing::info!(blog_id = %id, by = %admin.id, "Blog updated");
    Ok(ApiReply::ok("Blog updated successfully", updated))
}

async fn delete_blog(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<ApiReply<Blog>> {
    let conn = state.db.get()?;
    let blog = find_blog(&conn, &id)?;

    // Comments, likes and bookmarks of the post go with it (ON DELETE CASCADE).
    conn.execute("DELETE FROM blogs WHERE id = ?1", params![id])?;

    tracing::info!(blog_id = %id, by = %admin.id, "Blog deleted");
    Ok(ApiReply::ok("Blog deleted successfully", blog))
}

async fn count_blogs(State(state): State<AppState>) -> AppResult<ApiReply<i64>> {
    let conn = state.db.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM blogs", [], |r| r.get(0))?;
    Ok(ApiReply::ok("Count fetched successfully", count))
}

/// A blank or missing keyword lists every blog in the requested order.
async fn search_blogs(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<ApiReply<Vec<Blog>>> {
    let term = params
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let sort = BlogSort::from_param(params.sort.as_deref());

    let conn = state.db.get()?;
    let blogs = query_blogs(&conn, term, sort)?;
    Ok(ApiReply::counted("Search results fetched successfully", blogs))
}

// --- Query helpers ---

fn find_blog(conn: &Connection, id: &str) -> AppResult<Blog> {
    conn.query_row(
        &format!("SELECT {} FROM blogs WHERE id = ?1", Blog::COLUMNS),
        params![id],
        Blog::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("Blog not found".into()))
}

/// `term` filters case-insensitively on title or content.
fn query_blogs(conn: &Connection, term: Option<&str>, sort: BlogSort) -> AppResult<Vec<Blog>> {
    let pattern = term.map(|t| format!("%{}%", escape_like(t)));
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM blogs
         WHERE ?1 IS NULL
            OR title LIKE ?1 ESCAPE '\\'
            OR content LIKE ?1 ESCAPE '\\'
         ORDER BY {}",
        Blog::COLUMNS,
        sort.order_by()
    ))?;
    let blogs = stmt
        .query_map(params![pattern], Blog::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(blogs)
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// --- Tests ---
