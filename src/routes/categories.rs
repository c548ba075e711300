use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::auth::handlers::is_unique_violation;
use crate::db::models::Category;
use crate::db::{new_id, timestamp};
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, ApiJson};
use crate::response::ApiReply;
use crate::state::AppState;

pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

// --- Request types ---

#[derive(Debug, Default, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ValidCategory {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image: String,
}

impl CategoryInput {
    /// `current_image` is the stored image on update; a new category must
    /// bring its own.
    pub fn validate(self, current_image: Option<String>) -> AppResult<ValidCategory> {
        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        if name.chars().count() < MIN_NAME_CHARS {
            return Err(AppError::BadRequest(format!(
                "Category name must be at least {} characters",
                MIN_NAME_CHARS
            )));
        }

        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(AppError::BadRequest(
                "Category name must contain letters or digits".into(),
            ));
        }

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(AppError::BadRequest(format!(
                "Description cannot exceed {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }

        let image = self
            .image
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .or(current_image)
            .ok_or_else(|| AppError::BadRequest("Category image is required".into()))?;

        Ok(ValidCategory {
            name,
            slug,
            description,
            image,
        })
    }
}

/// Lowercase alphanumeric runs joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/count", get(count_categories))
        .route(
            "/categories/{slug}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}

// --- Handlers ---

async fn create_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(input): ApiJson<CategoryInput>,
) -> AppResult<ApiReply<Category>> {
    let category = input.validate(None)?;

    let conn = state.db.get()?;
    let id = new_id();
    let now = timestamp();
    conn.execute(
        "INSERT INTO categories (id, name, slug, description, image, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            id,
            category.name,
            category.slug,
            category.description,
            category.image,
            now
        ],
    )
    .map_err(duplicate_slug)?;

    let created = find_category(&conn, &category.slug)?;
    tracing::info!(slug = %created.slug, by = %admin.id, "Category created");
    Ok(ApiReply::created("Category created successfully", created))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<ApiReply<Vec<Category>>> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories ORDER BY created_at DESC, id DESC",
        Category::COLUMNS
    ))?;
    let categories = stmt
        .query_map([], Category::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ApiReply::ok("Categories fetched successfully", categories))
}

async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<ApiReply<Category>> {
    let conn = state.db.get()?;
    let category = find_category(&conn, &slug)?;
    Ok(ApiReply::ok("Category fetched successfully", category))
}

/// Renaming moves the category to the new name's slug.
async fn update_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(slug): Path<String>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> AppResult<ApiReply<Category>> {
    let conn = state.db.get()?;
    let existing = find_category(&conn, &slug)?;
    let category = input.validate(Some(existing.image))?;

    conn.execute(
        "UPDATE categories
         SET name = ?2, slug = ?3, description = ?4, image = ?5, updated_at = ?6
         WHERE id = ?1",
        params![
            existing.id,
            category.name,
            category.slug,
            category.description,
            category.image,
            timestamp()
        ],
    )
    .map_err(duplicate_slug)?;

    let updated = find_category(&conn, &category.slug)?;
    tracing::info!(slug = %updated.slug, by = %admin.id, "Category updated");
    Ok(ApiReply::ok("Category updated successfully", updated))
}

async fn delete_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(slug): Path<String>,
) -> AppResult<ApiReply<Category>> {
    let conn = state.db.get()?;
    let category = find_category(&conn, &slug)?;
    conn.execute("DELETE FROM categories WHERE id = ?1", params![category.id])?;

    tracing::info!(slug = %slug, by = %admin.id, "Category deleted");
    Ok(ApiReply::ok("Category deleted successfully", category))
}

async fn count_categories(State(state): State<AppState>) -> AppResult<ApiReply<i64>> {
    let conn = state.db.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
    Ok(ApiReply::ok("Count fetched successfully", count))
}

// --- Query helpers ---

fn find_category(conn: &Connection, slug: &str) -> AppResult<Category> {
    conn.query_row(
        &format!("SELECT {} FROM categories WHERE slug = ?1", Category::COLUMNS),
        params![slug],
        Category::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("Category not found".into()))
}

fn duplicate_slug(err: rusqlite::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::BadRequest("A category with this name already exists".into())
    } else {
        AppError::Database(err)
    }
}

// --- Tests ---
