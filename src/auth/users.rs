// Administrator user management and account bootstrap.

use axum::extract::{Path, State};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::auth::handlers::normalize_email;
use crate::db::models::User;
use crate::db::new_id;
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, ApiJson};
use crate::response::ApiReply;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

fn find_user(conn: &Connection, id: &str) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Insert or promote an administrator. Used by the `create-admin` command.
pub fn upsert_admin(
    conn: &Connection,
    email: &str,
    name: &str,
    password_hash: &str,
) -> rusqlite::Result<User> {
    let email = normalize_email(email);
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, is_admin)
         VALUES (?1, ?2, ?3, ?4, 1)
         ON CONFLICT(email) DO UPDATE SET
           name = excluded.name,
           password_hash = excluded.password_hash,
           is_admin = 1",
        params![new_id(), name, email, password_hash],
    )?;

    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?1", User::COLUMNS),
        params![email],
        User::from_row,
    )
}

/// GET /api/v1/auth/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<ApiReply<Vec<User>>> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC",
        User::COLUMNS
    ))?;
    let users = stmt
        .query_map([], User::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ApiReply::ok("Users fetched successfully", users))
}

/// GET /api/v1/auth/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<ApiReply<User>> {
    let conn = state.db.get()?;
    let user = find_user(&conn, &id)?;
    Ok(ApiReply::ok("User fetched successfully", user))
}

/// PUT /api/v1/auth/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> AppResult<ApiReply<User>> {
    let name = req.name.map(|n| n.trim().to_string());
    if matches!(name.as_deref(), Some("")) {
        return Err(AppError::BadRequest("Name cannot be empty".into()));
    }
    if id == admin.id && req.is_admin == Some(false) {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin role".into(),
        ));
    }

    let conn = state.db.get()?;
    let rows = conn.execute(
        "UPDATE users SET
           name = COALESCE(?2, name),
           is_admin = COALESCE(?3, is_admin)
         WHERE id = ?1",
        params![id, name, req.is_admin],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }

    let user = find_user(&conn, &id)?;
    tracing::info!(user_id = %user.id, by = %admin.id, "User updated");
    Ok(ApiReply::ok("User updated successfully", user))
}

/// DELETE /api/v1/auth/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<ApiReply<User>> {
    if id == admin.id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }

    let conn = state.db.get()?;
    let user = find_user(&conn, &id)?;
    conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;

    tracing::info!(user_id = %user.id, by = %admin.id, "User deleted");
    Ok(ApiReply::ok("User deleted successfully", user))
}

/// GET /api/v1/auth/count-users
pub async fn count_users(State(state): State<AppState>) -> AppResult<ApiReply<i64>> {
    let conn = state.db.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    Ok(ApiReply::ok("Count fetched successfully", count))
}
