use axum::extract::State;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::auth::{password, session};
use crate::db::models::User;
use crate::db::new_id;
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::response::ApiReply;
use crate::state::AppState;

// -- Request/Response types --

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Validated registration fields.
#[derive(Debug, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(self) -> AppResult<Registration> {
        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        let email = normalize_email(self.email.as_deref().unwrap_or_default());
        let password = self.password.unwrap_or_default();

        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "Name, email, and password are required".into(),
            ));
        }
        if !email.contains('@') {
            return Err(AppError::BadRequest("Email address is invalid".into()));
        }
        if password.chars().count() < password::MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                password::MIN_PASSWORD_LEN
            )));
        }

        Ok(Registration {
            name,
            email,
            password,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// -- Handlers --

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<ApiReply<User>> {
    let reg = req.validate()?;

    {
        let conn = state.db.get()?;
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
            params![reg.email],
            |r| r.get(0),
        )?;
        if taken {
            return Err(AppError::BadRequest("Email is already registered".into()));
        }
    }

    let password_hash = password::hash(reg.password, state.config.auth.password_cost).await?;

    let conn = state.db.get()?;
    let id = new_id();
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![id, reg.name, reg.email, password_hash],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest("Email is already registered".into())
        } else {
            AppError::Database(e)
        }
    })?;

    let user = conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![id],
        User::from_row,
    )?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(ApiReply::created("User registered successfully", user))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<ApiReply<LoginResponse>> {
    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let password = req.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".into()));
    }

    let found = {
        let conn = state.db.get()?;
        conn.query_row(
            &format!(
                "SELECT {}, password_hash FROM users WHERE email = ?1",
                User::COLUMNS
            ),
            params![email],
            |row| Ok((User::from_row(row)?, row.get::<_, String>(5)?)),
        )
        .optional()?
    };

    // Same response for unknown email and wrong password.
    let (user, hash) = found.ok_or(AppError::Unauthorized)?;
    if !password::verify(password, hash).await {
        tracing::info!(email = %email, "Failed login attempt");
        return Err(AppError::Unauthorized);
    }

    let conn = state.db.get()?;
    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(ApiReply::ok("Login successful", LoginResponse { token, user }))
}

/// POST /api/v1/auth/logout
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<ApiReply<()>> {
    let conn = state.db.get()?;
    session::delete_session(&conn, &user.token)?;
    Ok(ApiReply::message("Logged out successfully"))
}

/// GET /api/v1/auth/me
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<ApiReply<User>> {
    let conn = state.db.get()?;
    let me = conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![user.id],
        User::from_row,
    )?;
    Ok(ApiReply::ok("User fetched successfully", me))
}
