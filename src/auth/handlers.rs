use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{password, session};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::forum::users;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

// -- Handlers --

/// POST /auth/register: create an account and sign in
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<Response> {
    let username = users::validate_username(&req.username)?;
    let email = users::validate_email(&req.email)?;
    users::validate_password(&req.password)?;

    let cost = state.config.auth.bcrypt_cost;
    let plaintext = req.password;
    let password_hash =
        tokio::task::spawn_blocking(move || password::hash_password(&plaintext, cost))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

    let conn = state.db.get()?;
    let user = users::create_user(&conn, &username, &email, &password_hash)?;
    let token = start_session(&state, &conn, &user)?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })).into_response())
}

/// POST /auth/login: exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let conn = state.db.get()?;
    let purged = session::purge_expired(&conn)?;
    if purged > 0 {
        tracing::debug!("Purged {} expired sessions", purged);
    }

    let user = users::find_by_username(&conn, req.username.trim())?
        .ok_or(AppError::Unauthorized)?;

    let hash = user.password_hash.clone();
    let plaintext = req.password;
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        tracing::info!(username = %user.username, "Rejected login");
        return Err(AppError::Unauthorized);
    }

    let token = start_session(&state, &conn, &user)?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse { user, token }))
}

/// POST /auth/logout: end the session behind the bearer token
pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    session::delete_session(&conn, &user.session_token)?;
    tracing::info!(user_id = %user.id, "User logged out");
    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}

/// GET /auth/me
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<User>> {
    let conn = state.db.get()?;
    let user = users::find_by_id(&conn, &user.id)?.ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}

fn start_session(
    state: &AppState,
    conn: &rusqlite::Connection,
    user: &User,
) -> AppResult<String> {
    let new_session = session::create_session(conn, &user.id, state.config.auth.session_hours)?;
    let token = state
        .tokens
        .issue(&user.id, &new_session.token, new_session.expires_at)?;
    Ok(token)
}
