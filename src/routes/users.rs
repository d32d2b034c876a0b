use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::db::models::PublicProfile;
use crate::error::{AppError, AppResult};
use crate::forum::users;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/users/{id}", get(profile))
}

async fn profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PublicProfile>> {
    let conn = state.db.get()?;
    let user = users::find_by_id(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(user.profile()))
}
