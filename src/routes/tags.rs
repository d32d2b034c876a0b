use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::db::models::Tag;
use crate::error::AppResult;
use crate::forum::tags;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/tags", get(list))
}

async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Tag>>> {
    let conn = state.db.get()?;
    Ok(Json(tags::list_tags(&conn)?))
}
