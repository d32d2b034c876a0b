use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};

use crate::db::models::Answer;
use crate::error::AppResult;
use crate::extractors::{AppJson, CurrentUser};
use crate::forum::answers::{self, AnswerBody};
use crate::forum::blocking;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/answers/{id}", put(update).delete(remove))
        .route("/answers/{id}/accept", post(accept).delete(revoke))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    AppJson(input): AppJson<AnswerBody>,
) -> AppResult<Json<Answer>> {
    let answer = blocking(&state.db, move |conn| {
        answers::update_answer(conn, &id, &user.id, &input)
    })
    .await?;
    Ok(Json(answer))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    blocking(&state.db, move |conn| answers::delete_answer(conn, &id, &user.id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /answers/{id}/accept: question owner marks the accepted answer
async fn accept(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.ledger.accept_answer(&id, &user.id).await?;
    Ok(Json(serde_json::json!({ "message": "Answer accepted" })))
}

/// DELETE /answers/{id}/accept: question owner withdraws acceptance
async fn revoke(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.ledger.revoke_acceptance(&id, &user.id).await?;
    Ok(Json(serde_json::json!({ "message": "Acceptance removed" })))
}
