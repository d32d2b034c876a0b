use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::db::models::{Answer, Question};
use crate::error::AppResult;
use crate::extractors::{AppJson, AppQuery, CurrentUser, MaybeUser};
use crate::forum::answers::{self, AnswerBody};
use crate::forum::blocking;
use crate::forum::questions::{self, ListParams, NewQuestion, QuestionUpdate};
use crate::state::AppState;
use crate::votes::{TargetKind, VoteValue};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list).post(create))
        .route("/questions/{id}", get(show).put(update).delete(remove))
        .route("/questions/{id}/answers", get(list_answers).post(create_answer))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionPage {
    questions: Vec<Question>,
    page: u32,
    per_page: u32,
}

async fn list(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> AppResult<Json<QuestionPage>> {
    let (page, per_page) = params.resolve()?;
    let conn = state.db.get()?;
    let questions = questions::list_questions(&conn, &params)?;
    Ok(Json(QuestionPage {
        questions,
        page,
        per_page,
    }))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<NewQuestion>,
) -> AppResult<(StatusCode, Json<Question>)> {
    let author_id = user.id.clone();
    let question = blocking(&state.db, move |conn| {
        questions::create_question(conn, &author_id, &input)
    })
    .await?;
    tracing::info!(question_id = %question.id, author = %user.username, "Question created");
    Ok((StatusCode::CREATED, Json(question)))
}

/// A question as seen by one reader. Signed-in readers also get their own
/// vote, `null` when they have none.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionView {
    #[serde(flatten)]
    question: Question,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_vote: Option<Option<VoteValue>>,
}

/// Viewing a question counts as a view.
async fn show(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<QuestionView>> {
    state.ledger.record_question_view(&id).await?;
    let user_vote = match viewer {
        Some(user) => Some(
            state
                .ledger
                .user_vote(&user.id, TargetKind::Question, &id)
                .await?,
        ),
        None => None,
    };

    let conn = state.db.get()?;
    let question = questions::get_question(&conn, &id)?;
    Ok(Json(QuestionView {
        question,
        user_vote,
    }))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    AppJson(input): AppJson<QuestionUpdate>,
) -> AppResult<Json<Question>> {
    let question = blocking(&state.db, move |conn| {
        questions::update_question(conn, &id, &user.id, &input)
    })
    .await?;
    Ok(Json(question))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    blocking(&state.db, move |conn| {
        questions::delete_question(conn, &id, &user.id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_answers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Answer>>> {
    let conn = state.db.get()?;
    Ok(Json(answers::list_answers(&conn, &id)?))
}

async fn create_answer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    AppJson(input): AppJson<AnswerBody>,
) -> AppResult<(StatusCode, Json<Answer>)> {
    let conn = state.db.get()?;
    let answer = answers::create_answer(&conn, &id, &user.id, &input)?;
    tracing::info!(answer_id = %answer.id, question_id = %id, "Answer created");
    Ok((StatusCode::CREATED, Json(answer)))
}
