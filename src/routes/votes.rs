use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::state::AppState;
use crate::votes::{LedgerError, TargetKind, VoteLedger, VoteOutcome, VoteValue};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/votes", post(cast))
        .route("/votes/{target_type}/{target_id}", get(tally))
        .route("/votes/{target_type}/{target_id}/user", get(user_vote))
}

/// Raw body; target type and value are checked by hand so bad input is a 400.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CastVoteRequest {
    target_id: String,
    target_type: String,
    value: i64,
}

#[derive(Serialize)]
struct TallyResponse {
    votes: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserVoteResponse {
    user_vote: Option<VoteValue>,
}

async fn cast(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<CastVoteRequest>,
) -> AppResult<Json<VoteOutcome>> {
    let kind: TargetKind = req.target_type.parse()?;
    let value = VoteValue::try_from(req.value)?;
    if req.target_id.trim().is_empty() {
        return Err(AppError::BadRequest("targetId is required".into()));
    }

    let outcome = cast_with_retry(
        state.ledger.as_ref(),
        state.config.votes.conflict_retries,
        &user.id,
        kind,
        &req.target_id,
        value,
    )
    .await?;
    Ok(Json(outcome))
}

async fn tally(
    State(state): State<AppState>,
    Path((target_type, target_id)): Path<(String, String)>,
) -> AppResult<Json<TallyResponse>> {
    let kind: TargetKind = target_type.parse()?;
    let votes = state.ledger.tally(kind, &target_id).await?;
    Ok(Json(TallyResponse { votes }))
}

async fn user_vote(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((target_type, target_id)): Path<(String, String)>,
) -> AppResult<Json<UserVoteResponse>> {
    let kind: TargetKind = target_type.parse()?;
    let user_vote = state.ledger.user_vote(&user.id, kind, &target_id).await?;
    Ok(Json(UserVoteResponse { user_vote }))
}

/// Run a cast, re-running it from scratch when it loses an insert race.
/// The fresh attempt sees the winning row and updates or removes instead.
pub async fn cast_with_retry(
    ledger: &dyn VoteLedger,
    retries: u32,
    user_id: &str,
    kind: TargetKind,
    target_id: &str,
    value: VoteValue,
) -> Result<VoteOutcome, LedgerError> {
    let mut attempt = 0;
    loop {
        match ledger.cast_vote(user_id, kind, target_id, value).await {
            Err(LedgerError::Conflict(msg)) if attempt < retries => {
                attempt += 1;
                tracing::debug!(attempt, target_id, "Vote insert conflicted, retrying: {}", msg);
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::votes::VoteAction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a conflict a fixed number of times, then succeeds.
    struct FlakyLedger {
        conflicts_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyLedger {
        fn new(conflicts: u32) -> Self {
            Self {
                conflicts_left: AtomicU32::new(conflicts),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VoteLedger for FlakyLedger {
        async fn cast_vote(
            &self,
            _user_id: &str,
            _kind: TargetKind,
            _target_id: &str,
            value: VoteValue,
        ) -> Result<VoteOutcome, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.conflicts_left.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts_left.store(left - 1, Ordering::SeqCst);
                return Err(LedgerError::Conflict("duplicate vote".into()));
            }
            Ok(VoteOutcome {
                action: VoteAction::Updated,
                value: Some(value),
            })
        }

        async fn tally(&self, _kind: TargetKind, _target_id: &str) -> Result<i64, LedgerError> {
            Ok(0)
        }

        async fn user_vote(
            &self,
            _user_id: &str,
            _kind: TargetKind,
            _target_id: &str,
        ) -> Result<Option<VoteValue>, LedgerError> {
            Ok(None)
        }

        async fn accept_answer(
            &self,
            _answer_id: &str,
            _requester_id: &str,
        ) -> Result<(), LedgerError> {
            Ok(())
        }

        async fn revoke_acceptance(
            &self,
            _answer_id: &str,
            _requester_id: &str,
        ) -> Result<(), LedgerError> {
            Ok(())
        }

        async fn record_question_view(&self, _question_id: &str) -> Result<i64, LedgerError> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn conflict_is_retried_until_it_succeeds() {
        let ledger = FlakyLedger::new(2);
        let outcome = cast_with_retry(&ledger, 3, "u", TargetKind::Answer, "a", VoteValue::Up)
            .await
            .unwrap();
        assert_eq!(outcome.action, VoteAction::Updated);
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn conflict_surfaces_once_retries_are_spent() {
        let ledger = FlakyLedger::new(5);
        let err = cast_with_retry(&ledger, 2, "u", TargetKind::Answer, "a", VoteValue::Down)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let ledger = FlakyLedger::new(1);
        assert!(cast_with_retry(&ledger, 0, "u", TargetKind::Question, "q", VoteValue::Up)
            .await
            .is_err());
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);
    }
}
