// Domain types - pure, no database access
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of content that can receive votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Question,
    Answer,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Question => "question",
            TargetKind::Answer => "answer",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = InvalidVote;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question" => Ok(TargetKind::Question),
            "answer" => Ok(TargetKind::Answer),
            other => Err(InvalidVote::TargetType(other.to_string())),
        }
    }
}

/// An up or down vote. Stored as +1 / -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = InvalidVote;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(InvalidVote::Value(other)),
        }
    }
}

impl Serialize for VoteValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for VoteValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        VoteValue::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Rejected before anything touches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidVote {
    #[error("targetType must be 'question' or 'answer', got '{0}'")]
    TargetType(String),

    #[error("value must be 1 or -1, got {0}")]
    Value(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Created,
    Updated,
    Removed,
}

/// What happened to the caller's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub action: VoteAction,
    /// The vote now on record, `None` after a toggle-off.
    pub value: Option<VoteValue>,
}

/// Row-level change to the vote ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    Insert(VoteValue),
    Delete,
    Update(VoteValue),
}

/// The full effect of one cast: the ledger change plus the amount every
/// denormalized counter moves by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePlan {
    pub change: LedgerChange,
    pub delta: i64,
    pub outcome: VoteOutcome,
}

impl VotePlan {
    /// Decide the transition from the vote already on record (if any) to
    /// the one being cast.
    pub fn decide(existing: Option<VoteValue>, requested: VoteValue) -> Self {
        match existing {
            None => VotePlan {
                change: LedgerChange::Insert(requested),
                delta: requested.as_i64(),
                outcome: VoteOutcome {
                    action: VoteAction::Created,
                    value: Some(requested),
                },
            },
            Some(old) if old == requested => VotePlan {
                change: LedgerChange::Delete,
                delta: -old.as_i64(),
                outcome: VoteOutcome {
                    action: VoteAction::Removed,
                    value: None,
                },
            },
            Some(old) => VotePlan {
                change: LedgerChange::Update(requested),
                delta: requested.as_i64() - old.as_i64(),
                outcome: VoteOutcome {
                    action: VoteAction::Updated,
                    value: Some(requested),
                },
            },
        }
    }
}
