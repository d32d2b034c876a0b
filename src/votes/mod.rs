pub mod domain;
pub mod ledger;
pub mod target;

pub use domain::{InvalidVote, TargetKind, VoteAction, VoteOutcome, VotePlan, VoteValue};
pub use ledger::{DynVoteLedger, LedgerError, SqliteVoteLedger, VoteLedger};
pub use target::Votable;
