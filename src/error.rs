//! Error types for forge-rebase

use crate::types::CommitId;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the rebase engine can surface
///
/// The first five variants are the engine's own failure modes; the rest are
/// transport and lookup failures passed through from the forge client. In
/// every case the pull request's head reference is left at the sha observed
/// when the operation started.
#[derive(Debug, Error)]
pub enum Error {
    /// The commit range to rebase contains a merge commit
    #[error("cannot rebase: commit {0} is a merge commit")]
    UnsupportedHistory(CommitId),

    /// An autosquash directive has no anchor to fold into
    #[error("autosquash directive has no matching commit: `{subject}`")]
    AutosquashUnresolved {
        /// Subject line of the directive that failed to resolve
        subject: String,
    },

    /// The forge signalled a conflict while replaying a commit
    #[error("merge conflict while replaying commit {commit}")]
    MergeConflict {
        /// The source commit whose replay conflicted
        commit: CommitId,
    },

    /// The head reference moved while the rebase was in flight
    #[error("head reference changed during rebase (expected {expected}, found {actual})")]
    HeadChanged {
        /// Sha observed when the rebase started
        expected: CommitId,
        /// Sha found at swap time
        actual: CommitId,
    },

    /// The cooperative cancellation signal fired between plan items
    #[error("rebase cancelled")]
    Cancelled,

    /// Pull request lookup failed
    #[error("pull request #{0} not found")]
    PullRequestNotFound(u64),

    /// Reference lookup failed
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// Commit lookup failed
    #[error("commit not found: {0}")]
    CommitNotFound(CommitId),

    /// GitHub API error from octocrab
    #[error("GitHub API error: {0}")]
    GitHub(#[from] octocrab::Error),

    /// GitHub API error from a raw HTTP request
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Generic forge client error (used by injected clients and tests)
    #[error("forge error: {0}")]
    Forge(String),
}
