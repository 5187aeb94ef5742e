//! Core types for forge-rebase

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit id: the forge's opaque 40-hex content hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Wrap a sha received from the forge
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    /// The raw hex string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CommitId {
    fn from(sha: String) -> Self {
        Self(sha)
    }
}

impl From<&str> for CommitId {
    fn from(sha: &str) -> Self {
        Self(sha.to_string())
    }
}

/// A tree id assigned by the forge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(String);

impl TreeId {
    /// Wrap a tree sha received from the forge
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    /// The raw hex string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TreeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author or committer identity attached to a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Timestamp, if the forge reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// A commit as read from the forge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit id
    pub id: CommitId,
    /// Parent commit ids (one for the linear histories this crate rebases)
    pub parents: Vec<CommitId>,
    /// Root tree id
    pub tree: TreeId,
    /// Full commit message (subject, blank line, body)
    pub message: String,
    /// Author identity
    pub author: Identity,
    /// Committer identity
    pub committer: Identity,
}

impl Commit {
    /// First line of the commit message
    #[must_use]
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    /// Whether this commit has more than one parent
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// Payload for creating a commit via the forge
///
/// A `None` author lets the forge attach the authenticated identity. The
/// committer is always whatever identity the forge attaches to commits
/// created through its API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCommit {
    /// Root tree of the new commit
    pub tree: TreeId,
    /// Parent commit ids
    pub parents: Vec<CommitId>,
    /// Full commit message
    pub message: String,
    /// Author identity to record, or `None` for the caller's identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Identity>,
}

/// A pull request as read from the forge
///
/// Read-only input to the engine. The shas are the forge's current values at
/// the moment the record was fetched; `head_sha` becomes the compare-and-swap
/// witness for the final reference update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Head (feature) branch name
    pub head_ref: String,
    /// Current head branch tip
    pub head_sha: CommitId,
    /// Base branch name
    pub base_ref: String,
    /// Current base branch tip
    pub base_sha: CommitId,
}

/// Outcome of a server-side three-way merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The forge produced a merge commit
    Merged(CommitId),
    /// The forge signalled a merge conflict
    Conflict,
}

impl MergeOutcome {
    /// Whether the merge conflicted
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Forge configuration: which repository the client talks to
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}
