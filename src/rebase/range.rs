//! Commit range resolution - which commits get replayed, and onto what

use crate::error::{Error, Result};
use crate::forge::ForgeClient;
use crate::types::{Commit, CommitId, PullRequest};
use tracing::debug;

/// The resolved commit range of a pull request
#[derive(Debug, Clone)]
pub struct CommitRange {
    /// Commit the rewritten history will sit on: the current base branch tip
    pub base: CommitId,
    /// Feature commits in application order (oldest first)
    pub commits: Vec<Commit>,
    /// Head sha observed at resolution time; the compare-and-swap witness
    /// for the final reference update
    pub witness: CommitId,
}

/// Resolve the commits to replay for a pull request
///
/// The feature commits are those reachable from the head sha but not from
/// the base sha, in the forge's oldest-first order. Only linear histories
/// can be replayed: a commit with anything other than exactly one parent
/// fails with [`Error::UnsupportedHistory`].
pub async fn resolve_commit_range(
    forge: &dyn ForgeClient,
    pr: &PullRequest,
) -> Result<CommitRange> {
    debug!(number = pr.number, head = %pr.head_sha, base = %pr.base_sha, "resolving commit range");
    let commits = forge
        .list_commits_between(&pr.base_sha, &pr.head_sha)
        .await?;

    if let Some(nonlinear) = commits.iter().find(|c| c.parents.len() != 1) {
        return Err(Error::UnsupportedHistory(nonlinear.id.clone()));
    }

    debug!(number = pr.number, count = commits.len(), "resolved commit range");
    Ok(CommitRange {
        base: pr.base_sha.clone(),
        commits,
        witness: pr.head_sha.clone(),
    })
}
