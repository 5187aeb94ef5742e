//! Forge client for the Git data API
//!
//! Provides the capability set the rebase engine consumes: reference
//! read/update, commit read/create, server-side three-way merge, and
//! pull-request metadata.

mod github;

pub use github::GitHubForge;

use crate::error::Result;
use crate::types::{Commit, CommitId, MergeOutcome, NewCommit, PullRequest};
use async_trait::async_trait;

/// Forge client trait for remote Git object and reference operations
///
/// This trait abstracts the forge's HTTP data API. Any transport providing
/// these operations can drive a rebase; tests supply an in-memory
/// implementation. The engine issues calls strictly sequentially and never
/// writes to a user-visible reference except through [`update_reference`]
/// during the final swap.
///
/// [`update_reference`]: Self::update_reference
#[async_trait]
pub trait ForgeClient: Send + Sync {
    /// Fetch a pull request with its current head and base shas
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest>;

    /// Read the sha a branch currently points at
    async fn get_reference_sha(&self, branch: &str) -> Result<CommitId>;

    /// List the commits reachable from `head` but not from `base`
    ///
    /// Ordered oldest first, excluding `base` itself.
    async fn list_commits_between(&self, base: &CommitId, head: &CommitId)
    -> Result<Vec<Commit>>;

    /// Read a single commit
    async fn get_commit(&self, id: &CommitId) -> Result<Commit>;

    /// Create a commit object and return its id
    async fn create_commit(&self, commit: &NewCommit) -> Result<CommitId>;

    /// Three-way merge `head` into `branch` with an explicit merge base
    ///
    /// Combines the branch tip and `head` with respect to `base`, so only
    /// the `base..head` delta lands on the branch. Returns the merge commit
    /// id, or [`MergeOutcome::Conflict`] when the forge reports a merge
    /// conflict. Conflicts are a distinguished outcome, not an error: the
    /// engine turns them into
    /// [`Error::MergeConflict`](crate::error::Error::MergeConflict) with the
    /// offending source commit attached.
    async fn merge_three_way(
        &self,
        branch: &str,
        base: &CommitId,
        head: &CommitId,
    ) -> Result<MergeOutcome>;

    /// Create a branch pointing at `sha`
    async fn create_reference(&self, branch: &str, sha: &CommitId) -> Result<()>;

    /// Delete a branch
    async fn delete_reference(&self, branch: &str) -> Result<()>;

    /// Point `branch` at `sha`
    ///
    /// A non-force update succeeds only if the new sha fast-forwards the
    /// current tip.
    async fn update_reference(&self, branch: &str, sha: &CommitId, force: bool) -> Result<()>;
}
