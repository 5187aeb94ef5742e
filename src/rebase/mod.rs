//! Rebase engine for pull requests
//!
//! Three-phase pattern:
//! 1. Resolve - fetch the PR and its commit range (effectful, bounded)
//! 2. Plan - build a `RebasePlan` with autosquash folding (pure, testable)
//! 3. Replay + swap - rewrite history and update the head reference
//!    (effectful)

mod execute;
mod plan;
mod range;

pub use execute::{replay_plan, swap_head};
pub use plan::{PlanStep, RebasePlan, contains_autosquash_directives, plan_replay};
pub use range::{CommitRange, resolve_commit_range};

use crate::error::Result;
use crate::forge::ForgeClient;
use crate::types::CommitId;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Hook invoked after replay completes and before the final
/// compare-and-swap re-read
///
/// Exists so tests can simulate a concurrent push at the race window;
/// production callers never set one.
#[async_trait]
pub trait SwapInterceptor: Send + Sync {
    /// Called once, between the last replayed commit and the head re-read
    async fn on_before_swap(&self);
}

/// Options for a rebase run
pub struct RebaseOptions {
    /// Namespace for transient branches, unique-suffixed per run
    pub temp_namespace: String,
    /// Cooperative cancellation signal, checked between plan steps
    pub cancel: CancellationToken,
    /// Test-only hook fired before the final compare-and-swap
    pub interceptor: Option<Arc<dyn SwapInterceptor>>,
}

impl Default for RebaseOptions {
    fn default() -> Self {
        Self {
            temp_namespace: "temp/rebase".to_string(),
            cancel: CancellationToken::new(),
            interceptor: None,
        }
    }
}

/// Rebase a pull request's head branch onto the current tip of its base
/// branch, folding autosquash directives
///
/// This is a convenience method that delegates to [`rebase_with_options`]
/// with default options: no cancellation, no intercept hook, transient
/// branches under `temp/rebase/`.
pub async fn rebase(pr_number: u64, forge: &dyn ForgeClient) -> Result<CommitId> {
    rebase_with_options(pr_number, forge, &RebaseOptions::default()).await
}

/// Rebase a pull request with explicit options
///
/// Resolves the commit range, plans the replay (interpreting `fixup!` and
/// `squash!` directives), replays each commit on top of the base via
/// server-side three-way merges, and finally swaps the head reference under
/// a compare-and-swap against the head sha observed at the start.
///
/// Returns the new head sha. On any failure the head reference is untouched:
/// replay only ever creates commit objects and transient namespaced
/// branches, and the swap is the single write to a user-visible reference.
pub async fn rebase_with_options(
    pr_number: u64,
    forge: &dyn ForgeClient,
    options: &RebaseOptions,
) -> Result<CommitId> {
    let pr = forge.get_pull_request(pr_number).await?;
    let range = resolve_commit_range(forge, &pr).await?;
    let plan = plan_replay(&range.commits)?;
    debug!(
        pr_number,
        commits = range.commits.len(),
        picks = plan.pick_count(),
        "planned replay"
    );

    let new_head = replay_plan(forge, &plan, &range.base, pr.number, options).await?;

    if let Some(ref interceptor) = options.interceptor {
        interceptor.on_before_swap().await;
    }

    swap_head(forge, &pr.head_ref, &range.witness, new_head).await
}

/// Check whether rebasing the pull request would fold any commits
///
/// `true` iff any commit in the PR's range carries a `fixup!` or `squash!`
/// subject. Reads the PR and its commit range; never writes.
pub async fn needs_autosquashing(pr_number: u64, forge: &dyn ForgeClient) -> Result<bool> {
    let pr = forge.get_pull_request(pr_number).await?;
    let range = resolve_commit_range(forge, &pr).await?;
    let needed = contains_autosquash_directives(&range.commits);
    debug!(pr_number, needed, "checked autosquash directives");
    Ok(needed)
}
