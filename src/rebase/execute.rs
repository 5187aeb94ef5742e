//! Replay execution - effectful operations
//!
//! This module contains the effectful code that actually rewrites history.
//! It takes a `RebasePlan` (created by the pure planning functions), replays
//! it against the forge, and swaps the head reference under a
//! compare-and-swap guard.

use crate::error::{Error, Result};
use crate::forge::ForgeClient;
use crate::rebase::RebaseOptions;
use crate::rebase::plan::{PlanStep, RebasePlan};
use crate::types::{Commit, CommitId, Identity, MergeOutcome, NewCommit, TreeId};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Transient branches used to coerce the forge into producing merge trees
///
/// All refs live under a prefix unique to this run, so concurrent rebases of
/// different pull requests in the same repository cannot collide. Every ref
/// is deleted before the next plan step; deletion is best-effort and a leaked
/// ref is harmless.
struct TempRefs<'a> {
    forge: &'a dyn ForgeClient,
    prefix: String,
}

impl<'a> TempRefs<'a> {
    fn new(forge: &'a dyn ForgeClient, namespace: &str, pr_number: u64) -> Self {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        Self {
            forge,
            prefix: format!("{namespace}/{pr_number}/{nonce}"),
        }
    }

    /// Create a branch at `sha` for the given plan step
    async fn branch_at(&self, step_index: usize, sha: &CommitId) -> Result<String> {
        let branch = format!("{}/{step_index}", self.prefix);
        self.forge.create_reference(&branch, sha).await?;
        Ok(branch)
    }

    /// Delete a branch created by [`branch_at`](Self::branch_at)
    async fn remove(&self, branch: &str) {
        if let Err(e) = self.forge.delete_reference(branch).await {
            debug!(branch, error = %e, "failed to delete temporary reference");
        }
    }
}

/// The most recent pick, which fixup/squash steps rewrite in place
///
/// The cursor always equals the pick's id when a directive runs, because
/// directives sit directly behind their anchor in the plan.
struct LastPick {
    parent: CommitId,
    message: String,
    author: Identity,
}

/// Apply `source` on top of `cursor` via a server-side three-way merge and
/// return the resulting tree
///
/// The merge base is `source`'s parent, so only `source`'s own delta lands
/// on the cursor. The temporary branch is deleted before the outcome is
/// inspected, on both success and failure paths.
async fn merge_tree(
    forge: &dyn ForgeClient,
    temps: &TempRefs<'_>,
    step_index: usize,
    cursor: &CommitId,
    source: &Commit,
) -> Result<TreeId> {
    let Some(base) = source.parents.first() else {
        return Err(Error::UnsupportedHistory(source.id.clone()));
    };

    let branch = temps.branch_at(step_index, cursor).await?;
    let outcome = forge.merge_three_way(&branch, base, &source.id).await;
    temps.remove(&branch).await;

    match outcome? {
        MergeOutcome::Merged(merge_id) => Ok(forge.get_commit(&merge_id).await?.tree),
        MergeOutcome::Conflict => Err(Error::MergeConflict {
            commit: source.id.clone(),
        }),
    }
}

/// Replay the plan on top of `base` (EFFECTFUL)
///
/// Walks the plan holding two accumulators: `cursor`, the tip of the
/// rewritten history, and the last pick, which fixup/squash steps replace
/// rather than append to. Each step applies its source commit onto the
/// cursor via a server-side three-way merge and synthesizes a new commit
/// from the resulting tree, preserving the source's author identity.
///
/// Returns the final cursor: the candidate new head. No user-visible
/// reference is touched; on any failure the pull request's branches are
/// exactly as they were.
pub async fn replay_plan(
    forge: &dyn ForgeClient,
    plan: &RebasePlan,
    base: &CommitId,
    pr_number: u64,
    options: &RebaseOptions,
) -> Result<CommitId> {
    let temps = TempRefs::new(forge, &options.temp_namespace, pr_number);
    let mut cursor = base.clone();
    let mut last_pick: Option<LastPick> = None;

    for (index, step) in plan.steps.iter().enumerate() {
        if options.cancel.is_cancelled() {
            debug!(pr_number, index, "cancellation fired between plan steps");
            return Err(Error::Cancelled);
        }
        debug!(pr_number, index, step = %step, "replaying step");

        match step {
            PlanStep::Pick { source, message } => {
                let tree = merge_tree(forge, &temps, index, &cursor, source).await?;
                let new_id = forge
                    .create_commit(&NewCommit {
                        tree,
                        parents: vec![cursor.clone()],
                        message: message.clone(),
                        author: Some(source.author.clone()),
                    })
                    .await?;
                last_pick = Some(LastPick {
                    parent: cursor.clone(),
                    message: message.clone(),
                    author: source.author.clone(),
                });
                cursor = new_id;
            }
            PlanStep::Fixup { source, .. } | PlanStep::Squash { source, .. } => {
                let Some(pick) = last_pick.as_mut() else {
                    return Err(Error::AutosquashUnresolved {
                        subject: source.subject().to_string(),
                    });
                };

                let tree = merge_tree(forge, &temps, index, &cursor, source).await?;
                // A squash carries its folded message on the plan's anchor
                // pick; a fixup keeps the message the pick already has
                let message = match step {
                    PlanStep::Squash { anchor, .. } => match &plan.steps[*anchor] {
                        PlanStep::Pick { message, .. } => message.clone(),
                        _ => {
                            return Err(Error::AutosquashUnresolved {
                                subject: source.subject().to_string(),
                            });
                        }
                    },
                    _ => pick.message.clone(),
                };

                // Replace the pick rather than append: same parent, new tree
                let new_id = forge
                    .create_commit(&NewCommit {
                        tree,
                        parents: vec![pick.parent.clone()],
                        message: message.clone(),
                        author: Some(pick.author.clone()),
                    })
                    .await?;
                pick.message = message;
                cursor = new_id;
            }
        }
    }

    debug!(pr_number, new_head = %cursor, "replay complete");
    Ok(cursor)
}

/// Swap the head reference to the rewritten history (EFFECTFUL)
///
/// Re-reads the head reference and fails with [`Error::HeadChanged`] if it no
/// longer matches the witness observed when the rebase started, then
/// force-updates it to `new_head`. On any failure the head still points at
/// the witness, because nothing before this call wrote to it.
pub async fn swap_head(
    forge: &dyn ForgeClient,
    head_ref: &str,
    witness: &CommitId,
    new_head: CommitId,
) -> Result<CommitId> {
    let current = forge.get_reference_sha(head_ref).await?;
    if current != *witness {
        debug!(head_ref, expected = %witness, actual = %current, "head moved during rebase");
        return Err(Error::HeadChanged {
            expected: witness.clone(),
            actual: current,
        });
    }

    forge.update_reference(head_ref, &new_head, true).await?;
    debug!(head_ref, %new_head, "swapped head reference");
    Ok(new_head)
}
