//! Server-side pull request rebase through the forge HTTP API
//!
//! Rewrites a pull request's head branch so it appears to have been branched
//! from the current tip of its base branch, reproducing `git rebase
//! --autosquash` entirely through remote object creation and reference
//! updates - no local working copy, no `git` binary.
//!
//! The engine consumes a [`ForgeClient`](forge::ForgeClient), replays the
//! PR's commits one by one on top of the base via server-side three-way
//! merges, folds `fixup!`/`squash!` commits into their anchors, and swaps
//! the head reference under a compare-and-swap guard. If anything fails -
//! merge conflict, concurrent push, cancellation - the head reference is
//! left exactly where it was.
//!
//! # Example
//!
//! ```no_run
//! use forge_rebase::forge::GitHubForge;
//!
//! # async fn run() -> forge_rebase::Result<()> {
//! let forge = GitHubForge::new("token", "owner".into(), "repo".into(), None)?;
//!
//! if forge_rebase::needs_autosquashing(1337, &forge).await? {
//!     let new_head = forge_rebase::rebase(1337, &forge).await?;
//!     println!("rebased to {new_head}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod forge;
pub mod rebase;
pub mod types;

pub use error::{Error, Result};
pub use rebase::{
    RebaseOptions, SwapInterceptor, needs_autosquashing, rebase, rebase_with_options,
};
