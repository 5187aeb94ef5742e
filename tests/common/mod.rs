//! Shared test fixtures

#![allow(dead_code)]

mod mock_forge;

pub use mock_forge::{MergeCall, MockForge, UpdateRefCall};

use forge_rebase::types::{Commit, CommitId, Identity, TreeId};

/// An author identity for fixtures
pub fn author(name: &str) -> Identity {
    Identity {
        name: name.to_string(),
        email: format!("{name}@example.com"),
        date: None,
    }
}

/// A standalone commit for pure planner tests (no forge behind it)
pub fn message_commit(n: u64, message: &str) -> Commit {
    Commit {
        id: CommitId::new(format!("{n:040x}")),
        parents: if n == 0 {
            vec![]
        } else {
            vec![CommitId::new(format!("{:040x}", n - 1))]
        },
        tree: TreeId::new(format!("{n:040x}{n:x}")),
        message: message.to_string(),
        author: author("alice"),
        committer: author("alice"),
    }
}

/// Commit on top of a branch's current tip and advance the branch
pub fn commit_on(
    forge: &MockForge,
    branch: &str,
    entries: &[(&str, &str)],
    message: &str,
    author_name: &str,
) -> CommitId {
    let parent = forge.reference_sha(branch);
    let id = forge.seed_commit(&[&parent], entries, message, &author(author_name));
    forge.set_reference(branch, &id);
    id
}
