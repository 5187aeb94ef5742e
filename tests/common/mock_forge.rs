//! Mock forge client for testing
//!
//! Unlike a response-map mock, this carries a real in-memory object store
//! (commits, trees, references) with an entry-wise three-way merge, so
//! replay runs against honest merge semantics. Call tracking and error
//! injection follow the same pattern as the rest of the test utilities.

#![allow(dead_code)]

use async_trait::async_trait;
use forge_rebase::error::{Error, Result};
use forge_rebase::forge::ForgeClient;
use forge_rebase::types::{
    Commit, CommitId, Identity, MergeOutcome, NewCommit, PullRequest, TreeId,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Call record for `update_reference`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRefCall {
    pub branch: String,
    pub sha: CommitId,
    pub force: bool,
}

/// Call record for `merge_three_way`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub branch: String,
    pub base: CommitId,
    pub head: CommitId,
}

/// In-memory forge state: the object store and references
#[derive(Default)]
struct ForgeState {
    commits: HashMap<CommitId, Commit>,
    trees: HashMap<TreeId, BTreeMap<String, String>>,
    refs: HashMap<String, CommitId>,
    /// PR number to (head_ref, base_ref); shas are resolved at read time
    pulls: HashMap<u64, (String, String)>,
}

impl ForgeState {
    /// All commits reachable from `id`, including `id` itself
    fn ancestors(&self, id: &CommitId) -> HashSet<CommitId> {
        let mut seen = HashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&current) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    /// Commits reachable from `id` but not in `excluded`, oldest first
    fn collect_range(
        &self,
        excluded: &HashSet<CommitId>,
        id: &CommitId,
        visited: &mut HashSet<CommitId>,
        out: &mut Vec<Commit>,
    ) {
        if excluded.contains(id) || !visited.insert(id.clone()) {
            return;
        }
        let Some(commit) = self.commits.get(id).cloned() else {
            return;
        };
        for parent in &commit.parents {
            self.collect_range(excluded, parent, visited, out);
        }
        out.push(commit);
    }

    fn tree_of(&self, commit: &CommitId) -> BTreeMap<String, String> {
        let commit = self.commits.get(commit).expect("commit exists");
        self.trees.get(&commit.tree).expect("tree exists").clone()
    }
}

/// Entry-wise three-way merge; `None` means conflict
fn merge_trees(
    base: &BTreeMap<String, String>,
    ours: &BTreeMap<String, String>,
    theirs: &BTreeMap<String, String>,
) -> Option<BTreeMap<String, String>> {
    let mut paths: HashSet<&String> = HashSet::new();
    paths.extend(base.keys());
    paths.extend(ours.keys());
    paths.extend(theirs.keys());

    let mut merged = BTreeMap::new();
    for path in paths {
        let b = base.get(path);
        let o = ours.get(path);
        let t = theirs.get(path);

        let winner = if o == t {
            o
        } else if o == b {
            t
        } else if t == b {
            o
        } else {
            // Both sides changed the entry to different contents
            return None;
        };
        if let Some(content) = winner {
            merged.insert(path.clone(), content.clone());
        }
    }
    Some(merged)
}

/// Mock forge backed by an in-memory repository
///
/// Features:
/// - Real commit/tree/reference store with three-way merges
/// - Call tracking for verification
/// - Error injection for failure path testing
pub struct MockForge {
    state: Mutex<ForgeState>,
    /// Identity the forge attaches to commits created through the API
    committer: Identity,
    next_object: AtomicU64,
    // Call tracking
    create_commit_calls: Mutex<Vec<NewCommit>>,
    merge_calls: Mutex<Vec<MergeCall>>,
    created_refs: Mutex<Vec<String>>,
    deleted_refs: Mutex<Vec<String>>,
    update_ref_calls: Mutex<Vec<UpdateRefCall>>,
    // Error injection
    error_on_create_commit: Mutex<Option<String>>,
    error_on_merge: Mutex<Option<String>>,
    error_on_update_ref: Mutex<Option<String>>,
}

impl MockForge {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ForgeState::default()),
            committer: Identity {
                name: "forge-bot".to_string(),
                email: "bot@forge.test".to_string(),
                date: None,
            },
            next_object: AtomicU64::new(1),
            create_commit_calls: Mutex::new(Vec::new()),
            merge_calls: Mutex::new(Vec::new()),
            created_refs: Mutex::new(Vec::new()),
            deleted_refs: Mutex::new(Vec::new()),
            update_ref_calls: Mutex::new(Vec::new()),
            error_on_create_commit: Mutex::new(None),
            error_on_merge: Mutex::new(None),
            error_on_update_ref: Mutex::new(None),
        }
    }

    /// The identity this forge attaches as committer to created commits
    pub fn committer(&self) -> &Identity {
        &self.committer
    }

    fn next_sha(&self) -> String {
        format!("{:040x}", self.next_object.fetch_add(1, Ordering::SeqCst))
    }

    // === Fixture methods ===

    /// Store a commit with the given tree entries, bypassing the API
    pub fn seed_commit(
        &self,
        parents: &[&CommitId],
        entries: &[(&str, &str)],
        message: &str,
        author: &Identity,
    ) -> CommitId {
        let tree_id = TreeId::new(self.next_sha());
        let commit_id = CommitId::new(self.next_sha());
        let tree: BTreeMap<String, String> = entries
            .iter()
            .map(|(p, c)| ((*p).to_string(), (*c).to_string()))
            .collect();

        let mut state = self.state.lock().unwrap();
        state.trees.insert(tree_id.clone(), tree);
        state.commits.insert(
            commit_id.clone(),
            Commit {
                id: commit_id.clone(),
                parents: parents.iter().map(|&p| p.clone()).collect(),
                tree: tree_id,
                message: message.to_string(),
                author: author.clone(),
                committer: author.clone(),
            },
        );
        commit_id
    }

    /// Point a branch at a sha, bypassing the API (not call-tracked)
    pub fn set_reference(&self, branch: &str, sha: &CommitId) {
        self.state
            .lock()
            .unwrap()
            .refs
            .insert(branch.to_string(), sha.clone());
    }

    /// Register a pull request; head/base shas resolve from refs at read time
    pub fn add_pull_request(&self, number: u64, head_ref: &str, base_ref: &str) {
        self.state
            .lock()
            .unwrap()
            .pulls
            .insert(number, (head_ref.to_string(), base_ref.to_string()));
    }

    // === Inspection methods ===

    /// Current sha of a branch; panics if missing
    pub fn reference_sha(&self, branch: &str) -> CommitId {
        self.state
            .lock()
            .unwrap()
            .refs
            .get(branch)
            .cloned()
            .unwrap_or_else(|| panic!("reference not found: {branch}"))
    }

    /// Whether a branch currently exists
    pub fn has_reference(&self, branch: &str) -> bool {
        self.state.lock().unwrap().refs.contains_key(branch)
    }

    /// Read a stored commit; panics if missing
    pub fn commit(&self, id: &CommitId) -> Commit {
        self.state
            .lock()
            .unwrap()
            .commits
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("commit not found: {id}"))
    }

    /// Tree entries of a commit, for content assertions
    pub fn tree_of(&self, id: &CommitId) -> BTreeMap<String, String> {
        self.state.lock().unwrap().tree_of(id)
    }

    /// Full first-parent history of a branch, oldest first
    pub fn branch_history(&self, branch: &str) -> Vec<Commit> {
        let state = self.state.lock().unwrap();
        let mut history = Vec::new();
        let mut current = state.refs.get(branch).cloned();
        while let Some(id) = current {
            let commit = state.commits.get(&id).expect("commit exists").clone();
            current = commit.parents.first().cloned();
            history.push(commit);
        }
        history.reverse();
        history
    }

    // === Call verification methods ===

    pub fn create_commit_calls(&self) -> Vec<NewCommit> {
        self.create_commit_calls.lock().unwrap().clone()
    }

    pub fn merge_calls(&self) -> Vec<MergeCall> {
        self.merge_calls.lock().unwrap().clone()
    }

    pub fn created_reference_names(&self) -> Vec<String> {
        self.created_refs.lock().unwrap().clone()
    }

    pub fn deleted_reference_names(&self) -> Vec<String> {
        self.deleted_refs.lock().unwrap().clone()
    }

    pub fn update_reference_calls(&self) -> Vec<UpdateRefCall> {
        self.update_ref_calls.lock().unwrap().clone()
    }

    /// Assert every reference created through the API was also deleted
    pub fn assert_temp_refs_cleaned(&self) {
        let created = self.created_reference_names();
        let deleted = self.deleted_reference_names();
        for branch in &created {
            assert!(
                deleted.contains(branch),
                "temporary reference {branch} was never deleted (deleted: {deleted:?})"
            );
        }
    }

    // === Error injection methods ===

    /// Make `create_commit` return an error
    pub fn fail_create_commit(&self, msg: &str) {
        *self.error_on_create_commit.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `merge_three_way` return an error (not a conflict)
    pub fn fail_merge(&self, msg: &str) {
        *self.error_on_merge.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `update_reference` return an error
    pub fn fail_update_reference(&self, msg: &str) {
        *self.error_on_update_ref.lock().unwrap() = Some(msg.to_string());
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForgeClient for MockForge {
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        let state = self.state.lock().unwrap();
        let (head_ref, base_ref) = state
            .pulls
            .get(&number)
            .cloned()
            .ok_or(Error::PullRequestNotFound(number))?;
        let head_sha = state
            .refs
            .get(&head_ref)
            .cloned()
            .ok_or_else(|| Error::ReferenceNotFound(head_ref.clone()))?;
        let base_sha = state
            .refs
            .get(&base_ref)
            .cloned()
            .ok_or_else(|| Error::ReferenceNotFound(base_ref.clone()))?;
        Ok(PullRequest {
            number,
            head_ref,
            head_sha,
            base_ref,
            base_sha,
        })
    }

    async fn get_reference_sha(&self, branch: &str) -> Result<CommitId> {
        self.state
            .lock()
            .unwrap()
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::ReferenceNotFound(branch.to_string()))
    }

    async fn list_commits_between(
        &self,
        base: &CommitId,
        head: &CommitId,
    ) -> Result<Vec<Commit>> {
        let state = self.state.lock().unwrap();
        let excluded = state.ancestors(base);
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        state.collect_range(&excluded, head, &mut visited, &mut out);
        Ok(out)
    }

    async fn get_commit(&self, id: &CommitId) -> Result<Commit> {
        self.state
            .lock()
            .unwrap()
            .commits
            .get(id)
            .cloned()
            .ok_or_else(|| Error::CommitNotFound(id.clone()))
    }

    async fn create_commit(&self, commit: &NewCommit) -> Result<CommitId> {
        self.create_commit_calls.lock().unwrap().push(commit.clone());

        if let Some(msg) = self.error_on_create_commit.lock().unwrap().as_ref() {
            return Err(Error::Forge(msg.clone()));
        }

        let id = CommitId::new(self.next_sha());
        let mut state = self.state.lock().unwrap();
        if !state.trees.contains_key(&commit.tree) {
            return Err(Error::Forge(format!("unknown tree: {}", commit.tree)));
        }
        state.commits.insert(
            id.clone(),
            Commit {
                id: id.clone(),
                parents: commit.parents.clone(),
                tree: commit.tree.clone(),
                message: commit.message.clone(),
                author: commit.author.clone().unwrap_or_else(|| self.committer.clone()),
                committer: self.committer.clone(),
            },
        );
        Ok(id)
    }

    async fn merge_three_way(
        &self,
        branch: &str,
        base: &CommitId,
        head: &CommitId,
    ) -> Result<MergeOutcome> {
        self.merge_calls.lock().unwrap().push(MergeCall {
            branch: branch.to_string(),
            base: base.clone(),
            head: head.clone(),
        });

        if let Some(msg) = self.error_on_merge.lock().unwrap().as_ref() {
            return Err(Error::Forge(msg.clone()));
        }

        let mut state = self.state.lock().unwrap();
        let ours_sha = state
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::ReferenceNotFound(branch.to_string()))?;
        if !state.commits.contains_key(head) {
            return Err(Error::CommitNotFound(head.clone()));
        }
        if !state.commits.contains_key(base) {
            return Err(Error::CommitNotFound(base.clone()));
        }

        let base_tree = state.tree_of(base);
        let ours_tree = state.tree_of(&ours_sha);
        let theirs_tree = state.tree_of(head);

        let Some(merged) = merge_trees(&base_tree, &ours_tree, &theirs_tree) else {
            return Ok(MergeOutcome::Conflict);
        };

        let tree_id = TreeId::new(self.next_sha());
        let merge_id = CommitId::new(self.next_sha());
        state.trees.insert(tree_id.clone(), merged);
        state.commits.insert(
            merge_id.clone(),
            Commit {
                id: merge_id.clone(),
                parents: vec![ours_sha, head.clone()],
                tree: tree_id,
                message: format!("Merge {head} into {branch}"),
                author: self.committer.clone(),
                committer: self.committer.clone(),
            },
        );
        state.refs.insert(branch.to_string(), merge_id.clone());
        Ok(MergeOutcome::Merged(merge_id))
    }

    async fn create_reference(&self, branch: &str, sha: &CommitId) -> Result<()> {
        self.created_refs.lock().unwrap().push(branch.to_string());

        let mut state = self.state.lock().unwrap();
        if state.refs.contains_key(branch) {
            return Err(Error::Forge(format!("reference already exists: {branch}")));
        }
        if !state.commits.contains_key(sha) {
            return Err(Error::CommitNotFound(sha.clone()));
        }
        state.refs.insert(branch.to_string(), sha.clone());
        Ok(())
    }

    async fn delete_reference(&self, branch: &str) -> Result<()> {
        self.deleted_refs.lock().unwrap().push(branch.to_string());
        self.state
            .lock()
            .unwrap()
            .refs
            .remove(branch)
            .map(|_| ())
            .ok_or_else(|| Error::ReferenceNotFound(branch.to_string()))
    }

    async fn update_reference(&self, branch: &str, sha: &CommitId, force: bool) -> Result<()> {
        self.update_ref_calls.lock().unwrap().push(UpdateRefCall {
            branch: branch.to_string(),
            sha: sha.clone(),
            force,
        });

        if let Some(msg) = self.error_on_update_ref.lock().unwrap().as_ref() {
            return Err(Error::Forge(msg.clone()));
        }

        let mut state = self.state.lock().unwrap();
        let current = state
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::ReferenceNotFound(branch.to_string()))?;
        if !force && !state.ancestors(sha).contains(&current) {
            return Err(Error::Forge(format!("non-fast-forward update of {branch}")));
        }
        state.refs.insert(branch.to_string(), sha.clone());
        Ok(())
    }
}
