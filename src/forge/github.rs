//! GitHub forge client implementation

use crate::error::{Error, Result};
use crate::forge::ForgeClient;
use crate::types::{
    Commit, CommitId, ForgeConfig, Identity, MergeOutcome, NewCommit, PullRequest, TreeId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

// Response types for the git data API

#[derive(Deserialize)]
struct GitRef {
    object: GitRefObject,
}

#[derive(Deserialize)]
struct GitRefObject {
    sha: String,
}

#[derive(Deserialize)]
struct GitIdentity {
    name: String,
    email: String,
    date: Option<DateTime<Utc>>,
}

impl From<GitIdentity> for Identity {
    fn from(id: GitIdentity) -> Self {
        Self {
            name: id.name,
            email: id.email,
            date: id.date,
        }
    }
}

#[derive(Deserialize)]
struct ShaRef {
    sha: String,
}

/// Commit object as returned by `/git/commits/{sha}`
#[derive(Deserialize)]
struct GitCommit {
    sha: String,
    parents: Vec<ShaRef>,
    tree: ShaRef,
    message: String,
    author: GitIdentity,
    committer: GitIdentity,
}

impl From<GitCommit> for Commit {
    fn from(c: GitCommit) -> Self {
        Self {
            id: CommitId::new(c.sha),
            parents: c.parents.into_iter().map(|p| CommitId::new(p.sha)).collect(),
            tree: TreeId::new(c.tree.sha),
            message: c.message,
            author: c.author.into(),
            committer: c.committer.into(),
        }
    }
}

/// Commit entry as returned by the compare API (nests the git commit)
#[derive(Deserialize)]
struct RepoCommit {
    sha: String,
    parents: Vec<ShaRef>,
    commit: RepoCommitDetails,
}

#[derive(Deserialize)]
struct RepoCommitDetails {
    message: String,
    tree: ShaRef,
    author: GitIdentity,
    committer: GitIdentity,
}

impl From<RepoCommit> for Commit {
    fn from(c: RepoCommit) -> Self {
        Self {
            id: CommitId::new(c.sha),
            parents: c.parents.into_iter().map(|p| CommitId::new(p.sha)).collect(),
            tree: TreeId::new(c.commit.tree.sha),
            message: c.commit.message,
            author: c.commit.author.into(),
            committer: c.commit.committer.into(),
        }
    }
}

#[derive(Deserialize)]
struct CompareResponse {
    commits: Vec<RepoCommit>,
}

/// GitHub forge using octocrab for the pull-request API and raw HTTP for the
/// git data API (references, commit objects, server-side merges), which
/// octocrab does not cover
pub struct GitHubForge {
    client: Octocrab,
    config: ForgeConfig,
    /// Token for raw HTTP requests
    token: String,
    /// HTTP client for raw requests
    http_client: Client,
    /// API host for raw requests
    api_host: String,
}

impl GitHubForge {
    /// Create a new GitHub forge client
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        let api_host = if let Some(ref h) = host {
            let base_url = format!("https://{h}/api/v3");
            builder = builder
                .base_uri(&base_url)
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
            format!("{h}/api/v3")
        } else {
            "api.github.com".to_string()
        };

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("forge-rebase")
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: ForgeConfig { owner, repo, host },
            token: token.to_string(),
            http_client,
            api_host,
        })
    }

    /// The forge configuration
    #[must_use]
    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Build a raw request against the repository, with auth and API headers
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "https://{}/repos/{}/{}{path}",
            self.api_host, self.config.owner, self.config.repo
        );
        self.http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

/// Read an error message out of a non-success response body
async fn error_body(response: reqwest::Response) -> String {
    #[derive(Deserialize)]
    struct ApiError {
        message: String,
    }

    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(body) => format!("{status}: {}", body.message),
        Err(_) => status.to_string(),
    }
}

#[async_trait]
impl ForgeClient for GitHubForge {
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        debug!(number, "fetching pull request");
        let pr = match self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(number)
            .await
        {
            Ok(pr) => pr,
            Err(octocrab::Error::GitHub { source, .. })
                if source.status_code.as_u16() == 404 =>
            {
                return Err(Error::PullRequestNotFound(number));
            }
            Err(e) => return Err(e.into()),
        };

        let result = PullRequest {
            number: pr.number,
            head_ref: pr.head.ref_field.clone(),
            head_sha: CommitId::new(pr.head.sha.clone()),
            base_ref: pr.base.ref_field.clone(),
            base_sha: CommitId::new(pr.base.sha.clone()),
        };
        debug!(number, head = %result.head_sha, base = %result.base_sha, "fetched pull request");
        Ok(result)
    }

    async fn get_reference_sha(&self, branch: &str) -> Result<CommitId> {
        debug!(branch, "reading reference");
        let response = self
            .request(Method::GET, &format!("/git/ref/heads/{branch}"))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch reference: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::ReferenceNotFound(branch.to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::GitHubApi(error_body(response).await));
        }

        let git_ref: GitRef = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse reference: {e}")))?;
        Ok(CommitId::new(git_ref.object.sha))
    }

    async fn list_commits_between(
        &self,
        base: &CommitId,
        head: &CommitId,
    ) -> Result<Vec<Commit>> {
        debug!(%base, %head, "comparing commits");
        let response = self
            .request(Method::GET, &format!("/compare/{base}...{head}"))
            .query(&[("per_page", "250")])
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to compare commits: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::GitHubApi(error_body(response).await));
        }

        let compare: CompareResponse = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse comparison: {e}")))?;

        let commits: Vec<Commit> = compare.commits.into_iter().map(Commit::from).collect();
        debug!(count = commits.len(), "compared commits");
        Ok(commits)
    }

    async fn get_commit(&self, id: &CommitId) -> Result<Commit> {
        debug!(%id, "reading commit");
        let response = self
            .request(Method::GET, &format!("/git/commits/{id}"))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch commit: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::CommitNotFound(id.clone()));
        }
        if !response.status().is_success() {
            return Err(Error::GitHubApi(error_body(response).await));
        }

        let commit: GitCommit = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse commit: {e}")))?;
        Ok(commit.into())
    }

    async fn create_commit(&self, commit: &NewCommit) -> Result<CommitId> {
        debug!(tree = %commit.tree, parents = commit.parents.len(), "creating commit");

        let mut body = serde_json::json!({
            "message": commit.message,
            "tree": commit.tree.as_str(),
            "parents": commit.parents.iter().map(CommitId::as_str).collect::<Vec<_>>(),
        });
        if let Some(ref author) = commit.author {
            let mut identity = serde_json::json!({
                "name": author.name,
                "email": author.email,
            });
            if let Some(date) = author.date {
                identity["date"] = serde_json::Value::String(date.to_rfc3339());
            }
            body["author"] = identity;
        }

        let response = self
            .request(Method::POST, "/git/commits")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to create commit: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::GitHubApi(error_body(response).await));
        }

        let created: ShaRef = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse created commit: {e}")))?;
        debug!(sha = %created.sha, "created commit");
        Ok(CommitId::new(created.sha))
    }

    async fn merge_three_way(
        &self,
        branch: &str,
        base: &CommitId,
        head: &CommitId,
    ) -> Result<MergeOutcome> {
        debug!(branch, %base, %head, "three-way merging into branch");

        // The merges endpoint picks the merge base itself, so pin it: point
        // the branch at a sibling commit carrying the tip's tree but
        // parented on `base`. The common ancestor of that sibling and
        // `head` is then exactly `base`.
        let tip = self.get_reference_sha(branch).await?;
        let tip_tree = self.get_commit(&tip).await?.tree;
        let sibling = self
            .create_commit(&NewCommit {
                tree: tip_tree,
                parents: vec![base.clone()],
                message: format!("three-way merge base {base}"),
                author: None,
            })
            .await?;
        self.update_reference(branch, &sibling, true).await?;

        let response = self
            .request(Method::POST, "/merges")
            .json(&serde_json::json!({
                "base": branch,
                "head": head.as_str(),
            }))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to merge: {e}")))?;

        match response.status() {
            StatusCode::CREATED => {
                let merged: ShaRef = response
                    .json()
                    .await
                    .map_err(|e| Error::GitHubApi(format!("Failed to parse merge result: {e}")))?;
                debug!(sha = %merged.sha, "merged");
                Ok(MergeOutcome::Merged(CommitId::new(merged.sha)))
            }
            StatusCode::CONFLICT => {
                debug!(branch, %head, "merge conflict");
                Ok(MergeOutcome::Conflict)
            }
            // 204: head is already contained in the branch, so there is no
            // merge commit to read a tree from
            StatusCode::NO_CONTENT => Err(Error::GitHubApi(format!(
                "merge of {head} into {branch} produced no commit"
            ))),
            _ => Err(Error::GitHubApi(error_body(response).await)),
        }
    }

    async fn create_reference(&self, branch: &str, sha: &CommitId) -> Result<()> {
        debug!(branch, %sha, "creating reference");
        let response = self
            .request(Method::POST, "/git/refs")
            .json(&serde_json::json!({
                "ref": format!("refs/heads/{branch}"),
                "sha": sha.as_str(),
            }))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to create reference: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::GitHubApi(error_body(response).await));
        }
        Ok(())
    }

    async fn delete_reference(&self, branch: &str) -> Result<()> {
        debug!(branch, "deleting reference");
        let response = self
            .request(Method::DELETE, &format!("/git/refs/heads/{branch}"))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to delete reference: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::GitHubApi(error_body(response).await));
        }
        Ok(())
    }

    async fn update_reference(&self, branch: &str, sha: &CommitId, force: bool) -> Result<()> {
        debug!(branch, %sha, force, "updating reference");
        let response = self
            .request(Method::PATCH, &format!("/git/refs/heads/{branch}"))
            .json(&serde_json::json!({
                "sha": sha.as_str(),
                "force": force,
            }))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to update reference: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::GitHubApi(error_body(response).await));
        }
        debug!(branch, %sha, "updated reference");
        Ok(())
    }
}
