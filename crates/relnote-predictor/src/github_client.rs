//! GitHub API client for issue labels and comments.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::config::DEFAULT_GITHUB_API_URL;
use crate::error::GitHubError;

/// Page size for list endpoints, the maximum GitHub allows.
const PER_PAGE: usize = 100;

/// The issue or pull request a delivery refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconciliationTarget {
    /// Repository owner (organization or user)
    pub org: String,
    /// Repository name
    pub repo: String,
    /// Issue or pull request number
    pub number: u64,
}

impl ReconciliationTarget {
    #[must_use]
    pub fn new(org: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for ReconciliationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.number)
    }
}

/// GitHub user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User login
    pub login: String,
}

/// GitHub label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name
    pub name: String,
}

/// GitHub issue comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    /// Comment ID
    pub id: u64,
    /// Comment body (markdown)
    #[serde(default)]
    pub body: String,
    /// Comment author
    pub user: User,
}

/// Label and comment operations on issues and pull requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Labels currently on the target.
    async fn get_labels(&self, target: &ReconciliationTarget) -> Result<Vec<Label>, GitHubError>;

    /// Add a label to the target.
    async fn add_label(&self, target: &ReconciliationTarget, label: &str)
        -> Result<(), GitHubError>;

    /// Remove a label from the target.
    async fn remove_label(
        &self,
        target: &ReconciliationTarget,
        label: &str,
    ) -> Result<(), GitHubError>;

    /// The account this client acts as.
    async fn bot_user(&self) -> Result<User, GitHubError>;

    /// All comments on the target, oldest first.
    async fn list_comments(
        &self,
        target: &ReconciliationTarget,
    ) -> Result<Vec<IssueComment>, GitHubError>;

    /// Create a comment and return its ID.
    async fn create_comment(
        &self,
        target: &ReconciliationTarget,
        body: &str,
    ) -> Result<u64, GitHubError>;

    /// Replace the body of an existing comment.
    async fn edit_comment(
        &self,
        target: &ReconciliationTarget,
        id: u64,
        body: &str,
    ) -> Result<(), GitHubError>;

    /// Delete a comment.
    async fn delete_comment(&self, target: &ReconciliationTarget, id: u64)
        -> Result<(), GitHubError>;
}

#[derive(Debug, Serialize)]
struct AddLabelsRequest<'a> {
    labels: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedComment {
    id: u64,
}

/// GitHub REST client.
///
/// In dry-run mode reads go to the API while mutations are only logged.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
    dry_run: bool,
    bot: OnceCell<User>,
}

impl GitHubClient {
    /// Create a new GitHub client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token: &str) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("relnote-predictor/1.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: DEFAULT_GITHUB_API_URL.to_string(),
            token: token.trim().to_string(),
            dry_run: false,
            bot: OnceCell::new(),
        })
    }

    /// Point the client at another API root (GitHub Enterprise, tests).
    #[must_use]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Skip mutations and only log them.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn issue_url(&self, target: &ReconciliationTarget, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/{suffix}",
            self.api_base, target.org, target.repo, target.number
        )
    }

    fn comment_url(&self, target: &ReconciliationTarget, id: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/comments/{id}",
            self.api_base, target.org, target.repo
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GitHubError> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(GitHubError::Api { status, message })
    }

    /// Fetch every page of a list endpoint, stopping at the first short page.
    async fn get_all_pages<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, GitHubError> {
        let per_page = PER_PAGE.to_string();
        let mut items = Vec::new();
        let mut page = 1_u32;

        loop {
            let page_param = page.to_string();
            let request = self
                .client
                .get(url)
                .query(&[("per_page", per_page.as_str()), ("page", page_param.as_str())]);
            let chunk: Vec<T> = Self::decode(self.send(request).await?).await?;
            let chunk_len = chunk.len();
            items.extend(chunk);
            if chunk_len < PER_PAGE {
                break;
            }
            page = page.saturating_add(1);
        }

        Ok(items)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GitHubError> {
        response
            .json()
            .await
            .map_err(|e| GitHubError::Decode(e.to_string()))
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    #[instrument(skip(self), fields(target = %target))]
    async fn get_labels(&self, target: &ReconciliationTarget) -> Result<Vec<Label>, GitHubError> {
        let labels: Vec<Label> = self.get_all_pages(&self.issue_url(target, "labels")).await?;

        debug!(count = labels.len(), "Retrieved labels");
        Ok(labels)
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn add_label(
        &self,
        target: &ReconciliationTarget,
        label: &str,
    ) -> Result<(), GitHubError> {
        if self.dry_run {
            info!(label = %label, "Dry run: not adding label");
            return Ok(());
        }

        let url = self.issue_url(target, "labels");
        self.send(self.client.post(&url).json(&AddLabelsRequest { labels: [label] }))
            .await?;

        info!(label = %label, "Added label");
        Ok(())
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn remove_label(
        &self,
        target: &ReconciliationTarget,
        label: &str,
    ) -> Result<(), GitHubError> {
        if self.dry_run {
            info!(label = %label, "Dry run: not removing label");
            return Ok(());
        }

        let url = self.issue_url(target, &format!("labels/{}", urlencoding::encode(label)));
        match self.send(self.client.delete(&url)).await {
            Ok(_) => {
                info!(label = %label, "Removed label");
                Ok(())
            }
            Err(GitHubError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                // Label doesn't exist, which is fine for removal
                debug!(label = %label, "Label not found (already removed)");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn bot_user(&self) -> Result<User, GitHubError> {
        self.bot
            .get_or_try_init(|| async {
                let url = format!("{}/user", self.api_base);
                let response = self.send(self.client.get(&url)).await?;
                let user: User = Self::decode(response).await?;
                debug!(login = %user.login, "Resolved bot user");
                Ok::<_, GitHubError>(user)
            })
            .await
            .cloned()
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn list_comments(
        &self,
        target: &ReconciliationTarget,
    ) -> Result<Vec<IssueComment>, GitHubError> {
        let comments: Vec<IssueComment> =
            self.get_all_pages(&self.issue_url(target, "comments")).await?;

        debug!(count = comments.len(), "Listed comments");
        Ok(comments)
    }

    #[instrument(skip(self, body), fields(target = %target))]
    async fn create_comment(
        &self,
        target: &ReconciliationTarget,
        body: &str,
    ) -> Result<u64, GitHubError> {
        if self.dry_run {
            info!(body = %body, "Dry run: not creating comment");
            return Ok(0);
        }

        let url = self.issue_url(target, "comments");
        let response = self
            .send(self.client.post(&url).json(&CommentRequest { body }))
            .await?;
        let created: CreatedComment = Self::decode(response).await?;

        info!(comment_id = created.id, "Created comment");
        Ok(created.id)
    }

    #[instrument(skip(self, body), fields(target = %target))]
    async fn edit_comment(
        &self,
        target: &ReconciliationTarget,
        id: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        if self.dry_run {
            info!(comment_id = id, body = %body, "Dry run: not editing comment");
            return Ok(());
        }

        let url = self.comment_url(target, id);
        self.send(self.client.patch(&url).json(&CommentRequest { body }))
            .await?;

        info!(comment_id = id, "Edited comment");
        Ok(())
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn delete_comment(
        &self,
        target: &ReconciliationTarget,
        id: u64,
    ) -> Result<(), GitHubError> {
        if self.dry_run {
            info!(comment_id = id, "Dry run: not deleting comment");
            return Ok(());
        }

        let url = self.comment_url(target, id);
        self.send(self.client.delete(&url)).await?;

        info!(comment_id = id, "Deleted comment");
        Ok(())
    }
}
