//! Label and comment reconciliation for a single issue or pull request.
//!
//! Every delivery recomputes the outcome and compares it with the remote
//! state. The tracked label ends up present exactly when the score reaches
//! the threshold, and at most one marker-tagged bot comment is kept.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::classifier::{classify, ClassificationOutcome, Classifier};
use crate::config::ReconcilerConfig;
use crate::error::{GitHubError, ReconcileError};
use crate::github_client::{IssueTracker, ReconciliationTarget};
use crate::note;

/// Input for one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    /// Issue or pull request to reconcile
    pub target: ReconciliationTarget,
    /// Login the comment greets
    pub author: String,
    /// Raw issue or pull request body
    pub body: String,
}

/// What the label step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelChange {
    Added,
    Removed,
    Unchanged,
    /// The note was excluded, labels were not looked at
    Skipped,
}

impl LabelChange {
    /// Sentence appended to the prediction comment.
    #[must_use]
    pub const fn annotation(self) -> &'static str {
        match self {
            Self::Added => "I added the label for you.",
            Self::Removed => "I removed the label for you.",
            Self::Unchanged | Self::Skipped => "",
        }
    }
}

/// What the comment step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentChange {
    Created(u64),
    Edited(u64),
    Deleted(u64),
    Unchanged,
}

/// Summary of a successful reconciliation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileReport {
    pub outcome: ClassificationOutcome,
    pub label: LabelChange,
    pub comment: CommentChange,
}

/// Brings the tracked label and the bot comment in line with a prediction.
#[derive(Clone)]
pub struct Reconciler {
    tracker: Arc<dyn IssueTracker>,
    classifier: Arc<dyn Classifier>,
    config: ReconcilerConfig,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        classifier: Arc<dyn Classifier>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            tracker,
            classifier,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Classify the body and reconcile label and comment.
    ///
    /// # Errors
    ///
    /// Any failing step aborts the remaining ones. Label failures are
    /// [`ReconcileError::Label`], comment failures [`ReconcileError::Comment`].
    #[instrument(skip(self, request), fields(target = %request.target))]
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
    ) -> Result<ReconcileReport, ReconcileError> {
        info!("Parsing release note");
        let note = note::extract(&request.body)?;
        let outcome = classify(self.classifier.as_ref(), &note).await?;

        let label = self
            .reconcile_label(&request.target, outcome)
            .await
            .map_err(ReconcileError::Label)?;

        let comment = self
            .reconcile_comment(request, outcome, label)
            .await
            .map_err(ReconcileError::Comment)?;

        info!(?outcome, ?label, ?comment, "Reconciled");
        Ok(ReconcileReport {
            outcome,
            label,
            comment,
        })
    }

    /// Post or update a comment describing `error`.
    ///
    /// # Errors
    ///
    /// Returns the GitHub error if the comment could not be written. Callers
    /// only log it.
    #[instrument(skip(self, request, error), fields(target = %request.target))]
    pub async fn notify_failure(
        &self,
        request: &ReconcileRequest,
        error: &ReconcileError,
    ) -> Result<CommentChange, GitHubError> {
        let body = self.render_failure(&request.author, error);
        self.upsert_comment(&request.target, &body).await
    }

    async fn reconcile_label(
        &self,
        target: &ReconciliationTarget,
        outcome: ClassificationOutcome,
    ) -> Result<LabelChange, GitHubError> {
        let Some(score) = outcome.score() else {
            return Ok(LabelChange::Skipped);
        };

        debug!("Getting labels");
        let labels = self.tracker.get_labels(target).await?;
        let has_label = labels.iter().any(|l| l.name == self.config.label);
        let wants_label = score >= self.config.threshold;

        if wants_label && !has_label {
            info!(label = %self.config.label, "Adding the label");
            self.tracker.add_label(target, &self.config.label).await?;
            Ok(LabelChange::Added)
        } else if !wants_label && has_label {
            info!(label = %self.config.label, "Removing the label");
            self.tracker.remove_label(target, &self.config.label).await?;
            Ok(LabelChange::Removed)
        } else {
            Ok(LabelChange::Unchanged)
        }
    }

    async fn reconcile_comment(
        &self,
        request: &ReconcileRequest,
        outcome: ClassificationOutcome,
        label: LabelChange,
    ) -> Result<CommentChange, GitHubError> {
        let target = &request.target;

        let Some(score) = outcome.score() else {
            return match self.find_comment(target).await? {
                Some(id) => {
                    info!(comment_id = id, "Deleting comment of excluded note");
                    self.tracker.delete_comment(target, id).await?;
                    Ok(CommentChange::Deleted(id))
                }
                None => Ok(CommentChange::Unchanged),
            };
        };

        let body = self.render_prediction(&request.author, score, label);
        self.upsert_comment(target, &body).await
    }

    async fn upsert_comment(
        &self,
        target: &ReconciliationTarget,
        body: &str,
    ) -> Result<CommentChange, GitHubError> {
        if let Some(id) = self.find_comment(target).await? {
            info!(comment_id = id, "Editing existing comment");
            self.tracker.edit_comment(target, id, body).await?;
            return Ok(CommentChange::Edited(id));
        }

        info!("Creating new comment");
        let id = self.tracker.create_comment(target, body).await?;
        Ok(CommentChange::Created(id))
    }

    /// First comment written by the bot that carries the marker.
    async fn find_comment(&self, target: &ReconciliationTarget) -> Result<Option<u64>, GitHubError> {
        let bot = self.tracker.bot_user().await?;
        let comments = self.tracker.list_comments(target).await?;

        Ok(comments
            .iter()
            .find(|c| c.user.login == bot.login && c.body.contains(&self.config.marker))
            .map(|c| c.id))
    }

    /// Comment body for a scored note.
    #[must_use]
    pub fn render_prediction(&self, author: &str, score: f64, label: LabelChange) -> String {
        let ReconcilerConfig {
            threshold,
            label: name,
            marker,
        } = &self.config;

        format!(
            "Hey @{author} :wave:,\n\n\
             I predicted that this release note qualifies as **{name}** to **{:.2}%**.\n\n\
             A release note with the {name} needs a prediction rate with at least {:.0}%.\n\n\
             {}\n\
             {marker}",
            score * 100.0,
            threshold * 100.0,
            label.annotation(),
        )
    }

    /// Comment body for a failed reconciliation.
    #[must_use]
    pub fn render_failure(&self, author: &str, error: &ReconcileError) -> String {
        format!(
            "Hey @{author} :wave:,\n\n\
             I was not able to predict the release note:\n\n\
             ```\n{error}\n```\n\n\
             {}",
            self.config.marker
        )
    }
}
