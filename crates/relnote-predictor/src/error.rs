//! Error types for release note prediction and label reconciliation.

use thiserror::Error;

/// The body did not contain a parseable release note block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no release note block found in body")]
pub struct NoteParseError;

/// Errors returned by a release note classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Network-level failure or a non-2xx status from the prediction endpoint
    #[error("prediction request failed: {0}")]
    Transport(String),

    /// The prediction response was not JSON or lacked a numeric `result`
    #[error("decoding prediction response: {0}")]
    Decode(String),
}

/// Errors returned by the GitHub issue tracker client.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub answered with a non-success status
    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("decoding GitHub response: {0}")]
    Decode(String),
}

/// Errors that abort a single reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The body has no release note to classify
    #[error("parsing release note: {0}")]
    NoteParse(#[from] NoteParseError),

    /// The classifier could not produce a score
    #[error("predicting release note: {0}")]
    Classifier(#[from] ClassifierError),

    /// Reading or mutating the tracked label failed
    #[error("label handling: {0}")]
    Label(#[source] GitHubError),

    /// Reading or mutating the bot comment failed
    #[error("comment handling: {0}")]
    Comment(#[source] GitHubError),
}

impl ReconcileError {
    /// Whether a user-visible failure comment should be posted for this error.
    ///
    /// A body without a release note block is not a failure of the service, so
    /// it never produces a comment.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        !matches!(self, Self::NoteParse(_))
    }
}
