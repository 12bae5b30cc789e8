//! Release note prediction service for GitHub issues and pull requests.
//!
//! This crate provides:
//! - Release note extraction from issue and pull request bodies
//! - A classifier client for the remote prediction endpoint
//! - GitHub label and comment operations
//! - Reconciliation of the `kind/bug` label and the bot comment
//! - Webhook signature verification and an HTTP server

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Many async API methods can fail

pub mod classifier;
pub mod config;
pub mod error;
pub mod github_client;
pub mod handlers;
pub mod note;
pub mod reconciler;
pub mod server;
pub mod webhooks;

pub use classifier::{ClassificationOutcome, Classifier, HttpClassifier};
pub use config::{Config, ReconcilerConfig};
pub use error::{ClassifierError, GitHubError, NoteParseError, ReconcileError};
pub use github_client::{GitHubClient, IssueTracker, ReconciliationTarget};
pub use note::ReleaseNote;
pub use reconciler::{CommentChange, LabelChange, ReconcileReport, ReconcileRequest, Reconciler};
pub use webhooks::{verify_webhook_signature, GitHubEvent};
