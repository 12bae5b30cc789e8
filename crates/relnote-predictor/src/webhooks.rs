//! GitHub webhook payloads and signature verification.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::github_client::{ReconciliationTarget, User};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify an `X-Hub-Signature-256` header against the raw request body.
///
/// # Arguments
/// * `body` - Raw request body bytes
/// * `signature` - Header value, `sha256=<hex>`
/// * `secret` - Webhook signing secret
///
/// # Returns
/// `true` if the signature is valid, `false` otherwise
#[must_use]
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(hex_signature) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };

    let Ok(signature_bytes) = hex::decode(hex_signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    // Constant-time comparison to prevent timing attacks
    computed.as_slice().ct_eq(&signature_bytes).into()
}

/// `issues` event action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueAction {
    Opened,
    Edited,
    Closed,
    Reopened,
    Labeled,
    Unlabeled,
    /// Any action we don't react to
    #[serde(other)]
    Unknown,
}

impl IssueAction {
    /// Whether the body may have changed in a way worth re-predicting.
    #[must_use]
    pub const fn is_handled(self) -> bool {
        matches!(self, Self::Opened | Self::Edited)
    }
}

/// `pull_request` event action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Opened,
    Edited,
    Synchronize,
    Reopened,
    Closed,
    Labeled,
    Unlabeled,
    #[serde(other)]
    Unknown,
}

impl PullRequestAction {
    #[must_use]
    pub const fn is_handled(self) -> bool {
        matches!(
            self,
            Self::Opened | Self::Edited | Self::Synchronize | Self::Reopened
        )
    }
}

/// Repository the event belongs to
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Repository name
    pub name: String,
    /// Owning user or organization
    pub owner: User,
}

/// Issue as carried by `issues` events
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    /// Markdown body, `null` when empty
    #[serde(default)]
    pub body: Option<String>,
    pub user: User,
}

/// Pull request as carried by `pull_request` events
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub body: Option<String>,
    pub user: User,
    #[serde(default)]
    pub merged: bool,
}

/// `issues` webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    pub action: IssueAction,
    pub issue: Issue,
    pub repository: Repository,
}

/// `pull_request` webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

impl Repository {
    /// Target for issue or pull request `number` in this repository.
    #[must_use]
    pub fn target(&self, number: u64) -> ReconciliationTarget {
        ReconciliationTarget::new(self.owner.login.clone(), self.name.clone(), number)
    }
}

/// A decoded GitHub delivery, keyed by the `X-GitHub-Event` header.
#[derive(Debug, Clone)]
pub enum GitHubEvent {
    Ping,
    Issues(IssuesEvent),
    PullRequest(PullRequestEvent),
    /// Event type without a payload model
    Other(String),
}

impl GitHubEvent {
    /// Decode `body` according to `event_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if a modelled event has a malformed payload.
    pub fn parse(event_type: &str, body: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            "ping" => Self::Ping,
            "issues" => Self::Issues(serde_json::from_slice(body)?),
            "pull_request" => Self::PullRequest(serde_json::from_slice(body)?),
            other => Self::Other(other.to_string()),
        })
    }
}

/// Parsed webhook headers
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    /// Unique delivery ID
    pub delivery_id: Option<String>,
    /// Event type
    pub event_type: Option<String>,
    /// HMAC signature
    pub signature: Option<String>,
}

impl WebhookHeaders {
    /// Parse headers from a request
    #[must_use]
    pub fn from_header_map(get_header: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            delivery_id: get_header("x-github-delivery"),
            event_type: get_header("x-github-event"),
            signature: get_header("x-hub-signature-256"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_verify_webhook_signature_valid() {
        let body = b"test payload";
        let secret = "test-secret";

        assert!(verify_webhook_signature(body, &sign(body, secret), secret));
    }

    #[test]
    fn test_verify_webhook_signature_invalid() {
        let body = b"test payload";

        assert!(!verify_webhook_signature(body, &sign(body, "other"), "test-secret"));
        assert!(!verify_webhook_signature(
            b"tampered payload",
            &sign(body, "test-secret"),
            "test-secret"
        ));
    }

    #[test]
    fn test_verify_webhook_signature_malformed() {
        let body = b"test payload";
        let secret = "test-secret";
        let bare = sign(body, secret).trim_start_matches("sha256=").to_string();

        assert!(!verify_webhook_signature(body, &bare, secret));
        assert!(!verify_webhook_signature(body, "sha256=not-hex", secret));
        assert!(!verify_webhook_signature(body, "", secret));
    }

    #[test]
    fn test_parse_issues_event() {
        let payload = json!({
            "action": "edited",
            "issue": {
                "number": 17,
                "body": "```release-note\nFixed\n```",
                "user": { "login": "octocat", "id": 1 },
                "title": "Something broke"
            },
            "repository": {
                "name": "kubernetes",
                "full_name": "kubernetes/kubernetes",
                "owner": { "login": "kubernetes" }
            },
            "sender": { "login": "octocat" }
        });

        let event = GitHubEvent::parse("issues", payload.to_string().as_bytes()).unwrap();
        let GitHubEvent::Issues(event) = event else {
            panic!("expected issues event");
        };
        assert!(event.action.is_handled());
        assert_eq!(event.issue.user.login, "octocat");
        assert_eq!(
            event.repository.target(event.issue.number).to_string(),
            "kubernetes/kubernetes#17"
        );
    }

    #[test]
    fn test_parse_pull_request_event() {
        let payload = json!({
            "action": "synchronize",
            "number": 5,
            "pull_request": {
                "number": 5,
                "body": null,
                "user": { "login": "dev" },
                "merged": false
            },
            "repository": { "name": "repo", "owner": { "login": "org" } }
        });

        let event = GitHubEvent::parse("pull_request", payload.to_string().as_bytes()).unwrap();
        let GitHubEvent::PullRequest(event) = event else {
            panic!("expected pull_request event");
        };
        assert_eq!(event.action, PullRequestAction::Synchronize);
        assert!(event.action.is_handled());
        assert!(event.pull_request.body.is_none());
        assert!(!event.pull_request.merged);
    }

    #[test]
    fn test_unknown_actions() {
        let issue: IssueAction = serde_json::from_value(json!("transferred")).unwrap();
        assert_eq!(issue, IssueAction::Unknown);
        assert!(!issue.is_handled());
        assert!(!IssueAction::Closed.is_handled());

        let pr: PullRequestAction = serde_json::from_value(json!("review_requested")).unwrap();
        assert_eq!(pr, PullRequestAction::Unknown);
        assert!(!PullRequestAction::Closed.is_handled());
    }

    #[test]
    fn test_parse_other_events() {
        assert!(matches!(
            GitHubEvent::parse("ping", b"{\"zen\":\"Keep it simple.\"}").unwrap(),
            GitHubEvent::Ping
        ));
        assert!(matches!(
            GitHubEvent::parse("issue_comment", b"not even json").unwrap(),
            GitHubEvent::Other(kind) if kind == "issue_comment"
        ));
        assert!(GitHubEvent::parse("issues", b"{}").is_err());
    }

    #[test]
    fn test_headers_from_map() {
        let headers = WebhookHeaders::from_header_map(|name| match name {
            "x-github-delivery" => Some("72d3162e".to_string()),
            "x-github-event" => Some("issues".to_string()),
            _ => None,
        });
        assert_eq!(headers.delivery_id.as_deref(), Some("72d3162e"));
        assert_eq!(headers.event_type.as_deref(), Some("issues"));
        assert!(headers.signature.is_none());
    }
}
