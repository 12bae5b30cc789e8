//! Configuration for the release note prediction service.

use std::time::Duration;

/// Label kept in sync with the prediction.
pub const KIND_BUG_LABEL: &str = "kind/bug";

/// Hidden marker appended to every bot comment.
pub const COMMENT_MARKER: &str = "<!-- RELNOTE_PREDICTION -->";

/// Minimum score for a release note to carry the label.
pub const TRUE_PREDICTION: f64 = 0.6;

/// Default prediction endpoint.
pub const DEFAULT_PREDICTION_URL: &str =
    "https://kfserving.k8s.saschagrunert.de/v1/models/kubernetes-analysis:predict";

/// Default GitHub REST API base URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 8888;

/// Default prediction request timeout in seconds.
pub const DEFAULT_PREDICTION_TIMEOUT_SECS: u64 = 30;

/// Settings the reconciler runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerConfig {
    /// Decision threshold in `[0, 1]`.
    pub threshold: f64,
    /// Tracked label name.
    pub label: String,
    /// Hidden ownership marker for bot comments.
    pub marker: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            threshold: TRUE_PREDICTION,
            label: KIND_BUG_LABEL.to_string(),
            marker: COMMENT_MARKER.to_string(),
        }
    }
}

/// Service configuration, assembled from command line flags by the binary.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Webhook signing secret for `X-Hub-Signature-256` verification.
    pub webhook_secret: Option<String>,
    /// GitHub token for API calls.
    pub github_token: Option<String>,
    /// GitHub REST API base URL.
    pub github_api_url: String,
    /// Log and skip label/comment mutations.
    pub dry_run: bool,
    /// Prediction endpoint.
    pub prediction_url: String,
    /// `Host` header override for the prediction request.
    pub prediction_host: Option<String>,
    /// Timeout for the prediction request.
    pub prediction_timeout: Duration,
    /// Core reconciliation settings.
    pub reconciler: ReconcilerConfig,
}

impl Config {
    /// Whether the service can talk to GitHub.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.github_token.is_some()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("github_api_url", &self.github_api_url)
            .field("dry_run", &self.dry_run)
            .field("prediction_url", &self.prediction_url)
            .field("prediction_host", &self.prediction_host)
            .field("prediction_timeout", &self.prediction_timeout)
            .field("reconciler", &self.reconciler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            port: DEFAULT_PORT,
            webhook_secret: None,
            github_token: None,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            dry_run: true,
            prediction_url: DEFAULT_PREDICTION_URL.to_string(),
            prediction_host: None,
            prediction_timeout: Duration::from_secs(DEFAULT_PREDICTION_TIMEOUT_SECS),
            reconciler: ReconcilerConfig::default(),
        }
    }

    #[test]
    fn test_ready_requires_token() {
        assert!(!config().is_ready());

        let config = Config {
            github_token: Some("ghp_test".to_string()),
            ..config()
        };
        assert!(config.is_ready());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config {
            github_token: Some("ghp_secret".to_string()),
            webhook_secret: Some("hmac".to_string()),
            ..config()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert!(!rendered.contains("\"hmac\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_reconciler_defaults() {
        let config = ReconcilerConfig::default();
        assert!((config.threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.label, "kind/bug");
        assert_eq!(config.marker, "<!-- RELNOTE_PREDICTION -->");
    }
}
