//! Release note classification against a remote prediction endpoint.

use async_trait::async_trait;
use reqwest::header::HOST;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::ClassifierError;
use crate::note::ReleaseNote;

/// Result of classifying a release note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassificationOutcome {
    /// The author opted out, nothing was classified
    Excluded,
    /// Confidence that the note describes a bug
    Score(f64),
}

impl ClassificationOutcome {
    /// The score, unless excluded.
    #[must_use]
    pub const fn score(&self) -> Option<f64> {
        match self {
            Self::Excluded => None,
            Self::Score(score) => Some(*score),
        }
    }
}

/// Trait for release note classifiers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Score a release note text.
    async fn predict(&self, text: &str) -> Result<f64, ClassifierError>;
}

/// Classify an extracted note. Excluded notes never reach the classifier.
pub async fn classify<C>(
    classifier: &C,
    note: &ReleaseNote,
) -> Result<ClassificationOutcome, ClassifierError>
where
    C: Classifier + ?Sized,
{
    match note {
        ReleaseNote::Excluded => {
            debug!("Release note excluded, skipping prediction");
            Ok(ClassificationOutcome::Excluded)
        }
        ReleaseNote::Text(text) => classifier
            .predict(text)
            .await
            .map(ClassificationOutcome::Score),
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    result: f64,
}

/// Classifier backed by an HTTP prediction service.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    host: Option<String>,
}

impl HttpClassifier {
    /// Create a classifier for `endpoint`.
    ///
    /// `host` overrides the `Host` header, for routing through a gateway that
    /// dispatches on virtual host.
    pub fn new(
        endpoint: impl Into<String>,
        host: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .user_agent("relnote-predictor/1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            host,
        })
    }

    /// The configured prediction endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    #[instrument(skip(self, text), fields(endpoint = %self.endpoint))]
    async fn predict(&self, text: &str) -> Result<f64, ClassifierError> {
        debug!("Doing prediction request");

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&PredictionRequest { text });
        if let Some(host) = &self.host {
            request = request.header(HOST, host);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Transport(format!("HTTP status: {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClassifierError::Transport(format!("reading response body: {e}")))?;

        let decoded: PredictionResponse = serde_json::from_slice(&body)
            .map_err(|e| ClassifierError::Decode(e.to_string()))?;

        info!(result = decoded.result, "Got prediction result");
        Ok(decoded.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PREDICT_PATH: &str = "/v1/models/kubernetes-analysis:predict";

    fn classifier_for(server: &MockServer, host: Option<&str>) -> HttpClassifier {
        HttpClassifier::new(
            format!("{}{PREDICT_PATH}", server.uri()),
            host.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    async fn respond_with(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PREDICT_PATH))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn predict_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PREDICT_PATH))
            .and(body_json(json!({ "text": "This is my release note" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 0.5 })))
            .expect(1)
            .mount(&server)
            .await;

        let score = classifier_for(&server, None)
            .predict("This is my release note")
            .await
            .unwrap();

        assert!((score - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn predict_sends_host_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PREDICT_PATH))
            .and(header("host", "kubernetes-analysis.kubeflow.example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 0.9 })))
            .expect(1)
            .mount(&server)
            .await;

        let classifier =
            classifier_for(&server, Some("kubernetes-analysis.kubeflow.example.com"));

        assert!(classifier.predict("note").await.is_ok());
    }

    #[tokio::test]
    async fn predict_passes_out_of_range_scores_through() {
        let server =
            respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 1.5 }))).await;

        let score = classifier_for(&server, None)
            .predict("note")
            .await
            .unwrap();

        assert!((score - 1.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn predict_failure_result_no_float() {
        let server =
            respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "wrong" })))
                .await;

        let err = classifier_for(&server, None)
            .predict("note")
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifierError::Decode(_)));
    }

    #[tokio::test]
    async fn predict_failure_result_missing() {
        let server =
            respond_with(ResponseTemplate::new(200).set_body_json(json!({ "score": 0.4 }))).await;

        let err = classifier_for(&server, None)
            .predict("note")
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifierError::Decode(_)));
    }

    #[tokio::test]
    async fn predict_failure_result_no_json() {
        let server = respond_with(ResponseTemplate::new(200).set_body_string("wrong")).await;

        let err = classifier_for(&server, None)
            .predict("note")
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifierError::Decode(_)));
    }

    #[tokio::test]
    async fn predict_failure_status() {
        let server = respond_with(ResponseTemplate::new(404)).await;

        let err = classifier_for(&server, None)
            .predict("note")
            .await
            .unwrap_err();

        match err {
            ClassifierError::Transport(msg) => assert!(msg.contains("404"), "{msg}"),
            other @ ClassifierError::Decode(_) => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn predict_failure_unreachable() {
        let classifier = HttpClassifier::new(
            "http://127.0.0.1:1/predict",
            None,
            Duration::from_secs(2),
        )
        .unwrap();

        let err = classifier.predict("note").await.unwrap_err();
        assert!(matches!(err, ClassifierError::Transport(_)));
    }

    #[tokio::test]
    async fn classify_excluded_skips_prediction() {
        let mut classifier = MockClassifier::new();
        classifier.expect_predict().never();

        let outcome = classify(&classifier, &ReleaseNote::Excluded).await.unwrap();
        assert_eq!(outcome, ClassificationOutcome::Excluded);
        assert_eq!(outcome.score(), None);
    }

    #[tokio::test]
    async fn classify_text_returns_score() {
        let mut classifier = MockClassifier::new();
        classifier
            .expect_predict()
            .withf(|text| text == "Fixed a crash")
            .times(1)
            .returning(|_| Ok(0.75));

        let outcome = classify(&classifier, &ReleaseNote::Text("Fixed a crash".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome, ClassificationOutcome::Score(0.75));
    }
}
