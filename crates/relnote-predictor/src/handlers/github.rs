//! GitHub webhook handler.
//!
//! Issue and pull request deliveries whose body may carry a new release note
//! are answered right away and reconciled in a detached task.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::reconciler::{ReconcileRequest, Reconciler};
use crate::server::AppState;
use crate::webhooks::{verify_webhook_signature, GitHubEvent, WebhookHeaders};

/// Routing decision for a decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Reconcile the carried request
    Reconcile(ReconcileRequest),
    /// Answer a `ping` delivery
    Pong,
    /// Nothing to do, with the reason
    Ignored(&'static str),
}

/// Decide what to do with an event.
#[must_use]
pub fn route(event: &GitHubEvent) -> Routed {
    match event {
        GitHubEvent::Ping => Routed::Pong,
        GitHubEvent::Issues(event) => {
            if !event.action.is_handled() {
                return Routed::Ignored("issue_action_not_handled");
            }
            let issue = &event.issue;
            Routed::Reconcile(ReconcileRequest {
                target: event.repository.target(issue.number),
                author: issue.user.login.clone(),
                body: issue.body.clone().unwrap_or_default(),
            })
        }
        GitHubEvent::PullRequest(event) => {
            if !event.action.is_handled() {
                return Routed::Ignored("pull_request_action_not_handled");
            }
            let pr = &event.pull_request;
            if pr.merged {
                return Routed::Ignored("pull_request_merged");
            }
            Routed::Reconcile(ReconcileRequest {
                target: event.repository.target(pr.number),
                author: pr.user.login.clone(),
                body: pr.body.clone().unwrap_or_default(),
            })
        }
        GitHubEvent::Other(_) => Routed::Ignored("event_type_not_handled"),
    }
}

/// Runs one reconciliation task per accepted delivery.
#[derive(Clone)]
pub struct Dispatcher {
    reconciler: Reconciler,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    /// Spawn the reconciliation for `request`.
    ///
    /// The task is not supervised. Failures are logged and, when reportable,
    /// surfaced as a comment on the target.
    pub fn dispatch(
        &self,
        delivery_id: &str,
        event_type: &str,
        request: ReconcileRequest,
    ) -> JoinHandle<()> {
        let span = info_span!(
            "delivery",
            delivery_id = %delivery_id,
            event_type = %event_type,
            target = %request.target,
        );
        let reconciler = self.reconciler.clone();

        tokio::spawn(
            async move {
                match reconciler.reconcile(&request).await {
                    Ok(report) => {
                        debug!(?report, "Delivery processed");
                    }
                    Err(e) if !e.is_reportable() => {
                        info!(error = %e, "Nothing to predict");
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to reconcile release note prediction");
                        if let Err(notify_err) = reconciler.notify_failure(&request, &e).await {
                            warn!(error = %notify_err, "Failed to comment about the failure");
                        }
                    }
                }
            }
            .instrument(span),
        )
    }
}

/// Handle GitHub webhook
pub async fn handle_github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let headers = WebhookHeaders::from_header_map(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });
    let event_type = headers.event_type.as_deref().unwrap_or("unknown");
    let delivery_id = headers.delivery_id.as_deref().unwrap_or("unknown");

    info!(
        event_type = %event_type,
        delivery_id = %delivery_id,
        "Received GitHub webhook"
    );

    if let Some(secret) = &state.config.webhook_secret {
        let Some(signature) = &headers.signature else {
            warn!("Missing X-Hub-Signature-256 header");
            return Err(StatusCode::UNAUTHORIZED);
        };

        if !verify_webhook_signature(&body, signature, secret) {
            warn!("Invalid webhook signature");
            return Err(StatusCode::UNAUTHORIZED);
        }
        debug!("Webhook signature verified");
    }

    let event = GitHubEvent::parse(event_type, &body).map_err(|e| {
        error!("Failed to parse webhook payload: {e}");
        StatusCode::BAD_REQUEST
    })?;

    match route(&event) {
        Routed::Pong => Ok(Json(json!({ "status": "pong" }))),
        Routed::Ignored(reason) => {
            debug!(reason, "Ignoring GitHub webhook");
            Ok(Json(json!({
                "status": "ignored",
                "reason": reason
            })))
        }
        Routed::Reconcile(request) => {
            let target = request.target.to_string();
            state.dispatcher.dispatch(delivery_id, event_type, request);
            Ok(Json(json!({
                "status": "accepted",
                "target": target
            })))
        }
    }
}
