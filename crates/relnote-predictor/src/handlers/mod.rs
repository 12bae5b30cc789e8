//! Webhook event handlers.

pub mod github;

pub use github::{handle_github_webhook, route, Dispatcher, Routed};
