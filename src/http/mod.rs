mod routes;
mod types;

#[cfg(test)]
mod tests;

use crate::completion::CompletionClient;
use crate::config::{AppConfig, ReplyConfig};
use crate::http::routes::*;
use axum::http::{HeaderName, HeaderValue};
use axum::routing::{get, post};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

#[derive(Clone)]
pub struct HttpState {
    pub completion: Arc<dyn CompletionClient>,
    pub reply: Arc<ReplyConfig>,
    pub system_prompt: Arc<str>,
    pub service_name: Arc<str>,
}

pub fn create_app(config: &AppConfig, completion: Arc<dyn CompletionClient>) -> axum::Router {
    let state = HttpState {
        completion,
        reply: Arc::new(config.reply.clone()),
        system_prompt: config.completion.system_prompt.as_str().into(),
        service_name: config.http.service_name.as_str().into(),
    };

    axum::Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/diag/openai", get(diag_openai))
        .route("/whatsapp", post(whatsapp))
        .route("/status", post(status_callback))
        .layer(ServiceBuilder::new().layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-version"),
            HeaderValue::from_static(crate::VERSION),
        )))
        .with_state(state)
}
