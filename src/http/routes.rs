use crate::completion::CompletionRequest;
use crate::http::types::{
    DiagnosticResponse, FormFields, HealthResponse, InboundForm, IndexResponse, StatusAck,
    StatusCallbackForm, TwimlResponse, UnsupportedMediaType,
};
use crate::http::HttpState;
use crate::relay;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::{Form, Json};
use tracing::{debug, error, warn};

pub const ROUTES: &[&str] = &["/health", "/diag/openai", "/whatsapp", "/status"];

pub async fn index(State(state): State<HttpState>) -> Json<IndexResponse> {
    Json(IndexResponse {
        ok: true,
        message: format!("{} online", state.service_name),
        routes: ROUTES,
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub async fn diag_openai(State(state): State<HttpState>) -> Json<DiagnosticResponse> {
    let result = state.completion.complete(CompletionRequest::probe()).await;
    if let Err(e) = &result {
        warn!("Completion probe failed ({}): {e}", e.reason());
    }
    Json(DiagnosticResponse::from(result))
}

pub async fn whatsapp(
    State(state): State<HttpState>,
    form: Result<Form<FormFields>, FormRejection>,
) -> Result<TwimlResponse, UnsupportedMediaType> {
    let Form(fields) = form.map_err(|e| {
        warn!("Rejecting undecodable WhatsApp webhook: {e}");
        UnsupportedMediaType
    })?;
    let form = InboundForm::from(fields);
    debug!(
        "Inbound WhatsApp message {:?} from {:?}",
        form.message_sid, form.from
    );

    let prompt = relay::extract_prompt(form.body.as_deref(), &state.reply.default_prompt);
    let request = CompletionRequest::brief(&state.system_prompt, prompt);
    debug!("Prompting completion with {:?}", request.user_content());
    let result = state.completion.complete(request).await;

    if let Err(e) = &result {
        error!("Completion failed ({}), sending fallback: {e} {e:?}", e.reason());
    }

    let message = relay::compose_reply(&result, &state.reply);
    Ok(TwimlResponse(relay::render_twiml(&message)))
}

pub async fn status_callback(
    form: Result<Form<FormFields>, FormRejection>,
) -> Json<StatusAck> {
    let ack = match form {
        Ok(Form(fields)) => {
            let form = StatusCallbackForm::from(fields);
            debug!(
                "Status callback for {:?}: {:?}",
                form.message_sid, form.message_status
            );
            StatusAck {
                ok: true,
                received: form.message_status.unwrap_or_else(|| "unknown".to_string()),
                error: None,
            }
        }
        Err(e) => {
            warn!("Undecodable status callback: {e}");
            StatusAck {
                ok: true,
                received: "unknown".to_string(),
                error: Some("expected form-urlencoded"),
            }
        }
    };
    Json(ack)
}
