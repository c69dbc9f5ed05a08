use super::*;
use crate::completion::{CompletionError, CompletionRequest, CompletionResult, ErrorBody};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use std::sync::Mutex;
use tower::ServiceExt;

const BODY_LIMIT: usize = 64 * 1024;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const DISCLAIMER: &str = "[Aviso] Resposta informativa. Não substitui consulta com advogado(a). Contato: (21) 2018-4200 • WhatsApp: +1 415 523 8886";

enum StubReply {
    Text(&'static str),
    MissingCredential,
    Status(u16),
}

/// Records every request it receives and answers with a canned reply.
struct StubCompletion {
    reply: StubReply,
    requests: Mutex<Vec<CompletionRequest>>,
}
impl StubCompletion {
    fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(&self, request: CompletionRequest) -> CompletionResult {
        self.requests.lock().unwrap().push(request);
        match self.reply {
            StubReply::Text(text) => Ok(text.to_string()),
            StubReply::MissingCredential => Err(CompletionError::MissingCredential),
            StubReply::Status(status) => Err(CompletionError::Status {
                status,
                body: ErrorBody::Text("rate limited".to_string()),
            }),
        }
    }
}

fn test_router(stub: &Arc<StubCompletion>) -> axum::Router {
    let completion: Arc<dyn CompletionClient> = stub.clone();
    create_app(&AppConfig::default(), completion)
}

fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn expected_twiml(escaped: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{escaped}</Message></Response>"
    )
}

#[tokio::test]
async fn test_whatsapp_relays_completion() {
    let stub = StubCompletion::new(StubReply::Text("Um contrato é um acordo."));
    let response = test_router(&stub)
        .oneshot(post_form(
            "/whatsapp",
            "Body=%20%20O+que+%C3%A9+um+contrato%3F%20&From=whatsapp%3A%2B5521999999999&NumMedia=0",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );
    assert_eq!(
        body_text(response).await,
        expected_twiml(&format!("Um contrato é um acordo.\n\n{DISCLAIMER}"))
    );

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].user_content(), Some("O que é um contrato?"));
    assert_eq!(requests[0].messages[0].role, "system");
    assert_eq!(requests[0].max_tokens, 180);
}

#[tokio::test]
async fn test_whatsapp_blank_body_uses_default_prompt() {
    for body in ["Body=+++%0A", "From=whatsapp%3A%2B5521999999999", ""] {
        let stub = StubCompletion::new(StubReply::Text("ok"));
        let response = test_router(&stub)
            .oneshot(post_form("/whatsapp", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let requests = stub.requests();
        assert_eq!(requests.len(), 1, "body {body:?}");
        assert_eq!(
            requests[0].user_content(),
            Some("Olá! Faça uma pergunta objetiva."),
            "body {body:?}"
        );
    }
}

#[tokio::test]
async fn test_whatsapp_completion_failure_uses_fallback() {
    for reply in [StubReply::MissingCredential, StubReply::Status(429)] {
        let stub = StubCompletion::new(reply);
        let response = test_router(&stub)
            .oneshot(post_form("/whatsapp", "Body=Oi"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            expected_twiml(&format!(
                "Estou com instabilidade de IA no momento; nossa equipe retornará em breve.\n\n{DISCLAIMER}"
            ))
        );
    }
}

#[tokio::test]
async fn test_whatsapp_escapes_markup() {
    let stub = StubCompletion::new(StubReply::Text("A < B & C > \"D\""));
    let response = test_router(&stub)
        .oneshot(post_form("/whatsapp", "Body=compare"))
        .await
        .unwrap();

    let body = body_text(response).await;
    assert!(body.contains("A &lt; B &amp; C &gt; &quot;D&quot;"));

    let message = body
        .strip_prefix("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>")
        .and_then(|rest| rest.strip_suffix("</Message></Response>"))
        .unwrap();
    assert!(!message.contains('<'));
    assert!(!message.contains('>'));
    assert!(!message.contains('"'));
}

#[tokio::test]
async fn test_whatsapp_escapes_disclaimer() {
    let stub = StubCompletion::new(StubReply::Text("Plain answer"));
    let mut config = AppConfig::default();
    config.reply.disclaimer = "Call Smith & Sons <21 2018-4200>".to_string();
    let completion: Arc<dyn CompletionClient> = stub.clone();

    let response = create_app(&config, completion)
        .oneshot(post_form("/whatsapp", "Body=Oi"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        expected_twiml("Plain answer\n\nCall Smith &amp; Sons &lt;21 2018-4200&gt;")
    );
}

#[tokio::test]
async fn test_whatsapp_repeated_field_keeps_last_value() {
    let stub = StubCompletion::new(StubReply::Text("ok"));
    let response = test_router(&stub)
        .oneshot(post_form("/whatsapp", "Body=first&Body=second"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].user_content(), Some("second"));
}

#[tokio::test]
async fn test_whatsapp_rejects_non_form_body() {
    let stub = StubCompletion::new(StubReply::Text("unused"));
    let request = Request::builder()
        .method("POST")
        .uri("/whatsapp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"Body":"Oi"}"#))
        .unwrap();

    let response = test_router(&stub).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(body_text(response).await.contains("form-urlencoded"));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn test_status_callback() {
    let stub = StubCompletion::new(StubReply::Text("unused"));

    let response = test_router(&stub)
        .oneshot(post_form("/status", "MessageSid=SM123&MessageStatus=delivered"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"ok":true,"received":"delivered"}"#);

    let response = test_router(&stub)
        .oneshot(post_form("/status", "MessageSid=SM123"))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": true, "received": "unknown" })
    );
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn test_status_callback_repeated_field_keeps_last_value() {
    let stub = StubCompletion::new(StubReply::Text("unused"));
    let response = test_router(&stub)
        .oneshot(post_form("/status", "MessageStatus=sent&MessageStatus=delivered"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"ok":true,"received":"delivered"}"#);
}

#[tokio::test]
async fn test_status_callback_soft_error() {
    let stub = StubCompletion::new(StubReply::Text("unused"));
    let request = Request::builder()
        .method("POST")
        .uri("/status")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"MessageStatus":"delivered"}"#))
        .unwrap();

    let response = test_router(&stub).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": true, "received": "unknown", "error": "expected form-urlencoded" })
    );
}

#[tokio::test]
async fn test_diag_openai() {
    let stub = StubCompletion::new(StubReply::Text("ok"));
    let response = test_router(&stub).oneshot(get("/diag/openai")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": true, "text": "ok" })
    );
    assert_eq!(stub.requests(), vec![CompletionRequest::probe()]);

    let stub = StubCompletion::new(StubReply::MissingCredential);
    let response = test_router(&stub).oneshot(get("/diag/openai")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": false, "error": "completion API credential missing" })
    );
}

#[tokio::test]
async fn test_diag_openai_without_credential_skips_network() {
    use crate::completion::OpenAiClient;
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = AppConfig::default();
    config.completion.endpoint = format!("{}/v1/chat/completions", server.uri());
    config.completion.api_key = None;
    let completion: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(&config.completion));

    let response = create_app(&config, completion)
        .oneshot(get("/diag/openai"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ok"], false);
    assert!(json["error"].is_string());
    server.verify().await;
}

#[tokio::test]
async fn test_index_and_health() {
    let stub = StubCompletion::new(StubReply::Text("unused"));

    let response = test_router(&stub).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-version"));
    assert_eq!(
        body_json(response).await,
        serde_json::json!({
            "ok": true,
            "message": "HGA Bot online",
            "routes": ["/health", "/diag/openai", "/whatsapp", "/status"]
        })
    );

    let response = test_router(&stub).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "ok": true }));

    assert!(stub.requests().is_empty());
}
