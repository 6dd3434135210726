use crate::parse::parse_event;
use crate::sync::{deliver, Delivery, LeadDefaults, LeadStore};
use crate::types::VerifyQuery;
use axum::{
    extract::{rejection::QueryRejection, DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub crm: Arc<dyn LeadStore>,
    pub verify_token: String,
    pub lead_defaults: LeadDefaults,
    pub dry_run: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route(
            "/webhook",
            get(verify_handler)
                .post(events_handler)
                .layer(DefaultBodyLimit::disable()),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn verify_handler(
    State(state): State<AppState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(q)) => q,
        Err(e) => {
            warn!("Webhook verification failed: unreadable query ({})", e);
            return forbidden();
        }
    };
    let mode_ok = query.mode.as_deref() == Some("subscribe");
    let token_ok = query
        .verify_token
        .as_deref()
        .is_some_and(|t| constant_time_eq(t.as_bytes(), state.verify_token.as_bytes()));

    if mode_ok && token_ok {
        info!("Webhook verification succeeded");
        (StatusCode::OK, query.challenge.unwrap_or_default()).into_response()
    } else {
        warn!(
            "Webhook verification failed (mode: {:?}, token match: {})",
            query.mode, token_ok
        );
        forbidden()
    }
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Verification failed").into_response()
}

async fn events_handler(State(state): State<AppState>, body: axum::body::Bytes) -> Json<Value> {
    info!("Received request to /webhook, body length: {} bytes", body.len());

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                "Failed to parse webhook body ({}): {}",
                e,
                String::from_utf8_lossy(&body)
            );
            json!({})
        }
    };

    let message = parse_event(&payload);
    if let Some(ref id) = message.message_id {
        info!("Processing message {} from {:?}", id, message.sender);
    }

    let delivery = deliver(
        state.crm.as_ref(),
        &message,
        &state.lead_defaults,
        state.dry_run,
    )
    .await;
    delivery.log(message.sender.as_deref());
    if matches!(delivery, Delivery::Failed(_)) {
        warn!("Payload of failed delivery: {}", payload);
    }

    Json(json!({ "status": "ok" }))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::FakeStore;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn app(store: Arc<FakeStore>) -> Router {
        router(AppState {
            crm: store,
            verify_token: "verify-me".to_string(),
            lead_defaults: LeadDefaults::default(),
            dry_run: false,
        })
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn text_event(from: &str, body: &str) -> String {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "messages": [{ "from": from, "id": "wamid.1", "type": "text", "text": { "body": body } }]
                    }
                }]
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn verification_echoes_challenge() {
        let (status, body) = send(
            app(Arc::default()),
            Method::GET,
            "/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=123",
            "",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "123");
    }

    #[tokio::test]
    async fn verification_rejects_wrong_token_or_mode() {
        for uri in [
            "/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=123",
            "/webhook?hub.mode=unsubscribe&hub.verify_token=verify-me&hub.challenge=123",
            "/webhook?hub.challenge=123",
            "/webhook?hub.mode=subscribe&hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1",
            "/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.verify_token=verify-me&hub.challenge=1",
        ] {
            let (status, body) = send(app(Arc::default()), Method::GET, uri, "").await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body, "Verification failed");
        }
    }

    #[tokio::test]
    async fn oversized_body_is_still_processed() {
        let store = Arc::new(FakeStore::default());
        let long_text = "x".repeat(3 * 1024 * 1024);
        let (status, body) = send(
            app(store.clone()),
            Method::POST,
            "/webhook",
            &text_event("5730000001", &long_text),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "status": "ok" }));
        assert_eq!(store.leads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_still_acknowledged() {
        let store = Arc::new(FakeStore::default());
        let (status, body) = send(app(store.clone()), Method::POST, "/webhook", "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "status": "ok" }));
        assert!(store.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_structure_makes_no_crm_calls() {
        let store = Arc::new(FakeStore::default());
        let (status, _) = send(
            app(store.clone()),
            Method::POST,
            "/webhook",
            r#"{"entry":[{"changes":[]}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.lookups.lock().unwrap().is_empty());
        assert!(store.leads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_sender_creates_lead() {
        let store = Arc::new(FakeStore::default());
        let (status, _) = send(
            app(store.clone()),
            Method::POST,
            "/webhook",
            &text_event("5730000001", "Hello"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.lookups.lock().unwrap().as_slice(), ["5730000001"]);
        assert_eq!(store.leads.lock().unwrap().len(), 1);
        assert!(store.communications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn known_sender_gets_communication() {
        let store = Arc::new(FakeStore::with_lead("LEAD-0001"));
        send(
            app(store.clone()),
            Method::POST,
            "/webhook",
            &text_event("5730000001", " Hello "),
        )
        .await;
        assert!(store.leads.lock().unwrap().is_empty());
        let comms = store.communications.lock().unwrap();
        assert_eq!(comms.len(), 1);
        assert_eq!(comms[0].reference_name, "LEAD-0001");
        assert_eq!(comms[0].content, "Hello");
    }

    #[tokio::test]
    async fn crm_failure_is_still_acknowledged() {
        let store = Arc::new(FakeStore {
            fail_lookup: true,
            ..Default::default()
        });
        let (status, body) = send(
            app(store.clone()),
            Method::POST,
            "/webhook",
            &text_event("5730000001", "Hello"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let (status, body) = send(app(Arc::default()), Method::GET, "/", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}
