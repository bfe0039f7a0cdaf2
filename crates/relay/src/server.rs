//! HTTP API and extension WebSocket endpoint.
//!
//! Callers talk plain request/response (`/message`, `/v1/chat/completions`);
//! the one Chrome extension holds a WebSocket on `/ws-extension`. Downstream
//! failures surface as 502 with the error text, validation failures as 400.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use teleport_core::chat::ChatCompletionRequest;
use teleport_core::config::{Config, WS_EXTENSION_PATH};
use teleport_core::Result;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::connection::ConnectionManager;
use crate::relay::Relay;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub connections: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let relay = Arc::new(Relay::new(connections.clone(), config));
        Self { relay, connections }
    }
}

#[derive(Deserialize)]
struct MessageRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tools: Vec<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    extension_connected: bool,
    inflight_requests: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn dispatch(state: &AppState, request: ChatCompletionRequest) -> Response {
    match state.relay.submit(request).await {
        Ok(completion) => Json(completion).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn handle_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Response {
    let message = req.message.trim();
    if message.is_empty() {
        return bad_request(r#"Provide {"message": "..."}"#);
    }
    let request = ChatCompletionRequest::from_message(message, req.model, req.tools);
    dispatch(&state, request).await
}

async fn handle_completions(
    State(state): State<AppState>,
    Json(req): Json<ChatCompletionRequest>,
) -> Response {
    if req.messages.is_empty() {
        return bad_request("OpenAI-compatible payload must include messages[]");
    }
    dispatch(&state, req).await
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        extension_connected: state.connections.is_connected().await,
        inflight_requests: state.relay.inflight().await,
    })
}

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(64);
    let connection_id = state.connections.register(outbound_tx).await;
    info!(connection_id, "Chrome extension connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task: forward relay envelopes to this extension connection.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if ws_sender.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => state.relay.handle_envelope(&text).await,
            Ok(WsMessage::Close(_)) => break,
            Err(e) => {
                warn!(connection_id, error = %e, "WebSocket receive error");
                break;
            }
            _ => {}
        }
    }

    // Pending requests this connection was serving stay in the table and
    // finish via their own timeouts; only the channel reference is dropped.
    state.connections.clear(connection_id).await;
    send_task.abort();
    info!(connection_id, "Chrome extension disconnected");
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/message", post(handle_message))
        .route("/v1/chat/completions", post(handle_completions))
        .route("/health", get(handle_health))
        .route(WS_EXTENSION_PATH, get(handle_ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::new(config);
    let app = router(state);
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Bridge relay listening");
    info!("Waiting for Chrome extension websocket connection on {}", WS_EXTENSION_PATH);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use teleport_core::chat::ChatCompletion;
    use teleport_core::Envelope;
    use tower::ServiceExt;

    fn test_app() -> (Router, AppState) {
        let state = AppState::new(&Config::default());
        (router(state.clone()), state)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Answers every request envelope on the fake extension channel.
    fn spawn_fake_extension(
        state: &AppState,
        reply_content: &str,
    ) -> tokio::task::JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel(8);
        let relay = state.relay.clone();
        let content = reply_content.to_string();
        let connections = state.connections.clone();
        tokio::spawn(async move {
            connections.register(tx).await;
            while let Some(frame) = rx.recv().await {
                if let Ok(Envelope::Request { correlation_id, request }) =
                    serde_json::from_str::<Envelope>(&frame)
                {
                    let reply = Envelope::Response {
                        correlation_id,
                        response: ChatCompletion::from_text(request.model_name(), &content),
                    };
                    relay
                        .handle_envelope(&serde_json::to_string(&reply).unwrap())
                        .await;
                }
            }
        })
    }

    #[tokio::test]
    async fn message_empty_after_trim_is_400() {
        let (app, _state) = test_app();
        let response = app
            .oneshot(post_json("/message", r#"{ "message": "   " }"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], r#"Provide {"message": "..."}"#);
    }

    #[tokio::test]
    async fn completions_without_messages_is_400() {
        let (app, _state) = test_app();
        let response = app
            .oneshot(post_json("/v1/chat/completions", r#"{ "model": "x" }"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "OpenAI-compatible payload must include messages[]");
    }

    #[tokio::test]
    async fn message_while_disconnected_is_immediate_502() {
        let (app, _state) = test_app();
        let response = app
            .oneshot(post_json("/message", r#"{ "message": "Hello" }"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("Chrome extension is not connected"));
    }

    #[tokio::test]
    async fn message_round_trip_through_fake_extension() {
        let (app, state) = test_app();
        let responder = spawn_fake_extension(&state, "Hi there");
        // Let the fake extension register its channel first.
        tokio::task::yield_now().await;

        let response = app
            .oneshot(post_json("/message", r#"{ "message": "Hello" }"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["object"], "chat.completion");
        assert_eq!(body["choices"][0]["message"]["content"], "Hi there");
        assert_eq!(body["choices"][0]["finish_reason"], "stop");
        assert_eq!(body["usage"]["total_tokens"], 0);
        responder.abort();
    }

    #[tokio::test]
    async fn completions_round_trip_keeps_caller_model() {
        let (app, state) = test_app();
        let responder = spawn_fake_extension(&state, "ok");
        tokio::task::yield_now().await;

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                r#"{ "model": "custom", "messages": [{ "role": "user", "content": "hi" }] }"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["model"], "custom");
        responder.abort();
    }

    #[tokio::test]
    async fn health_reports_connection_and_inflight() {
        let (app, state) = test_app();
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["extensionConnected"], false);
        assert_eq!(body["inflightRequests"], 0);

        let (tx, _rx) = mpsc::channel(4);
        state.connections.register(tx).await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["extensionConnected"], true);
    }
}
