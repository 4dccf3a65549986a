//! mural serve — in-memory development stream server.
//!
//! One broadcast topic per stream id. Publishing renders post text to a
//! markup fragment, stores it, and announces the id; clients fetch the
//! rendered fragments over the stream socket with a load_content request.
//! Nothing survives the process.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use mural_core::{markup, ClientRequest, ContentId, ContentItem, StreamEvent, SENSITIVE_CLASS};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Tag that marks a whole post as sensitive.
const SENSITIVE_TAG: &str = "#nsfw";

// ─── Stream topics ────────────────────────────────────────────────────────────

struct StreamTopic {
    events: broadcast::Sender<StreamEvent>,
    items: HashMap<ContentId, ContentItem>,
    next_id: i64,
}

impl StreamTopic {
    fn new() -> Self {
        let (events, _) = broadcast::channel(100);
        StreamTopic {
            events,
            items: HashMap::new(),
            next_id: 1,
        }
    }
}

/// Manages stream topics for connected clients.
#[derive(Clone)]
pub struct AppState {
    streams: Arc<RwLock<HashMap<String, StreamTopic>>>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            streams: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to announcements for a stream, creating its topic on
    /// first use.
    async fn subscribe(&self, stream: &str) -> broadcast::Receiver<StreamEvent> {
        let mut streams = self.streams.write().await;
        streams
            .entry(stream.to_string())
            .or_insert_with(StreamTopic::new)
            .events
            .subscribe()
    }

    /// Render and store a post, then announce its id to subscribers.
    async fn publish(&self, stream: &str, text: &str) -> ContentId {
        let mut streams = self.streams.write().await;
        let topic = streams
            .entry(stream.to_string())
            .or_insert_with(StreamTopic::new);

        let id = ContentId::Number(topic.next_id);
        topic.next_id += 1;

        let rendered = render_post(text);
        topic.items.insert(
            id.clone(),
            ContentItem {
                id: id.clone(),
                rendered,
            },
        );
        // No receivers is fine; the announcement is best-effort.
        let _ = topic.events.send(StreamEvent::New { id: id.clone() });
        id
    }

    /// Stored items for the requested ids, in request order. Unknown ids
    /// are skipped.
    async fn contents(&self, stream: &str, ids: &[ContentId]) -> Vec<ContentItem> {
        let streams = self.streams.read().await;
        let Some(topic) = streams.get(stream) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| topic.items.get(id).cloned())
            .collect()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// ─── HTTP and socket surface ─────────────────────────────────────────────────

pub async fn run_serve(listen: &str) -> Result<()> {
    let state = AppState::new();

    let app = Router::new()
        .route("/ch/streams/{stream_id}/", get(stream_socket))
        .route("/api/streams/{stream_id}/items", post(publish_item))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    tracing::info!("stream server listening on {}", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve stream server")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}

async fn health_check() -> &'static str {
    "ok"
}

/// WebSocket endpoint for stream clients.
async fn stream_socket(
    ws: WebSocketUpgrade,
    Path(stream_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, stream_id, state))
}

async fn handle_stream(socket: WebSocket, stream_id: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_rx = state.subscribe(&stream_id).await;

    tracing::info!("client connected to stream {}", stream_id);

    loop {
        tokio::select! {
            // Forward announcements to the client
            Ok(event) = event_rx.recv() => {
                if sender.send(Message::Text(event.encode().into())).await.is_err() {
                    tracing::info!("client on stream {} went away", stream_id);
                    break;
                }
            }
            // Handle load requests, ping/pong, close
            Some(msg) = receiver.next() => {
                match msg {
                    Ok(Message::Text(raw)) => {
                        match ClientRequest::parse(raw.as_str()) {
                            Ok(ClientRequest::LoadContent { ids }) => {
                                let contents = state.contents(&stream_id, &ids).await;
                                let reply = StreamEvent::Content { contents };
                                if sender.send(Message::Text(reply.encode().into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!("dropping malformed request: {err}");
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("client disconnected from stream {}", stream_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            else => break,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PublishRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct PublishResponse {
    id: ContentId,
}

/// HTTP endpoint publishers use to add a post to a stream.
async fn publish_item(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
    Json(request): Json<PublishRequest>,
) -> Json<PublishResponse> {
    let id = state.publish(&stream_id, &request.text).await;
    tracing::info!("published post {} to stream {}", id, stream_id);
    Json(PublishResponse { id })
}

// ─── Post rendering ──────────────────────────────────────────────────────────

/// Render post text to a markup fragment: one `<p>` per blank-line block,
/// `![alt](url)` image syntax, everything else escaped. A post tagged
/// `#nsfw` gets the sensitive class on every image, which is the marker
/// the client's shield pass keys on.
fn render_post(text: &str) -> String {
    let mut fragment = String::new();
    for block in text.split("\n\n").filter(|b| !b.trim().is_empty()) {
        fragment.push_str("<p>");
        fragment.push_str(&render_inline(block.trim()));
        fragment.push_str("</p>");
    }

    if text.to_ascii_lowercase().contains(SENSITIVE_TAG) {
        markup::add_image_class(&fragment, SENSITIVE_CLASS)
    } else {
        fragment
    }
}

/// Escape text, converting `![alt](url)` spans into image tags.
fn render_inline(block: &str) -> String {
    let mut out = String::with_capacity(block.len());
    let mut rest = block;
    while let Some(start) = rest.find("![") {
        let Some(image) = parse_image(&rest[start..]) else {
            out.push_str(&escape(&rest[..start + 2]));
            rest = &rest[start + 2..];
            continue;
        };
        out.push_str(&escape(&rest[..start]));
        out.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\">",
            escape(&image.url),
            escape(&image.alt)
        ));
        rest = &rest[start + image.consumed..];
    }
    out.push_str(&escape(rest));
    out
}

struct InlineImage {
    alt: String,
    url: String,
    consumed: usize,
}

/// Parse `![alt](url)` at the start of `input`.
fn parse_image(input: &str) -> Option<InlineImage> {
    let after_bang = &input[2..];
    let alt_end = after_bang.find(']')?;
    let after_alt = &after_bang[alt_end..];
    if !after_alt[1..].starts_with('(') {
        return None;
    }
    let url_part = &after_alt[2..];
    let url_end = url_part.find(')')?;
    Some(InlineImage {
        alt: after_bang[..alt_end].to_string(),
        url: url_part[..url_end].to_string(),
        consumed: 2 + alt_end + 2 + url_end + 1,
    })
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
