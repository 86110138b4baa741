//! HTTP routes and the relay socket handler.
//!
//! Every relay socket gets a [`RelaySubscription`](orbit_core::RelaySubscription)
//! from the shared hub. `emit` frames for `post:created` and `post:deleted`
//! are rebroadcast to every other socket; the hub skips the emitting socket so
//! it never sees its own echo. Any other event name is answered with an
//! `error` frame and goes nowhere.

use crate::config::{Config, CorsConfig};
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::posts::{self, PostStore};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    handler::HandlerWithoutStateExt,
    http::{header, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use orbit_core::{ConnectionId, HubConfig, RelayHub};
use orbit_protocol::{codes, events, Frame, FrameCodec, ProtocolError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Relay fan-out.
    pub hub: RelayHub,
    /// Demo posts.
    pub posts: PostStore,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let hub = RelayHub::with_config(HubConfig {
            max_connections: config.relay.max_connections,
            capacity: config.relay.capacity,
        });

        Self {
            hub,
            posts: PostStore::new(),
            config,
        }
    }
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/api/posts", get(posts::list_posts).post(posts::create_post))
        .route("/api/posts/:id", delete(posts::delete_post))
        .route("/health", get(health_handler));

    if state.config.relay.enabled {
        app = app.route(&state.config.relay.path, get(ws_handler));
    }

    // dist, then public, then the single-page entry point
    let assets = &state.config.assets;
    let index = assets.index_html();
    let spa = move || spa_index(index.clone());
    let public = ServeDir::new(&assets.public_dir)
        .append_index_html_on_directories(false)
        .call_fallback_on_method_not_allowed(true)
        .fallback(spa.into_service());
    let static_files = ServeDir::new(&assets.dist_dir)
        .append_index_html_on_directories(false)
        .call_fallback_on_method_not_allowed(true)
        .fallback(public);

    app.fallback_service(static_files)
        .layer(cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server on the configured address.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn run_server(config: Config) -> Result<()> {
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!(error = %e, "Failed to start metrics server");
        }
    }

    if !config.assets.index_html().exists() {
        warn!(
            path = %config.assets.index_html().display(),
            "Single-page entry point not found; build the client before serving it"
        );
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    serve(listener, Arc::new(AppState::new(config))).await
}

/// Serve on an already bound listener.
///
/// # Errors
///
/// Returns an error if the server stops with an I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Orbit server listening");
    if state.config.relay.enabled {
        info!("Relay endpoint: ws://{}{}", addr, state.config.relay.path);
    }

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.hub.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": stats.connection_count,
        "relayed": stats.total_relayed,
    }))
}

async fn spa_index(index: PathBuf) -> Response {
    match tokio::fs::read_to_string(&index).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            debug!(path = %index.display(), error = %e, "Entry point unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Build output not found. Build the client and restart the server.",
            )
                .into_response()
        }
    }
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if cors.origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.max_message_size(state.config.relay.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state))
}

type WsSender = SplitSink<WebSocket, Message>;

/// Handle a relay socket.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let codec = FrameCodec::new(state.config.relay.max_message_size);

    let mut subscription = match state.hub.connect() {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "Rejecting relay socket");
            metrics::record_error("connection_limit");
            let frame = Frame::error(codes::TOO_MANY_CONNECTIONS, e.to_string());
            let _ = send_frame(&mut sender, &codec, &frame).await;
            let _ = sender.close().await;
            return;
        }
    };
    let _metrics_guard = ConnectionMetricsGuard::new();
    let id = subscription.id().clone();
    let heartbeat = state.config.heartbeat.clone();

    let connected = Frame::connected(
        id.as_str(),
        u32::try_from(heartbeat.interval_ms).unwrap_or(u32::MAX),
    );
    if let Err(e) = send_frame(&mut sender, &codec, &connected).await {
        error!(connection = %id, error = %e, "Failed to send Connected frame");
        state.hub.disconnect(&id);
        return;
    }

    let mut ticker = tokio::time::interval_at(
        Instant::now() + heartbeat.interval(),
        heartbeat.interval(),
    );
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            relayed = subscription.recv() => {
                let Some(message) = relayed else { break };
                if let Err(e) = send_frame(&mut sender, &codec, &message.to_frame()).await {
                    debug!(connection = %id, error = %e, "Relay delivery failed");
                    break;
                }
            }

            incoming = receiver.next() => {
                let decoded = match incoming {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_frame(text.len(), "inbound");
                        codec.decode(&text)
                    }
                    Some(Ok(Message::Binary(data))) => {
                        metrics::record_frame(data.len(), "inbound");
                        codec.decode_bytes(&data)
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        last_seen = Instant::now();
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(connection = %id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                };
                last_seen = Instant::now();

                let reply = match decoded {
                    Ok(frame) => handle_frame(frame, &id, &state),
                    Err(e) => {
                        warn!(connection = %id, error = %e, "Undecodable frame");
                        metrics::record_error("protocol");
                        Some(protocol_error(&e))
                    }
                };
                if let Some(reply) = reply {
                    if send_frame(&mut sender, &codec, &reply).await.is_err() {
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if last_seen.elapsed() > heartbeat.timeout() {
                    info!(connection = %id, "Relay socket timed out");
                    break;
                }
                if send_frame(&mut sender, &codec, &Frame::ping(Some(now_millis()))).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.disconnect(&id);
    debug!(connection = %id, "Relay socket closed");
}

/// Apply a decoded frame, returning a reply if one is due.
fn handle_frame(frame: Frame, id: &ConnectionId, state: &AppState) -> Option<Frame> {
    match frame {
        Frame::Emit { event, data } if is_relayed(&event) => {
            let recipients = state.hub.broadcast_from(id, &event, data);
            metrics::record_relayed(&event, recipients);
            debug!(connection = %id, event = %event, recipients, "Relayed");
            None
        }
        Frame::Emit { event, .. } => {
            warn!(connection = %id, event = %event, "Refusing to relay event");
            metrics::record_error("unrelayed_event");
            Some(Frame::error(
                codes::UNEXPECTED_FRAME,
                format!("Event {event} is not relayed"),
            ))
        }
        Frame::Ping { timestamp } => Some(Frame::pong(timestamp)),
        Frame::Pong { .. } => None,
        other => {
            warn!(connection = %id, frame_type = %other.frame_type(), "Unexpected frame type");
            Some(Frame::error(
                codes::UNEXPECTED_FRAME,
                format!("Unexpected {} frame", other.frame_type()),
            ))
        }
    }
}

/// Only post mutations travel over the relay.
fn is_relayed(event: &str) -> bool {
    matches!(event, events::POST_CREATED | events::POST_DELETED)
}

fn protocol_error(e: &ProtocolError) -> Frame {
    let code = match e {
        ProtocolError::FrameTooLarge { .. } => codes::FRAME_TOO_LARGE,
        _ => codes::MALFORMED_FRAME,
    };
    Frame::error(code, e.to_string())
}

async fn send_frame(sender: &mut WsSender, codec: &FrameCodec, frame: &Frame) -> Result<()> {
    let text = codec.encode(frame)?;
    metrics::record_frame(text.len(), "outbound");
    sender.send(Message::Text(text)).await?;
    Ok(())
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
