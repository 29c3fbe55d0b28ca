/*!
WebSocket transport.

One task turns engine events into frames shared by every client. Each client
task sends `sync:init`, then forwards shared frames and answers requests.
Requests are answered on the client task: every method either reads the
published snapshot or enqueues into the engine, so none of them block.
*/

use axum::{
  extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    State,
  },
  response::Response,
  routing::get,
  Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use winswitch::Switcher;

use crate::relay::{Relay, ServerFrame};

/// Default WebSocket server port.
pub const DEFAULT_WS_PORT: u16 = 3040;
const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Shared by the relay task and every client.
#[derive(Clone)]
pub struct WebSocketState {
  switcher: Switcher,
  frames: broadcast::Sender<String>,
  port: u16,
}

impl std::fmt::Debug for WebSocketState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WebSocketState")
      .field("port", &self.port)
      .field("clients", &self.frames.receiver_count())
      .finish_non_exhaustive()
  }
}

/// `{"id", "method", "args"}`; `id` is echoed back untouched.
#[derive(Debug, Deserialize)]
struct Envelope {
  #[serde(default)]
  id: Value,
  #[serde(default)]
  method: String,
  #[serde(default)]
  args: Value,
}

impl WebSocketState {
  /// Serve on [`DEFAULT_WS_PORT`].
  pub fn new(switcher: Switcher) -> Self {
    Self::with_port(switcher, DEFAULT_WS_PORT)
  }

  /// Serve on `port`.
  pub fn with_port(switcher: Switcher, port: u16) -> Self {
    let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
    Self {
      switcher,
      frames,
      port,
    }
  }

  /// Answer one request frame.
  pub fn handle_text(&self, text: &str) -> String {
    let envelope = match serde_json::from_str::<Envelope>(text) {
      Ok(envelope) => envelope,
      Err(e) => {
        let kind = if e.is_data() { "Invalid request" } else { "Invalid JSON" };
        return json!({ "id": Value::Null, "error": format!("{kind}: {e}") }).to_string();
      }
    };
    let Envelope { id, method, args } = envelope;
    let mut response = crate::rpc::dispatch_json(&self.switcher, &method, &args);
    if let Some(object) = response.as_object_mut() {
      object.insert("id".to_string(), id);
    }
    response.to_string()
  }

  fn sync_init(&self) -> ServerFrame {
    ServerFrame::SyncInit(self.switcher.snapshot())
  }
}

/// The `/ws` route with permissive CORS.
pub fn router(state: WebSocketState) -> Router {
  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods(Any)
    .allow_headers(Any);

  Router::new()
    .route("/ws", get(upgrade))
    .layer(cors)
    .with_state(state)
}

/// Relay engine events and serve `/ws` on localhost. Runs until the listener
/// fails.
pub async fn start_server(state: WebSocketState) -> std::io::Result<()> {
  spawn_relay(state.switcher.clone(), state.frames.clone());

  let addr = format!("127.0.0.1:{}", state.port);
  let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
    log::error!("Failed to bind WebSocket server to {addr}: {e}");
    e
  })?;
  log::info!("WebSocket server: ws://{addr}/ws");

  axum::serve(listener, router(state)).await.map_err(|e| {
    log::error!("WebSocket server failed: {e}");
    e
  })
}

fn spawn_relay(switcher: Switcher, frames: broadcast::Sender<String>) {
  let mut events = switcher.subscribe();
  tokio::spawn(async move {
    let mut relay = Relay::default();
    loop {
      let out = match events.recv().await {
        Ok(event) => relay.accept(event, || switcher.snapshot()),
        Err(async_broadcast::RecvError::Overflowed(n)) => {
          log::warn!("[ws] Engine event stream overflowed, {n} events dropped; resending state");
          relay.resync(switcher.snapshot())
        }
        Err(async_broadcast::RecvError::Closed) => {
          log::debug!("[ws] Engine stopped, relay exiting");
          break;
        }
      };
      for frame in &out {
        if let Some(json) = encode(frame) {
          // No receivers just means no clients are connected.
          drop(frames.send(json));
        }
      }
    }
  });
}

fn encode(frame: &ServerFrame) -> Option<String> {
  serde_json::to_string(frame)
    .map_err(|e| log::error!("[ws] Failed to encode frame: {e}"))
    .ok()
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<WebSocketState>) -> Response {
  ws.on_upgrade(|socket| serve_client(socket, state))
}

async fn serve_client(mut socket: WebSocket, state: WebSocketState) {
  let mut frames = state.frames.subscribe();
  if !send(&mut socket, &state.sync_init()).await {
    return;
  }
  log::debug!("[ws] client connected");

  loop {
    tokio::select! {
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(text))) => {
          let response = state.handle_text(&text);
          if socket.send(Message::Text(response)).await.is_err() {
            break;
          }
        }
        Some(Ok(Message::Close(_))) | None => {
          log::debug!("[ws] client disconnected");
          break;
        }
        Some(Err(e)) => {
          log::warn!("[ws] socket error: {e}");
          break;
        }
        Some(Ok(_)) => {}
      },

      frame = frames.recv() => match frame {
        Ok(json) => {
          if socket.send(Message::Text(json)).await.is_err() {
            break;
          }
        }
        Err(broadcast::error::RecvError::Lagged(n)) => {
          log::warn!("[ws] client lagged by {n} frames, resending sync:init");
          if !send(&mut socket, &state.sync_init()).await {
            break;
          }
        }
        Err(broadcast::error::RecvError::Closed) => break,
      },
    }
  }
}

/// Whether the socket is still writable.
async fn send(socket: &mut WebSocket, frame: &ServerFrame) -> bool {
  match encode(frame) {
    Some(json) => socket.send(Message::Text(json)).await.is_ok(),
    None => true,
  }
}
