//! Real-time collaboration hub.
//!
//! One reader task per connection and exactly one dispatcher task.
//! Readers stamp every inbound frame with the identity captured at
//! upgrade time and push it onto a single bounded broadcast queue; the
//! dispatcher drains the queue and is the sole writer to peer sockets,
//! so frames from one sender are never interleaved or reordered on any
//! peer. A full queue back-pressures the reader instead of dropping.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Readers block on the queue once this many frames are in flight.
const BROADCAST_CAPACITY: usize = 256;

/// Editor frame kinds. `stop` tears the sender's session down instead of
/// being forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Delta,
    FullSync,
    RequestSync,
    Stop,
}

/// A collaboration frame. `payload` is opaque to the server. `user` and
/// `roomId` are rewritten from the connection's authenticated identity
/// before the frame is queued; whatever the client put there is
/// discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub room_id: String,
}

type PeerSink = Arc<Mutex<SplitSink<WebSocket, WsMessage>>>;

struct Peer {
    username: String,
    room_id: String,
    sink: PeerSink,
}

/// Shared hub state. Readers take the write lock only to join and
/// leave; the dispatcher takes the read lock to snapshot fan-out targets
/// and the write lock to evict dead or stopped peers.
pub struct Hub {
    peers: RwLock<HashMap<Uuid, Peer>>,
    broadcast: mpsc::Sender<Message>,
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    #[serde(default)]
    username: String,
    #[serde(default)]
    room: String,
}

impl Hub {
    /// Create the hub and the receiving end of its broadcast queue. The
    /// receiver must be handed to [`Hub::dispatch`] on its own task.
    pub fn new() -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(BROADCAST_CAPACITY);
        let hub = Arc::new(Self {
            peers: RwLock::new(HashMap::new()),
            broadcast: tx,
        });
        (hub, rx)
    }

    /// Reader task: owns the receive half of one connection for its
    /// whole life. Any read error (including unparseable JSON) ends the
    /// session and removes the registry entry.
    async fn run_reader(self: Arc<Self>, socket: WebSocket, username: String, room_id: String) {
        let (sink, mut stream) = socket.split();
        let id = Uuid::new_v4();

        self.peers.write().await.insert(
            id,
            Peer {
                username: username.clone(),
                room_id: room_id.clone(),
                sink: Arc::new(Mutex::new(sink)),
            },
        );
        info!(%username, room = %room_id, "peer joined");

        while let Some(frame) = stream.next().await {
            let text = match frame {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            let mut message: Message = match serde_json::from_str(&text) {
                Ok(message) => message,
                Err(e) => {
                    warn!(%username, error = %e, "unreadable frame, closing session");
                    break;
                }
            };
            // Client-supplied identity fields are never trusted.
            message.user = username.clone();
            message.room_id = room_id.clone();

            if self.broadcast.send(message).await.is_err() {
                break; // dispatcher gone, process is shutting down
            }
        }

        // The dispatcher may already have evicted this peer on a stop
        // frame or a write failure; removing twice is harmless.
        self.peers.write().await.remove(&id);
        info!(%username, room = %room_id, "peer left");
    }

    /// Dispatcher task: drains the broadcast queue and fans each frame
    /// out to every other peer in the sender's room. Exits when the last
    /// queue sender is dropped.
    pub async fn dispatch(self: Arc<Self>, mut queue: mpsc::Receiver<Message>) {
        while let Some(message) = queue.recv().await {
            if message.kind == MessageKind::Stop {
                self.close_session(&message.user, &message.room_id).await;
                continue;
            }

            let frame = match serde_json::to_string(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "failed to encode frame, dropping");
                    continue;
                }
            };

            // Snapshot under the read lock, write after releasing it.
            let targets = self.room_targets(&message.room_id, &message.user).await;
            for (id, sink) in targets {
                let result = sink.lock().await.send(WsMessage::Text(frame.clone())).await;
                if let Err(e) = result {
                    warn!(error = %e, "write failed, dropping peer");
                    self.evict(id).await;
                }
            }
        }
        debug!("broadcast queue closed, dispatcher exiting");
    }

    /// The sinks of every peer in `room_id` other than `sender`.
    async fn room_targets(&self, room_id: &str, sender: &str) -> Vec<(Uuid, PeerSink)> {
        let peers = self.peers.read().await;
        peers
            .iter()
            .filter(|(_, peer)| receives_from(&peer.username, &peer.room_id, sender, room_id))
            .map(|(id, peer)| (*id, Arc::clone(&peer.sink)))
            .collect()
    }

    /// Handle a `stop` frame: close and remove the one session matching
    /// the authenticated (user, room) pair.
    async fn close_session(&self, user: &str, room_id: &str) {
        let mut peers = self.peers.write().await;
        let target = peers
            .iter()
            .find(|(_, peer)| peer.username == user && peer.room_id == room_id)
            .map(|(id, _)| *id);
        if let Some(id) = target {
            if let Some(peer) = peers.remove(&id) {
                info!(username = %peer.username, room = %peer.room_id, "stop frame, closing session");
                let _ = peer.sink.lock().await.close().await;
            }
        }
    }

    async fn evict(&self, id: Uuid) {
        let mut peers = self.peers.write().await;
        if let Some(peer) = peers.remove(&id) {
            let _ = peer.sink.lock().await.close().await;
        }
    }
}

/// A peer sees a frame when it shares the sender's room and is not the
/// sender itself.
fn receives_from(peer_user: &str, peer_room: &str, sender: &str, room: &str) -> bool {
    peer_room == room && peer_user != sender
}

/// Router for the dedicated WebSocket listener.
pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(hub)
}

/// GET /ws?username=<u>&room=<r> upgrades to a collaboration session.
/// Both params are required and non-empty; otherwise the connection is
/// refused without ever touching the registry.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(hub): State<Arc<Hub>>,
) -> Response {
    if params.username.is_empty() || params.room.is_empty() {
        debug!("refused ws connect without username or room");
        return StatusCode::BAD_REQUEST.into_response();
    }
    ws.on_upgrade(move |socket| hub.run_reader(socket, params.username, params.room))
}
