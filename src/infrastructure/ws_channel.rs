// WebSocket channel adapter - The single live link to the rig controller
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::application::peer_link::{LinkError, PeerEvent, PeerLink};
use crate::domain::session::ControlMessage;

// `live` holds the generation of the open connection, 0 when there is none.
const NO_CONNECTION: u64 = 0;

struct Connection {
    endpoint: String,
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    fn shutdown(self) {
        // Aborted so a superseded socket never reports `Lost`.
        self.reader.abort();
        // Dropping the sender lets the writer drain and send a close frame.
        drop(self.outbound);
        drop(self.writer);
    }
}

/// Holds at most one WebSocket to the peer. Inbound frames and link loss
/// are forwarded, in order, to the channel given at construction.
pub struct ChannelAdapter {
    inbound: mpsc::Sender<PeerEvent>,
    current: Mutex<Option<Connection>>,
    live: Arc<AtomicU64>,
    next_generation: AtomicU64,
}

impl ChannelAdapter {
    pub fn new(inbound: mpsc::Sender<PeerEvent>) -> Self {
        Self {
            inbound,
            current: Mutex::new(None),
            live: Arc::new(AtomicU64::new(NO_CONNECTION)),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Open a connection to `endpoint`, superseding any existing one.
    pub async fn connect(&self, endpoint: &str) -> Result<(), LinkError> {
        let (stream, _response) = connect_async(endpoint)
            .await
            .map_err(|e| LinkError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        let (mut sink, mut source) = stream.split();

        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            tracing::info!(endpoint = %previous.endpoint, "superseding previous peer link");
            previous.shutdown();
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.live.store(generation, Ordering::SeqCst);
        tracing::info!(endpoint, generation, "connected to peer");

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!("peer write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Held back until `Connected` is queued, so it always precedes this
        // connection's frames and its `Lost`.
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let inbound = self.inbound.clone();
        let live = self.live.clone();
        let reader = tokio::spawn(async move {
            // A cancelled `connect` drops the sender; read anyway.
            let _ = ready_rx.await;
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            tracing::warn!("dropping non-UTF-8 binary frame from peer");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!("peer read failed: {}", e);
                        break;
                    }
                };
                if inbound.send(PeerEvent::Frame(text)).await.is_err() {
                    break;
                }
            }
            // Only the live connection may report loss.
            if live
                .compare_exchange(generation, NO_CONNECTION, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let _ = inbound.send(PeerEvent::Lost { generation }).await;
            }
        });

        *current = Some(Connection {
            endpoint: endpoint.to_string(),
            generation,
            outbound,
            reader,
            writer,
        });
        drop(current);

        let _ = self.inbound.send(PeerEvent::Connected { generation }).await;
        let _ = ready_tx.send(());
        Ok(())
    }

    pub async fn endpoint(&self) -> Option<String> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|c| c.endpoint.clone())
    }
}

#[async_trait]
impl PeerLink for ChannelAdapter {
    fn is_connected(&self) -> bool {
        self.live.load(Ordering::SeqCst) != NO_CONNECTION
    }

    async fn send(&self, message: ControlMessage) -> Result<(), LinkError> {
        let text = serde_json::to_string(&message)?;
        let current = self.current.lock().await;
        let live = self.live.load(Ordering::SeqCst);
        let connection = current
            .as_ref()
            .filter(|c| c.generation == live)
            .ok_or(LinkError::NotConnected)?;

        tracing::debug!(frame = %text, "sending to peer");
        connection
            .outbound
            .send(text)
            .map_err(|_| LinkError::NotConnected)
    }

    async fn close(&self) {
        let mut current = self.current.lock().await;
        self.live.store(NO_CONNECTION, Ordering::SeqCst);
        if let Some(connection) = current.take() {
            tracing::info!(endpoint = %connection.endpoint, "closing peer link");
            connection.shutdown();
        }
    }
}
