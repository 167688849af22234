//! WebSocket bridge between the in-process bus and remote contexts.
//!
//! ```text
//! remote editor --[envelope]--> Bridge --publish--> TaskBus --> Orchestrator
//!       ^                         |
//!       +-------[every envelope]--+<--subscribe_all-- TaskBus
//! ```
//!
//! Envelopes from one remote client are relayed to the other clients as well,
//! since the bridge's own bus handle never hears them back.

mod client_io;
mod listen;

use std::net::{IpAddr, SocketAddr, TcpStream};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tungstenite::WebSocket;

use super::TaskBus;

struct Client {
    ws: WebSocket<TcpStream>,
    addr: SocketAddr,
}

pub struct Bridge {
    bus: TaskBus,
    rx: mpsc::Receiver<listen::Handshaken>,
    clients: Arc<Mutex<Vec<Client>>>,
    port: u16,
}

impl Bridge {
    /// Bind the listener and start accepting connections.
    pub fn bind(
        bus: TaskBus,
        interface: IpAddr,
        port: u16,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel(16);
        let port = listen::spawn_acceptor(interface, port, tx, cancel.clone())?;
        Ok(Self {
            bus,
            rx,
            clients: Arc::new(Mutex::new(Vec::new())),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let clients = Arc::clone(&self.clients);
        let bus = self.bus.clone();
        let stop = cancel.clone();
        std::thread::spawn(move || Self::reader_loop(clients, bus, stop));

        let mut envelopes = self.bus.subscribe_all();
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(client) = self.rx.recv() => self.add_client(client),

                envelope = envelopes.recv() => {
                    let Some(envelope) = envelope else { break };
                    match envelope.to_json() {
                        Ok(text) => Self::broadcast(&self.clients, &text, None),
                        Err(e) => crate::log!("bridge"; "cannot forward {}: {}", envelope.task, e),
                    }
                }
            }
        }

        for mut client in self.clients.lock().drain(..) {
            let _ = client.ws.close(None);
        }
        crate::debug!("bridge"; "stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, TcpStream};
    use std::time::Duration;

    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, WebSocket};

    use super::*;
    use crate::bus::{ANY, COMPILER, Origin, TaskEnvelope, TaskKind};

    fn connect(port: u16) -> WebSocket<MaybeTlsStream<TcpStream>> {
        let (ws, _) = tungstenite::connect(format!("ws://127.0.0.1:{port}")).unwrap();
        if let MaybeTlsStream::Plain(stream) = ws.get_ref() {
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        }
        ws
    }

    async fn start(origin: &Arc<Origin>, cancel: &CancellationToken) -> u16 {
        let bridge = Bridge::bind(origin.bus(), IpAddr::V4(Ipv4Addr::LOCALHOST), 0, cancel).unwrap();
        let port = bridge.port();
        tokio::spawn(bridge.run(cancel.clone()));
        port
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_envelope_reaches_bus() {
        let origin = Origin::new("o");
        let cancel = CancellationToken::new();
        let mut compiler = origin.bus().subscribe(COMPILER);
        let port = start(&origin, &cancel).await;

        let text = TaskEnvelope::generate_cache("bricks").to_json().unwrap();
        tokio::task::spawn_blocking(move || {
            let mut ws = connect(port);
            ws.send(Message::Text(text.into())).unwrap();
            std::thread::sleep(Duration::from_millis(300));
        });

        let envelope = tokio::time::timeout(Duration::from_secs(5), compiler.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.source, "integration/bricks");
        cancel.cancel();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bus_envelope_reaches_remote() {
        let origin = Origin::new("o");
        let cancel = CancellationToken::new();
        let port = start(&origin, &cancel).await;

        let client = tokio::task::spawn_blocking(move || {
            let mut ws = connect(port);
            loop {
                if let Message::Text(text) = ws.read().unwrap() {
                    return TaskEnvelope::from_json(text.as_str()).unwrap();
                }
            }
        });

        // let the handshake register the client
        tokio::time::sleep(Duration::from_millis(500)).await;
        origin
            .bus()
            .publish(&TaskEnvelope::new(
                TaskKind::CacheGenerated,
                COMPILER,
                ANY,
                serde_json::Value::Null,
            ))
            .unwrap();

        let received = client.await.unwrap();
        assert_eq!(received.task, TaskKind::CacheGenerated);
        cancel.cancel();
    }
}
