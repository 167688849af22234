use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tungstenite::protocol::Message;

use super::listen::Handshaken;
use super::{Bridge, Client};
use crate::bus::{TaskBus, TaskEnvelope};

const READ_POLL: Duration = Duration::from_millis(50);

impl Bridge {
    pub(super) fn add_client(&self, (ws, addr): Handshaken) {
        let mut clients = self.clients.lock();
        clients.push(Client { ws, addr });
        crate::debug!("bridge"; "client {} connected (total: {})", addr, clients.len());
    }

    /// Send to every client except `skip`, dropping the ones that fail.
    pub(super) fn broadcast(clients: &Mutex<Vec<Client>>, text: &str, skip: Option<SocketAddr>) {
        let mut clients = clients.lock();
        clients.retain_mut(|client| {
            if Some(client.addr) == skip {
                return true;
            }
            match client.ws.send(Message::Text(text.into())) {
                Ok(()) => true,
                Err(e) => {
                    crate::debug!("bridge"; "client {} dropped: {}", client.addr, e);
                    false
                }
            }
        });
    }

    /// Poll clients for envelopes, publish them in-process and relay them to
    /// the other clients.
    pub(super) fn reader_loop(
        clients: Arc<Mutex<Vec<Client>>>,
        bus: TaskBus,
        cancel: CancellationToken,
    ) {
        while !cancel.is_cancelled() {
            std::thread::sleep(READ_POLL);

            let mut received = Vec::new();
            {
                let mut guard = clients.lock();
                guard.retain_mut(|client| loop {
                    match client.ws.read() {
                        Ok(Message::Text(text)) => received.push((client.addr, text.as_str().to_string())),
                        Ok(Message::Close(_)) => return false,
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::WouldBlock =>
                        {
                            return true;
                        }
                        Err(e) => {
                            crate::debug!("bridge"; "client {} gone: {}", client.addr, e);
                            return false;
                        }
                    }
                });
            }

            for (from, text) in received {
                let envelope = match TaskEnvelope::from_json(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        crate::debug!("bridge"; "ignoring message from {}: {}", from, e);
                        continue;
                    }
                };
                if let Err(e) = bus.publish(&envelope) {
                    crate::debug!("bridge"; "rejected envelope from {}: {}", from, e);
                    continue;
                }
                Self::broadcast(&clients, &text, Some(from));
            }
        }
    }
}
