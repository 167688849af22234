//! TCP accept loop and websocket handshake for the bridge.

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tungstenite::WebSocket;

/// Ports tried after the configured one before giving up.
const MAX_PORT_RETRIES: u16 = 10;

const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// A client that connects but never upgrades is dropped after this.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) type Handshaken = (WebSocket<TcpStream>, SocketAddr);

/// Bind and start the acceptor thread. Returns the bound port.
///
/// Each handshake runs on its own thread, so only upgraded sockets ever
/// reach the bridge task.
pub(super) fn spawn_acceptor(
    interface: IpAddr,
    base_port: u16,
    clients: mpsc::Sender<Handshaken>,
    cancel: CancellationToken,
) -> Result<u16> {
    let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    std::thread::spawn(move || {
        while !cancel.is_cancelled() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    crate::debug!("bridge"; "connection from {}", addr);
                    let clients = clients.clone();
                    std::thread::spawn(move || match handshake(stream, HANDSHAKE_TIMEOUT) {
                        Ok(ws) => {
                            let _ = clients.blocking_send((ws, addr));
                        }
                        Err(e) => crate::log!("bridge"; "handshake with {} failed: {}", addr, e),
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    crate::log!("bridge"; "accept error: {}", e);
                    std::thread::sleep(ACCEPT_POLL);
                }
            }
        }
        crate::debug!("bridge"; "acceptor stopped");
    });

    Ok(port)
}

/// Upgrade `stream`, giving up if the client stalls for `timeout`.
///
/// The returned socket is non-blocking; reads are polled by the reader thread.
fn handshake(stream: TcpStream, timeout: Duration) -> Result<WebSocket<TcpStream>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    let ws = tungstenite::accept(stream).map_err(|e| anyhow!("{e}"))?;
    ws.get_ref().set_read_timeout(None)?;
    ws.get_ref().set_nonblocking(true)?;
    Ok(ws)
}

/// Bind `base_port`, moving up one port at a time while it is taken.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual = listener.local_addr()?.port();
                return Ok((listener, actual));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind bridge on {} after {} attempts: {}",
        interface,
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn test_stalled_handshake_gives_up() {
        let (listener, port) = try_bind_port(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, 1).unwrap();
        let _silent = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let (stream, _) = listener.accept().unwrap();

        let started = std::time::Instant::now();
        assert!(handshake(stream, Duration::from_millis(100)).is_err());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_port_taken_moves_up() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let (first, port) = try_bind_port(localhost, 0, 1).unwrap();
        let (_second, next) = try_bind_port(localhost, port, 3).unwrap();
        assert_ne!(port, next);
        drop(first);
    }
}
