//! TCP transport.
//!
//! Each socket is split into a reader task feeding the connection's inbound
//! channel and a writer task draining its outbound channel. When the peer
//! hangs up, the inbound channel closes and the bridge detaches the
//! endpoint.

use super::Connection;
use super::codec::{read_frame, write_envelope};
use crate::error::BridgeResult;
use scriptbridge_types::Envelope;
use std::io;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Connects to a bridge listening at `addr`.
pub async fn connect(addr: impl ToSocketAddrs) -> BridgeResult<Connection> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(spawn_stream(stream))
}

/// Accepts the next peer on `listener`.
pub async fn accept(listener: &TcpListener) -> BridgeResult<(Connection, SocketAddr)> {
    let (stream, addr) = listener.accept().await?;
    stream.set_nodelay(true)?;
    Ok((spawn_stream(stream), addr))
}

/// Starts the reader and writer tasks for an established stream.
pub fn spawn_stream(stream: TcpStream) -> Connection {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown peer".to_string());
    let (mut reader, mut writer) = stream.into_split();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Envelope>();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();

    let read_peer = peer.clone();
    tokio::spawn(async move {
        loop {
            let frame = match read_frame(&mut reader).await {
                Ok(frame) => frame,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("{} closed the connection", read_peer);
                    break;
                }
                Err(e) => {
                    warn!("Read from {} failed: {}", read_peer, e);
                    break;
                }
            };
            // A bad payload leaves the framing intact, so skip just that frame.
            let envelope = match Envelope::from_json(&frame) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!("Dropping undecodable frame from {}: {}", read_peer, e);
                    continue;
                }
            };
            if inbound_tx.send(envelope).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(envelope) = outbound_rx.recv().await {
            if let Err(e) = write_envelope(&mut writer, &envelope).await {
                warn!("Write to {} failed: {}", peer, e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    Connection::new(outbound_tx, inbound_rx)
}
