//! Transport layer.
//!
//! A [`Connection`] is the pair of channels a bridge needs to talk to one
//! peer: envelopes to send and envelopes received. In-process peers are
//! linked with [`Connection::pair`]; sockets are adapted by [`tcp`].

pub mod codec;
pub mod tcp;

use scriptbridge_types::Envelope;
use tokio::sync::mpsc;

/// Both directions of a link to one peer.
#[derive(Debug)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<Envelope>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
}

impl Connection {
    /// Wraps existing channels.
    pub fn new(
        outbound: mpsc::UnboundedSender<Envelope>,
        inbound: mpsc::UnboundedReceiver<Envelope>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Creates two connections wired to each other: what one sends, the
    /// other receives. Dropping one side ends the other's inbound stream.
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();
        (
            Self::new(left_tx, left_rx),
            Self::new(right_tx, right_rx),
        )
    }

    /// Splits into the sending and receiving halves.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<Envelope>,
        mpsc::UnboundedReceiver<Envelope>,
    ) {
        (self.outbound, self.inbound)
    }
}
