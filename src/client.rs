//! Client handle definition
//!
//! The cheap, cloneable handle other sessions use to reach a connection.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Handle to a connected client
///
/// Holds the connection's id and the sending side of its outbound queue.
/// The registry and room rosters store clones of this; the connection's
/// writer task drains the queue onto the transport.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Server → Client message queue
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Client {
    /// Create a new client with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { id, sender }
    }

    /// Queue a message for this client
    ///
    /// Never blocks. Returns an error if the writer has gone away.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .send(msg)
            .map_err(|_| SendError::TransportClosed)
    }
}
