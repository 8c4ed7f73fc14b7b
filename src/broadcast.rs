//! Message delivery to one or many clients
//!
//! Callers pass snapshots taken from the registry; nothing here touches the
//! registry lock. A failed recipient is logged and skipped.

use tracing::debug;

use crate::client::Client;
use crate::error::SendError;
use crate::message::ServerMessage;
use crate::room::Member;

/// Deliver one message to one client
pub fn send_to(client: &Client, msg: ServerMessage) -> Result<(), SendError> {
    client.send(msg).inspect_err(|e| {
        debug!("Dropping message for {}: {}", client.id, e);
    })
}

/// Deliver a per-recipient message to every member
///
/// `format` sees each member and may tailor the message (e.g. mark the
/// recipient's own entry). Returns how many deliveries succeeded.
pub fn broadcast_room<F>(members: &[Member], mut format: F) -> usize
where
    F: FnMut(&Member) -> ServerMessage,
{
    members
        .iter()
        .filter(|member| send_to(&member.client, format(member)).is_ok())
        .count()
}
