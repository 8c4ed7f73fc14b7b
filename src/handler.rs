//! Connection handler
//!
//! Drives one connection: frames the byte stream into lines, feeds them to a
//! `Session`, and runs a writer task that drains the client's outbound
//! queue onto the transport.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::codec::LineCodec;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::session::{Flow, Session};
use crate::types::ClientId;

/// Handle a new connection
///
/// Works over any duplex byte stream. Returns once the peer has gone away
/// or sent `/quit`, after the session has been cleaned up and everything
/// queued for the client has been written.
pub async fn handle_connection<S>(
    stream: S,
    registry: Registry,
    config: Arc<ServerConfig>,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut lines = FramedRead::new(read_half, LineCodec::new());

    let client_id = ClientId::new();
    info!("Client {} connected", client_id);

    // Create channel for server -> client messages
    let (msg_tx, msg_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut write_task = tokio::spawn(write_loop(
        FramedWrite::new(write_half, LineCodec::new()),
        msg_rx,
        client_id,
    ));
    let mut write_done = false;
    let mut write_error = None;

    let mut session = Session::new(Client::new(client_id, msg_tx), registry);
    session.greet(&config.server_name);

    loop {
        tokio::select! {
            frame = lines.next() => match frame {
                Some(Ok(line)) => {
                    if session.handle_line(&line) == Flow::Quit {
                        debug!("Client {} quit", client_id);
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!("Read error for {}: {}", client_id, e);
                    break;
                }
                None => {
                    debug!("Client {} closed the stream", client_id);
                    break;
                }
            },
            result = &mut write_task => {
                write_done = true;
                match result {
                    Ok(()) => debug!("Write task ended early for {}", client_id),
                    Err(e) => {
                        warn!("Write task failed for {}: {}", client_id, e);
                        write_error = Some(e);
                    }
                }
                break;
            }
        }
    }

    session.disconnect();
    // Last sender for this client; the writer drains and closes
    drop(session);

    info!("Client {} disconnected", client_id);

    if let Some(e) = write_error {
        return Err(e.into());
    }
    if !write_done {
        write_task.await?;
    }

    Ok(())
}

/// Write queued messages until every sender is gone or the transport fails
async fn write_loop<W>(
    mut sink: FramedWrite<WriteHalf<W>, LineCodec>,
    mut msg_rx: mpsc::UnboundedReceiver<ServerMessage>,
    client_id: ClientId,
) where
    W: AsyncRead + AsyncWrite,
{
    while let Some(msg) = msg_rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            debug!("Send to {} failed, ending write task: {}", client_id, e);
            break;
        }
    }
    debug!("Write task ended for {}", client_id);

    let _ = sink.close().await;
}
