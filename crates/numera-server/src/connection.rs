//! Per-connection request loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use numera::Registry;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::commands::dispatch;
use crate::resp::{RespReader, RespWriter};

/// Serves one client until it disconnects, breaks protocol, sends `quit`,
/// or the server shuts down.
///
/// An idle read timeout keeps the loop responsive to shutdown without
/// dropping quiet clients: elapsing simply re-arms the read. No identifier
/// is ever "pending" — once a reply fails to send, the value is gone for
/// the client but stays handed out from the dispenser's perspective.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
    read_timeout: Duration,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = RespReader::new(read_half);
    let mut writer = RespWriter::new(write_half);

    tracing::debug!(%peer, "client connected");

    loop {
        let request = tokio::select! {
            () = shutdown.cancelled() => break,
            result = timeout(read_timeout, reader.read_value()) => match result {
                // Idle client; keep waiting.
                Err(_) => continue,
                Ok(Err(err)) => {
                    if !err.is_eof() {
                        tracing::debug!(%peer, error = %err, "closing connection");
                    }
                    break;
                }
                Ok(Ok(value)) => value,
            }
        };

        let response = dispatch(&registry, &request);
        if let Err(err) = writer.write_value(&response.value).await {
            tracing::debug!(%peer, error = %err, "write failed");
            break;
        }
        if response.close {
            break;
        }
    }

    tracing::debug!(%peer, "client disconnected");
}
