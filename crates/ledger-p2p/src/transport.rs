//! Websocket plumbing. Each connection gets a reader task feeding the
//! synchronizer and a writer task draining that connection's outbound queue,
//! so a slow peer never stalls a broadcast.

use crate::error::P2pError;
use crate::peers::ConnectionId;
use crate::sync::Synchronizer;
use futures::{SinkExt, StreamExt};
use ledger_core::chain::ChainStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Accepts inbound peers for as long as the task lives. Accept errors (such as
/// running out of file descriptors) are logged and retried after a short pause.
pub async fn serve<S>(listener: TcpListener, sync: Arc<Synchronizer<S>>)
where
    S: ChainStore + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("listening for peers on ws://{}", addr);
    }
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("failed to accept peer connection: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };
        let sync = Arc::clone(&sync);
        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => {
                    start_connection(ws, addr.to_string(), sync);
                }
                Err(e) => warn!("websocket handshake with {} failed: {}", addr, e),
            }
        });
    }
}

/// Dials `url` (e.g. `ws://127.0.0.1:6001`). No retry on failure.
pub async fn connect_to_peer<S>(
    url: &str,
    sync: Arc<Synchronizer<S>>,
) -> Result<ConnectionId, P2pError>
where
    S: ChainStore + 'static,
{
    let (ws, _response) = connect_async(url).await.map_err(|e| {
        warn!("connection to peer {} failed: {}", url, e);
        e
    })?;
    let addr = match ws.get_ref() {
        MaybeTlsStream::Plain(tcp) => tcp
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| url.to_string()),
        _ => url.to_string(),
    };
    Ok(start_connection(ws, addr, sync))
}

fn start_connection<T, S>(
    ws: WebSocketStream<T>,
    addr: String,
    sync: Arc<Synchronizer<S>>,
) -> ConnectionId
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: ChainStore + 'static,
{
    let (id, mut outbound) = sync.on_connect(addr);
    let (mut sink, mut stream) = ws.split();

    let writer_sync = Arc::clone(&sync);
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let frame = match message.encode() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("cannot encode {:?}: {}", message.message_type(), e);
                    continue;
                }
            };
            if let Err(e) = sink.send(WsMessage::Text(frame)).await {
                debug!("write to peer {} failed: {}", id, e);
                break;
            }
        }
        writer_sync.on_disconnect(id);
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    sync.handle_frame(id, &text);
                }
                Ok(WsMessage::Close(_)) => break,
                // tungstenite answers pings itself; binary frames are not part of the protocol
                Ok(_) => {}
                Err(e) => {
                    debug!("read from peer {} failed: {}", id, e);
                    break;
                }
            }
        }
        sync.on_disconnect(id);
    });

    id
}
