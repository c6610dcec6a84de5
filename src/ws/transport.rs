use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::error::WsError;
use super::traits::{Connector, Transport, TransportListener};

enum Command {
    Send(String),
    Close,
}

/// [`Connector`] that opens WebSocket connections with `tokio-tungstenite`.
///
/// Each transport runs on its own Tokio task, so [`Connector::open`] must be called
/// from inside a Tokio runtime. Ping frames are answered by `tungstenite` and are
/// never reported as messages.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, endpoint: &Url, listener: Arc<dyn TransportListener>) -> Box<dyn Transport> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        tokio::spawn(run(
            endpoint.to_string(),
            command_rx,
            Arc::clone(&open),
            listener,
        ));

        Box::new(WsTransport { command_tx, open })
    }
}

struct WsTransport {
    command_tx: mpsc::UnboundedSender<Command>,
    open: Arc<AtomicBool>,
}

impl Transport for WsTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn send(&self, text: String) -> Result<(), WsError> {
        self.command_tx
            .send(Command::Send(text))
            .map_err(|_e| WsError::ConnectionClosed)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
        _ = self.command_tx.send(Command::Close);
    }
}

/// Drive one connection from the opening handshake to its close.
async fn run(
    endpoint: String,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    open: Arc<AtomicBool>,
    listener: Arc<dyn TransportListener>,
) {
    let ws_stream = tokio::select! {
        result = connect_async(endpoint.as_str()) => match result {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                listener.on_error(&WsError::Connection(e));
                listener.on_close();
                return;
            }
        },
        // Only a close request (or the handle being dropped) can arrive before the
        // handshake completes, since sends are refused until then.
        _ = command_rx.recv() => {
            listener.on_close();
            return;
        }
    };

    open.store(true, Ordering::Release);
    listener.on_open();

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        listener.on_message(text.to_string());
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                            listener.on_message(text);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Ping and pong frames are handled by tungstenite.
                    }
                    Some(Err(e)) => {
                        listener.on_error(&WsError::Connection(e));
                        break;
                    }
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            listener.on_error(&WsError::Connection(e));
                            break;
                        }
                    }
                    Some(Command::Close) | None => {
                        _ = write.close().await;
                        break;
                    }
                }
            }
        }
    }

    open.store(false, Ordering::Release);
    listener.on_close();
}
