#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Each test binary uses a different subset of these helpers"
)]

use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// Short reconnect delay so tests do not wait on the production default.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(50);

const WAIT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
enum ServerCommand {
    Text(String),
    /// Close every open connection from the server side
    Drop,
}

/// Mock WebSocket server.
pub struct MockWsServer {
    addr: SocketAddr,
    /// Commands fanned out to ALL connected clients
    command_tx: broadcast::Sender<ServerCommand>,
    /// Text frames received from clients
    incoming_rx: mpsc::UnboundedReceiver<String>,
    /// Request paths of every accepted connection, in order
    paths: Arc<Mutex<Vec<String>>>,
    accepted: Arc<AtomicUsize>,
    accept_loop: JoinHandle<()>,
}

impl MockWsServer {
    /// Start a mock WebSocket server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (command_tx, _) = broadcast::channel::<ServerCommand>(100);
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<String>();
        let paths = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));

        let broadcast_tx = command_tx.clone();
        let accept_paths = Arc::clone(&paths);
        let accept_count = Arc::clone(&accepted);

        let accept_loop = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                // Subscribe before the handshake so nothing sent after the client
                // sees the connection open can be missed.
                let mut command_rx = broadcast_tx.subscribe();
                let paths = Arc::clone(&accept_paths);

                let record_path = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    paths.lock().unwrap().push(request.uri().path().to_owned());
                    Ok(response)
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, record_path).await
                else {
                    continue;
                };
                accept_count.fetch_add(1, Ordering::SeqCst);

                let (mut write, mut read) = ws_stream.split();
                let incoming_tx = incoming_tx.clone();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        _ = incoming_tx.send(text.to_string());
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            command = command_rx.recv() => {
                                match command {
                                    Ok(ServerCommand::Text(text)) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(ServerCommand::Drop) | Err(_) => {
                                        _ = write.send(Message::Close(None)).await;
                                        break;
                                    }
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            command_tx,
            incoming_rx,
            paths,
            accepted,
            accept_loop,
        }
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a text frame to all connected clients.
    pub fn send(&self, message: &str) {
        _ = self.command_tx.send(ServerCommand::Text(message.to_owned()));
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        _ = self.command_tx.send(ServerCommand::Drop);
    }

    /// Number of WebSocket handshakes completed so far.
    pub fn connection_count(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    /// Receive the next text frame sent by a client.
    pub async fn recv_message(&mut self) -> Option<String> {
        timeout(WAIT, self.incoming_rx.recv()).await.ok().flatten()
    }

    /// Stop accepting connections and release the port.
    pub async fn shutdown(self) {
        self.accept_loop.abort();
        _ = self.accept_loop.await;
    }
}

/// Wait for the next item, failing the test if none arrives in time.
pub async fn recv<T: Debug>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Assert nothing is queued right now.
pub async fn recv_nothing<T: Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    if let Ok(Some(item)) = timeout(Duration::from_millis(20), rx.recv()).await {
        panic!("unexpected event: {item:?}");
    }
}
