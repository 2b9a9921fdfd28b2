use crate::service::{self, SubmissionService};
use futures::{SinkExt, StreamExt};
use stalk_engine::deadline::CancelHandle;
use stalk_engine::protocol::ServiceResponse;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

/// WebSocket front end: one JSON request per text frame, one JSON response
/// per request. Requests on a connection run concurrently and may be answered
/// out of order; clients match responses by `id`.
pub struct ServiceServer<S> {
    host: String,
    port: u16,
    service: Arc<S>,
}

pub struct ServerHandle {
    pub local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections. Open connections finish on their own.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }

    pub async fn wait(self) {
        let _ = self.accept_task.await;
    }
}

impl<S: SubmissionService + 'static> ServiceServer<S> {
    pub fn new(host: impl Into<String>, port: u16, service: Arc<S>) -> Self {
        Self {
            host: host.into(),
            port,
            service,
        }
    }

    /// Bind and start accepting. Port 0 picks a free port; see `local_addr`.
    pub async fn start(&self) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let local_addr = listener.local_addr()?;
        info!("Service listening on: ws://{}", local_addr);

        let service = self.service.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        info!("Accepted TCP connection from: {}", peer);
                        tokio::spawn(serve_connection(stream, service.clone()));
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            }
        });

        Ok(ServerHandle {
            local_addr,
            accept_task,
        })
    }
}

async fn serve_connection<S: SubmissionService + 'static>(stream: TcpStream, service: Arc<S>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("Error during the websocket handshake occurred: {}", e);
            return;
        }
    };

    info!("New WebSocket connection: established");
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (resp_tx, mut resp_rx) = mpsc::unbounded_channel::<ServiceResponse>();
    // Fetches still running when the client goes away are abandoned.
    let cancel = Arc::new(CancelHandle::new());

    loop {
        tokio::select! {
            Some(response) = resp_rx.recv() => {
                let json = match serde_json::to_string(&response) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize response: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(Message::Text(json)).await {
                    error!("Failed to send message to WS: {}", e);
                    break;
                }
            }

            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Request frame: {}", text);
                        let service = service.clone();
                        let cancel = cancel.clone();
                        let resp_tx = resp_tx.clone();
                        tokio::spawn(async move {
                            let response = service::handle_text(&*service, &text, &cancel).await;
                            let _ = resp_tx.send(response);
                        });
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket closed");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    cancel.cancel();
}
