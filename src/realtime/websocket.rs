//! WebSocket transport on tokio-tungstenite
//!
//! Every connection runs in its own task. The task reports what happens on
//! the socket as [`TransportEvent`]s tagged with the connection id, always
//! ending with exactly one `Close`.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::transport::{ConnectionHandle, ConnectionId, Transport, TransportEvent};
use crate::error::{RealtimeError, Result};

/// Channel the connection tasks report on
pub type TransportSink = mpsc::UnboundedSender<(ConnectionId, TransportEvent)>;

#[derive(Debug)]
enum HandleCommand {
    Send(String),
    Close,
}

/// Opens realtime connections with `connect_async`
pub struct WsTransport {
    events: TransportSink,
    auth_token: Option<String>,
}

impl WsTransport {
    pub fn new(events: TransportSink, auth_token: Option<String>) -> Self {
        // Fails only when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self { events, auth_token }
    }

    fn request(&self, endpoint: &Url) -> Result<Request> {
        let mut request = endpoint.as_str().into_client_request()?;
        if let Some(ref token) = self.auth_token {
            let cookie = HeaderValue::from_str(&format!("token={}", token))
                .map_err(|e| RealtimeError::Config(format!("invalid auth token: {}", e)))?;
            request.headers_mut().insert(COOKIE, cookie);
        }
        Ok(request)
    }
}

impl Transport for WsTransport {
    type Handle = WsHandle;

    fn open(&mut self, endpoint: &Url, id: ConnectionId) -> Result<WsHandle> {
        let request = self.request(endpoint)?;
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(id, request, receiver, self.events.clone()));

        Ok(WsHandle { commands, task })
    }
}

/// Handle to a connection task
pub struct WsHandle {
    commands: mpsc::UnboundedSender<HandleCommand>,
    task: JoinHandle<()>,
}

impl ConnectionHandle for WsHandle {
    fn send(&mut self, text: String) -> Result<()> {
        self.commands
            .send(HandleCommand::Send(text))
            .map_err(|_| RealtimeError::Transport("connection task has finished".to_string()))
    }

    fn close(&mut self) {
        let _ = self.commands.send(HandleCommand::Close);
    }

    fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_connection(
    id: ConnectionId,
    request: Request,
    mut commands: mpsc::UnboundedReceiver<HandleCommand>,
    events: TransportSink,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send((id, event));
    };
    let closed = |code: Option<u16>, reason: &str| TransportEvent::Close {
        code,
        reason: reason.to_string(),
    };

    let handshake = connect_async(request);
    tokio::pin!(handshake);

    let stream = loop {
        tokio::select! {
            result = &mut handshake => match result {
                Ok((stream, _response)) => break stream,
                Err(e) => {
                    let reason = e.to_string();
                    emit(TransportEvent::Error(reason.clone()));
                    emit(closed(None, &reason));
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(HandleCommand::Send(_)) => {
                    tracing::debug!(connection = %id, "Dropping frame queued before open");
                }
                Some(HandleCommand::Close) | None => {
                    emit(closed(None, "closed before open"));
                    return;
                }
            },
        }
    };

    emit(TransportEvent::Open);
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => emit(TransportEvent::Message(text)),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                        .unwrap_or((None, String::new()));
                    emit(TransportEvent::Close { code, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let reason = e.to_string();
                    emit(TransportEvent::Error(reason.clone()));
                    emit(closed(None, &reason));
                    return;
                }
                None => {
                    emit(closed(None, "stream ended"));
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(HandleCommand::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        let reason = e.to_string();
                        emit(TransportEvent::Error(reason.clone()));
                        emit(closed(None, &reason));
                        return;
                    }
                }
                Some(HandleCommand::Close) | None => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!(connection = %id, "Close frame not delivered: {}", e);
                    }
                    emit(closed(Some(1000), "closed by client"));
                    return;
                }
            },
        }
    }
}
