use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use skirmish_protocol::{Transport, TransportError};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

/// [`Transport`] over a WebSocket connection, exchanging text frames.
pub(crate) struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    /// Opens the connection to `url`.
    pub(crate) async fn connect(url: &str) -> Result<Self> {
        let (stream, response) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;
        tracing::info!(status = %response.status(), "connected to game server");
        Ok(Self { stream })
    }
}

impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(TransportError::new)
    }

    async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(message) = self.stream.next().await {
            match message.map_err(TransportError::new)? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(error) => tracing::warn!(%error, "dropping non-utf8 binary frame"),
                },
                Message::Close(frame) => {
                    tracing::info!(?frame, "server closed the connection");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }
}
