//! WebSocket transport over tokio-tungstenite
//!
//! [`split`] turns an upgraded stream into independent source and sink halves
//! so the two drain loops can block on their own side only.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::{FrameSink, FrameSource, TransportError};
use crate::envelope::Content;

/// Read half of a WebSocket connection
#[derive(Debug)]
pub struct WsSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Write half of a WebSocket connection
#[derive(Debug)]
pub struct WsSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

/// Split an upgraded WebSocket into (sink, source) halves
pub fn split<S>(ws: WebSocketStream<S>) -> (WsSink<S>, WsSource<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = ws.split();
    (WsSink { sink }, WsSource { stream })
}

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Content, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Content::Text(text)),
                Some(Ok(Message::Binary(data))) => return Ok(Content::Binary(data)),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WsSource::next_frame: close frame received");
                    return Err(TransportError::Closed);
                }
                // Pongs are queued by tungstenite itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Closed),
            }
        }
    }
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let message = match std::str::from_utf8(&frame) {
            Ok(text) => Message::Text(text.to_owned()),
            Err(_) => Message::Binary(frame.to_vec()),
        };
        self.sink.send(message).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        debug!("WsSink::close: called");
        self.sink.send(Message::Close(None)).await?;
        self.sink.close().await?;
        Ok(())
    }
}
