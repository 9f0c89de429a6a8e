//! Interactive terminal client
//!
//! Each stdin line goes out as one text frame. Frames from the hub are decoded
//! and printed; system announcements lose their `/` marker and get a `*` prefix.

use bytes::Bytes;
use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::envelope::{Codec, Content, Envelope, SYSTEM_PREFIX};
use crate::transport::{FrameSink, FrameSource, TransportError, websocket};

/// Render an envelope as one line of terminal output
pub fn render(envelope: &Envelope) -> String {
    let body = match envelope.content() {
        Content::Text(text) => text.clone(),
        Content::Binary(data) => format!("<{} bytes>", data.len()),
    };

    match envelope.sender() {
        Some(sender) => format!("{sender}: {body}"),
        None => match body.strip_prefix(SYSTEM_PREFIX) {
            Some(notice) => format!("* {notice}"),
            None => body,
        },
    }
}

/// Render a raw frame, falling back to the frame itself if it does not decode
pub fn render_frame(codec: &dyn Codec, content: &Content) -> String {
    let bytes: &[u8] = match content {
        Content::Text(text) => text.as_bytes(),
        Content::Binary(data) => data,
    };
    match codec.decode(bytes) {
        Ok(envelope) => render(&envelope),
        Err(e) => {
            debug!(error = %e, "render_frame: undecodable frame");
            match content {
                Content::Text(text) => text.clone(),
                Content::Binary(data) => format!("<{} bytes>", data.len()),
            }
        }
    }
}

/// Connect to `url` and bridge stdin/stdout until either side closes
pub async fn run(url: &str, codec: &dyn Codec) -> Result<()> {
    debug!(%url, "client::run: called");
    let (ws, _response) = tokio_tungstenite::connect_async(url)
        .await
        .context(format!("Failed to connect to {url}"))?;
    info!(%url, "Connected");
    println!("* Connected to {url}");

    let (mut sink, mut source) = websocket::split(ws);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => sink.send_frame(Bytes::from(line)).await?,
                None => {
                    debug!("client::run: stdin closed");
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "client::run: close frame not sent");
                    }
                    break;
                }
            },
            frame = source.next_frame() => match frame {
                Ok(content) => println!("{}", render_frame(codec, &content)),
                Err(TransportError::Closed) => {
                    println!("* Disconnected");
                    break;
                }
                Err(e) => return Err(e).context("Connection lost"),
            },
        }
    }

    Ok(())
}
