//! The line-oriented channel seam between the relay link and the wire.
//!
//! The reconnect/resync loop only ever needs four things from a
//! transport: open it, read one line, write one line, drop it. Keeping
//! that surface behind traits lets tests drive the whole loop with a
//! scripted fake while production talks to a Unix domain socket framed
//! by [`LinesCodec`].

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::WorkbenchError;

// ── Traits ───────────────────────────────────────────────────────

/// Opens a fresh channel to the relay endpoint for one connection
/// attempt.
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    async fn open(
        &self,
        endpoint: &Path,
    ) -> Result<(Box<dyn ChannelReader>, Box<dyn ChannelWriter>), WorkbenchError>;
}

/// Receive half of an open channel.
#[async_trait]
pub trait ChannelReader: Send {
    /// Wait for the next line from the peer.
    ///
    /// Returns `Ok(None)` when the peer closes the channel cleanly.
    async fn read_line(&mut self) -> Result<Option<String>, WorkbenchError>;
}

/// Transmit half of an open channel.
#[async_trait]
pub trait ChannelWriter: Send {
    /// Write one line; the channel appends the newline delimiter.
    async fn write_line(&mut self, line: &str) -> Result<(), WorkbenchError>;
}

// ── Unix socket implementation ───────────────────────────────────

/// Production opener: connects a [`UnixStream`] to the relay socket.
#[derive(Debug, Default)]
pub struct UnixSocketOpener;

#[async_trait]
impl ChannelOpener for UnixSocketOpener {
    async fn open(
        &self,
        endpoint: &Path,
    ) -> Result<(Box<dyn ChannelReader>, Box<dyn ChannelWriter>), WorkbenchError> {
        // sun_path is 108 bytes on Linux; longer paths can never bind.
        if endpoint.as_os_str().len() >= 108 {
            return Err(WorkbenchError::InvalidEndpoint(format!(
                "socket path too long: {}",
                endpoint.display()
            )));
        }
        let stream = UnixStream::connect(endpoint).await?;
        let (reader, writer) = split_stream(stream);
        Ok((Box::new(reader), Box::new(writer)))
    }
}

fn split_stream(stream: UnixStream) -> (SocketReader, SocketWriter) {
    let (sink, stream) = Framed::new(stream, LinesCodec::new()).split();
    (SocketReader { inner: stream }, SocketWriter { inner: sink })
}

struct SocketReader {
    inner: SplitStream<Framed<UnixStream, LinesCodec>>,
}

#[async_trait]
impl ChannelReader for SocketReader {
    async fn read_line(&mut self) -> Result<Option<String>, WorkbenchError> {
        match self.inner.next().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

struct SocketWriter {
    inner: SplitSink<Framed<UnixStream, LinesCodec>, String>,
}

#[async_trait]
impl ChannelWriter for SocketWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), WorkbenchError> {
        self.inner.send(line.to_string()).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn reader_yields_lines_then_none_on_close() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let (mut reader, _writer) = split_stream(ours);

        let mut peer = theirs;
        peer.write_all(b"first\nsecond\n").await.unwrap();
        drop(peer);

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("second"));
        assert!(reader.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writer_appends_newline_delimiter() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let (_reader, mut writer) = split_stream(ours);

        writer.write_line(r#"{"method":"ping"}"#).await.unwrap();
        drop(writer);
        drop(_reader);

        let mut received = String::new();
        theirs.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "{\"method\":\"ping\"}\n");
    }

    #[tokio::test]
    async fn opener_fails_on_missing_endpoint() {
        let opener = UnixSocketOpener;
        let result = opener.open(Path::new("/nonexistent/relay.sock")).await;
        assert!(matches!(result, Err(WorkbenchError::Connection(_))));
    }

    #[tokio::test]
    async fn opener_rejects_overlong_socket_paths() {
        let opener = UnixSocketOpener;
        let long = format!("/tmp/{}.sock", "x".repeat(120));
        let result = opener.open(Path::new(&long)).await;
        assert!(matches!(result, Err(WorkbenchError::InvalidEndpoint(_))));
    }
}
