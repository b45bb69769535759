//! Byte-stream types handed between resolution stages

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::AsyncRead;

/// Encoding of a resolved audio byte-stream
///
/// Tells the voice sink whether the bytes can be forwarded as-is or must
/// pass through the transcoder first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Pre-encoded Opus in a WebM container
    WebmOpus,

    /// Pre-encoded Opus in an Ogg container
    OggOpus,

    /// Arbitrary encoding; needs transcoding before the sink can use it
    Arbitrary,
}

/// Owned handle to an audio byte-stream
///
/// Exclusively owned by whichever component last produced it until handed
/// to the next stage; never shared.
pub struct AudioStream(Box<dyn AsyncRead + Send + Unpin>);

impl AudioStream {
    /// Wrap a raw async byte source
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self(Box::new(reader))
    }

    /// Consume the handle, returning the inner reader
    pub fn into_inner(self) -> Box<dyn AsyncRead + Send + Unpin> {
        self.0
    }
}

impl AsyncRead for AudioStream {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AudioStream")
    }
}

/// A resolved stream: byte source, encoding tag, and provider metadata
#[derive(Debug)]
pub struct StreamInfo {
    /// The audio byte-stream
    pub stream: AudioStream,

    /// Encoding of the stream
    pub kind: StreamKind,

    /// Free-form provider metadata (bitrate, container details, ...)
    pub metadata: serde_json::Value,
}

impl StreamInfo {
    /// Create stream info with no metadata
    pub fn new(stream: AudioStream, kind: StreamKind) -> Self {
        Self {
            stream,
            kind,
            metadata: serde_json::Value::Null,
        }
    }

    /// Whether the sink needs the transcoder for this stream
    pub fn needs_transcoding(&self) -> bool {
        self.kind == StreamKind::Arbitrary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn stream_reads_through() {
        let info = StreamInfo::new(
            AudioStream::new(std::io::Cursor::new(vec![1u8, 2, 3])),
            StreamKind::OggOpus,
        );
        assert!(!info.needs_transcoding());

        let mut buf = Vec::new();
        let mut stream = info.stream;
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
    }

    #[test]
    fn arbitrary_needs_transcoding() {
        let info = StreamInfo::new(
            AudioStream::new(std::io::Cursor::new(Vec::new())),
            StreamKind::Arbitrary,
        );
        assert!(info.needs_transcoding());
    }
}
