//! Line-framed TCP transport built on `tokio-util` codecs.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Default upper bound on a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_LEN: usize = 8 * 1024;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    max_frame_len: usize,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(%local, "TCP transport listening");
        }
        Ok(Self {
            listener,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Sets the longest frame accepted from clients.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted TCP connection");

        let (read_half, write_half) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer,
            reader: Mutex::new(FramedRead::new(
                read_half,
                FrameCodec::new(self.max_frame_len),
            )),
            writer: Mutex::new(FramedWrite::new(
                write_half,
                FrameCodec::new(self.max_frame_len),
            )),
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

/// A single TCP connection.
///
/// The read and write halves sit behind separate locks so a task blocked
/// in [`recv`](Connection::recv) never holds up a concurrent send.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<FramedRead<OwnedReadHalf, FrameCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, frame: &str) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|e| TransportError::SendFailed(into_io(e)))
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        match self.reader.lock().await.next().await {
            Some(Ok(Frame::Line(line))) => Ok(Some(line)),
            Some(Ok(Frame::TooLong(max))) => Err(TransportError::FrameTooLong(max)),
            Some(Err(e)) => Err(TransportError::ReceiveFailed(into_io(e))),
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        SinkExt::<&str>::close(&mut *writer)
            .await
            .map_err(|e| TransportError::SendFailed(into_io(e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

fn into_io(err: LinesCodecError) -> std::io::Error {
    match err {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "line too long")
        }
    }
}

/// A decoded unit from the wire.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line(String),
    /// A line longer than the limit was dropped.
    TooLong(usize),
}

/// `LinesCodec` with a length limit that reports oversized lines as a
/// [`Frame`] instead of an error.
///
/// A codec error terminates a `FramedRead` stream; an oversized line is a
/// client mistake, not a broken transport, so it must not end the stream.
#[derive(Debug)]
struct FrameCodec {
    lines: LinesCodec,
    max_frame_len: usize,
}

impl FrameCodec {
    fn new(max_frame_len: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_frame_len),
            max_frame_len,
        }
    }

    fn map(&self, decoded: Result<Option<String>, LinesCodecError>) -> Result<Option<Frame>, LinesCodecError> {
        match decoded {
            Ok(line) => Ok(line.map(Frame::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Ok(Some(Frame::TooLong(self.max_frame_len)))
            }
            Err(e) => Err(e),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        let decoded = self.lines.decode(buf);
        self.map(decoded)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        let decoded = self.lines.decode_eof(buf);
        self.map(decoded)
    }
}

impl Encoder<&str> for FrameCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: &str, buf: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.lines.encode(line, buf)
    }
}
