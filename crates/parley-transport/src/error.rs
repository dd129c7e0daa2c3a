/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed (reset, broken pipe, invalid UTF-8).
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer sent a frame longer than the configured limit.
    ///
    /// The oversized frame is discarded up to the next line terminator;
    /// the connection itself remains usable.
    #[error("frame exceeds {0} bytes")]
    FrameTooLong(usize),
}

impl TransportError {
    /// Returns `true` if the connection can keep being read after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::FrameTooLong(_))
    }
}
