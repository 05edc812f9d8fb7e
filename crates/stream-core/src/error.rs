use thiserror::Error;

/// Errors the stream core produces or relays to the consumer.
#[derive(Debug, Error)]
pub enum StreamError {
    /// `seek` was called on a stream whose producer does not support seeking.
    #[error("stream is not seekable")]
    NotSeekable,

    /// An operation requiring `ready` was called before the first byte (or
    /// metadata) arrived.
    #[error("stream is not ready")]
    NotReady,

    /// A producer-raised failure, captured opaquely and postponed to the
    /// consumer's next checkpoint (`read`, `seek`, or `check`).
    #[error("transport error: {0}")]
    Transport(anyhow::Error),
}
