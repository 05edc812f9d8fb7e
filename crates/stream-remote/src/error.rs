use thiserror::Error;

/// Errors from session acquisition (login).
///
/// Kept `Clone` because a single login failure fans out to every handler
/// queued behind it, the way `QobuzClient::InvokeHandlers` re-throws one
/// `exception_ptr` to each waiting handler.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("no session established yet")]
    NoSession,

    #[error("authentication failed: {0}")]
    AuthError(String),
}

/// Errors from a track URL lookup.
#[derive(Debug, Error)]
pub enum TrackRequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("response finished without a url field")]
    MissingUrl,
}
