//! Stream Remote — a session-authenticated remote track producer.
//!
//! Implements `stream-core`'s [`stream_core::Producer`] contract against a
//! Qobuz-style streaming API: a single-flight login client
//! ([`SessionClient`]), a signed-URL builder ([`sign::signed_url`]), a
//! track-lookup scanner ([`track_request::UrlScanner`]), and the producer
//! that ties them together ([`RemoteProducer`]).

mod config;
mod error;
mod invariants;
mod remote;
mod session;
mod sign;
mod track_request;

pub use config::QobuzConfig;
pub use error::{SessionError, TrackRequestError};
pub use remote::RemoteProducer;
pub use session::{Session, SessionClient};
pub use sign::signed_url;
pub use track_request::UrlScanner;
