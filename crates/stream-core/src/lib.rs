//! Stream Core — a bounded ring-buffered async input stream.
//!
//! This crate provides the concurrency core that sits between a producer
//! running on an event-loop thread (fetching bytes, potentially throttled by
//! buffer capacity) and a single consumer thread issuing synchronous reads
//! and seeks. See [`AsyncInputStream`] for the main entry point.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stream_core::{AsyncInputStream, Producer, StreamConfig, ThreadEventLoop};
//!
//! struct NullProducer;
//! impl Producer for NullProducer {
//!     fn do_resume(&self) -> anyhow::Result<()> { Ok(()) }
//!     fn do_seek(&self, _offset: u64) -> anyhow::Result<()> { Ok(()) }
//! }
//!
//! let event_loop: Arc<dyn stream_core::EventLoop> = Arc::new(ThreadEventLoop::spawn());
//! let stream = AsyncInputStream::new(event_loop, "mem://example", StreamConfig::default(), |_handle| NullProducer);
//! stream.close();
//! assert!(stream.is_eof());
//! let mut buf = [0u8; 8];
//! assert_eq!(stream.read(&mut buf).unwrap(), 0);
//! ```

mod config;
mod error;
mod event_loop;
mod invariants;
mod mixer;
mod producer;
mod ring;
mod stream;

pub use config::StreamConfig;
pub use error::StreamError;
pub use event_loop::{Deferred, EventLoop, ThreadEventLoop};
pub use mixer::MixerType;
pub use producer::{Producer, StreamHandle};
pub use ring::RingBuffer;
pub use stream::AsyncInputStream;
