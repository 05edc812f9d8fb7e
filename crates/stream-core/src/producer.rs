use std::any::Any;
use std::sync::Weak;

use crate::stream::AsyncInputStream;

/// The contract a plugin (a remote HTTP fetcher, a local file reader, ...)
/// implements to plug into the stream core.
///
/// Both methods are always called on the event-loop thread, under the
/// stream's mutex, and must not block — they arm the transport and return
/// immediately; bytes arrive later via [`StreamHandle::append_bytes`] or
/// [`StreamHandle::commit_write_buffer`], called from wherever the
/// embedder's event loop delivers transport readiness.
pub trait Producer: Send + Sync {
    /// Called when the core wants bytes to flow (initially, and after a
    /// backpressure pause is lifted). May fail on a hard transport error.
    fn do_resume(&self) -> anyhow::Result<()>;

    /// Called when the core needs the transport repositioned to `offset`.
    /// Must arrange for a later call to `seek_done` on the stream, on the
    /// event-loop thread. May fail, in which case the core cancels the
    /// seek and postpones the error.
    fn do_seek(&self, offset: u64) -> anyhow::Result<()>;
}

/// A producer's non-owning back-reference to the stream core that owns it.
///
/// The stream core owns the buffer, tag, and deferred handles outright; the
/// producer only ever gets a weak handle back, so a producer outliving its
/// stream (e.g. a stray callback from the embedder's HTTP client) silently
/// no-ops instead of touching freed state.
pub struct StreamHandle<P: Producer + 'static> {
    pub(crate) inner: Weak<AsyncInputStream<P>>,
}

impl<P: Producer + 'static> Clone for StreamHandle<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Producer + 'static> StreamHandle<P> {
    /// Tells the core to stop expecting more bytes until resumed. Must only
    /// be called from the event-loop thread.
    pub fn pause(&self) {
        if let Some(stream) = self.inner.upgrade() {
            stream.pause();
        }
    }

    /// Appends `n` bytes already written into the ring buffer's write
    /// window (obtained out-of-band by the producer) and flips `ready` on
    /// first call.
    pub fn commit_write_buffer(&self, n: usize) {
        if let Some(stream) = self.inner.upgrade() {
            stream.commit_write_buffer(n);
        }
    }

    /// Copies `data` into the buffer (wrapping if necessary) and flips
    /// `ready` on first call.
    pub fn append_bytes(&self, data: &[u8]) {
        if let Some(stream) = self.inner.upgrade() {
            stream.append_bytes(data);
        }
    }

    /// Replaces the current tag, dropping the previous one.
    pub fn set_tag(&self, tag: Box<dyn Any + Send>) {
        if let Some(stream) = self.inner.upgrade() {
            stream.set_tag(tag);
        }
    }

    /// Records the total stream size, if known.
    pub fn set_size(&self, size: u64) {
        if let Some(stream) = self.inner.upgrade() {
            stream.set_size(size);
        }
    }

    /// Records whether the producer supports seeking.
    pub fn set_seekable(&self, seekable: bool) {
        if let Some(stream) = self.inner.upgrade() {
            stream.set_seekable(seekable);
        }
    }

    /// Records the stream's MIME type.
    pub fn set_mime_type(&self, mime_type: impl Into<String>) {
        if let Some(stream) = self.inner.upgrade() {
            stream.set_mime_type(mime_type.into());
        }
    }

    /// Free space currently available for appended bytes. 0 if the handle
    /// has outlived its stream.
    pub fn write_capacity(&self) -> usize {
        self.inner.upgrade().map_or(0, |stream| stream.write_capacity())
    }

    /// Reports an asynchronous failure discovered after `do_resume` or
    /// `do_seek` already returned successfully.
    pub fn fail(&self, error: anyhow::Error) {
        if let Some(stream) = self.inner.upgrade() {
            stream.fail(error);
        }
    }

    /// Signals that the producer's transport has been repositioned and is
    /// ready to deliver bytes from the seek target.
    pub fn seek_done(&self) {
        if let Some(stream) = self.inner.upgrade() {
            stream.seek_done();
        }
    }

    /// Marks the stream as closed for new bytes (end-of-stream). The core
    /// computes EOF dynamically from this plus buffer occupancy.
    pub fn close(&self) {
        if let Some(stream) = self.inner.upgrade() {
            stream.close();
        }
    }
}
