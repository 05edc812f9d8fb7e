use std::any::Any;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};

use crate::error::StreamError;
use crate::event_loop::{Deferred, EventLoop};
use crate::invariants::{
    debug_assert_eof_yields_zero, debug_assert_no_deferred_seek_on_fast_forward,
    debug_assert_read_advanced, debug_assert_resume_scheduled,
};
use crate::producer::{Producer, StreamHandle};
use crate::ring::RingBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekState {
    None,
    Scheduled,
    Pending,
}

struct Inner {
    buffer: RingBuffer,
    size: Option<u64>,
    offset: u64,
    seekable: bool,
    ready: bool,
    open: bool,
    paused: bool,
    seek_state: SeekState,
    seek_offset: u64,
    tag: Option<Box<dyn Any + Send>>,
    mime_type: Option<String>,
    postponed_error: Option<StreamError>,
}

impl Inner {
    fn is_eof(&self) -> bool {
        let past_known_size = self.size.is_some_and(|size| self.offset >= size);
        let closed_and_drained = !self.open && self.buffer.is_empty();
        past_known_size || closed_and_drained
    }
}

/// The stream core: owns the ring buffer, synchronization primitives, and
/// the backpressure/seek state machine that bridges an async producer and
/// a synchronous consumer.
///
/// `P` is the concrete [`Producer`] plugged in (a remote HTTP fetcher, a
/// local file reader, ...). The stream is always held behind an `Arc`
/// because the producer is handed a non-owning [`StreamHandle`] back to it
/// at construction time.
pub struct AsyncInputStream<P: Producer + 'static> {
    url: String,
    resume_at: usize,
    event_loop: Arc<dyn EventLoop>,
    inner: Mutex<Inner>,
    cond: Condvar,
    producer: P,
    deferred_resume: Deferred,
    deferred_seek: Deferred,
    self_weak: Mutex<Weak<Self>>,
}

impl<P: Producer + 'static> AsyncInputStream<P> {
    /// Constructs a new stream and its producer in one step.
    ///
    /// `make_producer` receives a [`StreamHandle`] it can store to call back
    /// into the core once bytes start arriving; this is how the producer
    /// gets its non-owning back-reference despite the core owning the
    /// producer outright.
    pub fn new(
        event_loop: Arc<dyn EventLoop>,
        url: impl Into<String>,
        config: crate::StreamConfig,
        make_producer: impl FnOnce(StreamHandle<P>) -> P,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let handle = StreamHandle {
                inner: weak.clone(),
            };

            Self {
                url: url.into(),
                resume_at: config.resume_at,
                event_loop: Arc::clone(&event_loop),
                inner: Mutex::new(Inner {
                    buffer: RingBuffer::new(config.capacity),
                    size: None,
                    offset: 0,
                    seekable: false,
                    ready: false,
                    open: true,
                    paused: false,
                    seek_state: SeekState::None,
                    seek_offset: 0,
                    tag: None,
                    mime_type: None,
                    postponed_error: None,
                }),
                cond: Condvar::new(),
                producer: make_producer(handle),
                deferred_resume: Deferred::new(Arc::clone(&event_loop)),
                deferred_seek: Deferred::new(Arc::clone(&event_loop)),
                self_weak: Mutex::new(weak.clone()),
            }
        })
    }

    /// The immutable origin identifier this stream was created with.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn weak_self(&self) -> Weak<Self> {
        self.self_weak.lock().unwrap().clone()
    }

    // -------------------------------------------------------------------
    // Consumer-facing operations
    // -------------------------------------------------------------------

    /// Blocks until data is available, EOF is reached, or an error is
    /// postponed; then copies up to `dst.len()` bytes and returns the count
    /// actually copied (0 at EOF).
    ///
    /// # Panics
    ///
    /// Debug builds assert the caller is not the event-loop thread.
    pub fn read(&self, dst: &mut [u8]) -> Result<usize, StreamError> {
        debug_assert!(
            !self.event_loop.is_inside(),
            "read() must not be called from the event-loop thread"
        );

        let mut guard = self.inner.lock().unwrap();
        loop {
            self.take_postponed_error(&mut guard)?;

            let avail = guard.buffer.read_window().len();
            if avail > 0 || guard.is_eof() {
                break;
            }
            guard = self.cond.wait(guard).unwrap();
        }

        let is_eof = guard.is_eof();
        let r = guard.buffer.read_window();
        let n = dst.len().min(r.len());
        dst[..n].copy_from_slice(&r[..n]);
        guard.buffer.consume(n);
        guard.offset += n as u64;

        debug_assert_read_advanced!(n, dst.len());
        debug_assert_eof_yields_zero!(is_eof && guard.buffer.is_empty() && n == 0, n);

        let below_watermark = guard.buffer.size() < self.resume_at;
        let should_resume = guard.paused && below_watermark;
        if should_resume {
            self.schedule_deferred_resume();
        }
        debug_assert_resume_scheduled!(guard.paused, below_watermark, should_resume);

        Ok(n)
    }

    /// Seeks to `new_offset`, fast-forwarding within the buffer when
    /// possible and otherwise cancelling the in-flight transfer and
    /// restarting it via the producer.
    ///
    /// # Panics
    ///
    /// Debug builds assert the stream is ready and no seek is already in
    /// flight.
    pub fn seek(&self, new_offset: u64) -> Result<(), StreamError> {
        let mut guard = self.inner.lock().unwrap();
        debug_assert!(guard.ready, "seek() called before the stream is ready");
        debug_assert!(
            guard.seek_state == SeekState::None,
            "seek() called while a seek is already in flight"
        );

        if new_offset == guard.offset {
            return Ok(());
        }
        if !guard.seekable {
            return Err(StreamError::NotSeekable);
        }

        while new_offset > guard.offset {
            let r = guard.buffer.read_window();
            if r.is_empty() {
                break;
            }
            let gap = (new_offset - guard.offset) as usize;
            let nbytes = gap.min(r.len());
            guard.buffer.consume(nbytes);
            guard.offset += nbytes as u64;
        }

        if new_offset == guard.offset {
            debug_assert_no_deferred_seek_on_fast_forward!(true, false);
            return Ok(());
        }

        guard.seek_offset = new_offset;
        guard.seek_state = SeekState::Scheduled;

        let weak = self.weak_self();
        self.deferred_seek.schedule(move || {
            if let Some(stream) = weak.upgrade() {
                stream.run_deferred_seek();
            }
        });

        while guard.seek_state != SeekState::None {
            guard = self.cond.wait(guard).unwrap();
        }

        self.take_postponed_error(&mut guard)
    }

    /// True iff the stream has reached end-of-file: known size exceeded, or
    /// the producer closed with an empty buffer.
    pub fn is_eof(&self) -> bool {
        self.inner.lock().unwrap().is_eof()
    }

    /// True if data is readable, EOF is reached, or an error is postponed.
    /// Never blocks.
    pub fn is_available(&self) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.postponed_error.is_some() || guard.is_eof() || !guard.buffer.is_empty()
    }

    /// Atomically takes ownership of the current tag, if any, clearing the
    /// slot.
    pub fn read_tag(&self) -> Option<Box<dyn Any + Send>> {
        self.inner.lock().unwrap().tag.take()
    }

    /// The stream's MIME type, if the producer has set one.
    pub fn mime_type(&self) -> Option<String> {
        self.inner.lock().unwrap().mime_type.clone()
    }

    /// If an error is postponed, takes and returns it; otherwise `Ok(())`.
    pub fn check(&self) -> Result<(), StreamError> {
        let mut guard = self.inner.lock().unwrap();
        self.take_postponed_error(&mut guard)
    }

    fn take_postponed_error(&self, guard: &mut MutexGuard<'_, Inner>) -> Result<(), StreamError> {
        match guard.postponed_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // -------------------------------------------------------------------
    // Producer-facing operations (event-loop thread only)
    // -------------------------------------------------------------------

    /// Tells the core to stop expecting more bytes. Asserts event-loop
    /// context in debug builds.
    pub fn pause(&self) {
        debug_assert!(self.event_loop.is_inside(), "pause() must run on the event loop");
        self.inner.lock().unwrap().paused = true;
    }

    /// Appends `n` bytes already written into the write window, flips
    /// `ready` on first call, and wakes any waiting consumer.
    pub fn commit_write_buffer(&self, n: usize) {
        debug_assert!(
            self.event_loop.is_inside(),
            "commit_write_buffer() must run on the event loop"
        );
        let mut guard = self.inner.lock().unwrap();
        guard.buffer.append(n);
        guard.ready = true;
        self.cond.notify_all();
    }

    /// Copies `data` into the buffer (wrapping if necessary), flips `ready`
    /// on first call, and wakes any waiting consumer.
    pub fn append_bytes(&self, data: &[u8]) {
        debug_assert!(
            self.event_loop.is_inside(),
            "append_bytes() must run on the event loop"
        );
        let mut guard = self.inner.lock().unwrap();
        guard.buffer.append_bytes(data);
        guard.ready = true;
        self.cond.notify_all();
    }

    /// Replaces the current tag, dropping the previous one. Tags do not
    /// queue: a consumer that never calls `read_tag` only ever sees the
    /// latest one.
    pub fn set_tag(&self, tag: Box<dyn Any + Send>) {
        self.inner.lock().unwrap().tag = Some(tag);
    }

    /// Records the total stream size. Must be called before the stream
    /// becomes ready.
    pub fn set_size(&self, size: u64) {
        self.inner.lock().unwrap().size = Some(size);
    }

    /// Records whether the producer supports seeking. Must be called
    /// before the stream becomes ready.
    pub fn set_seekable(&self, seekable: bool) {
        self.inner.lock().unwrap().seekable = seekable;
    }

    /// Records the stream's MIME type. Must be called before the stream
    /// becomes ready.
    pub fn set_mime_type(&self, mime_type: String) {
        self.inner.lock().unwrap().mime_type = Some(mime_type);
    }

    /// Free space currently available for appended bytes. Lets a chunked
    /// producer size each write to what the buffer can actually hold instead
    /// of overrunning `RingBuffer::append_bytes`'s capacity check.
    ///
    /// # Panics
    ///
    /// Debug builds assert this runs on the event-loop thread.
    pub fn write_capacity(&self) -> usize {
        debug_assert!(
            self.event_loop.is_inside(),
            "write_capacity() must run on the event loop"
        );
        let guard = self.inner.lock().unwrap();
        guard.buffer.capacity() - guard.buffer.size()
    }

    /// Marks the stream closed for new bytes (end-of-stream). EOF is then
    /// computed dynamically once the buffer drains.
    pub fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.open = false;
        self.cond.notify_all();
    }

    /// Reports an asynchronous producer failure — one not caught
    /// synchronously by `do_resume`/`do_seek`'s return value, e.g. a
    /// transfer that fails after it was already under way. Postpones the
    /// error to the consumer's next checkpoint, same as a synchronous
    /// failure would.
    ///
    /// # Panics
    ///
    /// Debug builds assert this runs on the event-loop thread.
    pub fn fail(&self, error: anyhow::Error) {
        debug_assert!(self.event_loop.is_inside(), "fail() must run on the event loop");
        let mut guard = self.inner.lock().unwrap();
        guard.postponed_error = Some(StreamError::Transport(error));
        self.cond.notify_all();
    }

    /// Completes a pending seek: the producer's transport is repositioned
    /// and ready to deliver from the seek target.
    ///
    /// # Panics
    ///
    /// Debug builds assert a seek is actually pending and this runs on the
    /// event-loop thread.
    pub fn seek_done(&self) {
        debug_assert!(self.event_loop.is_inside(), "seek_done() must run on the event loop");
        let mut guard = self.inner.lock().unwrap();
        debug_assert!(
            guard.seek_state == SeekState::Pending,
            "seek_done() called with no seek pending"
        );
        guard.open = true;
        guard.seek_state = SeekState::None;
        self.cond.notify_all();
    }

    // -------------------------------------------------------------------
    // Internal: deferred task bodies, run on the event-loop thread
    // -------------------------------------------------------------------

    fn schedule_deferred_resume(&self) {
        let weak = self.weak_self();
        self.deferred_resume.schedule(move || {
            if let Some(stream) = weak.upgrade() {
                stream.run_deferred_resume();
            }
        });
    }

    fn run_deferred_resume(&self) {
        let mut guard = self.inner.lock().unwrap();
        if let Err(e) = self.resume_locked(&mut guard) {
            tracing::warn!(url = %self.url, error = %e, "do_resume failed");
            guard.postponed_error = Some(StreamError::Transport(e));
            self.cond.notify_all();
        }
    }

    fn run_deferred_seek(&self) {
        let mut guard = self.inner.lock().unwrap();
        if guard.seek_state != SeekState::Scheduled {
            return;
        }

        let seek_offset = guard.seek_offset;
        let result = self.resume_locked(&mut guard).and_then(|()| {
            guard.seek_state = SeekState::Pending;
            guard.buffer.clear();
            guard.paused = false;
            self.producer.do_seek(seek_offset)
        });

        if let Err(e) = result {
            tracing::warn!(url = %self.url, error = %e, "seek failed");
            guard.seek_state = SeekState::None;
            guard.postponed_error = Some(StreamError::Transport(e));
            self.cond.notify_all();
        }
    }

    /// `Resume()` in the original: lifts `paused` and arms the producer, if
    /// it was paused. A no-op otherwise.
    fn resume_locked(&self, guard: &mut MutexGuard<'_, Inner>) -> anyhow::Result<()> {
        if guard.paused {
            guard.paused = false;
            self.producer.do_resume()?;
        }
        Ok(())
    }
}
