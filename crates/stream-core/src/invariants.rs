//! Debug assertion macros for properties that should hold at every
//! checkpoint but are too costly (or too awkward) to check in release
//! builds. Only active under `#[cfg(debug_assertions)]`, so there is zero
//! overhead in release builds.

// =============================================================================
// INV-RING-01: Ring Buffer Conservation
// =============================================================================

/// Assert that `readable <= capacity` still holds after a ring buffer
/// mutation.
///
/// Used in: `RingBuffer::consume()`, `RingBuffer::append()`
macro_rules! debug_assert_ring_conserved {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len <= $capacity,
            "INV-RING-01 violated: readable {} exceeds capacity {}",
            $len,
            $capacity
        )
    };
}

// =============================================================================
// INV-STREAM-01: Read Never Over-Delivers
// =============================================================================

/// Assert that a successful `read` never returned more bytes than were
/// requested.
///
/// Used in: `AsyncInputStream::read()`
macro_rules! debug_assert_read_advanced {
    ($n:expr, $requested:expr) => {
        debug_assert!(
            $n <= $requested,
            "INV-STREAM-01 violated: read returned {} bytes but only {} were requested",
            $n,
            $requested
        )
    };
}

// =============================================================================
// INV-STREAM-02: EOF Yields Zero
// =============================================================================

/// Assert that once EOF is observed with an empty buffer, `read` returns 0.
///
/// Used in: `AsyncInputStream::read()`
macro_rules! debug_assert_eof_yields_zero {
    ($is_eof:expr, $n:expr) => {
        debug_assert!(
            !$is_eof || $n == 0,
            "INV-STREAM-02 violated: at EOF but read returned {} bytes",
            $n
        )
    };
}

// =============================================================================
// INV-SEEK-01: No Deferred Seek on Fast-Forward
// =============================================================================

/// Assert that a seek satisfied entirely from the buffer did not also
/// schedule a deferred seek.
///
/// Used in: `AsyncInputStream::seek()`
macro_rules! debug_assert_no_deferred_seek_on_fast_forward {
    ($satisfied_locally:expr, $scheduled:expr) => {
        debug_assert!(
            !$satisfied_locally || !$scheduled,
            "INV-SEEK-01 violated: seek was satisfied from the buffer but a deferred seek was scheduled anyway"
        )
    };
}

// =============================================================================
// INV-STREAM-03: Backpressure Relief Scheduling
// =============================================================================

/// Assert that a deferred resume was scheduled whenever the buffer drains
/// below the low watermark while paused.
///
/// Used in: `AsyncInputStream::read()` after consuming bytes
macro_rules! debug_assert_resume_scheduled {
    ($paused:expr, $below_watermark:expr, $scheduled:expr) => {
        debug_assert!(
            !($paused && $below_watermark) || $scheduled,
            "INV-STREAM-03 violated: paused and below watermark but no resume was scheduled"
        )
    };
}

// =============================================================================
// INV-STREAM-04: Single Postponed Error
// =============================================================================

/// Assert that `postponed_error` never holds more than a single value at a
/// time (enforced by `Option`, documented here as the contract it encodes).
///
/// Used in: `AsyncInputStream::fail()`, `run_deferred_resume()`,
/// `run_deferred_seek()`
macro_rules! debug_assert_single_postponed_error {
    ($had_previous:expr, $overwritten:expr) => {
        debug_assert!(
            !$had_previous || $overwritten,
            "INV-STREAM-04 violated: a postponed error was dropped instead of delivered"
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_eof_yields_zero;
pub(crate) use debug_assert_no_deferred_seek_on_fast_forward;
pub(crate) use debug_assert_read_advanced;
pub(crate) use debug_assert_resume_scheduled;
pub(crate) use debug_assert_ring_conserved;
#[allow(unused_imports)]
pub(crate) use debug_assert_single_postponed_error;
