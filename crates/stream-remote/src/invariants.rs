//! Debug assertion macros for properties that should hold at every
//! checkpoint but are too costly (or too awkward) to check in release
//! builds. Only active under `#[cfg(debug_assertions)]`, so there is zero
//! overhead in release builds.

// =============================================================================
// INV-SESS-01: Single-Flight Login
// =============================================================================

/// Assert that a new login is only started when none was already in flight.
///
/// Used in: `SessionClient::add_handler()` before calling `start_login()`
macro_rules! debug_assert_single_login_in_flight {
    ($was_in_flight:expr, $starting_now:expr) => {
        debug_assert!(
            !$starting_now || !$was_in_flight,
            "INV-SESS-01 violated: started a new login while one was already in flight"
        )
    };
}

// =============================================================================
// INV-SESS-02: Session and Error Are Mutually Exclusive
// =============================================================================

/// Assert that a completed login never leaves both a cached session and a
/// cached error set at once.
///
/// Used in: `SessionClient::on_login_complete()`
macro_rules! debug_assert_session_error_exclusive {
    ($has_session:expr, $has_error:expr) => {
        debug_assert!(
            !($has_session && $has_error),
            "INV-SESS-02 violated: session and error were both set after login completed"
        )
    };
}

// =============================================================================
// INV-SIGN-01: Query Parameters Sorted by Key
// =============================================================================

/// Assert that query parameters are folded into the signature in
/// non-decreasing key order.
///
/// Used in: `sign::signed_url()` while iterating the query map
macro_rules! debug_assert_query_keys_sorted {
    ($prev_key:expr, $key:expr) => {
        debug_assert!(
            $prev_key.as_deref().map_or(true, |prev| prev <= $key),
            "INV-SIGN-01 violated: query key {:?} was folded out of sorted order after {:?}",
            $key,
            $prev_key
        )
    };
}

// =============================================================================
// INV-SIGN-02: Well-Formed Digest
// =============================================================================

/// Assert that the request signature is a 32-character lowercase hex MD5
/// digest.
///
/// Used in: `sign::signed_url()` after hashing
macro_rules! debug_assert_digest_is_hex32 {
    ($digest:expr) => {
        debug_assert!(
            $digest.len() == 32 && $digest.chars().all(|c| c.is_ascii_hexdigit()),
            "INV-SIGN-02 violated: request_sig {:?} is not a 32-character hex digest",
            $digest
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_digest_is_hex32;
pub(crate) use debug_assert_query_keys_sorted;
pub(crate) use debug_assert_session_error_exclusive;
pub(crate) use debug_assert_single_login_in_flight;
