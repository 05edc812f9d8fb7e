use std::collections::BTreeMap;

use crate::config::QobuzConfig;
use crate::invariants::{debug_assert_digest_is_hex32, debug_assert_query_keys_sorted};

/// Builds a signed Qobuz API URL.
///
/// Grounded on `QobuzClient::MakeSignedUrl`: query parameters are appended
/// in key order (a `BTreeMap` standing in for the original's sorted
/// `std::multimap`), followed by `app_id` and a Unix timestamp. The
/// signature is the MD5 hex digest of
/// `object + method + sorted(key + value)... + request_ts + app_secret`.
///
/// `request_ts` is taken as a parameter rather than read from the clock so
/// the signature is reproducible in tests; callers pass the current Unix
/// time in production.
///
/// Query values are appended as given, not percent-encoded; callers are
/// responsible for pre-encoding anything that needs it.
#[must_use]
pub fn signed_url(
    config: &QobuzConfig,
    object: &str,
    method: &str,
    query: &BTreeMap<String, String>,
    request_ts: u64,
) -> String {
    debug_assert!(
        !query.is_empty(),
        "signed_url requires at least one query parameter"
    );

    let mut uri = format!("{}{object}/{method}", config.base_url);
    let mut concatenated = format!("{object}{method}");

    let mut prev_key: Option<&str> = None;
    for (key, value) in query {
        debug_assert_query_keys_sorted!(prev_key, key.as_str());
        push_param(&mut uri, key, value);
        concatenated.push_str(key);
        concatenated.push_str(value);
        prev_key = Some(key);
    }

    push_param(&mut uri, "app_id", &config.app_id);

    let ts = request_ts.to_string();
    push_param(&mut uri, "request_ts", &ts);
    concatenated.push_str(&ts);
    concatenated.push_str(&config.app_secret);

    let digest = format!("{:x}", md5::compute(concatenated.as_bytes()));
    debug_assert_digest_is_hex32!(digest);
    push_param(&mut uri, "request_sig", &digest);

    uri
}

fn push_param(uri: &mut String, name: &str, value: &str) {
    uri.push(if uri.contains('?') { '&' } else { '?' });
    uri.push_str(name);
    uri.push('=');
    uri.push_str(value);
}
