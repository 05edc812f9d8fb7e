use std::collections::BTreeMap;

use crate::config::QobuzConfig;
use crate::error::TrackRequestError;
use crate::session::Session;
use crate::sign::signed_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Key,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    Url,
}

/// Incrementally scans raw JSON text for a top-level `"url"` string field,
/// without building a parse tree.
///
/// Grounded on `QobuzTrackRequest`'s yajl-callback state machine
/// (`State::NONE` / `State::URL`, advanced by its `MapKey`/`String`/`EndMap`
/// callbacks): a closed string is classified as a key or a value by
/// structural position (after `{`/`,` vs. after `:`), and the scanner only
/// remembers whether the most recently closed key was `"url"`.
pub struct UrlScanner {
    state: State,
    position: Position,
    in_string: bool,
    escape: bool,
    token: String,
    url: Option<String>,
}

impl UrlScanner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::None,
            position: Position::Key,
            in_string: false,
            escape: false,
            token: String::new(),
            url: None,
        }
    }

    /// Feeds the next chunk of response text. May be called repeatedly with
    /// arbitrary chunking, including mid-token, without losing state.
    pub fn feed(&mut self, chunk: &str) {
        for c in chunk.chars() {
            if self.in_string {
                if self.escape {
                    self.token.push(c);
                    self.escape = false;
                } else if c == '\\' {
                    self.escape = true;
                } else if c == '"' {
                    self.in_string = false;
                    self.on_token_closed();
                } else {
                    self.token.push(c);
                }
                continue;
            }

            match c {
                '"' => {
                    self.in_string = true;
                    self.token.clear();
                }
                ':' => self.position = Position::Value,
                ',' | '{' | '}' => self.position = Position::Key,
                _ => {}
            }
        }
    }

    fn on_token_closed(&mut self) {
        match self.position {
            Position::Key => {
                self.state = if self.token == "url" {
                    State::Url
                } else {
                    State::None
                };
            }
            Position::Value => {
                if self.state == State::Url {
                    self.url = Some(std::mem::take(&mut self.token));
                    self.state = State::None;
                }
                self.position = Position::Key;
            }
        }
    }

    /// Returns the captured `url` value, if the scanned text contained one.
    pub fn take_url(&mut self) -> Option<String> {
        self.url.take()
    }
}

impl Default for UrlScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks up the signed, time-limited download URL for `track_id`.
///
/// Grounded on `QobuzTrackRequest`: builds a signed `track/getFileUrl`
/// request from the session's auth token, then scans the JSON response for
/// the `url` field.
pub async fn fetch_track_url(
    http: &reqwest::Client,
    config: &QobuzConfig,
    session: &Session,
    track_id: &str,
    request_ts: u64,
) -> Result<String, TrackRequestError> {
    let mut query = BTreeMap::new();
    query.insert(
        "user_auth_token".to_string(),
        session.user_auth_token.clone(),
    );
    query.insert("track_id".to_string(), track_id.to_string());
    query.insert("format_id".to_string(), "5".to_string());

    let url = signed_url(config, "track", "getFileUrl", &query, request_ts);

    let response = http.get(&url).send().await?;
    let body = response.text().await?;

    let mut scanner = UrlScanner::new();
    scanner.feed(&body);
    scanner.take_url().ok_or(TrackRequestError::MissingUrl)
}
