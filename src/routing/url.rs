//! Reverse lookup results.

use std::fmt;

use url::Url;

/// A path produced by reverse lookup, tagged with its protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPath {
    path: String,
}

impl UrlPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Always `websocket`: this framework only routes WebSocket connections.
    pub fn protocol(&self) -> &'static str {
        "websocket"
    }

    /// Join with `base_url`, switching `http`/`https` to `ws`/`wss`.
    pub fn make_absolute_url(&self, base_url: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(base_url)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        let path = format!("{}{}", url.path().trim_end_matches('/'), self.path);

        // http(s) and ws(s) are all special schemes, so switching cannot fail.
        let _ = url.set_scheme(scheme);
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

impl fmt::Display for UrlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl AsRef<str> for UrlPath {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

impl PartialEq<str> for UrlPath {
    fn eq(&self, other: &str) -> bool {
        self.path == other
    }
}

impl PartialEq<&str> for UrlPath {
    fn eq(&self, other: &&str) -> bool {
        self.path == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_url_uses_websocket_schemes() {
        let path = UrlPath::new("/rooms/lobby");
        assert_eq!(
            path.make_absolute_url("https://example.com/app/").unwrap().as_str(),
            "wss://example.com/app/rooms/lobby"
        );
        assert_eq!(
            path.make_absolute_url("http://localhost:8000").unwrap().as_str(),
            "ws://localhost:8000/rooms/lobby"
        );
    }

    #[test]
    fn compares_with_plain_strings() {
        assert_eq!(UrlPath::new("/a"), "/a");
        assert_eq!(UrlPath::new("/a").protocol(), "websocket");
    }
}
