//! Role handshake for relay connections.
//!
//! Every connection to the relay opens with the ASCII token `host` (the
//! desktop agent) or `client` (a web bridge).  The token may arrive split
//! across several TCP segments, so [`HandshakeReader`] accumulates bytes
//! until it can decide, instead of trusting a single read.
//!
//! Anything after the token is the start of the first relayed message and
//! is returned as [`Handshake::leftover`].

use std::fmt;

use thiserror::Error;

/// Token an agent sends to claim the host role.
pub const HOST_TOKEN: &[u8] = b"host";

/// Token a bridge sends to claim the client role.
pub const CLIENT_TOKEN: &[u8] = b"client";

/// Upper bound on bytes read before a token must have appeared.
pub const MAX_HANDSHAKE_LEN: usize = 64;

/// The two sides of a relay pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Host,
    Client,
}

impl Role {
    /// The handshake token for this role.
    pub fn token(self) -> &'static [u8] {
        match self {
            Role::Host => HOST_TOKEN,
            Role::Client => CLIENT_TOKEN,
        }
    }

    /// The role this one is paired with.
    pub fn counterpart(self) -> Role {
        match self {
            Role::Host => Role::Client,
            Role::Client => Role::Host,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Host => "host",
            Role::Client => "client",
        })
    }
}

/// Errors raised while reading the role token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// The connection opened with bytes that cannot become a valid token.
    #[error("invalid handshake token: {0:?}")]
    InvalidToken(String),

    /// Too many bytes arrived without a complete token.
    #[error("no handshake token within {0} bytes")]
    TooLong(usize),
}

/// A completed handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub role: Role,
    /// Bytes received after the token; they must be relayed, not dropped.
    pub leftover: Vec<u8>,
}

/// Accumulates the opening bytes of a connection until a role is known.
#[derive(Debug, Default)]
pub struct HandshakeReader {
    buf: Vec<u8>,
}

impl HandshakeReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and tries to classify the connection.
    ///
    /// Returns `Ok(None)` while the buffered bytes are still a prefix of a
    /// valid token (or only leading whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::InvalidToken`] as soon as the bytes cannot
    /// match either token (matching is exact and case-sensitive), and
    /// [`HandshakeError::TooLong`] past [`MAX_HANDSHAKE_LEN`] bytes.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Handshake>, HandshakeError> {
        self.buf.extend_from_slice(chunk);

        let start = self
            .buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buf.len());
        let candidate = &self.buf[start..];

        for role in [Role::Host, Role::Client] {
            let token = role.token();
            if candidate.starts_with(token) {
                let leftover = candidate[token.len()..].to_vec();
                self.buf.clear();
                return Ok(Some(Handshake { role, leftover }));
            }
        }

        let is_prefix = [HOST_TOKEN, CLIENT_TOKEN]
            .iter()
            .any(|token| token.starts_with(candidate));
        if !is_prefix {
            let shown = &candidate[..candidate.len().min(16)];
            return Err(HandshakeError::InvalidToken(
                String::from_utf8_lossy(shown).into_owned(),
            ));
        }

        if self.buf.len() > MAX_HANDSHAKE_LEN {
            return Err(HandshakeError::TooLong(MAX_HANDSHAKE_LEN));
        }
        Ok(None)
    }

    /// Bytes buffered so far.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_token_in_one_read() {
        let mut r = HandshakeReader::new();
        let hs = r.feed(b"host").unwrap().unwrap();
        assert_eq!(hs.role, Role::Host);
        assert!(hs.leftover.is_empty());
    }

    #[test]
    fn test_client_token_split_across_reads() {
        // Arrange
        let mut r = HandshakeReader::new();

        // Act / Assert: each partial read waits
        assert_eq!(r.feed(b"cl").unwrap(), None);
        assert_eq!(r.feed(b"ie").unwrap(), None);
        let hs = r.feed(b"nt").unwrap().unwrap();

        assert_eq!(hs.role, Role::Client);
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let mut r = HandshakeReader::new();
        let mut result = None;
        for b in b"host" {
            result = r.feed(std::slice::from_ref(b)).unwrap();
        }
        assert_eq!(result.map(|h| h.role), Some(Role::Host));
    }

    #[test]
    fn test_leftover_bytes_are_preserved() {
        let mut r = HandshakeReader::new();
        let hs = r.feed(b"host\x00\x00\x00\x02hi").unwrap().unwrap();
        assert_eq!(hs.role, Role::Host);
        assert_eq!(hs.leftover, b"\x00\x00\x00\x02hi".to_vec());
    }

    #[test]
    fn test_leading_whitespace_is_trimmed() {
        let mut r = HandshakeReader::new();
        assert_eq!(r.feed(b" \r\n").unwrap(), None);
        let hs = r.feed(b"client").unwrap().unwrap();
        assert_eq!(hs.role, Role::Client);
    }

    #[test]
    fn test_wrong_case_is_rejected() {
        let mut r = HandshakeReader::new();
        assert!(matches!(r.feed(b"HOST"), Err(HandshakeError::InvalidToken(_))));
    }

    #[test]
    fn test_garbage_is_rejected_before_token_length() {
        let mut r = HandshakeReader::new();
        assert_eq!(
            r.feed(b"hx"),
            Err(HandshakeError::InvalidToken("hx".to_string()))
        );
    }

    #[test]
    fn test_whitespace_flood_hits_length_limit() {
        let mut r = HandshakeReader::new();
        let spaces = vec![b' '; MAX_HANDSHAKE_LEN + 1];
        assert_eq!(r.feed(&spaces), Err(HandshakeError::TooLong(MAX_HANDSHAKE_LEN)));
    }

    #[test]
    fn test_counterpart_is_symmetric() {
        assert_eq!(Role::Host.counterpart(), Role::Client);
        assert_eq!(Role::Client.counterpart(), Role::Host);
    }

    #[test]
    fn test_role_display_matches_token() {
        assert_eq!(Role::Host.to_string().as_bytes(), HOST_TOKEN);
        assert_eq!(Role::Client.to_string().as_bytes(), CLIENT_TOKEN);
    }
}
