use chrono::Utc;
use percent_encoding::percent_decode_str;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use herbarium_core::OwnerId;

/// Number of random characters appended to a generated key.
const TOKEN_LEN: usize = 8;

/// Storage key for one media object: `{owner}/{unix_millis}-{token}.jpg`.
///
/// Keys are generated from the owner identifier, the current time, and a
/// random token. User-supplied filenames never reach the key, so no
/// sanitization of odd or unsafe characters is needed downstream.
///
/// The convention is reversible: given only a public URL whose path ends
/// in `.../{owner}/{file}`, [`StorageKey::from_public_url`] recovers the
/// deletable key. Reconciliation and aggregate deletion rely on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Wrap an already-rendered key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Mint a fresh, collision-resistant key under the owner's prefix.
    #[must_use]
    pub fn generate(owner: &OwnerId) -> Self {
        let millis = Utc::now().timestamp_millis();
        let token: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(format!("{owner}/{millis}-{token}.jpg"))
    }

    /// Recover a key from a public URL.
    ///
    /// Takes the last two path segments (owner prefix and object name),
    /// percent-decoded. Falls back to the final segment alone when the
    /// preceding one is not a plain prefix (e.g. a host or scheme part).
    /// Returns `None` for URLs with no usable path tail.
    #[must_use]
    pub fn from_public_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let mut tail = path.trim_end_matches('/').rsplit('/');

        let file = tail.next().filter(|s| !s.is_empty())?;
        let prefix = tail
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':') && !s.contains('.'));

        let key = match prefix {
            Some(prefix) => format!("{}/{}", decode(prefix), decode(file)),
            None => decode(file),
        };
        Some(Self(key))
    }

    /// Return the key as a str slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
