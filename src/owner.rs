//! The account a dossier cache file belongs to, recovered from its file name.
//!
//! Cache files are named with the base32 form of `server;nick`, encoded as Latin-1.

use std::path::Path;

use data_encoding::{BASE32, BASE32_NOPAD};
use serde::{Deserialize, Serialize};

const SEPARATOR: char = ';';

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheOwner {
    pub server: String,
    pub nick: String,
}

impl CacheOwner {
    pub fn new<S: Into<String>, N: Into<String>>(server: S, nick: N) -> Self {
        Self {
            server: server.into(),
            nick: nick.into(),
        }
    }

    /// Decode a file stem. Returns `None` unless it is valid base32 holding exactly one
    /// separator.
    pub fn from_stem(stem: &str) -> Option<Self> {
        let bytes = base32_decode(stem)?;
        // Latin-1 maps each byte straight to the code point of the same value.
        let text: String = bytes.iter().map(|&b| b as char).collect();
        let mut parts = text.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(server), Some(nick), None) => Some(CacheOwner::new(server, nick)),
            _ => None,
        }
    }

    /// Decode the stem of a cache file's path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let stem = path.as_ref().file_stem()?.to_str()?;
        Self::from_stem(stem)
    }

    /// The padded base32 stem this owner's cache file would have. Characters above U+00FF
    /// can't be carried and yield `None`.
    pub fn to_stem(&self) -> Option<String> {
        let text = format!("{}{}{}", self.server, SEPARATOR, self.nick);
        let bytes = text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect::<Option<Vec<u8>>>()?;
        Some(BASE32.encode(&bytes))
    }
}

/// Standard RFC 4648 base32. Padding is optional, but when present it must be complete.
fn base32_decode(text: &str) -> Option<Vec<u8>> {
    let encoding = if text.ends_with('=') {
        &BASE32
    } else {
        &BASE32_NOPAD
    };
    encoding.decode(text.as_bytes()).ok()
}
