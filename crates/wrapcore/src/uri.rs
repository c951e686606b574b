//! # Uri
//!
//! Normalized logical module address of the form `wrap://<authority>/<path>`.
//!
//! Parsing is lenient about the scheme (`ens/foo.eth` and `/ens/foo.eth` both
//! normalize to `wrap://ens/foo.eth`) and strict about everything else. The
//! path may be empty (`wrap://ens/`) but the separating `/` may not. The
//! normalized string is the identity: equality, hashing and ordering all work
//! on it, so a `Uri` can key any map.

use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::error::Error;
use crate::error::Result;

const SCHEME: &str = "wrap://";

#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Uri {
    uri: String,
    /// Byte offset of the `/` that separates authority from path.
    split: usize,
}

impl Uri {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidUri {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(invalid("empty uri"));
        }

        let uri = match trimmed.find(SCHEME) {
            Some(0) => trimmed.to_string(),
            Some(_) => return Err(invalid("scheme must appear at the start")),
            None => format!("{}{}", SCHEME, trimmed),
        };

        let rest = &uri[SCHEME.len()..];
        let Some(slash) = rest.find('/') else {
            return Err(invalid("missing path"));
        };

        let authority = &rest[..slash];
        if !valid_authority(authority) {
            return Err(invalid("authority must match [a-z][a-z0-9-_]+"));
        }

        let split = SCHEME.len() + slash;
        Ok(Self { uri, split })
    }

    pub fn authority(&self) -> &str {
        &self.uri[SCHEME.len()..self.split]
    }

    pub fn path(&self) -> &str {
        &self.uri[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

fn valid_authority(authority: &str) -> bool {
    let mut chars = authority.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    authority.len() >= 2
        && first.is_ascii_lowercase()
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

impl std::fmt::Debug for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Uri({})", self.uri)
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Uri {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

impl Serialize for Uri {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.uri)
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
