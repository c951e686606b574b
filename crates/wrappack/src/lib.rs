//! # Wrappack
//!
//! MessagePack is the byte format modules expect for arguments, results and
//! environments. Hosts usually hold structured text (JSON) or serde types, so
//! this crate converts between the three.
//!
//! - `encode` / `decode`: JSON text to msgpack and back.
//! - `to_vec` / `from_slice`: serde types to msgpack and back. Structs are
//!   written as maps keyed by field name.
//! - `merge_maps`: key-by-key merge of two msgpack maps.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;


#[derive(Debug)]
pub enum Error {
    /// Input text is not valid JSON.
    Json(serde_json::Error),
    /// Value could not be written as msgpack.
    Encode(rmp_serde::encode::Error),
    /// Bytes are not valid msgpack for the requested type.
    Decode(rmp_serde::decode::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "Invalid JSON: {}", e),
            Self::Encode(e) => write!(f, "Msgpack encode error: {}", e),
            Self::Decode(e) => write!(f, "Msgpack decode error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::Encode(e)
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::Decode(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Converts JSON text into msgpack bytes.
pub fn encode(json: &str) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_str(json)?;
    to_vec(&value)
}

/// Converts msgpack bytes into JSON text.
///
/// Binary blobs have no JSON representation and fail to decode.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let value: Value = from_slice(bytes)?;
    Ok(value.to_string())
}

/// Serializes a value to msgpack, writing structs as maps.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Deserializes a value from msgpack.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Merges two msgpack maps key by key, with keys from `update` winning.
///
/// Values are carried as raw msgpack, so `bin` and `ext` entries survive.
/// Returns `None` when either side is not a map, in which case the caller
/// should treat `update` as a replacement.
pub fn merge_maps(base: &[u8], update: &[u8]) -> Option<Vec<u8>> {
    let Ok(rmpv::Value::Map(mut merged)) = rmpv::decode::read_value(&mut &base[..]) else {
        return None;
    };
    let Ok(rmpv::Value::Map(update)) = rmpv::decode::read_value(&mut &update[..]) else {
        return None;
    };
    for (key, value) in update {
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => merged.push((key, value)),
        }
    }

    let mut bytes = Vec::new();
    rmpv::encode::write_value(&mut bytes, &rmpv::Value::Map(merged)).ok()?;
    Some(bytes)
}
