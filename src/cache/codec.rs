//! Payload Codec
//!
//! Converts results to and from the byte form stored by every backend.
//! Decoding ignores fields it does not know about, so records written by a
//! newer build stay readable by an older one and vice versa.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::StoreResult;

/// JSON codec shared by all backends.
pub struct Codec;

impl Codec {
    pub fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> StoreResult<T> {
        Ok(serde_json::from_slice(payload)?)
    }
}
