//! # Clipdeck Codec
//!
//! Deterministic CBOR encoding/decoding for Clipdeck.
//!
//! This crate provides:
//! - CBOR encoding of any `serde` type (offline log, auto-save drafts)
//! - SHA-256 fingerprints for structural identity checks, returned
//!   together with the encoded bytes for size checks
//!
//! ## Determinism
//!
//! Encoding is deterministic as long as the encoded types avoid
//! unordered containers. Model types use `BTreeSet`/`BTreeMap` for that
//! reason; two structurally identical values always produce identical
//! bytes and therefore identical fingerprints.
//!
//! ## Usage
//!
//! ```
//! use clipdeck_codec::{from_cbor, to_cbor};
//!
//! let bytes = to_cbor(&vec![1u32, 2, 3]).unwrap();
//! let decoded: Vec<u32> = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded, vec![1, 2, 3]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{CodecError, CodecResult};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(format!("{e:?}")))?;
    Ok(buffer)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are empty, truncated, or do not match
/// the shape of `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    if bytes.is_empty() {
        return Err(CodecError::UnexpectedEof);
    }
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(format!("{e:?}")))
}

/// SHA-256 digest of a value's CBOR encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the fingerprint of already-encoded bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Returns the raw digest.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Encodes `value` and fingerprints the result.
///
/// Returns the encoded bytes as well, so callers that also need the
/// serialized size do not encode twice.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> CodecResult<(Fingerprint, Vec<u8>)> {
    let bytes = to_cbor(value)?;
    Ok((Fingerprint::of_bytes(&bytes), bytes))
}
