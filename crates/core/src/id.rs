use std::fmt;
use std::str::FromStr;

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Number of random bytes behind every [`ObjectId`].
const ID_BYTES: usize = 16;

/// Length of the hex rendering of an [`ObjectId`].
pub const OBJECT_ID_LEN: usize = ID_BYTES * 2;

/// Returned when a string is not a well-formed [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object id: expected {OBJECT_ID_LEN} lowercase hex characters")]
pub struct InvalidObjectId;

/// Opaque handle for a stored object.
///
/// The id is the join key between the blob store object and its metadata
/// record. It carries 128 bits from the operating system CSPRNG and is never
/// derived from caller input, so one caller cannot predict or collide with
/// another caller's handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Parse an identifier received from a caller.
    ///
    /// Only the exact rendering produced by [`generate`](Self::generate) is
    /// accepted, so path separators and other surprises never reach a store.
    pub fn parse(value: &str) -> Result<Self, InvalidObjectId> {
        let well_formed = value.len() == OBJECT_ID_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(Self(value.to_owned()))
        } else {
            Err(InvalidObjectId)
        }
    }

    /// Return the identifier as a string slice (also the blob store key).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_ids_are_well_formed() {
        let id = ObjectId::generate();
        assert_eq!(id.as_str().len(), OBJECT_ID_LEN);
        assert_eq!(ObjectId::parse(id.as_str()), Ok(id));
    }

    #[test]
    fn generated_ids_do_not_repeat() {
        let ids: HashSet<ObjectId> = (0..1_000).map(|_| ObjectId::generate()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(ObjectId::parse("").is_err());
        assert!(ObjectId::parse("abc").is_err());
        assert!(ObjectId::parse("../../../../etc/passwd00000000000").is_err());
        // Uppercase hex is not a rendering we ever produce.
        assert!(ObjectId::parse("0123456789ABCDEF0123456789ABCDEF").is_err());
        assert!(ObjectId::parse("0123456789abcdef0123456789abcdef").is_ok());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<ObjectId, _> = serde_json::from_str("\"0123456789abcdef0123456789abcdef\"");
        assert!(ok.is_ok());
        let bad: Result<ObjectId, _> = serde_json::from_str("\"not-an-id\"");
        assert!(bad.is_err());
    }

    #[test]
    fn display_matches_as_str() {
        let id = ObjectId::generate();
        assert_eq!(id.to_string(), id.as_str());
    }
}
