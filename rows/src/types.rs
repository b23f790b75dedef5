//! Row key, value, and row types.

use crate::error::RowError;

/// Copies `src` one byte at a time into a fresh buffer.
///
/// Backends pay this cost once per key and value on every read and write, the
/// same way a real row format would pay for decoding.
fn copy_bytes(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    for &byte in src {
        out.push(byte);
    }
    out
}

/// An opaque row key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RowKey(Vec<u8>);

impl RowKey {
    /// Decodes a key from raw bytes. Never fails.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        Self(copy_bytes(bytes))
    }

    /// Returns a fresh copy of the encoded key.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        copy_bytes(&self.0)
    }

    /// Borrows the key bytes without copying.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An opaque row value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RowValue(Vec<u8>);

impl RowValue {
    /// Creates an empty value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a value from raw bytes. Never fails.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        Self(copy_bytes(bytes))
    }

    /// Returns a fresh copy of the encoded value.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        copy_bytes(&self.0)
    }

    /// Borrows the value bytes without copying.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `other` into this value.
    ///
    /// Reserved for read-modify-write workloads; currently leaves `self`
    /// unchanged.
    pub fn merge(&mut self, other: &Self) {
        let _ = other;
    }
}

/// A single row as produced by replay or by a backend scan.
///
/// When `error` is set the key and value are empty and carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    pub key: RowKey,
    pub value: RowValue,
    pub error: Option<RowError>,
}

impl Row {
    /// Creates a successfully decoded row.
    #[must_use]
    pub const fn new(key: RowKey, value: RowValue) -> Self {
        Self {
            key,
            value,
            error: None,
        }
    }

    /// Creates an error-bearing row.
    #[must_use]
    pub fn failed(error: RowError) -> Self {
        Self {
            key: RowKey::default(),
            value: RowValue::default(),
            error: Some(error),
        }
    }

    /// Decodes a row from raw key and value bytes.
    #[must_use]
    pub fn decode(key: &[u8], value: &[u8]) -> Self {
        Self::new(RowKey::decode(key), RowValue::decode(value))
    }

    /// Returns `true` if the row decoded without error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowField;

    #[test]
    fn key_decode_copies_input() {
        let mut raw = vec![1u8, 2, 3];
        let key = RowKey::decode(&raw);
        raw[0] = 9;
        assert_eq!(key.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn key_bytes_is_fresh_copy() {
        let key = RowKey::decode(&[4, 5]);
        let mut out = key.bytes();
        out.push(6);
        assert_eq!(key.len(), 2);
        assert_eq!(key.bytes(), vec![4, 5]);
    }

    #[test]
    fn empty_key_and_value() {
        let key = RowKey::decode(&[]);
        let value = RowValue::decode(&[]);
        assert!(key.is_empty());
        assert!(value.is_empty());
        assert!(key.bytes().is_empty());
        assert!(value.bytes().is_empty());
    }

    #[test]
    fn value_merge_is_noop() {
        let mut value = RowValue::decode(&[1, 2, 3]);
        value.merge(&RowValue::decode(&[7, 7]));
        assert_eq!(value.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn new_value_is_empty() {
        assert_eq!(RowValue::new(), RowValue::decode(&[]));
    }

    #[test]
    fn keys_order_bytewise() {
        let a = RowKey::decode(&[0, 9]);
        let b = RowKey::decode(&[1]);
        assert!(a < b);
    }

    #[test]
    fn row_decode_is_ok() {
        let row = Row::decode(b"k", b"v");
        assert!(row.is_ok());
        assert_eq!(row.key.as_slice(), b"k");
        assert_eq!(row.value.as_slice(), b"v");
    }

    #[test]
    fn failed_row_carries_error() {
        let row = Row::failed(RowError::Decode {
            field: RowField::Value,
            reason: "not a blob".to_string(),
        });
        assert!(!row.is_ok());
        assert!(row.key.is_empty());
        assert!(row.value.is_empty());
    }
}
