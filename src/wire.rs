//! Binary record for shipping a pattern to another worker
//!
//! ```text
//!  --------------------------------------------------------------------
//! | i32 LE key length | UTF-8 wildcard key | i32 LE length | UTF-8 template |
//!  --------------------------------------------------------------------
//! ```
//!
//! The record has no version byte and no checksum. It carries the key space
//! (wildcard key + template), not cursor positions: a decoded pattern starts
//! at the first key of that space.

use crate::error::{PatternError, Result};
use crate::pattern::KeyPattern;

const LEN_BYTES: usize = std::mem::size_of::<i32>();

/// Encode a pattern's wildcard key and template
pub fn serialize(pattern: &KeyPattern) -> Result<Vec<u8>> {
    let wildcard_key = pattern.wildcard_key();
    let template = pattern.template();

    let mut out = Vec::with_capacity(2 * LEN_BYTES + wildcard_key.len() + template.len());
    write_string(&mut out, &wildcard_key)?;
    write_string(&mut out, template)?;
    Ok(out)
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = i32::try_from(value.len()).map_err(|_| {
        PatternError::InvalidSerializedPattern(format!(
            "string of {} bytes does not fit the length prefix",
            value.len()
        ))
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Decode a record produced by [`serialize`]
///
/// The decoded strings go through the same validation as
/// [`KeyPattern::with_wildcard_key`].
pub fn deserialize(bytes: &[u8]) -> Result<KeyPattern> {
    let mut reader = Reader { bytes, pos: 0 };
    let wildcard_key = reader.read_string("wildcard key")?;
    let template = reader.read_string("pattern")?;

    if reader.pos != bytes.len() {
        return Err(PatternError::InvalidSerializedPattern(format!(
            "{} trailing bytes",
            bytes.len() - reader.pos
        )));
    }

    KeyPattern::with_wildcard_key(&template, &wildcard_key)
        .map_err(|err| PatternError::InvalidSerializedPattern(err.to_string()))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                PatternError::InvalidSerializedPattern(format!(
                    "truncated {what}: need {n} bytes at offset {}, have {}",
                    self.pos,
                    self.bytes.len() - self.pos
                ))
            })?;
        let chunk = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(chunk)
    }

    fn read_string(&mut self, what: &str) -> Result<String> {
        let mut prefix = [0u8; LEN_BYTES];
        prefix.copy_from_slice(self.take(LEN_BYTES, what)?);

        let len = i32::from_le_bytes(prefix);
        let len = usize::try_from(len).map_err(|_| {
            PatternError::InvalidSerializedPattern(format!("negative {what} length {len}"))
        })?;

        let data = self.take(len, what)?;
        String::from_utf8(data.to_vec()).map_err(|err| {
            PatternError::InvalidSerializedPattern(format!("{what} is not UTF-8: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn test_layout() {
        let pattern = KeyPattern::with_wildcard_key("K[A-C]", "KB").unwrap();
        let bytes = serialize(&pattern).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(b"KB");
        expected.extend_from_slice(&6i32.to_le_bytes());
        expected.extend_from_slice(b"K[A-C]");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_round_trip_restricted() {
        let pattern = KeyPattern::with_wildcard_key("AB[C-F]D[0-9]", "AB[C-D]D[2-7]").unwrap();
        let decoded = deserialize(&serialize(&pattern).unwrap()).unwrap();
        assert_eq!(decoded.current_key(), pattern.current_key());
        assert_eq!(decoded.size(), BigUint::from(12u32));
        assert_eq!(decoded, pattern);
    }

    #[test]
    fn test_in_progress_pattern_restarts() {
        // The record carries no cursor: a decoded pattern starts at its first key
        let mut pattern = KeyPattern::new("[a-c][0-2]").unwrap();
        pattern.advance(&BigUint::from(4u32));
        assert_eq!(pattern.current_key(), "b1");

        let decoded = deserialize(&serialize(&pattern).unwrap()).unwrap();
        assert_eq!(decoded.size(), pattern.size());
        assert_eq!(decoded.current_key(), "a0");
        assert_eq!(decoded.remaining(), BigUint::from(9u32));

        // split() keeps the cursor in process; its wire form does not
        let (first, _) = pattern.split().unwrap();
        assert_eq!(first.current_key(), "b1");
        assert_eq!(first.wildcard_key(), "b*");
        let shipped = deserialize(&serialize(&first).unwrap()).unwrap();
        assert_eq!(shipped.current_key(), "b0");
    }

    #[test]
    fn test_truncated() {
        let pattern = KeyPattern::new("K[A-C]").unwrap();
        let bytes = serialize(&pattern).unwrap();

        for cut in [0, 3, 5, bytes.len() - 1] {
            let err = deserialize(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, PatternError::InvalidSerializedPattern(_)));
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let pattern = KeyPattern::new("K[A-C]").unwrap();
        let mut bytes = serialize(&pattern).unwrap();
        bytes.push(0);
        assert!(deserialize(&bytes).is_err());
    }

    #[test]
    fn test_negative_length() {
        let bytes = (-1i32).to_le_bytes();
        let err = deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_invalid_contents() {
        // Wildcard key outside the template
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(b"[D]");
        bytes.extend_from_slice(&5i32.to_le_bytes());
        bytes.extend_from_slice(b"[A-C]");
        let err = deserialize(&bytes).unwrap_err();
        assert!(matches!(err, PatternError::InvalidSerializedPattern(_)));

        // Not UTF-8
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.push(0xff);
        assert!(deserialize(&bytes).is_err());
    }
}
