//! Canonical JSON encoding for deterministic hashing and signing.
//!
//! The encoding is the one produced by a sorted-key, ASCII-only JSON dump:
//! - Object keys sorted by code point
//! - `", "` between elements and `": "` between key and value
//! - Every character outside printable ASCII written as `\uXXXX`
//!   (UTF-16 surrogate pairs above the BMP)
//!
//! Block sealing and transaction signing both go through
//! [`to_canonical_bytes`], so a payload always hashes and verifies to the
//! same bytes on every call site.

use serde::Serialize;
use serde_json::ser::Formatter;
use std::io::{self, Write};
use thiserror::Error;

/// Errors that can occur while producing canonical bytes.
#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("payload is not representable as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a serializable value to canonical JSON bytes.
pub fn to_canonical_bytes<T>(value: &T) -> Result<Vec<u8>, CanonicalError>
where
    T: Serialize + ?Sized,
{
    // Round-tripping through `Value` sorts object keys (BTreeMap-backed map).
    let value = serde_json::to_value(value)?;
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// JSON formatter with spaced separators and ASCII-only strings.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}
