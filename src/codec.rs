//! Length-prefixed record framing for snapshot files.
//!
//! Each record is a 4-byte big-endian length followed by a bincode
//! payload. A clean end of stream before the first prefix byte is
//! reported as `None`; a partial prefix or truncated payload is an
//! error.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{SnapshotError, SnapshotResult};

/// Upper bound on a single record; rejected before allocation.
pub const MAX_RECORD_BYTES: usize = 64 << 20;

pub fn write_record<W: Write, T: Serialize>(writer: &mut W, value: &T) -> SnapshotResult<()> {
    let payload = bincode::serialize(value)?;
    if payload.len() > MAX_RECORD_BYTES {
        return Err(SnapshotError::Config(format!(
            "record of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_RECORD_BYTES
        )));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(&payload)?;
    Ok(())
}

/// Reads the next record, or `None` at a clean end of stream.
pub fn read_record<R: Read, T: DeserializeOwned>(reader: &mut R) -> SnapshotResult<Option<T>> {
    let mut len_buf = [0u8; 4];
    let read = read_fully(reader, &mut len_buf)?;
    if read == 0 {
        return Ok(None);
    }
    if read < len_buf.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated record length prefix",
        )
        .into());
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_RECORD_BYTES {
        return Err(SnapshotError::Config(format!(
            "record length {len} exceeds the {MAX_RECORD_BYTES} byte limit"
        )));
    }
    let mut payload = vec![0u8; len];
    let read = read_fully(reader, &mut payload)?;
    if read < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated record payload",
        )
        .into());
    }
    Ok(Some(bincode::deserialize(&payload)?))
}

fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
