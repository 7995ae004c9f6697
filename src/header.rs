//! Asset header codec.
//!
//! Every asset file begins with a fixed binary header shared by all asset
//! types; the asset-specific payload follows immediately after it. The
//! layout, written from offset 0 with little-endian integers:
//!
//! 1. `i32` asset type (the reserved unknown value `0` never appears on disk)
//! 2. `i32` GUID size + that many raw GUID bytes
//! 3. `i64` import date, in 100 ns ticks since the Unix epoch
//! 4. `i32` hash size + bytes when present, `0` when absent
//! 5. `i32` source path length + UTF-8 bytes (empty allowed)
//! 6. `i32` icon size + icon bytes
//!
//! There is no total-length field, so decoding is purely sequential: a reader
//! that only wants the header still consumes every field in order. Any
//! declared length that runs past the end of the stream decodes to
//! [`AssetError::CorruptHeader`], never a panic.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::binio::{read_i32, read_i64, read_vec, write_i32, write_i64};
use crate::error::{AssetError, Result};
use crate::types::{AssetInfo, AssetType};

/// Number of 100 ns ticks per second in the on-disk timestamp encoding.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: u32 = 100;

/// GUID size this writer emits. The size is still an explicit wire field, so
/// readers honor whatever a file declares instead of hard-coding it.
pub const HEADER_GUID_LEN: usize = 16;

/// Upper bound accepted for any declared variable-length field. Lengths past
/// this are treated as corruption rather than attempted as allocations.
const MAX_FIELD_LEN: i32 = 64 * 1024 * 1024;

/// The decoded fixed header of an asset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHeader {
    pub asset_type: AssetType,
    pub guid: Uuid,
    pub import_date: DateTime<Utc>,
    pub hash: Option<Vec<u8>>,
    pub source_path: String,
    pub icon: Vec<u8>,
}

impl AssetHeader {
    /// Decodes a header from the start of `reader`.
    ///
    /// The reader is left positioned at the first payload byte on success.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let type_value = read_field_i32(reader, "asset type")?;
        let asset_type = AssetType::from_wire(type_value).ok_or_else(|| {
            AssetError::CorruptHeader(format!("invalid asset type value {type_value}"))
        })?;

        let id_len = read_field_len(reader, "guid size")?;
        let id_bytes = read_field_vec(reader, id_len, "guid")?;
        let id_bytes: [u8; HEADER_GUID_LEN] = id_bytes.try_into().map_err(|_| {
            AssetError::CorruptHeader(format!(
                "guid size {id_len}, expected {HEADER_GUID_LEN} bytes"
            ))
        })?;
        let guid = Uuid::from_bytes(id_bytes);

        let ticks = read_field_i64(reader, "import date")?;
        let import_date = datetime_from_ticks(ticks);

        let hash_len = read_field_len(reader, "hash size")?;
        let hash = if hash_len > 0 {
            Some(read_field_vec(reader, hash_len, "hash")?)
        } else {
            None
        };

        let path_len = read_field_len(reader, "source path length")?;
        let path_bytes = read_field_vec(reader, path_len, "source path")?;
        let source_path = String::from_utf8(path_bytes)
            .map_err(|_| AssetError::CorruptHeader("source path is not valid UTF-8".to_string()))?;

        let icon_len = read_field_len(reader, "icon size")?;
        let icon = read_field_vec(reader, icon_len, "icon")?;

        Ok(Self {
            asset_type,
            guid,
            import_date,
            hash,
            source_path,
            icon,
        })
    }

    /// Encodes the full header. The byte count is deterministic in the field
    /// contents, so rewriting a header over an unchanged set of field sizes
    /// leaves the payload that follows untouched.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_i32(writer, self.asset_type.wire_value())?;
        write_i32(writer, HEADER_GUID_LEN as i32)?;
        writer.write_all(self.guid.as_bytes())?;
        write_i64(writer, ticks_from_datetime(self.import_date))?;
        match &self.hash {
            Some(hash) => {
                write_i32(writer, hash.len() as i32)?;
                writer.write_all(hash)?;
            }
            None => write_i32(writer, 0)?,
        }
        let path_bytes = self.source_path.as_bytes();
        write_i32(writer, path_bytes.len() as i32)?;
        writer.write_all(path_bytes)?;
        write_i32(writer, self.icon.len() as i32)?;
        writer.write_all(&self.icon)?;
        Ok(())
    }

    /// Decodes the header of the asset file at `path`.
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes the header from offset 0 of the file at `path`, creating it if
    /// needed. An existing payload past the header is not truncated.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let file = OpenOptions::new().write(true).create(true).open(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Builds the registry record for this header, stamped now.
    pub fn into_info(self, full_path: PathBuf) -> AssetInfo {
        AssetInfo {
            asset_type: self.asset_type,
            guid: self.guid,
            icon: self.icon,
            full_path,
            source_path: self.source_path,
            register_time: SystemTime::now(),
            import_date: self.import_date,
            hash: self.hash,
        }
    }
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

/// Maps a short read to `CorruptHeader` and any other IO failure to `Io`.
fn corrupt_on_eof(error: std::io::Error, what: &str) -> AssetError {
    if error.kind() == ErrorKind::UnexpectedEof {
        AssetError::CorruptHeader(format!("truncated {what}"))
    } else {
        AssetError::Io(error)
    }
}

fn read_field_i32<R: Read>(reader: &mut R, what: &str) -> Result<i32> {
    read_i32(reader).map_err(|error| corrupt_on_eof(error, what))
}

fn read_field_i64<R: Read>(reader: &mut R, what: &str) -> Result<i64> {
    read_i64(reader).map_err(|error| corrupt_on_eof(error, what))
}

fn read_field_len<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let len = read_field_i32(reader, what)?;
    if !(0..=MAX_FIELD_LEN).contains(&len) {
        return Err(AssetError::CorruptHeader(format!(
            "{what} {len} out of range"
        )));
    }
    Ok(len as usize)
}

fn read_field_vec<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    read_vec(reader, len).map_err(|error| corrupt_on_eof(error, what))
}

// ---------------------------------------------------------------------------
// Tick conversion
// ---------------------------------------------------------------------------

/// Converts a UTC timestamp to 100 ns ticks since the Unix epoch.
pub fn ticks_from_datetime(value: DateTime<Utc>) -> i64 {
    value
        .timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(value.timestamp_subsec_nanos() / NANOS_PER_TICK))
}

/// Converts on-disk ticks back to a UTC timestamp, clamping at the epoch.
pub fn datetime_from_ticks(ticks: i64) -> DateTime<Utc> {
    let ticks = ticks.max(0);
    let secs = ticks / TICKS_PER_SECOND;
    let nanos = (ticks % TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Converts a filesystem timestamp to ticks, clamping pre-epoch times to 0.
pub fn ticks_from_system_time(value: SystemTime) -> i64 {
    match value.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => (elapsed.as_secs() as i64)
            .saturating_mul(TICKS_PER_SECOND)
            .saturating_add(i64::from(elapsed.subsec_nanos() / NANOS_PER_TICK)),
        Err(_) => 0,
    }
}

/// Converts on-disk ticks back to a filesystem timestamp.
pub fn system_time_from_ticks(ticks: i64) -> SystemTime {
    let ticks = ticks.max(0) as u64;
    let secs = ticks / TICKS_PER_SECOND as u64;
    let nanos = (ticks % TICKS_PER_SECOND as u64) as u32 * NANOS_PER_TICK;
    UNIX_EPOCH + Duration::new(secs, nanos)
}
