//! Binary record codec
//!
//! This module serializes and deserializes [`Record`]s in the versioned
//! on-disk layout shared with existing recordings.
//!
//! # Layout (little-endian)
//!
//! | Field | Encoding |
//! |-------|----------|
//! | magic | `u32` = `0xDEADBEEF` |
//! | version | `u8` |
//! | end time | `i32` (Unix seconds) |
//! | name | `u8` length + UTF-8, no terminator |
//! | initial position | 3 × `f32` |
//! | initial angles | 2 × `f32` (pitch, yaw) |
//! | frame count | `i32` |
//! | bookmark count | `i32` (version ≥ 2) |
//! | bookmarks | `i32` frame, `i32` correction index, NUL-terminated name |
//! | frames | see below |
//!
//! Each frame is `u64` buttons, `i32` impulse, actual velocity (3 × `f32`),
//! predicted velocity (3 × `f32`), predicted angles (2 × `f32`), origin
//! (3 × `f32`), NUL-terminated item identifier (empty if none), `i32` subtype,
//! `i32` seed and `i32` correction flags. If the flags carry any correction
//! bit, the next correction entry follows immediately: origin, angles and
//! velocity (3 × `f32` each), each present only if its flag is set.
//!
//! There is no correction count on the wire. Entries are reconstructed purely
//! from the frame flags, so the writer and reader must walk them in the same
//! order.
//!
//! # Header-only reads
//!
//! [`read`] with `only_header = true` stops after the bookmark table, so
//! listing a directory of records never touches frame bodies.

mod wire;

pub(crate) use wire::truncate_utf8;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{MimicError, Result};
use crate::types::{
    Bookmark, CorrectionEntry, CorrectionFlags, Frame, Record, RecordHeader,
    BOOKMARKS_SINCE_VERSION, FORMAT_VERSION,
};
use wire::{WireReader, WireWriter};

/// Magic number at the start of every record file
pub const MAGIC: u32 = 0xDEAD_BEEF;

/// Default record file extension
pub const RECORD_FILE_EXTENSION: &str = "rec";

/// Cap for speculative preallocation driven by counts read from a file
const MAX_PREALLOC: usize = 4096;

fn bad(what: &'static str) -> impl FnOnce(io::Error) -> MimicError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MimicError::BadFile(format!("truncated stream while reading {what}"))
        } else {
            MimicError::BadFile(format!("{what}: {e}"))
        }
    }
}

// ==================== Writing ====================

/// Serialize a record to an in-memory buffer
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(64 + record.frames.len() * 80);
    write(&mut buf, record)?;
    Ok(buf)
}

/// Serialize a record into `writer`
///
/// The version byte is always [`FORMAT_VERSION`]; the frame and bookmark
/// counts are taken from the actual collections.
pub fn write<W: Write>(writer: W, record: &Record) -> Result<()> {
    if !record.has_body() {
        return Err(MimicError::BadFile(format!(
            "record '{}' has {} of {} frames loaded",
            record.header.name,
            record.frames.len(),
            record.header.frame_count
        )));
    }

    let mut w = WireWriter::new(writer);
    write_header(&mut w, &record.header, record.frames.len()).map_err(bad("header"))?;

    let mut corrections = record.corrections.iter();
    for (index, frame) in record.frames.iter().enumerate() {
        write_frame(&mut w, frame).map_err(bad("frame"))?;

        if !frame.correction.has_correction() {
            continue;
        }

        let entry = corrections.next().ok_or_else(|| {
            MimicError::BadFile(format!(
                "frame {index} references a correction entry but none is left"
            ))
        })?;
        write_correction(&mut w, frame.correction, entry).map_err(bad("correction entry"))?;
    }

    let unreferenced = corrections.count();
    if unreferenced > 0 {
        tracing::warn!(
            "Record '{}' has {} correction entries not referenced by any frame; dropped",
            record.header.name,
            unreferenced
        );
    }

    w.into_inner().flush().map_err(bad("flush"))?;
    Ok(())
}

fn write_header<W: Write>(
    w: &mut WireWriter<W>,
    header: &RecordHeader,
    frame_count: usize,
) -> io::Result<()> {
    w.u32(MAGIC)?;
    w.u8(FORMAT_VERSION)?;
    w.i32(header.end_time)?;
    w.prefixed_str(&header.name)?;
    w.vec3(header.initial_position)?;
    w.angles2(header.initial_angles)?;
    w.i32(frame_count as i32)?;
    w.i32(header.bookmarks.len() as i32)?;

    for bookmark in &header.bookmarks {
        w.i32(bookmark.frame as i32)?;
        w.i32(bookmark.correction_index as i32)?;
        w.cstr(&bookmark.name)?;
    }
    Ok(())
}

fn write_frame<W: Write>(w: &mut WireWriter<W>, frame: &Frame) -> io::Result<()> {
    w.u64(frame.buttons)?;
    w.i32(frame.impulse)?;
    w.vec3(frame.actual_velocity)?;
    w.vec3(frame.predicted_velocity)?;
    w.angles2(frame.predicted_angles)?;
    w.vec3(frame.origin)?;
    w.cstr(frame.new_weapon.as_deref().unwrap_or(""))?;
    w.i32(frame.subtype)?;
    w.i32(frame.seed)?;
    w.i32(frame.correction.bits() as i32)
}

/// Fields are selected by the frame's flags, not the entry's own.
fn write_correction<W: Write>(
    w: &mut WireWriter<W>,
    flags: CorrectionFlags,
    entry: &CorrectionEntry,
) -> io::Result<()> {
    if flags.contains(CorrectionFlags::ORIGIN) {
        w.vec3(entry.origin.unwrap_or_default())?;
    }
    if flags.contains(CorrectionFlags::ANGLES) {
        w.angles3(entry.angles.unwrap_or_default())?;
    }
    if flags.contains(CorrectionFlags::VELOCITY) {
        w.vec3(entry.velocity.unwrap_or_default())?;
    }
    Ok(())
}

/// Write a record to `path` atomically (temp file + rename)
///
/// Missing parent directories are created. Every I/O failure is reported as
/// [`MimicError::BadFile`].
pub fn write_file(path: &Path, record: &Record) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(MimicError::bad_file)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    let result = (|| {
        let file = File::create(tmp).map_err(MimicError::bad_file)?;
        let mut writer = BufWriter::new(file);
        write(&mut writer, record)?;
        let file = writer
            .into_inner()
            .map_err(|e| MimicError::bad_file(e.into_error()))?;
        file.sync_all().map_err(MimicError::bad_file)?;
        fs::rename(tmp, path).map_err(MimicError::bad_file)
    })();

    if result.is_err() {
        let _ = fs::remove_file(tmp);
    }
    result
}

// ==================== Reading ====================

/// Deserialize a full record from bytes
pub fn decode(bytes: &[u8]) -> Result<Record> {
    read(bytes, false)
}

/// Deserialize only the header (and bookmark table) from bytes
///
/// Bookmark correction indexes are not checked here, since the correction
/// count is only known after the body is read. [`decode`] rejects them.
pub fn decode_header(bytes: &[u8]) -> Result<RecordHeader> {
    read(bytes, true).map(|record| record.header)
}

/// Deserialize a record from `reader`
///
/// With `only_header`, the returned record carries the header and an empty
/// body; the frame section is never read. A full read also fails with
/// [`MimicError::BadFile`] when a bookmark points past the last correction.
pub fn read<R: Read>(reader: R, only_header: bool) -> Result<Record> {
    let mut r = WireReader::new(reader);
    let header = read_header(&mut r)?;

    if only_header {
        return Ok(Record::header_only(header));
    }

    let count = header.frame_count as usize;
    let mut frames = Vec::with_capacity(count.min(MAX_PREALLOC));
    let mut corrections = Vec::new();

    for _ in 0..count {
        let frame = read_frame(&mut r).map_err(bad("frame"))?;
        if frame.correction.has_correction() {
            let entry = read_correction(&mut r, frame.correction).map_err(bad("correction entry"))?;
            corrections.push(entry);
        }
        frames.push(frame);
    }

    if let Some(bookmark) = header
        .bookmarks
        .iter()
        .find(|b| b.correction_index as usize >= corrections.len())
    {
        return Err(MimicError::BadFile(format!(
            "bookmark '{}' points at correction {} but only {} exist",
            bookmark.name,
            bookmark.correction_index,
            corrections.len()
        )));
    }

    Ok(Record {
        header,
        frames,
        corrections,
    })
}

fn non_negative(value: i32, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| MimicError::BadFile(format!("negative {what}: {value}")))
}

fn read_header<R: Read>(r: &mut WireReader<R>) -> Result<RecordHeader> {
    let magic = r.u32().map_err(bad("magic"))?;
    if magic != MAGIC {
        return Err(MimicError::BadFile(format!("bad magic 0x{magic:08X}")));
    }

    let format_version = r.u8().map_err(bad("version"))?;
    if format_version > FORMAT_VERSION {
        return Err(MimicError::UnsupportedVersion {
            found: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let end_time = r.i32().map_err(bad("end time"))?;
    let name = r.prefixed_str().map_err(bad("record name"))?;
    let initial_position = r.vec3().map_err(bad("initial position"))?;
    let initial_angles = r.angles2().map_err(bad("initial angles"))?;
    let frame_count = non_negative(r.i32().map_err(bad("frame count"))?, "frame count")?;

    let mut bookmarks = Vec::new();
    if format_version >= BOOKMARKS_SINCE_VERSION {
        let count = non_negative(r.i32().map_err(bad("bookmark count"))?, "bookmark count")?;
        bookmarks.reserve((count as usize).min(MAX_PREALLOC));

        for _ in 0..count {
            let frame = non_negative(r.i32().map_err(bad("bookmark"))?, "bookmark frame")?;
            let correction_index =
                non_negative(r.i32().map_err(bad("bookmark"))?, "bookmark correction index")?;
            let name = r.cstr().map_err(bad("bookmark name"))?;

            if frame >= frame_count {
                return Err(MimicError::BadFile(format!(
                    "bookmark '{name}' at frame {frame} is past the last frame ({frame_count} frames)"
                )));
            }

            bookmarks.push(Bookmark {
                frame,
                correction_index,
                name,
            });
        }
    }

    Ok(RecordHeader {
        format_version,
        end_time,
        name,
        initial_position,
        initial_angles,
        frame_count,
        bookmarks,
    })
}

fn read_frame<R: Read>(r: &mut WireReader<R>) -> io::Result<Frame> {
    let buttons = r.u64()?;
    let impulse = r.i32()?;
    let actual_velocity = r.vec3()?;
    let predicted_velocity = r.vec3()?;
    let predicted_angles = r.angles2()?;
    let origin = r.vec3()?;
    let weapon = r.cstr()?;
    let subtype = r.i32()?;
    let seed = r.i32()?;
    let correction = CorrectionFlags::from_bits(r.i32()? as u32);

    Ok(Frame {
        buttons,
        impulse,
        actual_velocity,
        predicted_velocity,
        predicted_angles,
        origin,
        new_weapon: (!weapon.is_empty()).then_some(weapon),
        subtype,
        seed,
        correction,
    })
}

fn read_correction<R: Read>(
    r: &mut WireReader<R>,
    flags: CorrectionFlags,
) -> io::Result<CorrectionEntry> {
    let mut entry = CorrectionEntry::default();
    if flags.contains(CorrectionFlags::ORIGIN) {
        entry.origin = Some(r.vec3()?);
    }
    if flags.contains(CorrectionFlags::ANGLES) {
        entry.angles = Some(r.angles3()?);
    }
    if flags.contains(CorrectionFlags::VELOCITY) {
        entry.velocity = Some(r.vec3()?);
    }
    Ok(entry)
}

/// Read a record file
///
/// A missing file yields [`MimicError::FileNotFound`]; any other I/O failure
/// yields [`MimicError::BadFile`].
pub fn read_file(path: &Path, only_header: bool) -> Result<Record> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => MimicError::FileNotFound(path.to_path_buf()),
        _ => MimicError::bad_file(e),
    })?;
    read(BufReader::new(file), only_header)
}
