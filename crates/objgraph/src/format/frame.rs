// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame envelope.
//!
//! # Binary frame
//!
//! ```text
//! +---------------------------------------------------------+
//! | magic (4) 89 'O' 'G' 'B' | version (2) | flags (2)       |
//! | capacity (4) | length (4) | crc32 (4)                    |
//! +---------------------------------------------------------+
//! | content (length) | zero padding (capacity - length)     |
//! +---------------------------------------------------------+
//! ```
//!
//! # Text frame
//!
//! ```text
//! <!--OGX1:CCCCCCCC:LLLLLLLL:XXXXXXXX-->\n   capacity, length, crc32 (hex)
//! <graph version="1">...</graph>            content (length)
//!                                           space padding
//! ```
//!
//! Integers are little-endian. The CRC covers the content only. Capacity
//! is at least the content length; a frame rewritten in place keeps the
//! total size of the frame it replaces.

use crate::config::{BINARY_MAGIC, BINARY_VERSION, DETECT_LEN, TEXT_MAGIC};
use crate::error::{Error, Result};
use crate::format::Format;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub format: Format,
    /// Bytes reserved for content after the header.
    pub capacity: u32,
    /// Bytes of content actually used.
    pub length: u32,
    pub crc: u32,
}

impl FrameHeader {
    /// Header plus reserved capacity.
    pub fn total_len(&self) -> u64 {
        self.format.header_len() as u64 + u64::from(self.capacity)
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> io::Result<()> {
        match self.format {
            Format::Binary => {
                out.write_all(&BINARY_MAGIC)?;
                out.write_u16::<LittleEndian>(BINARY_VERSION)?;
                out.write_u16::<LittleEndian>(0)?;
                out.write_u32::<LittleEndian>(self.capacity)?;
                out.write_u32::<LittleEndian>(self.length)?;
                out.write_u32::<LittleEndian>(self.crc)?;
            }
            Format::Text => {
                out.write_all(&TEXT_MAGIC)?;
                writeln!(
                    out,
                    ":{:08x}:{:08x}:{:08x}-->",
                    self.capacity, self.length, self.crc
                )?;
            }
        }
        Ok(())
    }

    /// Parses a complete header (`format.header_len()` bytes).
    pub fn decode(format: Format, raw: &[u8]) -> Result<Self> {
        if !raw.starts_with(format.magic()) {
            return Err(Error::UnrecognizedFormat(format!(
                "expected a {format} frame marker"
            )));
        }
        let header = match format {
            Format::Binary => decode_binary(raw)?,
            Format::Text => decode_text(raw)?,
        };
        if header.length > header.capacity {
            return Err(Error::malformed(format!(
                "frame length {} exceeds capacity {}",
                header.length, header.capacity
            )));
        }
        Ok(header)
    }
}

fn decode_binary(raw: &[u8]) -> Result<FrameHeader> {
    let mut cursor = &raw[BINARY_MAGIC.len()..];
    let version = cursor.read_u16::<LittleEndian>()?;
    if version != BINARY_VERSION {
        return Err(Error::malformed(format!(
            "unsupported binary frame version {version}"
        )));
    }
    let _flags = cursor.read_u16::<LittleEndian>()?;
    Ok(FrameHeader {
        format: Format::Binary,
        capacity: cursor.read_u32::<LittleEndian>()?,
        length: cursor.read_u32::<LittleEndian>()?,
        crc: cursor.read_u32::<LittleEndian>()?,
    })
}

fn decode_text(raw: &[u8]) -> Result<FrameHeader> {
    let rest = &raw[TEXT_MAGIC.len()..];
    let field = |index: usize| -> Result<u32> {
        let start = index * 9;
        let (sep, digits) = (rest[start], &rest[start + 1..start + 9]);
        if sep != b':' || !digits.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::malformed("corrupt text frame header"));
        }
        let digits = std::str::from_utf8(digits)
            .map_err(|_| Error::malformed("corrupt text frame header"))?;
        u32::from_str_radix(digits, 16).map_err(|_| Error::malformed("corrupt text frame header"))
    };
    let header = FrameHeader {
        format: Format::Text,
        capacity: field(0)?,
        length: field(1)?,
        crc: field(2)?,
    };
    if &rest[27..] != b"-->\n" {
        return Err(Error::malformed("corrupt text frame header"));
    }
    Ok(header)
}

// ============================================================================
// Stream helpers
// ============================================================================

/// Reads until `buf` is full or the stream ends; returns the bytes read.
fn read_up_to<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Format of the frame starting at the current position. The position is
/// left unchanged.
pub(crate) fn peek_format<S: Read + Seek>(stream: &mut S) -> Result<Option<Format>> {
    let start = stream.stream_position()?;
    let mut prefix = [0u8; DETECT_LEN];
    let read = read_up_to(stream, &mut prefix)?;
    stream.seek(SeekFrom::Start(start))?;
    Ok(Format::detect(&prefix[..read]))
}

/// Header of the frame (of either format) starting at the current
/// position, if it parses. The position is left unchanged.
pub(crate) fn peek_header<S: Read + Seek>(stream: &mut S) -> Result<Option<FrameHeader>> {
    let Some(format) = peek_format(stream)? else {
        return Ok(None);
    };
    let start = stream.stream_position()?;
    let mut raw = vec![0u8; format.header_len()];
    let read = read_up_to(stream, &mut raw)?;
    stream.seek(SeekFrom::Start(start))?;
    if read < raw.len() {
        return Ok(None);
    }
    Ok(FrameHeader::decode(format, &raw).ok())
}

// ============================================================================
// Frame I/O
// ============================================================================

/// Writes `content` as one frame at the current position.
///
/// If a frame already starts here and more data follows it, the new frame
/// replaces it in place and must fit its total size. A frame that reaches
/// the end of the stream may grow. Returns the number of bytes written.
pub(crate) fn write_frame<S: Read + Write + Seek>(
    stream: &mut S,
    format: Format,
    content: &[u8],
    max_frame_len: u32,
) -> Result<u64> {
    let length = u32::try_from(content.len())
        .ok()
        .filter(|len| *len <= max_frame_len)
        .ok_or(Error::CapacityExceeded {
            needed: content.len() as u64,
            available: u64::from(max_frame_len),
        })?;
    let header_len = format.header_len() as u64;
    let needed = header_len + u64::from(length);

    let start = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(start))?;

    let mut capacity = length;
    if start < end {
        if let Some(old) = peek_header(stream)? {
            let available = old.total_len();
            if needed > available && start + available < end {
                return Err(Error::CapacityExceeded { needed, available });
            }
            // Keep the old footprint so no stale bytes survive a shrink.
            capacity = u32::try_from(available.saturating_sub(header_len))
                .map_or(length, |reserved| reserved.max(length));
            log::debug!(
                "[objgraph] rewriting {} frame at offset {} as {} ({}/{} bytes)",
                old.format,
                start,
                format,
                needed,
                available
            );
        }
    }

    let header = FrameHeader {
        format,
        capacity,
        length,
        crc: crc32fast::hash(content),
    };
    let total = header.total_len() as usize;
    let mut frame = Vec::with_capacity(total);
    header.encode(&mut frame)?;
    frame.extend_from_slice(content);
    frame.resize(total, format.pad_byte());

    stream.write_all(&frame)?;
    stream.flush()?;
    log::trace!(
        "[objgraph] wrote {} frame at offset {} ({} of {} bytes used)",
        format,
        start,
        length,
        capacity
    );
    Ok(frame.len() as u64)
}

/// Reads one frame of `format` and returns its verified content. The
/// stream is left right after the frame's padding.
pub(crate) fn read_frame<R: Read>(
    stream: &mut R,
    format: Format,
    max_frame_len: u32,
) -> Result<Vec<u8>> {
    let mut raw = vec![0u8; format.header_len()];
    let read = read_up_to(stream, &mut raw)?;
    if read == 0 {
        return Err(Error::malformed("premature end of stream"));
    }
    let marker = format.magic().len().min(read);
    if raw[..marker] != format.magic()[..marker] {
        return Err(Error::UnrecognizedFormat(format!(
            "expected a {format} frame marker"
        )));
    }
    if read < raw.len() {
        return Err(Error::malformed("truncated frame header"));
    }

    let header = FrameHeader::decode(format, &raw)?;
    if header.capacity > max_frame_len {
        return Err(Error::malformed(format!(
            "frame capacity {} exceeds limit {}",
            header.capacity, max_frame_len
        )));
    }

    let mut body = vec![0u8; header.capacity as usize];
    stream.read_exact(&mut body).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::malformed("truncated frame content"),
        _ => Error::StreamIo(e),
    })?;
    body.truncate(header.length as usize);

    if crc32fast::hash(&body) != header.crc {
        return Err(Error::malformed("frame checksum mismatch"));
    }
    log::trace!(
        "[objgraph] read {} frame ({} of {} bytes used)",
        format,
        header.length,
        header.capacity
    );
    Ok(body)
}
