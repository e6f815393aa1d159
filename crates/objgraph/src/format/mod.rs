// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Format drivers.
//!
//! Supports:
//! - Binary (tagged little-endian values)
//! - Structured text (XML)
//!
//! Both drivers produce and consume the frame content; [`frame`] wraps it in
//! a self-describing header that carries the format marker, the reserved
//! capacity, the content length and a CRC-32 of the content.

mod binary;
pub(crate) mod frame;
mod text;

use crate::config::{BINARY_HEADER_LEN, BINARY_MAGIC, Options, TEXT_HEADER_LEN, TEXT_MAGIC};
use crate::error::Result;
use crate::tracker::ReferenceTracker;
use crate::value::Graph;
use crate::walker::Decoded;
use std::fmt;
use std::str::FromStr;

/// Encoding of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Compact tagged binary.
    Binary,
    /// XML document, readable and diffable.
    Text,
}

impl Format {
    pub const ALL: [Self; 2] = [Self::Binary, Self::Text];

    pub fn name(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Text => "text",
        }
    }

    /// Marker every frame of this format starts with.
    pub fn magic(self) -> &'static [u8] {
        match self {
            Self::Binary => &BINARY_MAGIC,
            Self::Text => &TEXT_MAGIC,
        }
    }

    /// Frame header size in bytes.
    pub fn header_len(self) -> usize {
        match self {
            Self::Binary => BINARY_HEADER_LEN,
            Self::Text => TEXT_HEADER_LEN,
        }
    }

    /// Format whose marker starts `prefix`, if any.
    pub fn detect(prefix: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| prefix.starts_with(format.magic()))
    }

    /// Byte used to fill reserved capacity.
    pub(crate) fn pad_byte(self) -> u8 {
        match self {
            Self::Binary => 0,
            Self::Text => b' ',
        }
    }

    /// Encodes `graph` as frame content.
    pub(crate) fn encode(
        self,
        graph: &Graph,
        tracker: &mut ReferenceTracker,
        options: &Options,
    ) -> Result<Vec<u8>> {
        match self {
            Self::Binary => binary::encode(graph, options.registry(), tracker, options.max_depth()),
            Self::Text => text::encode(
                graph,
                options.registry(),
                tracker,
                options.max_depth(),
                options.pretty_text(),
            ),
        }
    }

    /// Decodes frame content.
    pub(crate) fn decode(
        self,
        content: &[u8],
        tracker: &mut ReferenceTracker,
        options: &Options,
    ) -> Result<Decoded> {
        match self {
            Self::Binary => binary::decode(content, options.registry(), tracker, options.max_depth()),
            Self::Text => text::decode(content, options.registry(), tracker, options.max_depth()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(Self::Binary),
            "text" | "xml" => Ok(Self::Text),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_marker() {
        assert_eq!(Format::detect(&BINARY_MAGIC), Some(Format::Binary));
        assert_eq!(Format::detect(b"<!--OGX1:0000"), Some(Format::Text));
        assert_eq!(Format::detect(b"<!--OGX"), None);
        assert_eq!(Format::detect(b"Hello World"), None);
        assert_eq!(Format::detect(&[]), None);
    }

    #[test]
    fn test_parse_name() {
        assert_eq!("XML".parse::<Format>(), Ok(Format::Text));
        assert_eq!("binary".parse::<Format>(), Ok(Format::Binary));
        assert!("json".parse::<Format>().is_err());
    }
}
