// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration.
//!
//! - **Level 1 (Static)**: frame markers, versions and default limits.
//! - **Level 2 (Session)**: [`Options`], handed to a session at open time.
//!
//! # Environment
//!
//! [`Options::from_env`] reads:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `OBJGRAPH_MAX_DEPTH` | nesting limit while walking a graph |
//! | `OBJGRAPH_MAX_FRAME_LEN` | largest frame accepted or produced, in bytes |
//! | `OBJGRAPH_PRETTY_TEXT` | indent structured-text output (`1`/`true`) |

use crate::registry::TypeRegistry;
use std::sync::Arc;

// =======================================================================
// Frame markers
// =======================================================================

/// Binary frame marker. The high first byte keeps it apart from text.
pub const BINARY_MAGIC: [u8; 4] = [0x89, b'O', b'G', b'B'];

/// Binary frame layout version.
pub const BINARY_VERSION: u16 = 1;

/// magic(4) version(2) flags(2) capacity(4) length(4) crc32(4)
pub const BINARY_HEADER_LEN: usize = 20;

/// Structured-text frame marker (start of an XML comment).
pub const TEXT_MAGIC: [u8; 8] = *b"<!--OGX1";

/// `<!--OGX1:CCCCCCCC:LLLLLLLL:XXXXXXXX-->\n`
pub const TEXT_HEADER_LEN: usize = 39;

/// Bytes needed to tell the formats apart.
pub const DETECT_LEN: usize = 8;

/// Structured-text document version attribute.
pub const TEXT_VERSION: &str = "1";

// =======================================================================
// Default limits
// =======================================================================

/// Nesting limit (objects and lists) while encoding or decoding.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Largest frame payload, in bytes (256 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;

// =======================================================================
// Session options
// =======================================================================

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct Options {
    max_depth: usize,
    max_frame_len: u32,
    pretty_text: bool,
    registry: Option<Arc<TypeRegistry>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            pretty_text: false,
            registry: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `OBJGRAPH_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(depth) = env_parse::<usize>("OBJGRAPH_MAX_DEPTH") {
            options.max_depth = depth;
        }
        if let Some(len) = env_parse::<u32>("OBJGRAPH_MAX_FRAME_LEN") {
            options.max_frame_len = len;
        }
        if let Ok(pretty) = std::env::var("OBJGRAPH_PRETTY_TEXT") {
            options.pretty_text = matches!(pretty.as_str(), "1" | "true" | "yes");
        }
        options
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Indent structured-text output.
    #[must_use]
    pub fn with_pretty_text(mut self, pretty: bool) -> Self {
        self.pretty_text = pretty;
        self
    }

    /// Use a private registry instead of the process-wide one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn max_frame_len(&self) -> u32 {
        self.max_frame_len
    }

    pub fn pretty_text(&self) -> bool {
        self.pretty_text
    }

    /// Registry used to describe and resolve types.
    pub fn registry(&self) -> &TypeRegistry {
        match &self.registry {
            Some(registry) => registry.as_ref(),
            None => TypeRegistry::global(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("[objgraph] ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes_match_layout() {
        assert_eq!(BINARY_HEADER_LEN, 4 + 2 + 2 + 4 + 4 + 4);
        let sample = format!(
            "{}:{:08x}:{:08x}:{:08x}-->\n",
            std::str::from_utf8(&TEXT_MAGIC).unwrap(),
            0,
            0,
            0
        );
        assert_eq!(sample.len(), TEXT_HEADER_LEN);
        assert!(DETECT_LEN >= BINARY_MAGIC.len() && DETECT_LEN >= TEXT_MAGIC.len());
    }

    #[test]
    fn test_builder_overrides() {
        let registry = Arc::new(TypeRegistry::new());
        let options = Options::new()
            .with_max_depth(8)
            .with_max_frame_len(1024)
            .with_pretty_text(true)
            .with_registry(Arc::clone(&registry));

        assert_eq!(options.max_depth(), 8);
        assert_eq!(options.max_frame_len(), 1024);
        assert!(options.pretty_text());
        assert!(std::ptr::eq(options.registry(), registry.as_ref()));
    }

    #[test]
    fn test_default_uses_global_registry() {
        let options = Options::default();
        assert!(std::ptr::eq(options.registry(), TypeRegistry::global()));
    }
}
