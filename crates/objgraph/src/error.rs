// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by every serializer operation.

use std::io;
use thiserror::Error;

/// Errors surfaced by sessions, format drivers and the typed layer.
///
/// Every variant aborts the top-level value being written or read; no
/// partially populated value is ever handed back.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Framing
    // ========================================================================
    /// No known frame marker at the current stream position.
    #[error("unrecognized format: {0}")]
    UnrecognizedFormat(String),

    /// Length, tag or structure inconsistency while decoding a frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// In-place rewrite does not fit the frame it replaces.
    #[error("capacity exceeded: frame needs {needed} bytes, {available} available")]
    CapacityExceeded { needed: u64, available: u64 },

    // ========================================================================
    // Types
    // ========================================================================
    /// A type name (stored or written) has no registered descriptor.
    #[error("unresolvable type '{0}'")]
    UnresolvableType(String),

    /// Decoded value is not assignable to the requested type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A shared object was mutably borrowed while the graph was written.
    #[error("shared '{0}' instance is mutably borrowed")]
    Borrowed(String),

    // ========================================================================
    // Stream
    // ========================================================================
    /// Underlying stream failure.
    #[error("stream I/O error: {0}")]
    StreamIo(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Adds the member path to a type mismatch so nested failures stay readable.
    pub(crate) fn in_member(self, owner: &str, member: &str) -> Self {
        match self {
            Self::TypeMismatch { expected, found } => Self::TypeMismatch {
                expected: format!("{expected} (member {owner}.{member})"),
                found,
            },
            other => other,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;
