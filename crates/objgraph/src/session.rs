// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serializer session.
//!
//! A [`Serializer`] binds one [`Format`] to one stream. Every
//! [`write_object`](Serializer::write_object) writes exactly one frame at the
//! stream's current position and every [`read_object`](Serializer::read_object)
//! consumes exactly one, so frames can be mixed with foreign data written
//! directly to the stream in between.
//!
//! The stream can be owned (`Serializer<File>`) or borrowed
//! (`Serializer<&mut Cursor<Vec<u8>>>`). A borrowed stream stays usable once
//! the session is dropped.
//!
//! # Example
//!
//! ```
//! use objgraph::{Format, Persist, Serializer};
//! use std::io::Cursor;
//!
//! #[derive(Debug, Default, PartialEq, Persist)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let mut stream = Cursor::new(Vec::new());
//! let mut writer = Serializer::open(&mut stream, Some(Format::Text))?;
//! writer.write_object(&Point { x: 3, y: -4 })?;
//!
//! stream.set_position(0);
//! let mut reader = Serializer::open(&mut stream, None)?;
//! assert_eq!(reader.format(), Format::Text);
//! assert_eq!(reader.read_object::<Point>()?, Point { x: 3, y: -4 });
//! # Ok::<(), objgraph::Error>(())
//! ```

use crate::config::Options;
use crate::error::{Error, Result};
use crate::format::{frame, Format};
use crate::persist::{GraphReader, GraphWriter, Persist};
use crate::tracker::ReferenceTracker;
use crate::value::Graph;
use crate::walker::Decoded;
use std::io::{Read, Seek, SeekFrom, Write};

/// Detects the format of the frame at the stream's current position.
///
/// The position is restored. Fails with `UnrecognizedFormat` when no frame
/// marker is found.
pub fn detect_format<S: Read + Seek>(stream: &mut S) -> Result<Format> {
    match frame::peek_format(stream)? {
        Some(format) => Ok(format),
        None => {
            let offset = stream.stream_position()?;
            Err(Error::UnrecognizedFormat(format!(
                "no frame marker at offset {offset}"
            )))
        }
    }
}

/// One format bound to one stream.
pub struct Serializer<S> {
    stream: S,
    format: Format,
    options: Options,
    tracker: ReferenceTracker,
}

impl<S: Read + Seek> Serializer<S> {
    /// Opens a session with default options.
    ///
    /// With `format == None` the format is detected from the frame at the
    /// current position, which is left unchanged.
    pub fn open(stream: S, format: Option<Format>) -> Result<Self> {
        Self::with_options(stream, format, Options::default())
    }

    pub fn with_options(mut stream: S, format: Option<Format>, options: Options) -> Result<Self> {
        let format = match format {
            Some(format) => format,
            None => {
                let detected = detect_format(&mut stream)?;
                log::debug!("[objgraph] detected {} format", detected);
                detected
            }
        };
        log::debug!(
            "[objgraph] session opened (format={}, max_depth={}, max_frame_len={})",
            format,
            options.max_depth(),
            options.max_frame_len()
        );
        Ok(Self {
            stream,
            format,
            options,
            tracker: ReferenceTracker::new(),
        })
    }

    /// Reads the next frame as a dynamic graph.
    ///
    /// Every stored type name must resolve.
    pub fn read_graph(&mut self) -> Result<Graph> {
        self.next_frame()?.into_graph()
    }

    /// Reads the next frame as a `T`.
    ///
    /// Fails with `TypeMismatch` when the stored value is not assignable to
    /// `T`. Stored members `T` no longer declares are skipped, whether or
    /// not their types are still known. The frame is consumed either way.
    pub fn read_object<T: Persist>(&mut self) -> Result<T> {
        // Stored type names resolve through the registry while decoding.
        self.options.registry().ensure::<T>();
        let decoded = self.next_frame()?;
        GraphReader::new(&decoded.graph, self.options.registry())
            .with_max_depth(self.options.max_depth())
            .read_root()
    }

    fn next_frame(&mut self) -> Result<Decoded> {
        let offset = self.stream.stream_position()?;
        let content = frame::read_frame(&mut self.stream, self.format, self.options.max_frame_len())?;

        self.tracker.clear();
        let decoded = self.format.decode(&content, &mut self.tracker, &self.options);
        let objects = self.tracker.len();
        self.tracker.clear();

        let decoded = decoded?;
        log::debug!(
            "[objgraph] read {} frame at offset {} ({} objects)",
            self.format,
            offset,
            objects
        );
        Ok(decoded)
    }

    /// Current stream position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.stream.stream_position()?)
    }

    /// Moves the stream, e.g. back to a frame to rewrite it.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.stream.seek(pos)?)
    }
}

impl<S: Read + Write + Seek> Serializer<S> {
    /// Writes `value` as one frame at the current position.
    pub fn write_object<T: Persist>(&mut self, value: &T) -> Result<()> {
        let graph = GraphWriter::new(self.options.registry())
            .with_max_depth(self.options.max_depth())
            .build(value)?;
        self.write_graph(&graph)
    }

    /// Writes a dynamic graph as one frame at the current position.
    ///
    /// Every record type must be registered. Writing over an existing frame
    /// that is followed by more data replaces it in place and fails with
    /// `CapacityExceeded` (writing nothing) if the new frame is larger.
    pub fn write_graph(&mut self, graph: &Graph) -> Result<()> {
        self.tracker.clear();
        let content = self.format.encode(graph, &mut self.tracker, &self.options);
        let objects = self.tracker.len();
        self.tracker.clear();

        let content = content?;
        let offset = self.stream.stream_position()?;
        let written = frame::write_frame(
            &mut self.stream,
            self.format,
            &content,
            self.options.max_frame_len(),
        )?;
        log::debug!(
            "[objgraph] wrote {} frame at offset {} ({} bytes, {} objects)",
            self.format,
            offset,
            written,
            objects
        );
        Ok(())
    }
}

impl<S> Serializer<S> {
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Direct access to the stream, for foreign data between frames.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> std::fmt::Debug for Serializer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializer")
            .field("format", &self.format)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
