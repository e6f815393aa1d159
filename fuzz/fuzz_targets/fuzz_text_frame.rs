// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use objgraph::{Format, Serializer};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Raw frame bytes, header included
    if let Ok(mut session) = Serializer::open(Cursor::new(data), Some(Format::Text)) {
        let _ = session.read_graph();
    }

    // Same bytes as an XML document behind a valid header
    let len = data.len();
    let crc = crc32fast::hash(data);
    let mut framed = format!("<!--OGX1:{len:08x}:{len:08x}:{crc:08x}-->\n").into_bytes();
    framed.extend_from_slice(data);
    if let Ok(mut session) = Serializer::open(Cursor::new(framed), None) {
        let _ = session.read_graph();
    }
});
