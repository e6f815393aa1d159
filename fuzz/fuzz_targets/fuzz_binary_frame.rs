// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use objgraph::{Format, Serializer};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Raw frame bytes, header included
    if let Ok(mut session) = Serializer::open(Cursor::new(data), Some(Format::Binary)) {
        let _ = session.read_graph();
    }

    // Same bytes as content behind a valid header, past the checksum
    let len = (data.len() as u32).to_le_bytes();
    let mut framed = Vec::with_capacity(data.len() + 20);
    framed.extend_from_slice(&[0x89, b'O', b'G', b'B', 1, 0, 0, 0]);
    framed.extend_from_slice(&len);
    framed.extend_from_slice(&len);
    framed.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    framed.extend_from_slice(data);
    if let Ok(mut session) = Serializer::open(Cursor::new(framed), None) {
        let _ = session.read_graph();
    }
});
