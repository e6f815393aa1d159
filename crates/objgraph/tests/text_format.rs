// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Structured-text frames: documents stay human readable and hand-written
// documents load like generated ones.

#![allow(clippy::float_cmp)]
#![allow(clippy::missing_panics_doc)]

use objgraph::{Error, Format, Options, Persist, Serializer};
use std::io::Cursor;

#[derive(Debug, Default, Clone, Copy, PartialEq, Persist)]
#[persist(name = "tests.Unit")]
enum Unit {
    #[default]
    Celsius,
    Kelvin,
}

#[derive(Debug, Default, PartialEq, Persist)]
#[persist(name = "tests.Reading")]
struct Reading {
    sensor: String,
    celsius: f64,
    unit: Unit,
    history: Vec<i32>,
}

/// Wraps a document in a text frame header.
fn text_frame(document: &str) -> Vec<u8> {
    let crc = crc32fast::hash(document.as_bytes());
    let len = document.len();
    let mut frame = format!("<!--OGX1:{len:08x}:{len:08x}:{crc:08x}-->\n").into_bytes();
    frame.extend_from_slice(document.as_bytes());
    frame
}

#[test]
fn test_hand_written_document() {
    let document = r#"<graph version="1">
  <object id="0" type="tests.Reading">
    <member name="sensor"><string>probe-7</string></member>
    <member name="firmware"><string>2.1</string></member>
    <member name="celsius"><f32>21.5</f32></member>
    <member name="unit"><enum type="tests.Unit" discriminant="99">Kelvin</enum></member>
    <member name="history">
      <array kind="i16" length="3"><i16>-4</i16><i16>0</i16><i16>19</i16></array>
    </member>
  </object>
</graph>
"#;
    let mut stream = Cursor::new(text_frame(document));
    let mut session = Serializer::open(&mut stream, None).unwrap();
    assert_eq!(session.format(), Format::Text);

    let reading: Reading = session.read_object().unwrap();
    assert_eq!(
        reading,
        Reading {
            sensor: "probe-7".to_string(),
            celsius: 21.5,
            unit: Unit::Kelvin,
            history: vec![-4, 0, 19],
        }
    );
}

#[test]
fn test_pretty_output() {
    let reading = Reading {
        sensor: "probe <7>".to_string(),
        celsius: -3.25,
        unit: Unit::Celsius,
        history: vec![1, 2],
    };

    let mut stream = Cursor::new(Vec::new());
    let options = Options::new().with_pretty_text(true);
    Serializer::with_options(&mut stream, Some(Format::Text), options)
        .unwrap()
        .write_object(&reading)
        .unwrap();

    let text = String::from_utf8(stream.get_ref().clone()).unwrap();
    assert!(text.starts_with("<!--OGX1:"));
    assert!(text.contains("\n  <object id=\"0\" type=\"tests.Reading\">"));
    assert!(text.contains("<string>probe &lt;7&gt;</string>"));
    assert!(text.contains("<enum type=\"tests.Unit\" discriminant=\"0\">Celsius</enum>"));

    stream.set_position(0);
    let read: Reading = Serializer::open(&mut stream, None)
        .unwrap()
        .read_object()
        .unwrap();
    assert_eq!(read, reading);
}

#[test]
fn test_edited_document_fails_checksum() {
    let mut stream = Cursor::new(Vec::new());
    Serializer::open(&mut stream, Some(Format::Text))
        .unwrap()
        .write_object(&Reading::default())
        .unwrap();

    let edited = String::from_utf8(stream.into_inner())
        .unwrap()
        .replace("Celsius", "Kelvin!");
    let mut stream = Cursor::new(edited.into_bytes());
    let err = Serializer::open(&mut stream, None)
        .unwrap()
        .read_graph()
        .unwrap_err();
    assert!(matches!(err, Error::MalformedFrame(msg) if msg.contains("checksum")));
}

#[test]
fn test_unknown_variant_is_a_mismatch() {
    let document = r#"<graph version="1"><enum type="tests.Unit" discriminant="7">Rankine</enum></graph>"#;
    let mut stream = Cursor::new(text_frame(document));
    let err = Serializer::open(&mut stream, None)
        .unwrap()
        .read_object::<Unit>()
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}
