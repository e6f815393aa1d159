// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// End-to-end session tests: every scenario runs against both formats.
//
// Covers plain values, records, shared and cyclic references, several
// frames per stream, in-place rewrite, foreign data between frames and
// conversion between the two formats.

#![allow(clippy::float_cmp)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use objgraph::{
    detect_format, Decimal, Error, Format, Graph, MemberInfo, Options, Persist, Serializer,
    TypeInfo, TypeRegistry, Value,
};
use std::cell::RefCell;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::rc::{Rc, Weak};
use std::sync::Arc;

// ============================================================================
// Test model
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq, Persist)]
#[persist(name = "tests.Point")]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Persist)]
#[persist(name = "tests.Color")]
enum Color {
    #[default]
    Red,
    Green = 5,
    Blue,
}

#[derive(Debug, Default, Clone, PartialEq, Persist)]
#[persist(name = "tests.Sample")]
struct Sample {
    flag: bool,
    tiny: i8,
    byte: u8,
    short: i16,
    ushort: u16,
    int: i32,
    uint: u32,
    long: i64,
    ulong: u64,
    single: f32,
    double: f64,
    money: Decimal,
    letter: char,
    text: String,
    color: Color,
    bytes: Vec<u8>,
    words: Vec<String>,
    maybe: Option<i32>,
    nothing: Option<Point>,
    boxed: Box<Point>,
    points: Vec<Point>,
    #[persist(transient)]
    scratch: u64,
}

#[derive(Debug, Default, Persist)]
#[persist(name = "tests.Node")]
struct Node {
    label: String,
    children: Vec<Rc<RefCell<Node>>>,
    parent: Weak<RefCell<Node>>,
    peer: Option<Rc<RefCell<Node>>>,
}

fn node(label: &str) -> Rc<RefCell<Node>> {
    Rc::new(RefCell::new(Node {
        label: label.to_string(),
        ..Node::default()
    }))
}

fn sample() -> Sample {
    Sample {
        flag: true,
        tiny: -8,
        byte: 200,
        short: -1600,
        ushort: 60000,
        int: -320000,
        uint: 4_000_000_000,
        long: i64::MIN,
        ulong: u64::MAX,
        single: 1.5,
        double: -2.25e300,
        money: "-1234.56".parse().unwrap(),
        letter: 'é',
        text: "fünf <&> \"quoted\"".to_string(),
        color: Color::Green,
        bytes: vec![0, 1, 254, 255],
        words: vec!["alpha".to_string(), String::new(), "gamma".to_string()],
        maybe: Some(42),
        nothing: None,
        boxed: Box::new(Point { x: 1, y: 2 }),
        points: vec![Point { x: 3, y: 4 }, Point { x: -5, y: 6 }],
        scratch: 0,
    }
}

fn round_trip<T: Persist>(format: Format, value: &T) -> T {
    let mut stream = Cursor::new(Vec::new());
    Serializer::open(&mut stream, Some(format))
        .unwrap()
        .write_object(value)
        .unwrap();
    stream.set_position(0);
    let mut reader = Serializer::open(&mut stream, None).unwrap();
    assert_eq!(reader.format(), format);
    reader.read_object().unwrap()
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_plain_data() {
    for format in Format::ALL {
        assert!(round_trip(format, &true));
        assert_eq!(round_trip(format, &-7i8), -7);
        assert_eq!(round_trip(format, &0xABu8), 0xAB);
        assert_eq!(round_trip(format, &i16::MIN), i16::MIN);
        assert_eq!(round_trip(format, &u16::MAX), u16::MAX);
        assert_eq!(round_trip(format, &i32::MIN), i32::MIN);
        assert_eq!(round_trip(format, &u32::MAX), u32::MAX);
        assert_eq!(round_trip(format, &i64::MAX), i64::MAX);
        assert_eq!(round_trip(format, &u64::MAX), u64::MAX);
        assert_eq!(round_trip(format, &f32::MIN_POSITIVE), f32::MIN_POSITIVE);
        assert_eq!(round_trip(format, &std::f64::consts::PI), std::f64::consts::PI);
        assert_eq!(round_trip(format, &Decimal::MAX), Decimal::MAX);
        assert_eq!(round_trip(format, &Decimal::MIN), Decimal::MIN);
        assert_eq!(round_trip(format, &String::new()), "");
        assert_eq!(round_trip(format, &"Hello World".to_string()), "Hello World");
        assert_eq!(round_trip(format, &Color::Blue), Color::Blue);
        assert_eq!(round_trip(format, &Some(3u16)), Some(3));
        assert_eq!(round_trip(format, &None::<u16>), None);

        let nan = round_trip(format, &f64::NAN);
        assert!(nan.is_nan());
        assert_eq!(round_trip(format, &-0.0f64).to_bits(), (-0.0f64).to_bits());
    }
}

#[test]
fn test_every_latin1_char() {
    for format in Format::ALL {
        for code in 0..=255u8 {
            let c = char::from(code);
            assert_eq!(round_trip(format, &c), c, "{format} {code}");
        }
        let text: String = (0..=255u8).map(char::from).collect();
        assert_eq!(round_trip(format, &text), text, "{format}");
    }
}

#[test]
fn test_primitive_arrays() {
    let mut rng = fastrand::Rng::with_seed(0x0B_6A_F0);
    for format in Format::ALL {
        let bools: Vec<bool> = (0..50).map(|_| rng.bool()).collect();
        let bytes: Vec<u8> = (0..50).map(|_| rng.u8(..)).collect();
        let signed: Vec<i8> = (0..50).map(|_| rng.i8(..)).collect();
        let shorts: Vec<i16> = (0..50).map(|_| rng.i16(..)).collect();
        let ints: Vec<i32> = (0..50).map(|_| rng.i32(..)).collect();
        let longs: Vec<u64> = (0..50).map(|_| rng.u64(..)).collect();
        let singles: Vec<f32> = (0..50).map(|_| rng.f32() * 1e6 - 5e5).collect();
        let doubles: Vec<f64> = (0..50).map(|_| rng.f64() * 1e12).collect();
        let chars: Vec<char> = (0..50).map(|_| rng.alphanumeric()).collect();
        let words: Vec<String> = (0..50)
            .map(|i| std::iter::repeat_with(|| rng.alphanumeric()).take(i % 7).collect())
            .collect();

        assert_eq!(round_trip(format, &bools), bools);
        assert_eq!(round_trip(format, &bytes), bytes);
        assert_eq!(round_trip(format, &signed), signed);
        assert_eq!(round_trip(format, &shorts), shorts);
        assert_eq!(round_trip(format, &ints), ints);
        assert_eq!(round_trip(format, &longs), longs);
        assert_eq!(round_trip(format, &singles), singles);
        assert_eq!(round_trip(format, &doubles), doubles);
        assert_eq!(round_trip(format, &chars), chars);
        assert_eq!(round_trip(format, &words), words);

        assert!(round_trip(format, &Vec::<f64>::new()).is_empty());
        assert!(round_trip(format, &Vec::<String>::new()).is_empty());
        assert!(round_trip(format, &Vec::<Point>::new()).is_empty());
    }
}

#[test]
fn test_type_and_member_handles() {
    let registry = TypeRegistry::global();
    let point = TypeInfo::of::<Point>(registry).unwrap();
    let member = MemberInfo::of::<Point>(registry, "y").unwrap();

    for format in Format::ALL {
        let read = round_trip(format, &point);
        assert_eq!(read, point);
        assert_eq!(read.name(), "tests.Point");

        let read = round_trip(format, &member);
        assert_eq!(read, member);
        assert_eq!(read.name(), "y");
        assert_eq!(read.owner().name(), "tests.Point");
    }
}

// ============================================================================
// Records
// ============================================================================

#[test]
fn test_flat_struct() {
    for format in Format::ALL {
        let mut original = sample();
        original.scratch = 99;
        let read = round_trip(format, &original);
        assert_eq!(read.scratch, 0, "transient member is not stored");
        original.scratch = 0;
        assert_eq!(read, original);
    }
}

#[test]
fn test_object_tree_keeps_sharing_and_cycles() {
    for format in Format::ALL {
        let root = node("root");
        let left = node("left");
        let right = node("right");
        for child in [&left, &right] {
            child.borrow_mut().parent = Rc::downgrade(&root);
            root.borrow_mut().children.push(Rc::clone(child));
        }
        left.borrow_mut().peer = Some(Rc::clone(&right));
        right.borrow_mut().peer = Some(Rc::clone(&left));
        root.borrow_mut().peer = Some(Rc::clone(&root));

        let read = round_trip(format, &root);
        let tree = read.borrow();
        assert_eq!(tree.label, "root");
        assert!(tree.parent.upgrade().is_none());
        assert!(Rc::ptr_eq(tree.peer.as_ref().unwrap(), &read));
        assert_eq!(tree.children.len(), 2);

        let (l, r) = (&tree.children[0], &tree.children[1]);
        assert_eq!(l.borrow().label, "left");
        assert_eq!(r.borrow().label, "right");
        assert!(Rc::ptr_eq(&l.borrow().parent.upgrade().unwrap(), &read));
        assert!(Rc::ptr_eq(&r.borrow().parent.upgrade().unwrap(), &read));
        assert!(Rc::ptr_eq(l.borrow().peer.as_ref().unwrap(), r));
        assert!(Rc::ptr_eq(r.borrow().peer.as_ref().unwrap(), l));
    }
}

#[test]
fn test_shared_object_is_written_once() {
    let shared = node("shared");
    let list = vec![Rc::clone(&shared), Rc::clone(&shared), Rc::clone(&shared)];

    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        Serializer::open(&mut stream, Some(format))
            .unwrap()
            .write_object(&list)
            .unwrap();

        stream.set_position(0);
        let graph = Serializer::open(&mut stream, None)
            .unwrap()
            .read_graph()
            .unwrap();
        assert_eq!(graph.len(), 1);

        stream.set_position(0);
        let read: Vec<Rc<RefCell<Node>>> = Serializer::open(&mut stream, None)
            .unwrap()
            .read_object()
            .unwrap();
        assert!(Rc::ptr_eq(&read[0], &read[1]));
        assert!(Rc::ptr_eq(&read[1], &read[2]));
    }
}

#[test]
fn test_mutably_borrowed_shared_object() {
    let shared = node("busy");
    let _guard = shared.borrow_mut();
    let mut stream = Cursor::new(Vec::new());
    let err = Serializer::open(&mut stream, Some(Format::Binary))
        .unwrap()
        .write_object(&shared)
        .unwrap_err();
    assert!(matches!(err, Error::Borrowed(_)));
    assert!(stream.get_ref().is_empty());
}

// ============================================================================
// Streams
// ============================================================================

#[test]
fn test_sequential_frames() {
    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        let mut session = Serializer::open(&mut stream, Some(format)).unwrap();
        session.write_object(&Point { x: 1, y: 1 }).unwrap();
        session.write_object(&"between".to_string()).unwrap();
        session.write_object(&sample()).unwrap();
        session.write_object(&Point { x: 2, y: 2 }).unwrap();
        drop(session);

        stream.set_position(0);
        let mut session = Serializer::open(&mut stream, None).unwrap();
        assert_eq!(session.read_object::<Point>().unwrap(), Point { x: 1, y: 1 });
        assert_eq!(session.read_object::<String>().unwrap(), "between");
        assert_eq!(session.read_object::<Sample>().unwrap(), sample());
        assert_eq!(session.read_object::<Point>().unwrap(), Point { x: 2, y: 2 });
        assert!(matches!(
            session.read_object::<Point>(),
            Err(Error::MalformedFrame(msg)) if msg.contains("end of stream")
        ));
    }
}

#[test]
fn test_random_access_rewrite() {
    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        let mut session = Serializer::open(&mut stream, Some(format)).unwrap();
        session.write_object(&Point { x: 1, y: 1 }).unwrap();
        let middle = session.position().unwrap();
        session.write_object(&"a fairly long middle frame".to_string()).unwrap();
        let last = session.position().unwrap();
        session.write_object(&Point { x: 3, y: 3 }).unwrap();
        let end = session.position().unwrap();

        // Shrinking keeps the old footprint.
        session.seek(SeekFrom::Start(middle)).unwrap();
        session.write_object(&"short".to_string()).unwrap();
        assert_eq!(session.position().unwrap(), last);

        // Growing into the next frame is refused and writes nothing.
        session.seek(SeekFrom::Start(middle)).unwrap();
        let err = session.write_object(&"x".repeat(512)).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { needed, available } if needed > available));

        // The original capacity is still available after the shrink.
        session.seek(SeekFrom::Start(middle)).unwrap();
        session.write_object(&"a fairly long middle frame".to_string()).unwrap();
        assert_eq!(session.position().unwrap(), last);

        session.seek(SeekFrom::Start(last)).unwrap();
        session.write_object(&Point { x: 7, y: 8 }).unwrap();
        assert_eq!(session.position().unwrap(), end);

        session.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(session.read_object::<Point>().unwrap(), Point { x: 1, y: 1 });
        assert_eq!(
            session.read_object::<String>().unwrap(),
            "a fairly long middle frame"
        );
        assert_eq!(session.read_object::<Point>().unwrap(), Point { x: 7, y: 8 });
    }
}

#[test]
fn test_last_frame_may_grow() {
    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        let mut session = Serializer::open(&mut stream, Some(format)).unwrap();
        session.write_object(&1u8).unwrap();
        let last = session.position().unwrap();
        session.write_object(&"tiny".to_string()).unwrap();

        session.seek(SeekFrom::Start(last)).unwrap();
        session.write_object(&"y".repeat(300)).unwrap();

        session.seek(SeekFrom::Start(last)).unwrap();
        assert_eq!(session.read_object::<String>().unwrap(), "y".repeat(300));
    }
}

#[test]
fn test_foreign_data_between_frames() {
    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        stream.write_all(b"Hello World").unwrap();
        let mut session = Serializer::open(&mut stream, Some(format)).unwrap();
        session.write_object(&sample()).unwrap();
        session.get_mut().write_i64::<LittleEndian>(17).unwrap();
        session.write_object(&Color::Red).unwrap();
        drop(session);

        stream.set_position(0);
        let mut greeting = [0u8; 11];
        stream.read_exact(&mut greeting).unwrap();
        assert_eq!(&greeting, b"Hello World");

        let mut session = Serializer::open(&mut stream, None).unwrap();
        assert_eq!(session.read_object::<Sample>().unwrap(), sample());
        assert_eq!(session.get_mut().read_i64::<LittleEndian>().unwrap(), 17);
        assert_eq!(session.read_object::<Color>().unwrap(), Color::Red);
        drop(session);

        assert_eq!(stream.position(), stream.get_ref().len() as u64);
    }
}

#[test]
fn test_format_conversion() {
    let mut binary = Cursor::new(Vec::new());
    Serializer::open(&mut binary, Some(Format::Binary))
        .unwrap()
        .write_object(&sample())
        .unwrap();
    binary.set_position(0);
    let graph = Serializer::open(&mut binary, None)
        .unwrap()
        .read_graph()
        .unwrap();

    let mut text = Cursor::new(Vec::new());
    Serializer::open(&mut text, Some(Format::Text))
        .unwrap()
        .write_graph(&graph)
        .unwrap();
    assert!(std::str::from_utf8(text.get_ref()).is_ok());

    text.set_position(0);
    let mut session = Serializer::open(&mut text, None).unwrap();
    assert_eq!(session.format(), Format::Text);
    let converted = session.read_graph().unwrap();
    assert_eq!(converted, graph);

    session.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(session.read_object::<Sample>().unwrap(), sample());
}

#[test]
fn test_owned_file_stream() {
    for format in Format::ALL {
        let file = tempfile::tempfile().unwrap();
        let mut session = Serializer::open(file, Some(format)).unwrap();
        session.write_object(&sample()).unwrap();
        session.write_object(&Point { x: 9, y: 9 }).unwrap();

        let mut file = session.into_inner();
        file.rewind().unwrap();
        assert_eq!(detect_format(&mut file).unwrap(), format);

        let mut session = Serializer::open(file, None).unwrap();
        assert_eq!(session.read_object::<Sample>().unwrap(), sample());
        assert_eq!(session.read_object::<Point>().unwrap(), Point { x: 9, y: 9 });
    }
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_detect_failure() {
    let mut stream = Cursor::new(b"Hello World".to_vec());
    assert!(matches!(
        detect_format(&mut stream),
        Err(Error::UnrecognizedFormat(_))
    ));
    assert_eq!(stream.position(), 0);
    assert!(matches!(
        detect_format(&mut Cursor::new(Vec::new())),
        Err(Error::UnrecognizedFormat(_))
    ));
}

#[test]
fn test_typed_mismatch_consumes_frame() {
    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        let mut session = Serializer::open(&mut stream, Some(format)).unwrap();
        session.write_object(&Point { x: 1, y: 2 }).unwrap();
        session.write_object(&vec![1i32, 2, 3]).unwrap();
        session.write_object(&Color::Blue).unwrap();
        session.write_object(&"end".to_string()).unwrap();

        session.seek(SeekFrom::Start(0)).unwrap();
        assert!(matches!(
            session.read_object::<Sample>(),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            session.read_object::<Vec<u8>>(),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            session.read_object::<Point>(),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(session.read_object::<String>().unwrap(), "end");
    }
}

#[test]
fn test_unregistered_type_on_read() {
    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        Serializer::open(&mut stream, Some(format))
            .unwrap()
            .write_object(&Point { x: 0, y: 0 })
            .unwrap();

        stream.set_position(0);
        let options = Options::new().with_registry(Arc::new(TypeRegistry::new()));
        let err = Serializer::with_options(&mut stream, None, options)
            .unwrap()
            .read_graph()
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableType(name) if name == "tests.Point"));
    }
}

#[test]
fn test_unregistered_type_on_write() {
    let mut graph = Graph::new();
    let object = graph.add_object("tests.Unknown");
    graph.set_root(Value::Object(object));

    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        let err = Serializer::open(&mut stream, Some(format))
            .unwrap()
            .write_graph(&graph)
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableType(_)));
        assert!(stream.get_ref().is_empty());
    }
}

#[test]
fn test_corrupted_frame_is_malformed() {
    for format in Format::ALL {
        let mut stream = Cursor::new(Vec::new());
        Serializer::open(&mut stream, Some(format))
            .unwrap()
            .write_object(&sample())
            .unwrap();

        let mut bytes = stream.into_inner();
        let last = bytes.len() - 8;
        bytes[last] ^= 0x20;

        let mut session = Serializer::open(Cursor::new(bytes.clone()), None).unwrap();
        assert!(matches!(session.read_graph(), Err(Error::MalformedFrame(_))));

        bytes.truncate(format.header_len() + 3);
        let mut session = Serializer::open(Cursor::new(bytes), None).unwrap();
        assert!(matches!(session.read_graph(), Err(Error::MalformedFrame(_))));
    }
}
