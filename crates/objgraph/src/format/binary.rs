// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary content encoding.
//!
//! Every value starts with a one-byte tag followed by its payload:
//!
//! ```text
//! 0x00            null
//! 0x01..=0x0E     scalar, PrimitiveKind::ALL order (payload below)
//! 0x20 ARRAY      kind tag (1) | count (4) | payloads without tags
//! 0x21 LIST       count (4) | values
//! 0x22 OBJECT     id (4) | type (str) | member count (4) | (name (str) | value)*
//! 0x23 BACKREF    id (4)
//! 0x24 ENUM       type (str) | variant (str) | discriminant (8)
//! 0x25 TYPE       type (str)
//! 0x26 MEMBER     owner (str) | member (str)
//! ```
//!
//! Payloads are little-endian. `str` is a `u32` byte count plus UTF-8; `char`
//! is its `u32` code point; `decimal` is an `i128` mantissa plus a `u8` scale;
//! `bool` is one byte, 0 or 1.

use crate::error::{Error, Result};
use crate::registry::TypeRegistry;
use crate::tracker::ReferenceTracker;
use crate::value::{Array, Decimal, EnumValue, Graph, MemberRef, PrimitiveKind, Value};
use crate::walker::{walk, Decoded, Emitter, Rebuilder};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

mod tag {
    pub const NULL: u8 = 0x00;
    pub const ARRAY: u8 = 0x20;
    pub const LIST: u8 = 0x21;
    pub const OBJECT: u8 = 0x22;
    pub const BACK_REF: u8 = 0x23;
    pub const ENUM: u8 = 0x24;
    pub const TYPE: u8 = 0x25;
    pub const MEMBER: u8 = 0x26;
}

fn kind_tag(kind: PrimitiveKind) -> u8 {
    let index = PrimitiveKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default();
    index as u8 + 1
}

fn tag_kind(tag: u8) -> Option<PrimitiveKind> {
    PrimitiveKind::ALL.get(usize::from(tag).checked_sub(1)?).copied()
}

// ============================================================================
// Encoder
// ============================================================================

pub(crate) fn encode(
    graph: &Graph,
    registry: &TypeRegistry,
    tracker: &mut ReferenceTracker,
    max_depth: usize,
) -> Result<Vec<u8>> {
    let mut encoder = Encoder { out: Vec::new() };
    walk(graph, registry, tracker, max_depth, &mut encoder)?;
    Ok(encoder.out)
}

struct Encoder {
    out: Vec<u8>,
}

impl Encoder {
    fn string(&mut self, s: &str) -> io::Result<()> {
        self.len(s.len())?;
        self.out.write_all(s.as_bytes())
    }

    fn len(&mut self, len: usize) -> io::Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "sequence too long"))?;
        self.out.write_u32::<LittleEndian>(len)
    }

    /// Payload of a scalar, without its tag.
    fn payload(&mut self, value: &Value) -> io::Result<()> {
        if let Value::String(v) = value {
            return self.string(v);
        }
        let out = &mut self.out;
        match value {
            Value::Bool(v) => out.write_u8(u8::from(*v)),
            Value::I8(v) => out.write_i8(*v),
            Value::U8(v) => out.write_u8(*v),
            Value::I16(v) => out.write_i16::<LittleEndian>(*v),
            Value::U16(v) => out.write_u16::<LittleEndian>(*v),
            Value::I32(v) => out.write_i32::<LittleEndian>(*v),
            Value::U32(v) => out.write_u32::<LittleEndian>(*v),
            Value::I64(v) => out.write_i64::<LittleEndian>(*v),
            Value::U64(v) => out.write_u64::<LittleEndian>(*v),
            Value::F32(v) => out.write_f32::<LittleEndian>(*v),
            Value::F64(v) => out.write_f64::<LittleEndian>(*v),
            Value::Decimal(v) => {
                out.write_i128::<LittleEndian>(v.mantissa())?;
                out.write_u8(v.scale())
            }
            Value::Char(v) => out.write_u32::<LittleEndian>(u32::from(*v)),
            _ => Ok(()),
        }
    }
}

impl Emitter for Encoder {
    fn null(&mut self) -> Result<()> {
        self.out.push(tag::NULL);
        Ok(())
    }

    fn primitive(&mut self, value: &Value) -> Result<()> {
        let Some(kind) = value.primitive_kind() else {
            return Err(Error::mismatch("primitive", value.describe()));
        };
        self.out.push(kind_tag(kind));
        Ok(self.payload(value)?)
    }

    fn array(&mut self, array: &Array) -> Result<()> {
        self.out.push(tag::ARRAY);
        self.out.push(kind_tag(array.element_kind()));
        self.len(array.len())?;
        for item in array.values() {
            self.payload(&item)?;
        }
        Ok(())
    }

    fn enumeration(&mut self, value: &EnumValue) -> Result<()> {
        self.out.push(tag::ENUM);
        self.string(&value.type_name)?;
        self.string(&value.variant)?;
        self.out.write_i64::<LittleEndian>(value.discriminant)?;
        Ok(())
    }

    fn type_handle(&mut self, name: &str) -> Result<()> {
        self.out.push(tag::TYPE);
        Ok(self.string(name)?)
    }

    fn member_handle(&mut self, member: &MemberRef) -> Result<()> {
        self.out.push(tag::MEMBER);
        self.string(&member.owner)?;
        Ok(self.string(&member.member)?)
    }

    fn begin_list(&mut self, len: usize) -> Result<()> {
        self.out.push(tag::LIST);
        Ok(self.len(len)?)
    }

    fn end_list(&mut self) -> Result<()> {
        Ok(())
    }

    fn begin_object(&mut self, id: u32, type_name: &str, members: usize) -> Result<()> {
        self.out.push(tag::OBJECT);
        self.out.write_u32::<LittleEndian>(id)?;
        self.string(type_name)?;
        Ok(self.len(members)?)
    }

    fn begin_member(&mut self, name: &str) -> Result<()> {
        Ok(self.string(name)?)
    }

    fn end_member(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        Ok(())
    }

    fn back_reference(&mut self, id: u32) -> Result<()> {
        self.out.push(tag::BACK_REF);
        self.out.write_u32::<LittleEndian>(id)?;
        Ok(())
    }
}

// ============================================================================
// Decoder
// ============================================================================

pub(crate) fn decode(
    content: &[u8],
    registry: &TypeRegistry,
    tracker: &mut ReferenceTracker,
    max_depth: usize,
) -> Result<Decoded> {
    let mut decoder = Decoder {
        input: content,
        rebuilder: Rebuilder::new(registry, tracker, max_depth),
    };
    let root = decoder.value()?;
    if !decoder.input.is_empty() {
        return Err(Error::malformed(format!(
            "{} trailing bytes after root value",
            decoder.input.len()
        )));
    }
    Ok(decoder.rebuilder.finish(root))
}

struct Decoder<'a, 'r> {
    input: &'a [u8],
    rebuilder: Rebuilder<'r>,
}

/// Short reads inside content mean the content itself is cut.
fn truncated(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::malformed("truncated frame content"),
        _ => Error::StreamIo(err),
    }
}

impl Decoder<'_, '_> {
    fn value(&mut self) -> Result<Value> {
        let code = self.u8()?;
        match code {
            tag::NULL => Ok(Value::Null),
            tag::ARRAY => {
                let element = self.u8()?;
                let kind = tag_kind(element).ok_or_else(|| {
                    Error::malformed(format!("unknown array element tag 0x{element:02x}"))
                })?;
                let len = self.len()?;
                self.array(kind, len).map(Value::Array)
            }
            tag::LIST => {
                let len = self.len()?;
                self.rebuilder.enter()?;
                let mut items = Vec::with_capacity(len.min(self.input.len()));
                for _ in 0..len {
                    items.push(self.value()?);
                }
                self.rebuilder.leave();
                Ok(Value::List(items))
            }
            tag::OBJECT => {
                let id = self.u32()?;
                let type_name = self.string()?;
                self.rebuilder.enter()?;
                let object = self.rebuilder.open_object(id, &type_name)?;
                let count = self.len()?;
                for _ in 0..count {
                    let name = self.string()?;
                    let value = self.value()?;
                    self.rebuilder.set_member(object, name, value);
                }
                self.rebuilder.leave();
                Ok(Value::Object(object))
            }
            tag::BACK_REF => {
                let id = self.u32()?;
                self.rebuilder.back_reference(id)
            }
            tag::ENUM => {
                let type_name = self.string()?;
                let variant = self.string()?;
                let discriminant = self.input.read_i64::<LittleEndian>().map_err(truncated)?;
                self.rebuilder.enumeration(&type_name, &variant, discriminant)
            }
            tag::TYPE => {
                let name = self.string()?;
                Ok(self.rebuilder.type_handle(&name))
            }
            tag::MEMBER => {
                let owner = self.string()?;
                let member = self.string()?;
                Ok(self.rebuilder.member_handle(&owner, &member))
            }
            other => match tag_kind(other) {
                Some(kind) => self.scalar(kind),
                None => Err(Error::malformed(format!("unknown value tag 0x{other:02x}"))),
            },
        }
    }

    fn array(&mut self, kind: PrimitiveKind, len: usize) -> Result<Array> {
        if let Some(size) = kind.size() {
            if !matches!(len.checked_mul(size), Some(bytes) if bytes <= self.input.len()) {
                return Err(Error::malformed(format!(
                    "array of {len} {kind} exceeds frame content"
                )));
            }
        }
        let mut items = Vec::with_capacity(len.min(self.input.len()));
        for _ in 0..len {
            items.push(self.scalar(kind)?);
        }
        Array::from_values(kind, items)
            .map_err(|item| Error::malformed(format!("{} inside array<{kind}>", item.describe())))
    }

    fn scalar(&mut self, kind: PrimitiveKind) -> Result<Value> {
        let value = match kind {
            PrimitiveKind::Bool => match self.u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(Error::malformed(format!("invalid bool byte {other}"))),
            },
            PrimitiveKind::I8 => Value::I8(self.input.read_i8().map_err(truncated)?),
            PrimitiveKind::U8 => Value::U8(self.u8()?),
            PrimitiveKind::I16 => Value::I16(self.input.read_i16::<LittleEndian>().map_err(truncated)?),
            PrimitiveKind::U16 => Value::U16(self.input.read_u16::<LittleEndian>().map_err(truncated)?),
            PrimitiveKind::I32 => Value::I32(self.input.read_i32::<LittleEndian>().map_err(truncated)?),
            PrimitiveKind::U32 => Value::U32(self.u32()?),
            PrimitiveKind::I64 => Value::I64(self.input.read_i64::<LittleEndian>().map_err(truncated)?),
            PrimitiveKind::U64 => Value::U64(self.input.read_u64::<LittleEndian>().map_err(truncated)?),
            PrimitiveKind::F32 => Value::F32(self.input.read_f32::<LittleEndian>().map_err(truncated)?),
            PrimitiveKind::F64 => Value::F64(self.input.read_f64::<LittleEndian>().map_err(truncated)?),
            PrimitiveKind::Decimal => {
                let mantissa = self.input.read_i128::<LittleEndian>().map_err(truncated)?;
                let scale = self.u8()?;
                let decimal = Decimal::new(mantissa, scale)
                    .ok_or_else(|| Error::malformed("decimal out of range"))?;
                Value::Decimal(decimal)
            }
            PrimitiveKind::Char => {
                let code = self.u32()?;
                let c = char::from_u32(code)
                    .ok_or_else(|| Error::malformed(format!("invalid char code {code:#x}")))?;
                Value::Char(c)
            }
            PrimitiveKind::String => Value::String(self.string()?),
        };
        Ok(value)
    }

    fn u8(&mut self) -> Result<u8> {
        self.input.read_u8().map_err(truncated)
    }

    fn u32(&mut self) -> Result<u32> {
        self.input.read_u32::<LittleEndian>().map_err(truncated)
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.len()?;
        if len > self.input.len() {
            return Err(Error::malformed("truncated frame content"));
        }
        let (bytes, rest) = self.input.split_at(len);
        self.input = rest;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::malformed("string is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeDescriptorBuilder;

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeDescriptorBuilder::record("demo.Node")
                .primitive("value", PrimitiveKind::I32)
                .shared("next", "demo.Node")
                .build(),
        );
        registry
    }

    fn decode_with(content: &[u8], registry: &TypeRegistry) -> Result<Graph> {
        decode(content, registry, &mut ReferenceTracker::new(), 64).and_then(Decoded::into_graph)
    }

    #[test]
    fn test_scalar_layout() {
        let registry = registry();
        let graph = Graph::from_value(Value::I32(-2));
        let bytes = encode(&graph, &registry, &mut ReferenceTracker::new(), 64).unwrap();
        assert_eq!(bytes, [kind_tag(PrimitiveKind::I32), 0xfe, 0xff, 0xff, 0xff]);

        let graph = Graph::from_value("hé");
        let bytes = encode(&graph, &registry, &mut ReferenceTracker::new(), 64).unwrap();
        assert_eq!(bytes, [0x0e, 3, 0, 0, 0, b'h', 0xc3, 0xa9]);
    }

    #[test]
    fn test_kind_tags_are_dense() {
        for (index, kind) in PrimitiveKind::ALL.into_iter().enumerate() {
            assert_eq!(kind_tag(kind), index as u8 + 1);
            assert_eq!(tag_kind(kind_tag(kind)), Some(kind));
        }
        assert_eq!(tag_kind(tag::NULL), None);
        assert_eq!(tag_kind(tag::ARRAY), None);
    }

    #[test]
    fn test_cycle_round_trip() {
        let registry = registry();
        let mut graph = Graph::new();
        let node = graph.add_object("demo.Node");
        graph.object_mut(node).unwrap().set("value", 7);
        graph.object_mut(node).unwrap().set("next", node);
        graph.set_root(node);

        let bytes = encode(&graph, &registry, &mut ReferenceTracker::new(), 64).unwrap();
        assert_eq!(bytes.iter().filter(|b| **b == tag::OBJECT).count(), 1);
        assert_eq!(decode_with(&bytes, &registry).unwrap(), graph);
    }

    #[test]
    fn test_rejects_corrupt_content() {
        let registry = registry();
        let bad = [
            vec![0x7f],
            vec![kind_tag(PrimitiveKind::I64), 1, 2],
            vec![kind_tag(PrimitiveKind::Bool), 2],
            vec![tag::ARRAY, kind_tag(PrimitiveKind::U64), 0xff, 0xff, 0xff, 0xff],
            vec![tag::BACK_REF, 0, 0, 0, 0],
            vec![tag::NULL, tag::NULL],
            vec![kind_tag(PrimitiveKind::Char), 0x00, 0xd8, 0x00, 0x00],
        ];
        for content in bad {
            assert!(
                matches!(decode_with(&content, &registry), Err(Error::MalformedFrame(_))),
                "{content:02x?}"
            );
        }
    }

    #[test]
    fn test_unknown_record_type() {
        let mut content = vec![tag::OBJECT, 0, 0, 0, 0, 8, 0, 0, 0];
        content.extend_from_slice(b"demo.Gap");
        content.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            decode_with(&content, &registry()),
            Err(Error::UnresolvableType(name)) if name == "demo.Gap"
        ));
    }
}
