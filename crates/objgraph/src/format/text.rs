// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured-text content encoding (XML).
//!
//! ```text
//! <graph version="1">
//!   <object id="0" type="demo.Node">
//!     <member name="value"><i32>7</i32></member>
//!     <member name="next"><ref id="0"/></member>
//!   </object>
//! </graph>
//! ```
//!
//! Scalars are elements named after their kind. `char` is written as its
//! decimal code point. Strings holding characters XML cannot carry are
//! written as UTF-8 hex with `encoding="hex"`. NaN floats carry their bit
//! pattern in a `bits` attribute.

use crate::config::TEXT_VERSION;
use crate::error::{Error, Result};
use crate::registry::TypeRegistry;
use crate::tracker::ReferenceTracker;
use crate::value::{Array, EnumValue, Graph, MemberRef, PrimitiveKind, Value};
use crate::walker::{walk, Decoded, Emitter, Rebuilder};
use roxmltree::{Document, Node};
use std::str::FromStr;

// ============================================================================
// Writer
// ============================================================================

pub(crate) fn encode(
    graph: &Graph,
    registry: &TypeRegistry,
    tracker: &mut ReferenceTracker,
    max_depth: usize,
    pretty: bool,
) -> Result<Vec<u8>> {
    let mut writer = XmlWriter {
        out: String::new(),
        pretty,
        depth: 0,
    };
    writer.open("graph", &[("version", TEXT_VERSION)]);
    walk(graph, registry, tracker, max_depth, &mut writer)?;
    writer.close("graph");
    writer.out.push('\n');
    Ok(writer.out.into_bytes())
}

struct XmlWriter {
    out: String,
    pretty: bool,
    depth: usize,
}

impl XmlWriter {
    fn indent(&mut self) {
        if self.pretty && !self.out.is_empty() {
            self.out.push('\n');
            for _ in 0..self.depth {
                self.out.push_str("  ");
            }
        }
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attrs {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            escape_attr(value, &mut self.out);
            self.out.push('"');
        }
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.start(name, attrs);
        self.out.push('>');
        self.depth += 1;
    }

    fn close(&mut self, name: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.start(name, attrs);
        self.out.push_str("/>");
    }

    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) {
        self.start(name, attrs);
        self.out.push('>');
        escape_text(text, &mut self.out);
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    fn scalar(&mut self, value: &Value) -> Result<()> {
        let Some(kind) = value.primitive_kind() else {
            return Err(Error::mismatch("primitive", value.describe()));
        };
        let name = kind.name();
        match value {
            Value::F32(v) if v.is_nan() => {
                self.leaf(name, &[("bits", format!("{:08x}", v.to_bits()).as_str())], "NaN");
            }
            Value::F64(v) if v.is_nan() => {
                self.leaf(name, &[("bits", format!("{:016x}", v.to_bits()).as_str())], "NaN");
            }
            Value::String(s) if !is_xml_text(s) => {
                self.leaf(name, &[("encoding", "hex")], &hex(s.as_bytes()));
            }
            Value::String(s) => self.leaf(name, &[], s),
            other => self.leaf(name, &[], &scalar_text(other)),
        }
        Ok(())
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Bool(v) => v.to_string(),
        Value::I8(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::Char(v) => u32::from(*v).to_string(),
        Value::String(v) => v.clone(),
        _ => String::new(),
    }
}

/// True if every character is legal in XML 1.0 content.
fn is_xml_text(s: &str) -> bool {
    s.chars().all(|c| {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    })
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            // Parsers normalize bare carriage returns to newlines.
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl Emitter for XmlWriter {
    fn null(&mut self) -> Result<()> {
        self.empty("null", &[]);
        Ok(())
    }

    fn primitive(&mut self, value: &Value) -> Result<()> {
        self.scalar(value)
    }

    fn array(&mut self, array: &Array) -> Result<()> {
        let length = array.len().to_string();
        self.open(
            "array",
            &[("kind", array.element_kind().name()), ("length", length.as_str())],
        );
        for item in array.values() {
            self.scalar(&item)?;
        }
        self.close("array");
        Ok(())
    }

    fn enumeration(&mut self, value: &EnumValue) -> Result<()> {
        let discriminant = value.discriminant.to_string();
        self.leaf(
            "enum",
            &[
                ("type", value.type_name.as_str()),
                ("discriminant", discriminant.as_str()),
            ],
            &value.variant,
        );
        Ok(())
    }

    fn type_handle(&mut self, name: &str) -> Result<()> {
        self.empty("type", &[("name", name)]);
        Ok(())
    }

    fn member_handle(&mut self, member: &MemberRef) -> Result<()> {
        self.empty(
            "member-ref",
            &[
                ("owner", member.owner.as_str()),
                ("member", member.member.as_str()),
            ],
        );
        Ok(())
    }

    fn begin_list(&mut self, len: usize) -> Result<()> {
        self.open("list", &[("length", len.to_string().as_str())]);
        Ok(())
    }

    fn end_list(&mut self) -> Result<()> {
        self.close("list");
        Ok(())
    }

    fn begin_object(&mut self, id: u32, type_name: &str, _members: usize) -> Result<()> {
        self.open("object", &[("id", id.to_string().as_str()), ("type", type_name)]);
        Ok(())
    }

    fn begin_member(&mut self, name: &str) -> Result<()> {
        self.open("member", &[("name", name)]);
        Ok(())
    }

    fn end_member(&mut self) -> Result<()> {
        self.close("member");
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        self.close("object");
        Ok(())
    }

    fn back_reference(&mut self, id: u32) -> Result<()> {
        self.empty("ref", &[("id", id.to_string().as_str())]);
        Ok(())
    }
}

// ============================================================================
// Reader
// ============================================================================

pub(crate) fn decode(
    content: &[u8],
    registry: &TypeRegistry,
    tracker: &mut ReferenceTracker,
    max_depth: usize,
) -> Result<Decoded> {
    let text = std::str::from_utf8(content)
        .map_err(|_| Error::malformed("text frame is not valid UTF-8"))?;
    let doc = Document::parse(text).map_err(|e| Error::malformed(format!("invalid XML: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != "graph" {
        return Err(Error::malformed(format!(
            "expected <graph>, found <{}>",
            root.tag_name().name()
        )));
    }
    match root.attribute("version") {
        Some(TEXT_VERSION) => {}
        other => {
            return Err(Error::malformed(format!(
                "unsupported text frame version {other:?}"
            )))
        }
    }

    let value = single_child(root)?;
    let mut reader = XmlReader {
        rebuilder: Rebuilder::new(registry, tracker, max_depth),
    };
    let root_value = reader.value(value)?;
    Ok(reader.rebuilder.finish(root_value))
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}

fn single_child<'a, 'input>(node: Node<'a, 'input>) -> Result<Node<'a, 'input>> {
    let mut children = elements(node);
    match (children.next(), children.next()) {
        (Some(child), None) => Ok(child),
        _ => Err(Error::malformed(format!(
            "<{}> must hold exactly one value",
            node.tag_name().name()
        ))),
    }
}

fn attr<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        Error::malformed(format!(
            "<{}> is missing attribute '{name}'",
            node.tag_name().name()
        ))
    })
}

fn parse_attr<T: FromStr>(node: Node<'_, '_>, name: &str) -> Result<T> {
    let raw = attr(node, name)?;
    raw.parse().map_err(|_| {
        Error::malformed(format!(
            "<{}> has invalid {name}=\"{raw}\"",
            node.tag_name().name()
        ))
    })
}

struct XmlReader<'r> {
    rebuilder: Rebuilder<'r>,
}

impl XmlReader<'_> {
    fn value(&mut self, node: Node<'_, '_>) -> Result<Value> {
        match node.tag_name().name() {
            "null" => Ok(Value::Null),
            "array" => {
                let kind_name = attr(node, "kind")?;
                let kind = PrimitiveKind::from_name(kind_name).ok_or_else(|| {
                    Error::malformed(format!("unknown array kind '{kind_name}'"))
                })?;
                let length: usize = parse_attr(node, "length")?;
                let items = elements(node)
                    .map(|item| {
                        if item.tag_name().name() != kind.name() {
                            return Err(Error::malformed(format!(
                                "<{}> inside array<{kind}>",
                                item.tag_name().name()
                            )));
                        }
                        scalar(kind, item)
                    })
                    .collect::<Result<Vec<_>>>()?;
                if items.len() != length {
                    return Err(Error::malformed(format!(
                        "array declares {length} items, holds {}",
                        items.len()
                    )));
                }
                Array::from_values(kind, items)
                    .map(Value::Array)
                    .map_err(|item| Error::malformed(format!("{} inside array<{kind}>", item.describe())))
            }
            "list" => {
                let length: usize = parse_attr(node, "length")?;
                self.rebuilder.enter()?;
                let items = elements(node)
                    .map(|item| self.value(item))
                    .collect::<Result<Vec<_>>>()?;
                self.rebuilder.leave();
                if items.len() != length {
                    return Err(Error::malformed(format!(
                        "list declares {length} items, holds {}",
                        items.len()
                    )));
                }
                Ok(Value::List(items))
            }
            "object" => {
                let id: u32 = parse_attr(node, "id")?;
                let type_name = attr(node, "type")?;
                self.rebuilder.enter()?;
                let object = self.rebuilder.open_object(id, type_name)?;
                for member in elements(node) {
                    if member.tag_name().name() != "member" {
                        return Err(Error::malformed(format!(
                            "<{}> inside <object>",
                            member.tag_name().name()
                        )));
                    }
                    let name = attr(member, "name")?;
                    let value = self.value(single_child(member)?)?;
                    self.rebuilder.set_member(object, name.to_string(), value);
                }
                self.rebuilder.leave();
                Ok(Value::Object(object))
            }
            "ref" => self.rebuilder.back_reference(parse_attr(node, "id")?),
            "enum" => self.rebuilder.enumeration(
                attr(node, "type")?,
                node.text().unwrap_or_default(),
                parse_attr(node, "discriminant")?,
            ),
            "type" => Ok(self.rebuilder.type_handle(attr(node, "name")?)),
            "member-ref" => Ok(self
                .rebuilder
                .member_handle(attr(node, "owner")?, attr(node, "member")?)),
            other => match PrimitiveKind::from_name(other) {
                Some(kind) => scalar(kind, node),
                None => Err(Error::malformed(format!("unknown element <{other}>"))),
            },
        }
    }
}

fn scalar(kind: PrimitiveKind, node: Node<'_, '_>) -> Result<Value> {
    let text = node.text().unwrap_or_default();
    let bad = || Error::malformed(format!("invalid {kind} literal {text:?}"));
    let number = text.trim();

    Ok(match kind {
        PrimitiveKind::Bool => match number {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(bad()),
        },
        PrimitiveKind::I8 => Value::I8(number.parse().map_err(|_| bad())?),
        PrimitiveKind::U8 => Value::U8(number.parse().map_err(|_| bad())?),
        PrimitiveKind::I16 => Value::I16(number.parse().map_err(|_| bad())?),
        PrimitiveKind::U16 => Value::U16(number.parse().map_err(|_| bad())?),
        PrimitiveKind::I32 => Value::I32(number.parse().map_err(|_| bad())?),
        PrimitiveKind::U32 => Value::U32(number.parse().map_err(|_| bad())?),
        PrimitiveKind::I64 => Value::I64(number.parse().map_err(|_| bad())?),
        PrimitiveKind::U64 => Value::U64(number.parse().map_err(|_| bad())?),
        PrimitiveKind::F32 => Value::F32(match node.attribute("bits") {
            Some(bits) => f32::from_bits(u32::from_str_radix(bits, 16).map_err(|_| bad())?),
            None => number.parse().map_err(|_| bad())?,
        }),
        PrimitiveKind::F64 => Value::F64(match node.attribute("bits") {
            Some(bits) => f64::from_bits(u64::from_str_radix(bits, 16).map_err(|_| bad())?),
            None => number.parse().map_err(|_| bad())?,
        }),
        PrimitiveKind::Decimal => Value::Decimal(number.parse().map_err(|_| bad())?),
        PrimitiveKind::Char => {
            let code: u32 = number.parse().map_err(|_| bad())?;
            Value::Char(char::from_u32(code).ok_or_else(bad)?)
        }
        PrimitiveKind::String => match node.attribute("encoding") {
            None => Value::String(text.to_string()),
            Some("hex") => Value::String(unhex(text).ok_or_else(bad)?),
            Some(other) => {
                return Err(Error::malformed(format!(
                    "unknown string encoding '{other}'"
                )))
            }
        },
    })
}

fn unhex(text: &str) -> Option<String> {
    let digits = text.trim().as_bytes();
    if digits.len() % 2 != 0 {
        return None;
    }
    let bytes = digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
