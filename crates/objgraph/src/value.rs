// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic value model.
//!
//! A [`Graph`] is what every format driver reads and writes: a root [`Value`]
//! plus an arena of [`Object`] records. Shared references are two
//! [`Value::Object`] carrying the same [`ObjectId`]; a cycle is an id that
//! points back at an ancestor in the arena.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Primitive kinds
// ============================================================================

/// Leaf value kinds handled by the primitive and array codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
    Char,
    String,
}

impl PrimitiveKind {
    /// Every kind, in tag order.
    pub const ALL: [Self; 14] = [
        Self::Bool,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::F32,
        Self::F64,
        Self::Decimal,
        Self::Char,
        Self::String,
    ];

    /// Stable name, also used as the XML element name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "decimal",
            Self::Char => "char",
            Self::String => "string",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Encoded size in the binary format (None for strings).
    pub fn size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 | Self::Char => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::Decimal => Some(17),
            Self::String => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::U8 | Self::I16 | Self::U16 | Self::I32 | Self::U32 | Self::I64 | Self::U64
        )
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Decimal
// ============================================================================

/// Fixed-point decimal: 96-bit signed mantissa scaled by `10^-scale`.
///
/// Equality is exact on (mantissa, scale), so `1.0` and `1.00` differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

/// Error returned when a decimal literal cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decimal literal '{0}'")]
pub struct ParseDecimalError(String);

impl Decimal {
    /// Largest supported scale.
    pub const MAX_SCALE: u8 = 28;
    /// Largest mantissa magnitude (2^96 - 1).
    pub const MAX_MANTISSA: i128 = (1i128 << 96) - 1;

    pub const ZERO: Self = Self {
        mantissa: 0,
        scale: 0,
    };
    pub const MAX: Self = Self {
        mantissa: Self::MAX_MANTISSA,
        scale: 0,
    };
    pub const MIN: Self = Self {
        mantissa: -Self::MAX_MANTISSA,
        scale: 0,
    };

    /// Returns `None` when the mantissa or scale is out of range.
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        if scale > Self::MAX_SCALE || mantissa.unsigned_abs() > Self::MAX_MANTISSA as u128 {
            return None;
        }
        Some(Self { mantissa, scale })
    }

    pub fn mantissa(self) -> i128 {
        self.mantissa
    }

    pub fn scale(self) -> u8 {
        self.scale
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self {
            mantissa: i128::from(value),
            scale: 0,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = usize::from(self.scale);
        if self.mantissa < 0 {
            f.write_str("-")?;
        }
        if scale == 0 {
            return f.write_str(&digits);
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{int_part}.{frac_part}")
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDecimalError(s.to_string());
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty()
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
            || (body.contains('.') && frac_part.is_empty())
        {
            return Err(invalid());
        }
        let scale = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
        let magnitude: u128 = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| invalid())?;
        let magnitude = i128::try_from(magnitude).map_err(|_| invalid())?;
        let mantissa = if negative { -magnitude } else { magnitude };
        Self::new(mantissa, scale).ok_or_else(invalid)
    }
}

// ============================================================================
// Values
// ============================================================================

/// Identifier of an object inside one [`Graph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Enumeration value, stored by name and discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: String,
    pub variant: String,
    pub discriminant: i64,
}

/// Reflective handle naming one member of a registered type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub member: String,
}

/// Homogeneous primitive array.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Decimal(Vec<Decimal>),
    Char(Vec<char>),
    String(Vec<String>),
}

macro_rules! each_array {
    ($array:expr, $items:ident => $body:expr) => {
        match $array {
            Array::Bool($items) => $body,
            Array::I8($items) => $body,
            Array::U8($items) => $body,
            Array::I16($items) => $body,
            Array::U16($items) => $body,
            Array::I32($items) => $body,
            Array::U32($items) => $body,
            Array::I64($items) => $body,
            Array::U64($items) => $body,
            Array::F32($items) => $body,
            Array::F64($items) => $body,
            Array::Decimal($items) => $body,
            Array::Char($items) => $body,
            Array::String($items) => $body,
        }
    };
}

macro_rules! collect_array {
    ($values:expr, $variant:ident) => {
        $values
            .into_iter()
            .map(|value| match value {
                Value::$variant(item) => Ok(item),
                other => Err(other),
            })
            .collect::<Result<Vec<_>, Value>>()
            .map(Array::$variant)
    };
}

impl Array {
    pub fn element_kind(&self) -> PrimitiveKind {
        match self {
            Self::Bool(_) => PrimitiveKind::Bool,
            Self::I8(_) => PrimitiveKind::I8,
            Self::U8(_) => PrimitiveKind::U8,
            Self::I16(_) => PrimitiveKind::I16,
            Self::U16(_) => PrimitiveKind::U16,
            Self::I32(_) => PrimitiveKind::I32,
            Self::U32(_) => PrimitiveKind::U32,
            Self::I64(_) => PrimitiveKind::I64,
            Self::U64(_) => PrimitiveKind::U64,
            Self::F32(_) => PrimitiveKind::F32,
            Self::F64(_) => PrimitiveKind::F64,
            Self::Decimal(_) => PrimitiveKind::Decimal,
            Self::Char(_) => PrimitiveKind::Char,
            Self::String(_) => PrimitiveKind::String,
        }
    }

    pub fn len(&self) -> usize {
        each_array!(self, items => items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` as a scalar value.
    pub fn get(&self, index: usize) -> Option<Value> {
        each_array!(self, items => items.get(index).cloned().map(Value::from))
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Builds an array of `kind` from scalar values.
    ///
    /// Returns the first value whose kind differs from `kind`.
    pub fn from_values(kind: PrimitiveKind, values: Vec<Value>) -> Result<Self, Value> {
        match kind {
            PrimitiveKind::Bool => collect_array!(values, Bool),
            PrimitiveKind::I8 => collect_array!(values, I8),
            PrimitiveKind::U8 => collect_array!(values, U8),
            PrimitiveKind::I16 => collect_array!(values, I16),
            PrimitiveKind::U16 => collect_array!(values, U16),
            PrimitiveKind::I32 => collect_array!(values, I32),
            PrimitiveKind::U32 => collect_array!(values, U32),
            PrimitiveKind::I64 => collect_array!(values, I64),
            PrimitiveKind::U64 => collect_array!(values, U64),
            PrimitiveKind::F32 => collect_array!(values, F32),
            PrimitiveKind::F64 => collect_array!(values, F64),
            PrimitiveKind::Decimal => collect_array!(values, Decimal),
            PrimitiveKind::Char => collect_array!(values, Char),
            PrimitiveKind::String => collect_array!(values, String),
        }
    }
}

/// A serialized value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Char(char),
    String(String),
    Enum(EnumValue),
    Array(Array),
    /// Heterogeneous sequence (objects, nulls, nested lists).
    List(Vec<Value>),
    /// Reference into the owning graph's arena.
    Object(ObjectId),
    /// Reflective handle to a registered type, by qualified name.
    Type(String),
    /// Reflective handle to a member of a registered type.
    Member(MemberRef),
}

impl Value {
    /// Scalar kind, if this is a primitive value.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        Some(match self {
            Self::Bool(_) => PrimitiveKind::Bool,
            Self::I8(_) => PrimitiveKind::I8,
            Self::U8(_) => PrimitiveKind::U8,
            Self::I16(_) => PrimitiveKind::I16,
            Self::U16(_) => PrimitiveKind::U16,
            Self::I32(_) => PrimitiveKind::I32,
            Self::U32(_) => PrimitiveKind::U32,
            Self::I64(_) => PrimitiveKind::I64,
            Self::U64(_) => PrimitiveKind::U64,
            Self::F32(_) => PrimitiveKind::F32,
            Self::F64(_) => PrimitiveKind::F64,
            Self::Decimal(_) => PrimitiveKind::Decimal,
            Self::Char(_) => PrimitiveKind::Char,
            Self::String(_) => PrimitiveKind::String,
            _ => return None,
        })
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        if let Some(kind) = self.primitive_kind() {
            return kind.name().to_string();
        }
        match self {
            Self::Null => "null".to_string(),
            Self::Enum(e) => format!("enum {}", e.type_name),
            Self::Array(a) => format!("array<{}>", a.element_kind()),
            Self::List(_) => "list".to_string(),
            Self::Object(_) => "object".to_string(),
            Self::Type(_) => "type handle".to_string(),
            Self::Member(_) => "member handle".to_string(),
            _ => "value".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Signed integer view of any integer value that fits in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I8(v) => Some(i64::from(*v)),
            Self::U8(v) => Some(i64::from(*v)),
            Self::I16(v) => Some(i64::from(*v)),
            Self::U16(v) => Some(i64::from(*v)),
            Self::I32(v) => Some(i64::from(*v)),
            Self::U32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            Self::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

value_from!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    char => Char,
    String => String,
    EnumValue => Enum,
    Array => Array,
    ObjectId => Object,
    MemberRef => Member,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

// ============================================================================
// Objects and graphs
// ============================================================================

/// One object record: type name plus ordered name -> value members.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub type_name: String,
    pub members: Vec<(String, Value)>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, value)| value)
    }

    /// Sets `name`, replacing an existing member of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.members.iter_mut().find(|(member, _)| *member == name) {
            Some(slot) => slot.1 = value,
            None => self.members.push((name, value)),
        }
    }
}

/// Arena-owned object graph with a root value.
///
/// Objects are registered with [`Graph::add_object`] before their members
/// are filled in, which lets a member point back at an ancestor that is
/// still being populated.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    root: Value,
    objects: Vec<Object>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph holding a single non-object value.
    pub fn from_value(root: impl Into<Value>) -> Self {
        Self {
            root: root.into(),
            objects: Vec::new(),
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn set_root(&mut self, root: impl Into<Value>) {
        self.root = root.into();
    }

    pub fn into_root(self) -> (Value, Vec<Object>) {
        (self.root, self.objects)
    }

    /// Registers an empty object and returns its id.
    pub fn add_object(&mut self, type_name: impl Into<String>) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(Object::new(type_name));
        id
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.index())
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.index())
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(index, object)| (ObjectId(index as u32), object))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Structural equality: two graphs are equal when an id bijection makes
/// every reachable object match. Floats compare bitwise so NaN survives a
/// round trip.
impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        Isomorphism::new(self, other).check()
    }
}

struct Isomorphism<'a> {
    left: &'a Graph,
    right: &'a Graph,
    forward: HashMap<ObjectId, ObjectId>,
    backward: HashMap<ObjectId, ObjectId>,
    pending: Vec<(ObjectId, ObjectId)>,
}

impl<'a> Isomorphism<'a> {
    fn new(left: &'a Graph, right: &'a Graph) -> Self {
        Self {
            left,
            right,
            forward: HashMap::new(),
            backward: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn check(mut self) -> bool {
        let (left_graph, right_graph) = (self.left, self.right);
        if !self.same_value(&left_graph.root, &right_graph.root) {
            return false;
        }
        while let Some((a, b)) = self.pending.pop() {
            let (Some(left), Some(right)) = (left_graph.object(a), right_graph.object(b)) else {
                return false;
            };
            if left.type_name != right.type_name || left.members.len() != right.members.len() {
                return false;
            }
            for (name, value) in &left.members {
                let Some(other) = right.member(name) else {
                    return false;
                };
                if !self.same_value(value, other) {
                    return false;
                }
            }
        }
        true
    }

    fn same_value(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) => self.pair(*x, *y),
            (Value::List(xs), Value::List(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.same_value(x, y))
            }
            (Value::F32(x), Value::F32(y)) => x.to_bits() == y.to_bits(),
            (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits(),
            (Value::Array(Array::F32(xs)), Value::Array(Array::F32(ys))) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Value::Array(Array::F64(xs)), Value::Array(Array::F64(ys))) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => a == b,
        }
    }

    fn pair(&mut self, a: ObjectId, b: ObjectId) -> bool {
        match (self.forward.get(&a), self.backward.get(&b)) {
            (Some(mapped), Some(back)) => *mapped == b && *back == a,
            (None, None) => {
                self.forward.insert(a, b);
                self.backward.insert(b, a);
                self.pending.push((a, b));
                true
            }
            _ => false,
        }
    }
}
