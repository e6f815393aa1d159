// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed layer: converts Rust values to and from a [`Graph`].
//!
//! [`Persist`] is implemented for primitives, strings, [`Decimal`], `Vec`,
//! `Option`, `Box`, shared `Rc<RefCell<T>>` / `Weak<RefCell<T>>` references and
//! the reflective handles [`TypeInfo`] and [`MemberInfo`]. Structs and
//! fieldless enums get it from `#[derive(Persist)]`.
//!
//! Shared references keep their identity: two `Rc`s pointing at one
//! allocation become one object record, and read back as two `Rc`s pointing
//! at one new allocation. A shared instance is registered before its members
//! are read, so a member referring back to it (a cycle) gets the same `Rc`.

use crate::config::DEFAULT_MAX_DEPTH;
use crate::descriptor::{MemberDescriptor, Shape, TypeDescriptor};
use crate::error::{Error, Result};
use crate::registry::TypeRegistry;
use crate::value::{Array, Decimal, Graph, MemberRef, ObjectId, PrimitiveKind, Value};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::sync::Arc;

// ============================================================================
// Traits
// ============================================================================

/// A type that can be written to and read from an object graph.
pub trait Persist: Sized + 'static {
    /// Declared semantic type, as recorded in member descriptors.
    fn shape() -> Shape;

    /// Descriptor of named types (records and enumerations).
    fn descriptor() -> Option<TypeDescriptor> {
        None
    }

    /// Registers the types referenced by this type's members.
    fn register_dependencies(_registry: &TypeRegistry) {}

    fn to_value(&self, writer: &mut GraphWriter<'_>) -> Result<Value>;

    fn from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Self>;

    // Sequence hooks: primitives override these to use dense arrays.

    #[doc(hidden)]
    fn slice_shape() -> Shape {
        Shape::List(Box::new(Self::shape()))
    }

    #[doc(hidden)]
    fn slice_to_value(items: &[Self], writer: &mut GraphWriter<'_>) -> Result<Value> {
        items
            .iter()
            .map(|item| writer.write(item))
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }

    #[doc(hidden)]
    fn vec_from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Vec<Self>> {
        match value {
            Value::List(items) => items.iter().map(|item| reader.read(item)).collect(),
            other => Err(Error::mismatch(
                Self::slice_shape().to_string(),
                other.describe(),
            )),
        }
    }
}

/// A struct-like type serialized as an object record.
///
/// `read_member` receives the index of the member in the type's descriptor
/// (see [`TypeDescriptor::members`]); stored members are matched by name
/// before it is called.
pub trait Record: Persist + Default {
    /// Qualified type name.
    const TYPE_NAME: &'static str;

    fn write_members(&self, object: ObjectId, writer: &mut GraphWriter<'_>) -> Result<()>;

    fn read_member(
        &mut self,
        index: usize,
        value: &Value,
        reader: &mut GraphReader<'_>,
    ) -> Result<()>;
}

// ============================================================================
// Writer
// ============================================================================

/// Builds a [`Graph`] from typed values.
pub struct GraphWriter<'r> {
    graph: Graph,
    registry: &'r TypeRegistry,
    /// `Rc` allocation address -> record.
    identities: HashMap<usize, ObjectId>,
    depth: usize,
    max_depth: usize,
}

impl<'r> GraphWriter<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            graph: Graph::new(),
            registry,
            identities: HashMap::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Converts `root` and returns the finished graph.
    pub fn build<T: Persist>(mut self, root: &T) -> Result<Graph> {
        let root = self.write(root)?;
        self.graph.set_root(root);
        Ok(self.graph)
    }

    /// Converts one nested value.
    pub fn write<T: Persist>(&mut self, value: &T) -> Result<Value> {
        if self.depth >= self.max_depth {
            return Err(Error::malformed(format!(
                "value nesting exceeds {} levels",
                self.max_depth
            )));
        }
        self.depth += 1;
        let result = value.to_value(self);
        self.depth -= 1;
        result
    }

    /// Writes an owned record; every call creates a new object.
    pub fn record<T: Record>(&mut self, value: &T) -> Result<Value> {
        let object = self.begin::<T>();
        value.write_members(object, self)?;
        Ok(Value::Object(object))
    }

    /// Writes a shared record once; later encounters reuse its object.
    pub fn shared<T: Record>(&mut self, shared: &Rc<RefCell<T>>) -> Result<Value> {
        let key = Rc::as_ptr(shared) as *const () as usize;
        if let Some(object) = self.identities.get(&key) {
            return Ok(Value::Object(*object));
        }
        let object = self.begin::<T>();
        self.identities.insert(key, object);
        let inner = shared
            .try_borrow()
            .map_err(|_| Error::Borrowed(T::TYPE_NAME.to_string()))?;
        inner.write_members(object, self)?;
        Ok(Value::Object(object))
    }

    /// Appends one member to a record started by [`record`](Self::record).
    pub fn member<T: Persist>(&mut self, object: ObjectId, name: &str, value: &T) -> Result<()> {
        let value = self.write(value)?;
        if let Some(target) = self.graph.object_mut(object) {
            target.members.push((name.to_string(), value));
        }
        Ok(())
    }

    fn begin<T: Record>(&mut self) -> ObjectId {
        self.registry.ensure::<T>();
        self.graph.add_object(T::TYPE_NAME)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Rebuilds typed values from a [`Graph`].
pub struct GraphReader<'g> {
    graph: &'g Graph,
    registry: &'g TypeRegistry,
    /// Shared instances created so far, by record.
    instances: HashMap<ObjectId, Rc<dyn Any>>,
    /// Owned records currently being populated.
    active: HashSet<ObjectId>,
    depth: usize,
    max_depth: usize,
}

impl<'g> GraphReader<'g> {
    pub fn new(graph: &'g Graph, registry: &'g TypeRegistry) -> Self {
        Self {
            graph,
            registry,
            instances: HashMap::new(),
            active: HashSet::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &'g TypeRegistry {
        self.registry
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Reads the graph's root value as `T`.
    pub fn read_root<T: Persist>(&mut self) -> Result<T> {
        let root = self.graph.root();
        self.read(root)
    }

    /// Reads one nested value.
    pub fn read<T: Persist>(&mut self, value: &Value) -> Result<T> {
        if self.depth >= self.max_depth {
            return Err(Error::malformed(format!(
                "value nesting exceeds {} levels",
                self.max_depth
            )));
        }
        self.depth += 1;
        let result = T::from_value(value, self);
        self.depth -= 1;
        result
    }

    /// Reads an owned record.
    pub fn record<T: Record>(&mut self, value: &Value) -> Result<T> {
        let (object, descriptor) = self.expect_record::<T>(value)?;
        if !self.active.insert(object) {
            return Err(Error::mismatch(
                format!("owned {}", descriptor.name()),
                "cyclic reference",
            ));
        }
        let mut target = T::default();
        let result = self.populate(object, &descriptor, &mut target);
        self.active.remove(&object);
        result.map(|()| target)
    }

    /// Reads a shared record, reusing the instance built for the same
    /// record earlier in this graph.
    pub fn shared<T: Record>(&mut self, value: &Value) -> Result<Rc<RefCell<T>>> {
        let (object, descriptor) = self.expect_record::<T>(value)?;
        if let Some(existing) = self.instances.get(&object) {
            return Rc::clone(existing)
                .downcast::<RefCell<T>>()
                .map_err(|_| Error::mismatch(descriptor.name(), "record already read as another type"));
        }

        let instance = Rc::new(RefCell::new(T::default()));
        let erased: Rc<dyn Any> = instance.clone();
        self.instances.insert(object, erased);

        let mut target = instance
            .try_borrow_mut()
            .map_err(|_| Error::Borrowed(T::TYPE_NAME.to_string()))?;
        self.populate(object, &descriptor, &mut *target)?;
        drop(target);
        Ok(instance)
    }

    fn expect_record<T: Record>(&self, value: &Value) -> Result<(ObjectId, Arc<TypeDescriptor>)> {
        let descriptor = self
            .registry
            .descriptor_of::<T>()
            .ok_or_else(|| Error::UnresolvableType(T::TYPE_NAME.to_string()))?;
        let Value::Object(object) = value else {
            return Err(Error::mismatch(descriptor.name(), value.describe()));
        };
        let stored = self
            .graph
            .object(*object)
            .ok_or_else(|| Error::malformed(format!("dangling object reference {object}")))?;
        if !descriptor.answers_to(&stored.type_name) {
            if !self.registry.contains(&stored.type_name) {
                return Err(Error::UnresolvableType(stored.type_name.clone()));
            }
            return Err(Error::mismatch(descriptor.name(), stored.type_name.clone()));
        }
        Ok((*object, descriptor))
    }

    /// Assigns stored members by name: exact names first, then aliases.
    fn populate<T: Record>(
        &mut self,
        object: ObjectId,
        descriptor: &TypeDescriptor,
        target: &mut T,
    ) -> Result<()> {
        let graph = self.graph;
        let Some(stored) = graph.object(object) else {
            return Err(Error::malformed(format!("dangling object reference {object}")));
        };

        let mut filled = vec![false; descriptor.members().len()];
        let mut aliased = Vec::new();
        for (name, value) in &stored.members {
            match descriptor.resolve_member(name) {
                Some(hit) if hit.exact => {
                    self.assign(descriptor, target, &mut filled, hit.index, value)?;
                }
                Some(hit) => aliased.push((hit.index, value)),
                None => log::trace!(
                    "[objgraph] {}: ignoring stored member '{}'",
                    descriptor.name(),
                    name
                ),
            }
        }
        for (index, value) in aliased {
            self.assign(descriptor, target, &mut filled, index, value)?;
        }
        Ok(())
    }

    fn assign<T: Record>(
        &mut self,
        descriptor: &TypeDescriptor,
        target: &mut T,
        filled: &mut [bool],
        index: usize,
        value: &Value,
    ) -> Result<()> {
        if filled[index] {
            return Ok(());
        }
        filled[index] = true;
        target
            .read_member(index, value, self)
            .map_err(|err| err.in_member(descriptor.name(), &descriptor.members()[index].name))
    }
}

/// Converts a value with the process-wide registry.
pub fn to_graph<T: Persist>(value: &T) -> Result<Graph> {
    GraphWriter::new(TypeRegistry::global()).build(value)
}

/// Reads a graph's root with the process-wide registry.
pub fn from_graph<T: Persist>(graph: &Graph) -> Result<T> {
    let registry = TypeRegistry::global();
    registry.ensure::<T>();
    GraphReader::new(graph, registry).read_root()
}

// ============================================================================
// Primitives
// ============================================================================

macro_rules! persist_primitive {
    ($ty:ty, $kind:ident $(; $($from:ident),*)?) => {
        impl Persist for $ty {
            fn shape() -> Shape {
                Shape::Primitive(PrimitiveKind::$kind)
            }

            fn to_value(&self, _writer: &mut GraphWriter<'_>) -> Result<Value> {
                Ok(Value::$kind(*self))
            }

            fn from_value(value: &Value, _reader: &mut GraphReader<'_>) -> Result<Self> {
                match value {
                    Value::$kind(v) => Ok(*v),
                    $($(Value::$from(v) => Ok(<$ty>::from(*v)),)*)?
                    other => Err(Error::mismatch(PrimitiveKind::$kind.name(), other.describe())),
                }
            }

            fn slice_shape() -> Shape {
                Shape::Array(PrimitiveKind::$kind)
            }

            fn slice_to_value(items: &[Self], _writer: &mut GraphWriter<'_>) -> Result<Value> {
                Ok(Value::Array(Array::$kind(items.to_vec())))
            }

            fn vec_from_value(value: &Value, _reader: &mut GraphReader<'_>) -> Result<Vec<Self>> {
                match value {
                    Value::Array(Array::$kind(items)) => Ok(items.clone()),
                    $($(Value::Array(Array::$from(items)) => {
                        Ok(items.iter().map(|v| <$ty>::from(*v)).collect())
                    })*)?
                    other => Err(Error::mismatch(
                        format!("array<{}>", PrimitiveKind::$kind),
                        other.describe(),
                    )),
                }
            }
        }
    };
}

// Accepted source kinds follow `compat::widens`.
persist_primitive!(bool, Bool);
persist_primitive!(i8, I8);
persist_primitive!(u8, U8);
persist_primitive!(i16, I16; I8, U8);
persist_primitive!(u16, U16; U8);
persist_primitive!(i32, I32; I8, U8, I16, U16);
persist_primitive!(u32, U32; U8, U16);
persist_primitive!(i64, I64; I8, U8, I16, U16, I32, U32);
persist_primitive!(u64, U64; U8, U16, U32);
persist_primitive!(f32, F32; I8, U8, I16, U16);
persist_primitive!(f64, F64; F32, I8, U8, I16, U16, I32, U32);
persist_primitive!(Decimal, Decimal);
persist_primitive!(char, Char);

impl Persist for String {
    fn shape() -> Shape {
        Shape::Primitive(PrimitiveKind::String)
    }

    fn to_value(&self, _writer: &mut GraphWriter<'_>) -> Result<Value> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value, _reader: &mut GraphReader<'_>) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(Error::mismatch("string", other.describe())),
        }
    }

    fn slice_shape() -> Shape {
        Shape::Array(PrimitiveKind::String)
    }

    fn slice_to_value(items: &[Self], _writer: &mut GraphWriter<'_>) -> Result<Value> {
        Ok(Value::Array(Array::String(items.to_vec())))
    }

    fn vec_from_value(value: &Value, _reader: &mut GraphReader<'_>) -> Result<Vec<Self>> {
        match value {
            Value::Array(Array::String(items)) => Ok(items.clone()),
            other => Err(Error::mismatch("array<string>", other.describe())),
        }
    }
}

// ============================================================================
// Containers
// ============================================================================

impl<T: Persist> Persist for Vec<T> {
    fn shape() -> Shape {
        T::slice_shape()
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.ensure::<T>();
    }

    fn to_value(&self, writer: &mut GraphWriter<'_>) -> Result<Value> {
        T::slice_to_value(self, writer)
    }

    fn from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Self> {
        T::vec_from_value(value, reader)
    }
}

impl<T: Persist> Persist for Option<T> {
    fn shape() -> Shape {
        Shape::Optional(Box::new(T::shape()))
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.ensure::<T>();
    }

    fn to_value(&self, writer: &mut GraphWriter<'_>) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(writer),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, reader).map(Some),
        }
    }
}

impl<T: Persist> Persist for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.ensure::<T>();
    }

    fn to_value(&self, writer: &mut GraphWriter<'_>) -> Result<Value> {
        (**self).to_value(writer)
    }

    fn from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Self> {
        T::from_value(value, reader).map(Box::new)
    }
}

impl<T: Record> Persist for Rc<RefCell<T>> {
    fn shape() -> Shape {
        Shape::Shared(T::TYPE_NAME.to_string())
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.ensure::<T>();
    }

    fn to_value(&self, writer: &mut GraphWriter<'_>) -> Result<Value> {
        writer.shared(self)
    }

    fn from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Self> {
        reader.shared(value)
    }
}

/// A dangling weak reference is written as null.
impl<T: Record> Persist for Weak<RefCell<T>> {
    fn shape() -> Shape {
        Shape::Optional(Box::new(Shape::Shared(T::TYPE_NAME.to_string())))
    }

    fn register_dependencies(registry: &TypeRegistry) {
        registry.ensure::<T>();
    }

    fn to_value(&self, writer: &mut GraphWriter<'_>) -> Result<Value> {
        match self.upgrade() {
            Some(shared) => writer.shared(&shared),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Self> {
        match value {
            Value::Null => Ok(Weak::new()),
            other => reader.shared::<T>(other).map(|shared| Rc::downgrade(&shared)),
        }
    }
}

// ============================================================================
// Reflective handles
// ============================================================================

/// Handle to a registered type.
#[derive(Debug, Clone)]
pub struct TypeInfo(Arc<TypeDescriptor>);

impl TypeInfo {
    /// Handle for a Rust type, registering it if needed.
    pub fn of<T: Persist>(registry: &TypeRegistry) -> Option<Self> {
        registry.descriptor_of::<T>().map(Self)
    }

    pub fn named(registry: &TypeRegistry, name: &str) -> Result<Self> {
        registry.resolve(name).map(Self)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.0
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Persist for TypeInfo {
    fn shape() -> Shape {
        Shape::TypeInfo
    }

    fn to_value(&self, _writer: &mut GraphWriter<'_>) -> Result<Value> {
        Ok(Value::Type(self.name().to_string()))
    }

    fn from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Self> {
        match value {
            Value::Type(name) => Self::named(reader.registry(), name),
            other => Err(Error::mismatch("type handle", other.describe())),
        }
    }
}

/// Handle to one member of a registered record type.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    owner: Arc<TypeDescriptor>,
    index: usize,
}

impl MemberInfo {
    /// Handle for `member` of a Rust type (name or alias).
    pub fn of<T: Persist>(registry: &TypeRegistry, member: &str) -> Option<Self> {
        let owner = registry.descriptor_of::<T>()?;
        let hit = owner.resolve_member(member)?;
        Some(Self {
            owner,
            index: hit.index,
        })
    }

    pub fn named(registry: &TypeRegistry, owner: &str, member: &str) -> Result<Self> {
        let owner = registry.resolve(owner)?;
        let Some(hit) = owner.resolve_member(member) else {
            return Err(Error::UnresolvableType(format!("{}.{member}", owner.name())));
        };
        Ok(Self {
            owner,
            index: hit.index,
        })
    }

    pub fn owner(&self) -> &TypeDescriptor {
        &self.owner
    }

    pub fn descriptor(&self) -> &MemberDescriptor {
        &self.owner.members()[self.index]
    }

    pub fn name(&self) -> &str {
        &self.descriptor().name
    }
}

impl PartialEq for MemberInfo {
    fn eq(&self, other: &Self) -> bool {
        self.owner.name() == other.owner.name() && self.index == other.index
    }
}

impl Persist for MemberInfo {
    fn shape() -> Shape {
        Shape::MemberInfo
    }

    fn to_value(&self, _writer: &mut GraphWriter<'_>) -> Result<Value> {
        Ok(Value::Member(MemberRef {
            owner: self.owner.name().to_string(),
            member: self.name().to_string(),
        }))
    }

    fn from_value(value: &Value, reader: &mut GraphReader<'_>) -> Result<Self> {
        match value {
            Value::Member(member) => Self::named(reader.registry(), &member.owner, &member.member),
            other => Err(Error::mismatch("member handle", other.describe())),
        }
    }
}
