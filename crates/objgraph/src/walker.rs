// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Graph walker shared by the format drivers.
//!
//! Encoding: [`walk`] visits a [`Graph`] depth-first and reports every value
//! to an [`Emitter`]. The first encounter of an object emits its record (with
//! a stream identifier from the [`ReferenceTracker`]); later encounters emit a
//! back-reference. Type names are checked against the registry and written
//! in their current qualified form.
//!
//! Decoding: drivers parse their own syntax and feed a [`Rebuilder`], which
//! resolves names, binds stream identifiers and assembles the graph. A name
//! the registry no longer knows (or an enumeration variant it no longer
//! declares) does not stop the decode: the value keeps its stored form and
//! the failure is held in [`Decoded`]. Dynamic reads report it; typed reads
//! only fail if a declared member actually reaches the value.

use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};
use crate::registry::TypeRegistry;
use crate::tracker::ReferenceTracker;
use crate::value::{Array, EnumValue, Graph, MemberRef, ObjectId, Value};
use std::sync::Arc;

/// Sink for one walk. Calls arrive in document order.
pub(crate) trait Emitter {
    fn null(&mut self) -> Result<()>;

    /// Any scalar accepted by [`Value::primitive_kind`].
    fn primitive(&mut self, value: &Value) -> Result<()>;

    fn array(&mut self, array: &Array) -> Result<()>;

    fn enumeration(&mut self, value: &EnumValue) -> Result<()>;

    fn type_handle(&mut self, name: &str) -> Result<()>;

    fn member_handle(&mut self, member: &MemberRef) -> Result<()>;

    fn begin_list(&mut self, len: usize) -> Result<()>;

    fn end_list(&mut self) -> Result<()>;

    fn begin_object(&mut self, id: u32, type_name: &str, members: usize) -> Result<()>;

    fn begin_member(&mut self, name: &str) -> Result<()>;

    fn end_member(&mut self) -> Result<()>;

    fn end_object(&mut self) -> Result<()>;

    fn back_reference(&mut self, id: u32) -> Result<()>;
}

// ============================================================================
// Encoding
// ============================================================================

/// Walks `graph` from its root.
pub(crate) fn walk<E: Emitter>(
    graph: &Graph,
    registry: &TypeRegistry,
    tracker: &mut ReferenceTracker,
    max_depth: usize,
    emitter: &mut E,
) -> Result<()> {
    let mut walker = Walker {
        graph,
        registry,
        tracker,
        emitter,
        depth: 0,
        max_depth,
    };
    walker.value(graph.root())
}

struct Walker<'a, E> {
    graph: &'a Graph,
    registry: &'a TypeRegistry,
    tracker: &'a mut ReferenceTracker,
    emitter: &'a mut E,
    depth: usize,
    max_depth: usize,
}

impl<E: Emitter> Walker<'_, E> {
    fn value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.emitter.null(),
            Value::Enum(e) => {
                let descriptor = self.registry.resolve(&e.type_name)?;
                self.emitter.enumeration(&EnumValue {
                    type_name: descriptor.name().to_string(),
                    variant: e.variant.clone(),
                    discriminant: e.discriminant,
                })
            }
            Value::Array(array) => self.emitter.array(array),
            Value::List(items) => {
                self.enter()?;
                self.emitter.begin_list(items.len())?;
                for item in items {
                    self.value(item)?;
                }
                self.emitter.end_list()?;
                self.depth -= 1;
                Ok(())
            }
            Value::Object(id) => self.object(*id),
            Value::Type(name) => {
                let descriptor = self.registry.resolve(name)?;
                self.emitter.type_handle(descriptor.name())
            }
            Value::Member(member) => {
                let (owner, index) = resolve_member(self.registry, &member.owner, &member.member)?;
                self.emitter.member_handle(&MemberRef {
                    owner: owner.name().to_string(),
                    member: owner.members()[index].name.clone(),
                })
            }
            scalar => self.emitter.primitive(scalar),
        }
    }

    fn object(&mut self, id: ObjectId) -> Result<()> {
        if let Some(stream_id) = self.tracker.lookup(id) {
            return self.emitter.back_reference(stream_id);
        }
        let graph = self.graph;
        let object = graph
            .object(id)
            .ok_or_else(|| Error::malformed(format!("dangling object reference {id}")))?;
        let descriptor = self.registry.resolve(&object.type_name)?;

        self.enter()?;
        let stream_id = self.tracker.assign(id);
        self.emitter
            .begin_object(stream_id, descriptor.name(), object.members.len())?;
        for (name, value) in &object.members {
            self.emitter.begin_member(name)?;
            self.value(value)?;
            self.emitter.end_member()?;
        }
        self.emitter.end_object()?;
        self.depth -= 1;
        Ok(())
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::malformed(format!(
                "graph nesting exceeds {} levels",
                self.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }
}

fn resolve_member(
    registry: &TypeRegistry,
    owner: &str,
    member: &str,
) -> Result<(Arc<TypeDescriptor>, usize)> {
    let descriptor = registry.resolve(owner)?;
    match descriptor.resolve_member(member) {
        Some(hit) => Ok((descriptor, hit.index)),
        None => Err(Error::UnresolvableType(format!("{}.{member}", descriptor.name()))),
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Assembles a graph from decoded records.
pub(crate) struct Rebuilder<'a> {
    graph: Graph,
    registry: &'a TypeRegistry,
    tracker: &'a mut ReferenceTracker,
    depth: usize,
    max_depth: usize,
    /// First name resolution failure, in document order.
    deferred: Option<Error>,
}

/// Result of decoding one frame.
#[derive(Debug)]
pub(crate) struct Decoded {
    pub(crate) graph: Graph,
    deferred: Option<Error>,
}

impl Decoded {
    /// The graph, provided every stored name resolved.
    pub(crate) fn into_graph(self) -> Result<Graph> {
        match self.deferred {
            Some(err) => Err(err),
            None => Ok(self.graph),
        }
    }
}

impl<'a> Rebuilder<'a> {
    pub(crate) fn new(
        registry: &'a TypeRegistry,
        tracker: &'a mut ReferenceTracker,
        max_depth: usize,
    ) -> Self {
        Self {
            graph: Graph::new(),
            registry,
            tracker,
            depth: 0,
            max_depth,
            deferred: None,
        }
    }

    /// Enters a list or object.
    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::malformed(format!(
                "frame nesting exceeds {} levels",
                self.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn defer(&mut self, err: Error) {
        log::trace!("[objgraph] deferring decode failure: {err}");
        self.deferred.get_or_insert(err);
    }

    /// Current descriptor for a stored name, or `None` (deferred) if the
    /// name is unknown.
    fn lookup(&mut self, type_name: &str) -> Option<Arc<TypeDescriptor>> {
        let found = self.registry.get(type_name);
        if found.is_none() {
            self.defer(Error::UnresolvableType(type_name.to_string()));
        }
        found
    }

    /// Registers a record before its members are decoded, so members can
    /// refer back to it.
    pub(crate) fn open_object(&mut self, stream_id: u32, type_name: &str) -> Result<ObjectId> {
        let current = match self.lookup(type_name) {
            Some(descriptor) if !descriptor.is_record() => {
                return Err(Error::mismatch("record type", format!("enumeration {type_name}")));
            }
            Some(descriptor) => descriptor.name().to_string(),
            None => type_name.to_string(),
        };
        let object = self.graph.add_object(current);
        self.tracker.bind(stream_id, object)?;
        Ok(object)
    }

    pub(crate) fn set_member(&mut self, object: ObjectId, name: String, value: Value) {
        if let Some(target) = self.graph.object_mut(object) {
            target.members.push((name, value));
        }
    }

    pub(crate) fn back_reference(&self, stream_id: u32) -> Result<Value> {
        self.tracker.resolve(stream_id).map(Value::Object)
    }

    /// Resolves a stored enumeration value to the current variant.
    pub(crate) fn enumeration(
        &mut self,
        type_name: &str,
        variant: &str,
        discriminant: i64,
    ) -> Result<Value> {
        let stored = EnumValue {
            type_name: type_name.to_string(),
            variant: variant.to_string(),
            discriminant,
        };
        let Some(descriptor) = self.lookup(type_name) else {
            return Ok(Value::Enum(stored));
        };
        if !descriptor.is_enum() {
            return Err(Error::mismatch("enumeration type", format!("record {type_name}")));
        }
        let Some(current) = descriptor.resolve_variant(variant, discriminant) else {
            self.defer(Error::mismatch(
                descriptor.name(),
                format!("unknown variant {variant} ({discriminant})"),
            ));
            return Ok(Value::Enum(stored));
        };
        Ok(Value::Enum(EnumValue {
            type_name: descriptor.name().to_string(),
            variant: current.name.clone(),
            discriminant: current.discriminant,
        }))
    }

    pub(crate) fn type_handle(&mut self, name: &str) -> Value {
        let current = self
            .lookup(name)
            .map_or_else(|| name.to_string(), |descriptor| descriptor.name().to_string());
        Value::Type(current)
    }

    pub(crate) fn member_handle(&mut self, owner: &str, member: &str) -> Value {
        match resolve_member(self.registry, owner, member) {
            Ok((owner, index)) => Value::Member(MemberRef {
                owner: owner.name().to_string(),
                member: owner.members()[index].name.clone(),
            }),
            Err(err) => {
                self.defer(err);
                Value::Member(MemberRef {
                    owner: owner.to_string(),
                    member: member.to_string(),
                })
            }
        }
    }

    pub(crate) fn finish(mut self, root: Value) -> Decoded {
        self.graph.set_root(root);
        Decoded {
            graph: self.graph,
            deferred: self.deferred,
        }
    }
}
