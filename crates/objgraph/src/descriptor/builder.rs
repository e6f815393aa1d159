// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for TypeDescriptor.

use super::{DescriptorKind, EnumVariant, MemberDescriptor, Shape, TypeDescriptor};
use crate::value::PrimitiveKind;

/// Builder for record and enumeration descriptors registered at runtime.
///
/// ```rust
/// use objgraph::{PrimitiveKind, TypeDescriptorBuilder};
///
/// let desc = TypeDescriptorBuilder::record("sensors.Reading")
///     .alias("legacy.Reading")
///     .primitive("sensor_id", PrimitiveKind::U32)
///     .primitive("celsius", PrimitiveKind::F64)
///     .member_alias("temperature")
///     .array("samples", PrimitiveKind::F32)
///     .transient("cached_mean")
///     .build();
///
/// assert_eq!(desc.serializable_members().count(), 3);
/// assert!(desc.resolve_member("temperature").is_some());
/// ```
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    name: String,
    aliases: Vec<String>,
    members: Vec<MemberDescriptor>,
    variants: Option<Vec<EnumVariant>>,
}

impl TypeDescriptorBuilder {
    /// Start a record type.
    pub fn record(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            members: Vec::new(),
            variants: None,
        }
    }

    /// Start an enumeration type.
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self {
            variants: Some(Vec::new()),
            ..Self::record(name)
        }
    }

    /// Former qualified name of the type.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a member with an explicit shape.
    pub fn member(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.members.push(MemberDescriptor::new(name, shape));
        self
    }

    /// Add a primitive member.
    pub fn primitive(self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        self.member(name, Shape::Primitive(kind))
    }

    /// Add a string member.
    pub fn string(self, name: impl Into<String>) -> Self {
        self.primitive(name, PrimitiveKind::String)
    }

    /// Add a primitive array member.
    pub fn array(self, name: impl Into<String>, element: PrimitiveKind) -> Self {
        self.member(name, Shape::Array(element))
    }

    /// Add an owned nested record member.
    pub fn nested(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.member(name, Shape::Record(type_name.into()))
    }

    /// Add a shared record reference member.
    pub fn shared(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.member(name, Shape::Shared(type_name.into()))
    }

    /// Add a transient member.
    pub fn transient(mut self, name: impl Into<String>) -> Self {
        self.members.push(MemberDescriptor::transient(name));
        self
    }

    /// Former name of the most recently added member.
    pub fn member_alias(mut self, alias: impl Into<String>) -> Self {
        if let Some(last) = self.members.last_mut() {
            last.aliases.push(alias.into());
        }
        self
    }

    /// Add an enumeration variant (ignored for records).
    pub fn variant(mut self, name: impl Into<String>, discriminant: i64) -> Self {
        if let Some(variants) = self.variants.as_mut() {
            variants.push(EnumVariant::new(name, discriminant));
        }
        self
    }

    pub fn build(self) -> TypeDescriptor {
        let kind = match self.variants {
            Some(variants) => DescriptorKind::Enum(variants),
            None => DescriptorKind::Record(self.members),
        };
        self.aliases
            .into_iter()
            .fold(TypeDescriptor::new(self.name, kind), |desc, alias| {
                desc.with_alias(alias)
            })
    }
}
