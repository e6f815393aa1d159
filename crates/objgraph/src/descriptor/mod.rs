// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptors for registered record and enumeration types.
//!
//! A descriptor names a type, lists the names it answered to in earlier
//! schema versions, and describes its members (records) or variants
//! (enumerations). Member types are [`Shape`]s that refer to other named
//! types by qualified name only, so recursive types describe without
//! recursion.

mod builder;

pub use builder::TypeDescriptorBuilder;

use crate::value::PrimitiveKind;
use std::fmt;

/// Declared semantic type of a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Scalar primitive.
    Primitive(PrimitiveKind),
    /// Homogeneous primitive array.
    Array(PrimitiveKind),
    /// Sequence of arbitrary values.
    List(Box<Shape>),
    /// Nullable value.
    Optional(Box<Shape>),
    /// Owned nested record, by qualified name.
    Record(String),
    /// Shared (identity-tracked) record, by qualified name.
    Shared(String),
    /// Enumeration, by qualified name.
    Enum(String),
    /// Reflective type handle.
    TypeInfo,
    /// Reflective member handle.
    MemberInfo,
    /// Any value; no declared structure.
    Dynamic,
}

impl Shape {
    /// Qualified name of the record or enumeration this shape refers to.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Record(name) | Self::Shared(name) | Self::Enum(name) => Some(name),
            Self::List(inner) | Self::Optional(inner) => inner.type_name(),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{kind}"),
            Self::Array(kind) => write!(f, "array<{kind}>"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Optional(inner) => write!(f, "option<{inner}>"),
            Self::Record(name) => write!(f, "{name}"),
            Self::Shared(name) => write!(f, "shared<{name}>"),
            Self::Enum(name) => write!(f, "enum {name}"),
            Self::TypeInfo => f.write_str("type"),
            Self::MemberInfo => f.write_str("member"),
            Self::Dynamic => f.write_str("any"),
        }
    }
}

/// One declared member of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    pub shape: Shape,
    /// Earlier names of this member still accepted on read.
    pub aliases: Vec<String>,
    /// Transient members are never written and never read.
    pub transient: bool,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            aliases: Vec::new(),
            transient: false,
        }
    }

    /// Member excluded from serialization.
    pub fn transient(name: impl Into<String>) -> Self {
        Self {
            transient: true,
            ..Self::new(name, Shape::Dynamic)
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// One variant of an enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: String,
    pub discriminant: i64,
}

impl EnumVariant {
    pub fn new(name: impl Into<String>, discriminant: i64) -> Self {
        Self {
            name: name.into(),
            discriminant,
        }
    }
}

/// Record members or enumeration variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorKind {
    Record(Vec<MemberDescriptor>),
    Enum(Vec<EnumVariant>),
}

/// Result of resolving a stored member name against a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberMatch {
    /// Index into [`TypeDescriptor::members`].
    pub index: usize,
    /// True when the stored name is the member's current name.
    pub exact: bool,
}

/// Structural summary of a registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    aliases: Vec<String>,
    kind: DescriptorKind,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: DescriptorKind) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            kind,
        }
    }

    pub fn record(name: impl Into<String>, members: Vec<MemberDescriptor>) -> Self {
        Self::new(name, DescriptorKind::Record(members))
    }

    pub fn enumeration(name: impl Into<String>, variants: Vec<EnumVariant>) -> Self {
        Self::new(name, DescriptorKind::Enum(variants))
    }

    /// Adds a former qualified name that still resolves to this type.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn kind(&self) -> &DescriptorKind {
        &self.kind
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, DescriptorKind::Record(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, DescriptorKind::Enum(_))
    }

    /// True if `name` is this type's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|alias| alias == name)
    }

    /// Declared members, transient ones included (empty for enums).
    pub fn members(&self) -> &[MemberDescriptor] {
        match &self.kind {
            DescriptorKind::Record(members) => members,
            DescriptorKind::Enum(_) => &[],
        }
    }

    /// Members that take part in serialization, in declaration order.
    pub fn serializable_members(&self) -> impl Iterator<Item = (usize, &MemberDescriptor)> {
        self.members()
            .iter()
            .enumerate()
            .filter(|(_, member)| !member.transient)
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members().iter().find(|m| m.name == name)
    }

    /// Resolves a stored member name to a current, non-transient member.
    ///
    /// The member with that exact name wins; otherwise the first declared
    /// member listing it as an alias.
    pub fn resolve_member(&self, stored: &str) -> Option<MemberMatch> {
        let members = self.members();
        if let Some(index) = members
            .iter()
            .position(|m| !m.transient && m.name == stored)
        {
            return Some(MemberMatch { index, exact: true });
        }
        members
            .iter()
            .position(|m| !m.transient && m.aliases.iter().any(|a| a == stored))
            .map(|index| MemberMatch {
                index,
                exact: false,
            })
    }

    /// Variants (empty for records).
    pub fn variants(&self) -> &[EnumVariant] {
        match &self.kind {
            DescriptorKind::Enum(variants) => variants,
            DescriptorKind::Record(_) => &[],
        }
    }

    /// Variant by name, falling back to discriminant.
    pub fn resolve_variant(&self, name: &str, discriminant: i64) -> Option<&EnumVariant> {
        let variants = self.variants();
        variants
            .iter()
            .find(|v| v.name == name)
            .or_else(|| variants.iter().find(|v| v.discriminant == discriminant))
    }
}
