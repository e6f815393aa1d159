// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema evolution rules.
//!
//! Reads match members by name, so added and removed members never break a
//! payload. What can break is a member whose semantic type changed: a stored
//! primitive is accepted only when the declared primitive holds every value
//! of the stored one (see [`widens`]).

use crate::descriptor::{DescriptorKind, Shape, TypeDescriptor};
use crate::value::PrimitiveKind;

// ---------------------------------------------------------------------------
// Primitive widening
// ---------------------------------------------------------------------------

/// True if every `from` value converts losslessly to `to`.
pub fn widens(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    use PrimitiveKind::*;

    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (I8, I16 | I32 | I64 | F32 | F64)
            | (U8, U16 | U32 | U64 | I16 | I32 | I64 | F32 | F64)
            | (I16, I32 | I64 | F32 | F64)
            | (U16, U32 | U64 | I32 | I64 | F32 | F64)
            | (I32, I64 | F64)
            | (U32, U64 | I64 | F64)
            | (F32, F64)
    )
}

/// True if data stored with shape `stored` reads into a member declared as
/// `declared`.
pub fn accepts(declared: &Shape, stored: &Shape) -> bool {
    match (declared, stored) {
        (Shape::Dynamic, _) | (_, Shape::Dynamic) => true,
        (Shape::Primitive(to), Shape::Primitive(from)) | (Shape::Array(to), Shape::Array(from)) => {
            widens(*from, *to)
        }
        (Shape::List(to), Shape::List(from)) => accepts(to, from),
        (Shape::Optional(to), Shape::Optional(from)) => accepts(to, from),
        (Shape::Optional(to), from) => accepts(to, from),
        (
            Shape::Record(to) | Shape::Shared(to),
            Shape::Record(from) | Shape::Shared(from),
        ) => to == from,
        (Shape::Enum(to), Shape::Enum(from)) => to == from,
        (Shape::TypeInfo, Shape::TypeInfo) | (Shape::MemberInfo, Shape::MemberInfo) => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Compatibility level
// ---------------------------------------------------------------------------

/// Describes how two versions of a type relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Each version reads the other's data.
    Full,
    /// New version reads data written by the old one.
    Backward,
    /// Old version reads data written by the new one.
    Forward,
    /// Neither direction is safe.
    Breaking,
}

/// Detailed result of comparing two descriptors.
#[derive(Debug, Clone)]
pub struct CompatibilityResult {
    pub compatibility: Compatibility,
    /// Human-readable list of what changed.
    pub details: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compare an old and a new version of a type.
pub fn compare(old: &TypeDescriptor, new: &TypeDescriptor) -> CompatibilityResult {
    let mut details = Vec::new();
    let mut backward = new.answers_to(old.name());
    let mut forward = old.answers_to(new.name());

    if old.name() != new.name() {
        details.push(format!("renamed type: {} -> {}", old.name(), new.name()));
    }

    match (old.kind(), new.kind()) {
        (DescriptorKind::Record(_), DescriptorKind::Record(_)) => {
            compare_records(old, new, &mut details, &mut backward, &mut forward);
        }
        (DescriptorKind::Enum(_), DescriptorKind::Enum(_)) => {
            compare_enums(old, new, &mut details, &mut backward, &mut forward);
        }
        _ => {
            details.push("changed kind between record and enumeration".to_string());
            backward = false;
            forward = false;
        }
    }

    let compatibility = match (backward, forward) {
        (true, true) => Compatibility::Full,
        (true, false) => Compatibility::Backward,
        (false, true) => Compatibility::Forward,
        (false, false) => Compatibility::Breaking,
    };

    CompatibilityResult {
        compatibility,
        details,
    }
}

fn compare_records(
    old: &TypeDescriptor,
    new: &TypeDescriptor,
    details: &mut Vec<String>,
    backward: &mut bool,
    forward: &mut bool,
) {
    let mut matched = vec![false; new.members().len()];

    for (_, member) in old.serializable_members() {
        let Some(hit) = new.resolve_member(&member.name) else {
            details.push(format!("removed member: {} {}", member.shape, member.name));
            continue;
        };
        matched[hit.index] = true;
        let current = &new.members()[hit.index];
        if !hit.exact {
            details.push(format!("renamed member: {} -> {}", member.name, current.name));
            // Old readers look for the old name and fall back to defaults.
            *forward &= old.resolve_member(&current.name).is_some();
        }
        if current.shape == member.shape {
            continue;
        }
        details.push(format!(
            "changed type of {}: {} -> {}",
            current.name, member.shape, current.shape
        ));
        *backward &= accepts(&current.shape, &member.shape);
        *forward &= accepts(&member.shape, &current.shape);
    }

    for (index, member) in new.serializable_members() {
        if !matched[index] {
            details.push(format!("added member: {} {}", member.shape, member.name));
        }
    }
}

fn compare_enums(
    old: &TypeDescriptor,
    new: &TypeDescriptor,
    details: &mut Vec<String>,
    backward: &mut bool,
    forward: &mut bool,
) {
    for variant in old.variants() {
        if new.resolve_variant(&variant.name, variant.discriminant).is_none() {
            details.push(format!("removed variant: {}", variant.name));
            *backward = false;
        }
    }
    for variant in new.variants() {
        if old.resolve_variant(&variant.name, variant.discriminant).is_none() {
            details.push(format!("added variant: {}", variant.name));
            *forward = false;
        }
    }
}
