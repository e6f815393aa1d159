// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptor registry.
//!
//! Process-wide, lazily populated and never invalidated: a type is described
//! the first time a session meets it and stays registered for the lifetime of
//! the process. Lookups go by Rust `TypeId` (typed layer) or by qualified name
//! and alias (decoding).
//!
//! Sessions use [`TypeRegistry::global`] unless [`Options`] hands them a
//! private registry.
//!
//! [`Options`]: crate::Options

use crate::compat::{self, Compatibility};
use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};
use crate::persist::Persist;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();

#[derive(Default)]
struct Inner {
    /// Qualified names and aliases.
    by_name: HashMap<String, Arc<TypeDescriptor>>,
    by_type: HashMap<TypeId, Arc<TypeDescriptor>>,
}

/// Thread-safe descriptor table.
#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<Inner>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("TypeRegistry")
            .field("names", &inner.by_name.len())
            .field("types", &inner.by_type.len())
            .finish()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        GLOBAL.get_or_init(TypeRegistry::new)
    }

    /// Registers a descriptor under its name and aliases.
    ///
    /// The first registration of a name stays authoritative. Registering a
    /// different structure under the same name logs the compatibility
    /// report and returns the existing descriptor.
    pub fn register(&self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let mut inner = self.inner.write();
        Self::insert_names(&mut inner, Arc::new(descriptor))
    }

    /// Registers the descriptor of a Rust type. Returns false if `type_id`
    /// was already known.
    ///
    /// The type always keeps its own descriptor, even when another type
    /// holds its name: member indexes handed to [`Record::read_member`]
    /// come from it.
    ///
    /// [`Record::read_member`]: crate::Record::read_member
    pub(crate) fn register_type(&self, type_id: TypeId, descriptor: TypeDescriptor) -> bool {
        let mut inner = self.inner.write();
        if inner.by_type.contains_key(&type_id) {
            return false;
        }
        let own = Arc::new(descriptor);
        Self::insert_names(&mut inner, Arc::clone(&own));
        inner.by_type.insert(type_id, own);
        true
    }

    fn insert_names(inner: &mut Inner, descriptor: Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        if let Some(existing) = inner.by_name.get(descriptor.name()) {
            if **existing != *descriptor {
                let report = compat::compare(existing, &descriptor);
                if report.compatibility != Compatibility::Full {
                    log::warn!(
                        "[objgraph] type '{}' registered twice with {:?} structure: {}",
                        descriptor.name(),
                        report.compatibility,
                        report.details.join("; ")
                    );
                }
            }
            return Arc::clone(existing);
        }

        log::debug!(
            "[objgraph] registered type '{}' ({} aliases)",
            descriptor.name(),
            descriptor.aliases().len()
        );
        for alias in descriptor.aliases() {
            inner
                .by_name
                .entry(alias.clone())
                .or_insert_with(|| Arc::clone(&descriptor));
        }
        inner
            .by_name
            .insert(descriptor.name().to_string(), Arc::clone(&descriptor));
        descriptor
    }

    /// Describes `T` (and, transitively, the types of its members) if it is
    /// not registered yet.
    pub fn ensure<T: Persist>(&self) {
        if self.inner.read().by_type.contains_key(&TypeId::of::<T>()) {
            return;
        }
        match T::descriptor() {
            // Registered before its members so recursive types terminate.
            Some(descriptor) => {
                if self.register_type(TypeId::of::<T>(), descriptor) {
                    T::register_dependencies(self);
                }
            }
            None => T::register_dependencies(self),
        }
    }

    /// Descriptor of a Rust type, registering it on first use.
    pub fn descriptor_of<T: Persist>(&self) -> Option<Arc<TypeDescriptor>> {
        self.ensure::<T>();
        self.inner.read().by_type.get(&TypeId::of::<T>()).cloned()
    }

    /// Descriptor by qualified name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.inner.read().by_name.get(name).cloned()
    }

    /// Like [`get`](Self::get) but fails with `UnresolvableType`.
    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.get(name)
            .ok_or_else(|| Error::UnresolvableType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(name)
    }

    /// Registered qualified names (aliases excluded), sorted.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner
            .by_name
            .iter()
            .filter(|(name, desc)| desc.name() == name.as_str())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_name.is_empty()
    }
}
