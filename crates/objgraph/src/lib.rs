// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # objgraph - Object-graph serialization
//!
//! Writes arbitrary, possibly cyclic object graphs to a stream and reads them
//! back, in a compact binary encoding or an XML encoding. Shared references
//! keep their identity, frames can be rewritten in place, foreign data can sit
//! between frames, and data written by an older version of a type still reads
//! into the current one.
//!
//! ## Quick Start
//!
//! ```rust
//! use objgraph::{Format, Persist, Result, Serializer};
//! use std::cell::RefCell;
//! use std::io::Cursor;
//! use std::rc::Rc;
//!
//! #[derive(Debug, Default, Persist)]
//! struct Employee {
//!     name: String,
//!     manager: Option<Rc<RefCell<Employee>>>,
//! }
//!
//! fn main() -> Result<()> {
//!     let boss = Rc::new(RefCell::new(Employee { name: "Ada".into(), manager: None }));
//!     let team = vec![
//!         Rc::new(RefCell::new(Employee { name: "Bob".into(), manager: Some(boss.clone()) })),
//!         Rc::new(RefCell::new(Employee { name: "Cy".into(), manager: Some(boss.clone()) })),
//!     ];
//!
//!     let mut stream = Cursor::new(Vec::new());
//!     Serializer::open(&mut stream, Some(Format::Binary))?.write_object(&team)?;
//!
//!     stream.set_position(0);
//!     let team: Vec<Rc<RefCell<Employee>>> = Serializer::open(&mut stream, None)?.read_object()?;
//!     let first = team[0].borrow().manager.clone();
//!     let second = team[1].borrow().manager.clone();
//!     assert!(Rc::ptr_eq(&first.unwrap(), &second.unwrap()));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  Serializer (one stream, one format, frame per top-level value)    |
//! +---------------------------------------------------------------------+
//! |  Typed layer: Persist / Record  <->  Graph (root + object arena)    |
//! +---------------------------------------------------------------------+
//! |  Walker: depth-first, ReferenceTracker ids, TypeRegistry names      |
//! +---------------------------------------------------------------------+
//! |  Format drivers: binary tags | XML elements, inside a CRC'd frame  |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Serializer`] | Session binding a [`Format`] to a stream |
//! | [`Persist`] | Conversion of a Rust type to and from a [`Value`] |
//! | [`Graph`] | Dynamic form of any serialized value |
//! | [`TypeRegistry`] | Descriptors by Rust type, qualified name and alias |
//! | [`Options`] | Per-session limits and registry |
//!
//! ## Schema evolution
//!
//! Members are matched by name. Stored members the current type no longer
//! has are skipped (even when their types are gone too), members missing
//! from the data keep their `Default` value, and renamed types and members
//! resolve through aliases:
//!
//! ```rust
//! # use objgraph::Persist;
//! #[derive(Default, Persist)]
//! #[persist(name = "shop.Item", alias = "legacy.Article")]
//! struct Item {
//!     #[persist(alias = "title")]
//!     name: String,
//!     price_cents: u64,
//!     #[persist(transient)]
//!     cached_label: Option<String>,
//! }
//! ```
//!
//! Numeric members widen losslessly (`i16` data reads into an `i64` member);
//! any other change of member type is a [`Error::TypeMismatch`].

// Allow the derive macro to work inside this crate's tests
extern crate self as objgraph;

/// Schema evolution rules (widening, descriptor comparison).
pub mod compat;
/// Global configuration (frame markers, default limits, session options).
pub mod config;
/// Type descriptors and their builder.
pub mod descriptor;
mod error;
/// Format drivers and frame envelope.
pub mod format;
mod persist;
mod registry;
mod session;
mod tracker;
mod value;
mod walker;

pub use config::Options;
pub use descriptor::{
    DescriptorKind, EnumVariant, MemberDescriptor, Shape, TypeDescriptor, TypeDescriptorBuilder,
};
pub use error::{Error, Result};
pub use format::Format;
pub use persist::{
    from_graph, to_graph, GraphReader, GraphWriter, MemberInfo, Persist, Record, TypeInfo,
};
pub use registry::TypeRegistry;
pub use session::{detect_format, Serializer};
pub use tracker::ReferenceTracker;
pub use value::{
    Array, Decimal, EnumValue, Graph, MemberRef, Object, ObjectId, ParseDecimalError,
    PrimitiveKind, Value,
};

/// Derive macro for [`Persist`] (and [`Record`] on structs).
pub use objgraph_codegen::Persist;
