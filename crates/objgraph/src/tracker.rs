// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference tracker.
//!
//! Maps arena objects to the stream identifiers of one frame. Writers
//! [`assign`](ReferenceTracker::assign) identifiers in first-encounter order;
//! readers [`bind`](ReferenceTracker::bind) them in the same order, before the
//! object's members are decoded. The session owns one tracker and clears it
//! at every frame boundary, so frames never reference each other.

use crate::error::{Error, Result};
use crate::value::ObjectId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ReferenceTracker {
    assigned: HashMap<ObjectId, u32>,
    bound: Vec<ObjectId>,
}

impl ReferenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every identifier (frame boundary).
    pub fn clear(&mut self) {
        self.assigned.clear();
        self.bound.clear();
    }

    /// Number of identifiers handed out or bound in the current frame.
    pub fn len(&self) -> usize {
        self.assigned.len().max(self.bound.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Write side
    // ------------------------------------------------------------------

    /// Identifier already assigned to `object`, if any.
    pub fn lookup(&self, object: ObjectId) -> Option<u32> {
        self.assigned.get(&object).copied()
    }

    /// Assigns the next identifier to `object` (or returns its existing one).
    pub fn assign(&mut self, object: ObjectId) -> u32 {
        let next = self.assigned.len() as u32;
        *self.assigned.entry(object).or_insert(next)
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    /// Binds a freshly decoded record identifier to its arena object.
    ///
    /// Identifiers must arrive in allocation order: 0, 1, 2, ...
    pub fn bind(&mut self, stream_id: u32, object: ObjectId) -> Result<()> {
        let expected = self.bound.len();
        if stream_id as usize != expected {
            return Err(Error::malformed(format!(
                "object id {stream_id} out of sequence (expected {expected})"
            )));
        }
        self.bound.push(object);
        Ok(())
    }

    /// Arena object for a back-reference.
    pub fn resolve(&self, stream_id: u32) -> Result<ObjectId> {
        self.bound.get(stream_id as usize).copied().ok_or_else(|| {
            Error::malformed(format!("back-reference to unknown object id {stream_id}"))
        })
    }
}
