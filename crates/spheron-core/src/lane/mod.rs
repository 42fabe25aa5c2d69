// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Lanes
//!
//! A lane is a stateless step strategy. Its owning agent keeps every
//! long-lived resource and lends the ones a step needs through a
//! [`LaneContext`], a map keyed by type. The lane reads its inputs from the
//! context, runs, and leaves its output behind for the agent to take.
//!
//! Borrowed collaborators enter the context as [`Slot`] (exclusive) or
//! [`Ref`] (shared). Both erase the borrow's lifetime, so a context must not
//! outlive the call it was built for.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::error::DisplacementError;

pub mod context_keys;
pub use context_keys::*;

/// Why a lane could not complete.
#[derive(Debug)]
pub enum LaneError {
    /// The context lacks an input the lane reads.
    MissingInput(&'static str),
    /// The step itself failed.
    Step(DisplacementError),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::MissingInput(name) => write!(f, "Lane input `{name}` was not provided"),
            LaneError::Step(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::Step(err) => Some(err),
            LaneError::MissingInput(_) => None,
        }
    }
}

impl From<DisplacementError> for LaneError {
    fn from(err: DisplacementError) -> Self {
        LaneError::Step(err)
    }
}

/// Inputs and outputs of one lane call, one value per type.
#[derive(Default)]
pub struct LaneContext {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl LaneContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any earlier value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// The value of type `T`, if present.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.entries.get(&TypeId::of::<T>())?.downcast_ref()
    }

    /// Like [`get`](Self::get), but a missing value is a
    /// [`LaneError::MissingInput`] naming `T`.
    pub fn require<T: Any>(&self) -> Result<&T, LaneError> {
        self.get::<T>()
            .ok_or(LaneError::MissingInput(type_name::<T>()))
    }

    /// Removes and returns the value of type `T`.
    pub fn take<T: Any>(&mut self) -> Option<T> {
        let entry = self.entries.remove(&TypeId::of::<T>())?;
        entry.downcast().ok().map(|boxed| *boxed)
    }
}

impl fmt::Debug for LaneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaneContext")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// An exclusive borrow lent to a lane with its lifetime erased.
///
/// The lender must keep the value alive and untouched until the context
/// holding the slot is dropped.
pub struct Slot<T: ?Sized>(*mut T);

// SAFETY: a slot only lives inside the LaneContext of a single lane call,
// during which its lender does not touch the value.
unsafe impl<T: ?Sized> Send for Slot<T> {}
unsafe impl<T: ?Sized> Sync for Slot<T> {}

impl<T: ?Sized> Slot<T> {
    /// Lends `value`.
    pub fn new(value: &mut T) -> Self {
        Self(value)
    }

    /// The lent value.
    #[allow(clippy::mut_from_ref)]
    pub fn get(&self) -> &mut T {
        // SAFETY: see the type-level contract; lanes read each slot once per
        // call.
        unsafe { &mut *self.0 }
    }
}

/// A shared borrow lent to a lane with its lifetime erased.
pub struct Ref<T: ?Sized>(*const T);

// SAFETY: as for `Slot`.
unsafe impl<T: ?Sized> Send for Ref<T> {}
unsafe impl<T: ?Sized> Sync for Ref<T> {}

impl<T: ?Sized> Ref<T> {
    /// Lends `value`.
    pub fn new(value: &T) -> Self {
        Self(value)
    }

    /// The lent value.
    pub fn get(&self) -> &T {
        // SAFETY: the lender keeps `value` alive for the whole call.
        unsafe { &*self.0 }
    }
}

/// A step strategy driven by an agent.
pub trait Lane: Send + Sync {
    /// Name of the strategy, used in logs and error context.
    fn strategy_name(&self) -> &'static str;

    /// Runs one step on the inputs found in `ctx`.
    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError>;

    /// Releases whatever resources `ctx` lends that the lane manages.
    fn on_shutdown(&self, _ctx: &mut LaneContext) {}
}
