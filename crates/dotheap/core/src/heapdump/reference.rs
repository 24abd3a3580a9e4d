// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Outgoing references of instances

use crate::heapdump::{InstanceRef, Reachability};

/// Which slot of the source instance holds a reference.
///
/// Labels are kept as indices and only turned into text on demand, so the
/// per-edge records stored by the analysis passes stay small.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeLabel {
    /// The n-th GC root of the super root.
    Root(u32),
    /// The n-th instance field slot along the class chain.
    Field(u32),
    /// The n-th static field of a class object.
    Static(u32),
    /// The n-th element of an array.
    Element(u32),
}

/// A directed edge `src -> target`.
///
/// Every edge is strong except the `referent` field of instances of the
/// `java.lang.ref` reference classes, which carries the reachability of
/// that reference kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub src: InstanceRef,
    pub target: InstanceRef,
    pub label: EdgeLabel,
    pub reachability: Reachability,
}

impl Reference {
    pub fn is_strong(&self) -> bool {
        self.reachability == Reachability::Strong
    }
}
