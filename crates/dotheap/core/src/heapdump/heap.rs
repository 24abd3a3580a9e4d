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

//! Heaps: named partitions of the object graph

use crate::heapdump::Size;
use serde::Serialize;

/// Index of a heap in its graph's heap table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HeapRef(pub(crate) u32);

impl HeapRef {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A heap of the snapshot, for example "app", "image" or "zygote".
#[derive(Debug, Clone, Serialize)]
pub struct Heap {
    name: String,
    index: HeapRef,
    /// Bytes on this heap retained by the GC roots. Filled in once the
    /// super root's retained size is known.
    size: Size,
}

impl Heap {
    pub(crate) fn new(name: String, index: HeapRef) -> Self {
        Self { name, index, size: Size::ZERO }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> HeapRef {
        self.index
    }

    /// Total size of all instances on this heap reachable from a GC root.
    pub fn size(&self) -> Size {
        self.size
    }

    pub(crate) fn add_to_size(&mut self, size: Size) {
        self.size += size;
    }
}
