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

//! Analysis passes over a heap graph
//!
//! The passes run in a fixed order, each consuming the output of the
//! previous one:
//!
//! 1. [`ReachabilityWalk`]: breadth-first search from the super root,
//!    strong references first, recording one path to a GC root per
//!    instance and the reverse references of every instance.
//! 2. [`DominatorTree`]: immediate dominators over the strong references
//!    reachable from the super root.
//! 3. [`RetainedSizes`]: per-heap retained sizes, summed bottom-up over the
//!    dominator tree.

pub mod dominators;
pub mod reachability;
pub mod retained;

pub use dominators::{DominatorGraph, DominatorTree, StrongReferences};
pub use reachability::{PathLink, ReachabilityWalk};
pub use retained::RetainedSizes;
