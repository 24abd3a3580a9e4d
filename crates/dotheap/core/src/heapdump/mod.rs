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

//! In-memory heap graph model
//!
//! The graph is an arena: instances, heaps and allocation sites live in
//! dense tables and refer to each other by index ([`InstanceRef`],
//! [`HeapRef`], [`SiteRef`]). Nothing in the arena holds a back-pointer;
//! everything derived from the graph (paths to roots, dominators, retained
//! sizes) lives in side tables owned by the [`Snapshot`](crate::Snapshot).

pub mod builder;
pub mod document;
pub mod graph;
pub mod heap;
pub mod instance;
pub mod native;
pub mod reachability;
pub mod reference;
pub mod root_type;
pub mod site;
pub mod size;
pub mod value;

pub use builder::HeapGraphBuilder;
pub use document::GraphDocument;
pub use graph::HeapGraph;
pub use heap::{Heap, HeapRef};
pub use instance::{ArrayData, ClassObjData, Instance, InstanceId, InstanceKind, InstanceRef};
pub use native::NativeAllocation;
pub use reachability::Reachability;
pub use reference::{EdgeLabel, Reference};
pub use root_type::{RootType, RootTypes};
pub use site::{ObjectsInfo, Site, SiteRef, StackFrame};
pub use size::Size;
pub use value::{Field, FieldValue, Type, Value};
