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

//! DotHeap core
//!
//! Heap snapshot analysis engine. Given a fully materialized object graph
//! extracted from a memory snapshot, the engine computes for every object:
//!
//! - its reachability class and a sample path back to a GC root,
//! - its immediate dominator in the strong-reference graph,
//! - its retained size, split per heap.
//!
//! All three passes run once, when a [`Snapshot`] is constructed. The
//! resulting snapshot is immutable and can be shared between readers.
//!
//! # Example Usage
//!
//! ```rust
//! use dotheap_core::heapdump::{ClassObjData, HeapGraphBuilder, InstanceId, RootType};
//! use dotheap_core::{Snapshot, SnapshotConfig};
//!
//! let mut builder = HeapGraphBuilder::new();
//! let heap = builder.add_heap("app");
//! let site = builder.root_site();
//!
//! let class = builder.add_class_obj(InstanceId(1), heap, site, None, ClassObjData::new("Node").with_instance_size(16)).unwrap();
//! builder.add_class_instance(InstanceId(2), heap, site, class, vec![]).unwrap();
//! builder.add_root(RootType::JniGlobal, InstanceId(2));
//!
//! let snapshot = Snapshot::new(builder.build().unwrap(), SnapshotConfig::default());
//! let inst = snapshot.find_instance(InstanceId(2)).unwrap();
//! assert!(inst.is_strongly_reachable());
//! assert_eq!(inst.total_retained_size().total(), 16);
//! ```

pub mod analysis;
pub mod config;
pub mod diff;
pub mod error;
pub mod heapdump;
pub mod progress;
pub mod snapshot;
pub mod sort;

pub use config::SnapshotConfig;
pub use error::{GraphError, GraphResult};
pub use heapdump::{HeapGraph, HeapGraphBuilder, Reachability, Size};
pub use progress::{NullProgress, Progress, TracingProgress};
pub use snapshot::{InstanceView, PathElement, Snapshot};
