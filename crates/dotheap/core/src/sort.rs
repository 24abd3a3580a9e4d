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

//! Orderings used when listing snapshot contents

use crate::heapdump::{Heap, HeapGraph, ObjectsInfo, Site};
use crate::snapshot::InstanceView;
use std::cmp::Ordering;

/// Largest total retained size first, then by id.
pub fn by_total_retained_size(a: &InstanceView<'_>, b: &InstanceView<'_>) -> Ordering {
    b.total_retained_size().total().cmp(&a.total_retained_size().total()).then_with(|| a.id().cmp(&b.id()))
}

/// Heaps in the order they were declared.
pub fn by_heap_index(a: &Heap, b: &Heap) -> Ordering {
    a.index().cmp(&b.index())
}

/// Largest total size first, then by site id.
pub fn by_site_size(a: &Site, b: &Site) -> Ordering {
    b.total_size().total().cmp(&a.total_size().total()).then_with(|| a.id().cmp(&b.id()))
}

/// Largest size first, then by heap, then by class name.
pub fn by_objects_info_size(graph: &HeapGraph) -> impl Fn(&&ObjectsInfo, &&ObjectsInfo) -> Ordering + '_ {
    move |a: &&ObjectsInfo, b: &&ObjectsInfo| {
        b.num_bytes
            .total()
            .cmp(&a.num_bytes.total())
            .then_with(|| a.heap.cmp(&b.heap))
            .then_with(|| class_name(graph, a).cmp(class_name(graph, b)))
    }
}

pub(crate) fn class_name<'g>(graph: &'g HeapGraph, info: &ObjectsInfo) -> &'g str {
    info.class_obj.and_then(|c| graph.class_data(c)).map(|c| c.name.as_str()).unwrap_or("???")
}
