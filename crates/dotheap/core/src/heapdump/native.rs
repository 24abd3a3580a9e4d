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

//! Native memory registered against managed instances

use crate::heapdump::{HeapGraph, InstanceKind, InstanceRef};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// `size` bytes of native memory owned by `referent`, registered through
/// `owner` (typically a `sun.misc.Cleaner`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NativeAllocation {
    pub owner: InstanceRef,
    pub referent: InstanceRef,
    pub size: u64,
}

/// Recognizes a `NativeAllocationRegistry` cleaner:
///
/// ```text
/// sun.misc.Cleaner
///   .referent -> the instance owning the native memory
///   .thunk    -> NativeAllocationRegistry$CleanerThunk
///                  .this$0 -> NativeAllocationRegistry
///                               .size: long
/// ```
pub fn detect(graph: &HeapGraph, inst: InstanceRef) -> Option<NativeAllocation> {
    if !matches!(graph.instance(inst).kind, InstanceKind::ClassInstance { .. }) || !graph.is_instance_of_class(inst, "sun.misc.Cleaner") {
        return None;
    }

    let thunk = graph.field(inst, "thunk")?.as_instance()?;
    if !graph.is_instance_of_class(thunk, "libcore.util.NativeAllocationRegistry$CleanerThunk") {
        return None;
    }

    let registry = graph.field(thunk, "this$0")?.as_instance()?;
    if !graph.is_instance_of_class(registry, "libcore.util.NativeAllocationRegistry") {
        return None;
    }

    let size = graph.field(registry, "size")?.as_long()?;
    let referent = graph.field(inst, "referent")?.as_instance()?;
    Some(NativeAllocation {
        owner: inst,
        referent,
        size: u64::try_from(size).ok()?,
    })
}

/// Folds explicitly registered and detected native allocations into the
/// shallow sizes of their referents. Returns the number of allocations
/// applied.
///
/// An owner registered explicitly is not detected again.
pub(crate) fn apply_registered_native_sizes(graph: &mut HeapGraph) -> usize {
    let mut allocations = graph.native_allocations.clone();
    let registered: HashSet<InstanceRef> = allocations.iter().map(|a| a.owner).collect();
    allocations.extend((1..graph.len()).map(InstanceRef::new).filter(|inst| !registered.contains(inst)).filter_map(|inst| detect(graph, inst)));

    for allocation in &allocations {
        graph.add_registered_native_size(allocation.referent, allocation.size);
    }

    debug!(count = allocations.len(), "Registered native allocations applied");
    allocations.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heapdump::{ClassObjData, HeapGraphBuilder, HeapRef, InstanceId, Size, Type, Value};

    /// A bitmap owning 4096 native bytes through a registry cleaner.
    /// Returns the builder, its heap and object class, then the cleaner,
    /// thunk and bitmap instances.
    fn cleaner_builder() -> (HeapGraphBuilder, HeapRef, InstanceRef, [InstanceRef; 3]) {
        let mut builder = HeapGraphBuilder::new();
        let heap = builder.add_heap("app");
        let site = builder.root_site();
        let object = builder.add_class_obj(InstanceId(1), heap, site, None, ClassObjData::new("java.lang.Object").with_instance_size(8)).unwrap();
        let phantom = builder
            .add_class_obj(InstanceId(2), heap, site, None, ClassObjData::new("java.lang.ref.PhantomReference").with_super_class(object).with_instance_size(16).with_field("referent", Type::Object))
            .unwrap();
        let cleaner = builder
            .add_class_obj(InstanceId(3), heap, site, None, ClassObjData::new("sun.misc.Cleaner").with_super_class(phantom).with_instance_size(24).with_field("thunk", Type::Object))
            .unwrap();
        let thunk = builder
            .add_class_obj(
                InstanceId(4),
                heap,
                site,
                None,
                ClassObjData::new("libcore.util.NativeAllocationRegistry$CleanerThunk").with_super_class(object).with_instance_size(12).with_field("this$0", Type::Object),
            )
            .unwrap();
        let registry = builder
            .add_class_obj(InstanceId(5), heap, site, None, ClassObjData::new("libcore.util.NativeAllocationRegistry").with_super_class(object).with_instance_size(16).with_field("size", Type::Long))
            .unwrap();

        let bitmap = builder.add_class_instance(InstanceId(10), heap, site, object, vec![]).unwrap();
        let reg = builder.add_class_instance(InstanceId(11), heap, site, registry, vec![Some(Value::Long(4096))]).unwrap();
        let th = builder.add_class_instance(InstanceId(12), heap, site, thunk, vec![Some(Value::Instance(reg))]).unwrap();
        let cl = builder.add_class_instance(InstanceId(13), heap, site, cleaner, vec![Some(Value::Instance(th)), Some(Value::Instance(bitmap))]).unwrap();
        (builder, heap, object, [cl, th, bitmap])
    }

    #[test]
    fn test_cleaner_pattern_is_detected() {
        let (mut builder, heap, object, [cl, th, bitmap]) = cleaner_builder();
        let site = builder.root_site();
        let explicit = builder.add_class_instance(InstanceId(14), heap, site, object, vec![]).unwrap();
        builder.register_native_allocation(explicit, explicit, 100);
        let mut graph = builder.build().unwrap();

        assert_eq!(
            detect(&graph, cl),
            Some(NativeAllocation {
                owner: cl,
                referent: bitmap,
                size: 4096
            })
        );
        assert_eq!(detect(&graph, th), None);
        assert_eq!(detect(&graph, bitmap), None);

        assert_eq!(apply_registered_native_sizes(&mut graph), 2);
        assert_eq!(graph.shallow_size(bitmap), Size::new(8, 4096));
        assert_eq!(graph.shallow_size(explicit), Size::new(8, 100));
    }

    #[test]
    fn test_registered_cleaner_is_counted_once() {
        let (mut builder, _, _, [cl, _, bitmap]) = cleaner_builder();
        builder.register_native_allocation(cl, bitmap, 4096);
        let mut graph = builder.build().unwrap();

        assert_eq!(apply_registered_native_sizes(&mut graph), 1);
        assert_eq!(graph.shallow_size(bitmap), Size::new(8, 4096));
    }

    #[test]
    fn test_oversized_registrations_saturate() {
        let (mut builder, heap, object, _) = cleaner_builder();
        let site = builder.root_site();
        let buffer = builder.add_class_instance(InstanceId(20), heap, site, object, vec![]).unwrap();
        builder.register_native_allocation(buffer, buffer, u64::MAX);
        builder.register_native_allocation(buffer, buffer, 4096);
        let mut graph = builder.build().unwrap();

        apply_registered_native_sizes(&mut graph);
        assert_eq!(graph.shallow_size(buffer), Size::new(8, u64::MAX));
    }
}
