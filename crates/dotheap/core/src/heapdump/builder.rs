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

//! Assembling a heap graph from parsed dump records

use crate::error::{GraphError, GraphResult};
use crate::heapdump::{
    ArrayData, ClassObjData, Heap, HeapGraph, HeapRef, Instance, InstanceId, InstanceKind, InstanceRef, NativeAllocation, RootType, Site, SiteRef, StackFrame, Value,
};
use std::collections::HashMap;
use tracing::debug;

/// Incrementally collects instances, heaps, sites, roots and native
/// allocation registrations, then validates them into a [`HeapGraph`].
///
/// Instances may reference ids that are declared later: [`reference`]
/// reserves an arena slot for an id on first mention, and [`build`] fails
/// if any reserved slot was never declared.
///
/// [`reference`]: HeapGraphBuilder::reference
/// [`build`]: HeapGraphBuilder::build
#[derive(Debug)]
pub struct HeapGraphBuilder {
    slots: Vec<Option<Instance>>,
    slot_ids: Vec<InstanceId>,
    ids: HashMap<InstanceId, InstanceRef>,
    heaps: Vec<Heap>,
    sites: Vec<Site>,
    roots: Vec<(RootType, InstanceRef)>,
    native_allocations: Vec<NativeAllocation>,
    id_size: u32,
    /// Upper bound on arena slots, the super root included.
    max_slots: usize,
    /// First id that did not get a slot.
    overflow: Option<InstanceId>,
}

impl Default for HeapGraphBuilder {
    fn default() -> Self {
        Self {
            slots: vec![Some(Instance::super_root(SiteRef::ROOT))],
            slot_ids: vec![InstanceId(0)],
            ids: HashMap::new(),
            heaps: Vec::new(),
            sites: vec![Site::root()],
            roots: Vec::new(),
            native_allocations: Vec::new(),
            id_size: 4,
            max_slots: usize::MAX,
            overflow: None,
        }
    }
}

impl HeapGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the width in bytes of references, used to size object arrays.
    pub fn with_id_size(mut self, id_size: u32) -> Self {
        self.id_size = id_size;
        self
    }

    /// Add a heap, or return the existing heap with the same name.
    pub fn add_heap(&mut self, name: impl Into<String>) -> HeapRef {
        let name = name.into();
        if let Some(heap) = self.heap(&name) {
            return heap;
        }
        let index = HeapRef::new(self.heaps.len());
        self.heaps.push(Heap::new(name, index));
        index
    }

    pub fn heap(&self, name: &str) -> Option<HeapRef> {
        self.heaps.iter().find(|h| h.name() == name).map(Heap::index)
    }

    pub fn root_site(&self) -> SiteRef {
        SiteRef::ROOT
    }

    pub fn add_site(&mut self, parent: SiteRef, frame: StackFrame) -> GraphResult<SiteRef> {
        if parent.index() >= self.sites.len() {
            return Err(GraphError::UnknownSite(parent.index()));
        }
        let index = SiteRef::try_new(self.sites.len()).ok_or(GraphError::TooManySites)?;
        self.sites.push(Site::new(index, Some(parent), frame));
        self.sites[parent.index()].add_child(index);
        Ok(index)
    }

    /// The arena slot of `id`, reserving one if `id` has not been seen yet.
    ///
    /// Once the arena is full, new ids get the super root's slot and
    /// [`build`](HeapGraphBuilder::build) fails.
    pub fn reference(&mut self, id: InstanceId) -> InstanceRef {
        if let Some(&inst) = self.ids.get(&id) {
            return inst;
        }
        let Some(inst) = InstanceRef::try_new(self.slots.len()).filter(|inst| inst.index() < self.max_slots) else {
            self.overflow.get_or_insert(id);
            return InstanceRef::SUPER_ROOT;
        };
        self.slots.push(None);
        self.slot_ids.push(id);
        self.ids.insert(id, inst);
        inst
    }

    pub fn add_class_obj(&mut self, id: InstanceId, heap: HeapRef, site: SiteRef, class_obj: Option<InstanceRef>, data: ClassObjData) -> GraphResult<InstanceRef> {
        self.declare(id, heap, site, class_obj, InstanceKind::ClassObj(Box::new(data)))
    }

    /// Add an ordinary object. `fields` follow the layout of the class chain,
    /// the object's own class first; `None` is a null reference.
    pub fn add_class_instance(&mut self, id: InstanceId, heap: HeapRef, site: SiteRef, class_obj: InstanceRef, fields: Vec<Option<Value>>) -> GraphResult<InstanceRef> {
        let kind = InstanceKind::ClassInstance { fields: fields.into_boxed_slice() };
        self.declare(id, heap, site, Some(class_obj), kind)
    }

    pub fn add_array_instance(&mut self, id: InstanceId, heap: HeapRef, site: SiteRef, class_obj: Option<InstanceRef>, array: ArrayData) -> GraphResult<InstanceRef> {
        self.declare(id, heap, site, class_obj, InstanceKind::Array(array))
    }

    /// Mark `id` as a GC root of the given kind. An instance may be a root
    /// several times over.
    pub fn add_root(&mut self, root_type: RootType, id: InstanceId) -> InstanceRef {
        let inst = self.reference(id);
        self.roots.push((root_type, inst));
        inst
    }

    /// Attribute `size` bytes of native memory to `referent`, registered
    /// through `owner`.
    pub fn register_native_allocation(&mut self, owner: InstanceRef, referent: InstanceRef, size: u64) {
        self.native_allocations.push(NativeAllocation { owner, referent, size });
    }

    fn declare(&mut self, id: InstanceId, heap: HeapRef, site: SiteRef, class_obj: Option<InstanceRef>, kind: InstanceKind) -> GraphResult<InstanceRef> {
        if heap.index() >= self.heaps.len() {
            return Err(GraphError::UnknownHeap(format!("#{}", heap.index())));
        }
        if site.index() >= self.sites.len() {
            return Err(GraphError::UnknownSite(site.index()));
        }

        let inst = self.reference(id);
        if inst == InstanceRef::SUPER_ROOT {
            return Err(GraphError::TooManyInstances(id, self.slots.len()));
        }
        let slot = &mut self.slots[inst.index()];
        if slot.is_some() {
            return Err(GraphError::DuplicateInstance(id));
        }
        *slot = Some(Instance {
            id,
            heap: Some(heap),
            site,
            class_obj,
            root_types: Default::default(),
            registered_native_size: 0,
            kind,
        });
        Ok(inst)
    }

    /// Validate and freeze the graph.
    pub fn build(self) -> GraphResult<HeapGraph> {
        let HeapGraphBuilder {
            slots,
            slot_ids,
            ids,
            heaps,
            sites,
            roots,
            native_allocations,
            id_size,
            max_slots: _,
            overflow,
        } = self;

        if let Some(id) = overflow {
            return Err(GraphError::TooManyInstances(id, slots.len()));
        }

        let mut instances = Vec::with_capacity(slots.len());
        for (slot, id) in slots.into_iter().zip(&slot_ids) {
            instances.push(slot.ok_or(GraphError::MissingInstance(*id))?);
        }

        let mut graph = HeapGraph {
            instances,
            ids,
            heaps,
            sites,
            roots: Vec::new(),
            native_allocations,
            id_size,
        };

        validate_classes(&graph)?;

        for (root_type, inst) in roots {
            let instance = &mut graph.instances[inst.index()];
            if instance.root_types.is_empty() {
                graph.roots.push(inst);
            }
            instance.root_types.insert(root_type);
        }

        for i in 1..graph.instances.len() {
            let site = graph.instances[i].site;
            graph.sites[site.index()].add_instance(InstanceRef::new(i));
        }

        debug!(instances = graph.len() - 1, heaps = graph.heaps.len(), sites = graph.sites.len(), roots = graph.roots.len(), "Heap graph built");
        Ok(graph)
    }
}

fn validate_classes(graph: &HeapGraph) -> GraphResult<()> {
    let is_class = |inst: InstanceRef| graph.class_data(inst).is_some();

    for (i, instance) in graph.instances.iter().enumerate() {
        if let Some(class) = instance.class_obj {
            if !is_class(class) {
                return Err(GraphError::UnknownClass(graph.instance(class).id));
            }
        }

        if let InstanceKind::ClassObj(data) = &instance.kind {
            if let Some(super_class) = data.super_class {
                if !is_class(super_class) {
                    return Err(GraphError::UnknownClass(graph.instance(super_class).id));
                }
            }
            // A chain longer than the arena must revisit a class.
            if graph.class_chain(Some(InstanceRef::new(i))).nth(graph.instances.len()).is_some() {
                return Err(GraphError::CyclicClassHierarchy(instance.id));
            }
        }
    }

    // Class chains are finite from here on.
    for instance in &graph.instances {
        if let InstanceKind::ClassInstance { fields } = &instance.kind {
            let expected = graph.class_chain(instance.class_obj).map(|c| c.instance_fields.len()).sum::<usize>();
            if expected != fields.len() {
                return Err(GraphError::FieldCountMismatch {
                    id: instance.id,
                    expected,
                    actual: fields.len(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heapdump::{EdgeLabel, Reachability, Size, Type};

    struct Fixture {
        builder: HeapGraphBuilder,
        heap: HeapRef,
        object: InstanceRef,
        reference: InstanceRef,
        weak: InstanceRef,
    }

    fn fixture() -> Fixture {
        let mut builder = HeapGraphBuilder::new();
        let heap = builder.add_heap("app");
        let site = builder.root_site();
        let object = builder.add_class_obj(InstanceId(1), heap, site, None, ClassObjData::new("java.lang.Object").with_instance_size(8)).unwrap();
        let reference = builder
            .add_class_obj(
                InstanceId(2),
                heap,
                site,
                None,
                ClassObjData::new("java.lang.ref.Reference").with_super_class(object).with_instance_size(16).with_field("referent", Type::Object),
            )
            .unwrap();
        let weak = builder
            .add_class_obj(InstanceId(3), heap, site, None, ClassObjData::new("java.lang.ref.WeakReference").with_super_class(reference).with_instance_size(16))
            .unwrap();
        Fixture { builder, heap, object, reference, weak }
    }

    #[test]
    fn test_forward_references_resolve() {
        let mut f = fixture();
        let site = f.builder.root_site();
        let target = f.builder.reference(InstanceId(20));
        let array = f
            .builder
            .add_array_instance(InstanceId(10), f.heap, site, None, ArrayData::new(Type::Object, vec![Some(Value::Instance(target)), None]))
            .unwrap();
        let declared = f.builder.add_class_instance(InstanceId(20), f.heap, site, f.object, vec![]).unwrap();
        assert_eq!(target, declared);

        let graph = f.builder.build().unwrap();
        let refs = graph.references(array);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, target);
        assert_eq!(refs[0].label, EdgeLabel::Element(0));
        assert_eq!(graph.edge_label(array, refs[0].label), "[0]");
    }

    #[test]
    fn test_missing_instance_fails_build() {
        let mut f = fixture();
        f.builder.add_root(RootType::JniGlobal, InstanceId(99));
        assert!(matches!(f.builder.build(), Err(GraphError::MissingInstance(InstanceId(99)))));
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let mut f = fixture();
        let site = f.builder.root_site();
        f.builder.add_class_instance(InstanceId(5), f.heap, site, f.object, vec![]).unwrap();
        let second = f.builder.add_class_instance(InstanceId(5), f.heap, site, f.object, vec![]);
        assert!(matches!(second, Err(GraphError::DuplicateInstance(InstanceId(5)))));
    }

    #[test]
    fn test_full_arena_fails_fast() {
        let mut f = fixture();
        f.builder.max_slots = 5;
        let site = f.builder.root_site();

        let last = f.builder.add_class_instance(InstanceId(5), f.heap, site, f.object, vec![]).unwrap();
        assert_eq!(last.index(), 4);

        let overflow = f.builder.add_class_instance(InstanceId(6), f.heap, site, f.object, vec![]);
        assert!(matches!(overflow, Err(GraphError::TooManyInstances(InstanceId(6), 5))));
        assert_eq!(f.builder.reference(InstanceId(7)), InstanceRef::SUPER_ROOT);
        assert!(matches!(f.builder.build(), Err(GraphError::TooManyInstances(InstanceId(6), 5))));
    }

    #[test]
    fn test_field_count_must_match_class_chain() {
        let mut f = fixture();
        let site = f.builder.root_site();
        f.builder.add_class_instance(InstanceId(5), f.heap, site, f.weak, vec![]).unwrap();
        match f.builder.build() {
            Err(GraphError::FieldCountMismatch { id, expected, actual }) => {
                assert_eq!(id, InstanceId(5));
                assert_eq!(expected, 1);
                assert_eq!(actual, 0);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_class_must_be_class_object() {
        let mut f = fixture();
        let site = f.builder.root_site();
        let plain = f.builder.add_class_instance(InstanceId(5), f.heap, site, f.object, vec![]).unwrap();
        f.builder.add_class_instance(InstanceId(6), f.heap, site, plain, vec![]).unwrap();
        assert!(matches!(f.builder.build(), Err(GraphError::UnknownClass(InstanceId(5)))));
    }

    #[test]
    fn test_unknown_site_rejected() {
        let mut f = fixture();
        assert!(matches!(f.builder.add_site(SiteRef::new(7), StackFrame::default()), Err(GraphError::UnknownSite(7))));
    }

    #[test]
    fn test_weak_referent_is_not_strong() {
        let mut f = fixture();
        let site = f.builder.root_site();
        let target = f.builder.add_class_instance(InstanceId(10), f.heap, site, f.object, vec![]).unwrap();
        let weak = f.builder.add_class_instance(InstanceId(11), f.heap, site, f.weak, vec![Some(Value::Instance(target))]).unwrap();
        let plain = f.builder.add_class_instance(InstanceId(12), f.heap, site, f.reference, vec![Some(Value::Instance(target))]).unwrap();
        let graph = f.builder.build().unwrap();

        let refs = graph.references(weak);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].reachability, Reachability::Weak);
        assert!(!refs[0].is_strong());
        assert_eq!(graph.edge_label(weak, refs[0].label), ".referent");

        // java.lang.ref.Reference itself is not one of the reference kinds.
        assert!(graph.references(plain)[0].is_strong());
    }

    #[test]
    fn test_shallow_sizes() {
        let mut f = fixture();
        let site = f.builder.root_site();
        let obj = f.builder.add_class_instance(InstanceId(10), f.heap, site, f.object, vec![]).unwrap();
        let array_class = f.builder.add_class_obj(InstanceId(11), f.heap, site, None, ClassObjData::new("int[]").with_instance_size(12)).unwrap();
        let ints = f
            .builder
            .add_array_instance(InstanceId(12), f.heap, site, Some(array_class), ArrayData::new(Type::Int, vec![Some(Value::Int(1)); 5]))
            .unwrap();
        let with_statics = f
            .builder
            .add_class_obj(InstanceId(13), f.heap, site, Some(f.object), ClassObjData::new("Statics").with_static_fields_size(24))
            .unwrap();
        let graph = f.builder.build().unwrap();

        assert_eq!(graph.shallow_size(obj), Size::new(8, 0));
        assert_eq!(graph.shallow_size(ints), Size::new(12 + 5 * 4, 0));
        assert_eq!(graph.shallow_size(with_statics), Size::new(8 + 24, 0));
        assert_eq!(graph.shallow_size(InstanceRef::SUPER_ROOT), Size::ZERO);
    }

    #[test]
    fn test_roots_are_deduplicated() {
        let mut f = fixture();
        let site = f.builder.root_site();
        let obj = f.builder.add_class_instance(InstanceId(10), f.heap, site, f.object, vec![]).unwrap();
        f.builder.add_root(RootType::JniGlobal, InstanceId(10));
        f.builder.add_root(RootType::StickyClass, InstanceId(10));
        let graph = f.builder.build().unwrap();

        assert_eq!(graph.roots(), &[obj]);
        let types = graph.instance(obj).root_types();
        assert!(types.contains(RootType::JniGlobal));
        assert!(types.contains(RootType::StickyClass));
        assert_eq!(graph.references(InstanceRef::SUPER_ROOT).len(), 1);
    }

    #[test]
    fn test_field_lookup_along_class_chain() {
        let mut f = fixture();
        let site = f.builder.root_site();
        let derived = f
            .builder
            .add_class_obj(InstanceId(20), f.heap, site, None, ClassObjData::new("Derived").with_super_class(f.weak).with_instance_size(24).with_field("count", Type::Int))
            .unwrap();
        let inst = f.builder.add_class_instance(InstanceId(21), f.heap, site, derived, vec![Some(Value::Int(3)), None]).unwrap();
        let graph = f.builder.build().unwrap();

        assert_eq!(graph.field(inst, "count"), Some(Value::Int(3)));
        assert_eq!(graph.field(inst, "referent"), None);
        assert_eq!(graph.field(inst, "missing"), None);
        assert!(graph.is_instance_of_class(inst, "java.lang.ref.Reference"));
        assert!(!graph.is_instance_of_class(inst, "java.lang.String"));
        assert_eq!(graph.reference_type(inst), Reachability::Weak);
        assert_eq!(graph.class_name(inst), "Derived");
    }

    #[test]
    fn test_strings() {
        let mut f = fixture();
        let site = f.builder.root_site();
        let string = f
            .builder
            .add_class_obj(
                InstanceId(30),
                f.heap,
                site,
                None,
                ClassObjData::new("java.lang.String").with_super_class(f.object).with_instance_size(24).with_field("value", Type::Object).with_field("count", Type::Int).with_field("offset", Type::Int),
            )
            .unwrap();
        let chars: Vec<Option<Value>> = "hello world".encode_utf16().map(|c| Some(Value::Char(c))).collect();
        let char_array = f.builder.add_array_instance(InstanceId(31), f.heap, site, None, ArrayData::new(Type::Char, chars)).unwrap();
        let hello = f
            .builder
            .add_class_instance(InstanceId(32), f.heap, site, string, vec![Some(Value::Instance(char_array)), Some(Value::Int(5)), Some(Value::Int(0))])
            .unwrap();
        let world = f
            .builder
            .add_class_instance(InstanceId(33), f.heap, site, string, vec![Some(Value::Instance(char_array)), Some(Value::Int(5)), Some(Value::Int(6))])
            .unwrap();
        let bytes: Vec<Option<Value>> = b"latin".iter().map(|&b| Some(Value::Byte(b as i8))).collect();
        let byte_array = f.builder.add_array_instance(InstanceId(34), f.heap, site, None, ArrayData::new(Type::Byte, bytes)).unwrap();
        let compressed = f
            .builder
            .add_class_instance(InstanceId(35), f.heap, site, string, vec![Some(Value::Instance(byte_array)), Some(Value::Int(5)), None])
            .unwrap();
        let broken = f
            .builder
            .add_class_instance(InstanceId(36), f.heap, site, string, vec![Some(Value::Instance(char_array)), Some(Value::Int(50)), None])
            .unwrap();
        let graph = f.builder.build().unwrap();

        assert_eq!(graph.as_string(hello, None).as_deref(), Some("hello"));
        assert_eq!(graph.as_string(world, None).as_deref(), Some("world"));
        assert_eq!(graph.as_string(world, Some(3)).as_deref(), Some("wor"));
        assert_eq!(graph.as_string(compressed, None).as_deref(), Some("latin"));
        assert_eq!(graph.as_string(broken, None), None);
        assert_eq!(graph.as_string(char_array, None), None);
    }
}
