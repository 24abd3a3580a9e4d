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

//! The immutable heap graph arena

use crate::heapdump::{ClassObjData, EdgeLabel, Field, Heap, Instance, InstanceId, InstanceKind, InstanceRef, NativeAllocation, Reachability, Reference, Site, SiteRef, Size, Type, Value};
use std::collections::HashMap;

/// A fully materialized object graph.
///
/// Built by [`HeapGraphBuilder`](crate::HeapGraphBuilder), which guarantees
/// that every reference names a declared instance and every class instance
/// matches the field layout of its class chain.
#[derive(Debug, Clone)]
pub struct HeapGraph {
    pub(crate) instances: Vec<Instance>,
    pub(crate) ids: HashMap<InstanceId, InstanceRef>,
    pub(crate) heaps: Vec<Heap>,
    pub(crate) sites: Vec<Site>,
    /// Distinct GC root instances, in the order they were first registered.
    pub(crate) roots: Vec<InstanceRef>,
    pub(crate) native_allocations: Vec<NativeAllocation>,
    pub(crate) id_size: u32,
}

impl HeapGraph {
    /// Number of arena slots, the super root included.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True if the graph holds nothing but the super root.
    pub fn is_empty(&self) -> bool {
        self.instances.len() <= 1
    }

    pub fn instance(&self, inst: InstanceRef) -> &Instance {
        &self.instances[inst.index()]
    }

    pub fn find(&self, id: InstanceId) -> Option<InstanceRef> {
        self.ids.get(&id).copied()
    }

    pub fn heaps(&self) -> &[Heap] {
        &self.heaps
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn site(&self, site: SiteRef) -> &Site {
        &self.sites[site.index()]
    }

    pub fn roots(&self) -> &[InstanceRef] {
        &self.roots
    }

    pub fn id_size(&self) -> u32 {
        self.id_size
    }

    pub fn class_data(&self, inst: InstanceRef) -> Option<&ClassObjData> {
        match &self.instance(inst).kind {
            InstanceKind::ClassObj(data) => Some(&**data),
            _ => None,
        }
    }

    /// The given class followed by its superclasses.
    pub fn class_chain(&self, class: Option<InstanceRef>) -> impl Iterator<Item = &ClassObjData> + '_ {
        std::iter::successors(class.and_then(|c| self.class_data(c)), move |c| c.super_class.and_then(|s| self.class_data(s)))
    }

    /// Instance fields of a class instance paired with their values, own
    /// class first. Empty for anything that is not a class instance.
    pub fn instance_fields(&self, inst: InstanceRef) -> impl Iterator<Item = (&Field, Option<Value>)> + '_ {
        let instance = self.instance(inst);
        let (class, values): (Option<InstanceRef>, &[Option<Value>]) = match &instance.kind {
            InstanceKind::ClassInstance { fields } => (instance.class_obj, &fields[..]),
            _ => (None, &[][..]),
        };
        self.class_chain(class).flat_map(|c| c.instance_fields.iter()).zip(values.iter().copied())
    }

    /// Value of the first instance field named `name`. `None` if there is no
    /// such field or its value is null.
    pub fn field(&self, inst: InstanceRef, name: &str) -> Option<Value> {
        self.instance_fields(inst).find(|(field, _)| field.name == name).and_then(|(_, value)| value)
    }

    pub fn class_name(&self, inst: InstanceRef) -> &str {
        self.instance(inst).class_obj.and_then(|c| self.class_data(c)).map(|c| c.name.as_str()).unwrap_or("???")
    }

    /// True if the class of `inst`, or one of its superclasses, is named
    /// `class_name`.
    pub fn is_instance_of_class(&self, inst: InstanceRef, class_name: &str) -> bool {
        self.class_chain(self.instance(inst).class_obj).any(|c| c.name == class_name)
    }

    /// Reachability carried by the `referent` field of `inst`: the kind of
    /// `java.lang.ref` reference its class derives from, or strong.
    pub fn reference_type(&self, inst: InstanceRef) -> Reachability {
        self.class_chain(self.instance(inst).class_obj).find_map(|c| Reachability::of_reference_class(&c.name)).unwrap_or(Reachability::Strong)
    }

    /// Calls `f` with every outgoing reference of `inst`, in field order.
    pub fn for_each_reference(&self, inst: InstanceRef, mut f: impl FnMut(Reference)) {
        match &self.instance(inst).kind {
            InstanceKind::SuperRoot => {
                for (i, &root) in self.roots.iter().enumerate() {
                    f(Reference {
                        src: inst,
                        target: root,
                        label: EdgeLabel::Root(i as u32),
                        reachability: Reachability::Strong,
                    });
                }
            }
            InstanceKind::ClassInstance { .. } => {
                let ref_type = self.reference_type(inst);
                for (slot, (field, value)) in self.instance_fields(inst).enumerate() {
                    if let Some(Value::Instance(target)) = value {
                        let reachability = if ref_type != Reachability::Strong && field.name == "referent" { ref_type } else { Reachability::Strong };
                        f(Reference {
                            src: inst,
                            target,
                            label: EdgeLabel::Field(slot as u32),
                            reachability,
                        });
                    }
                }
            }
            InstanceKind::Array(array) => {
                for (i, value) in array.values.iter().enumerate() {
                    if let Some(Value::Instance(target)) = *value {
                        f(Reference {
                            src: inst,
                            target,
                            label: EdgeLabel::Element(i as u32),
                            reachability: Reachability::Strong,
                        });
                    }
                }
            }
            InstanceKind::ClassObj(data) => {
                for (i, field) in data.static_values.iter().enumerate() {
                    if let Some(Value::Instance(target)) = field.value {
                        f(Reference {
                            src: inst,
                            target,
                            label: EdgeLabel::Static(i as u32),
                            reachability: Reachability::Strong,
                        });
                    }
                }
            }
        }
    }

    pub fn references(&self, inst: InstanceRef) -> Vec<Reference> {
        let mut refs = Vec::new();
        self.for_each_reference(inst, |r| refs.push(r));
        refs
    }

    /// Human readable name of the slot `label` of `src`: `.name` for fields,
    /// `[i]` for array elements.
    pub fn edge_label(&self, src: InstanceRef, label: EdgeLabel) -> String {
        match label {
            EdgeLabel::Root(i) => format!(".roots[{i}]"),
            EdgeLabel::Field(slot) => match self.instance_fields(src).nth(slot as usize) {
                Some((field, _)) => format!(".{}", field.name),
                None => String::from(".???"),
            },
            EdgeLabel::Static(i) => match self.class_data(src).and_then(|c| c.static_values.get(i as usize)) {
                Some(field) => format!(".{}", field.name),
                None => String::from(".???"),
            },
            EdgeLabel::Element(i) => format!("[{i}]"),
        }
    }

    /// Shallow size: the instance size recorded by the class, plus
    /// type-specific extra bytes, plus registered native bytes.
    pub fn shallow_size(&self, inst: InstanceRef) -> Size {
        let instance = self.instance(inst);
        let extra = match &instance.kind {
            InstanceKind::SuperRoot => return Size::ZERO,
            InstanceKind::ClassInstance { .. } => 0,
            InstanceKind::Array(array) => array.values.len() as u64 * array.element_type.size(self.id_size),
            InstanceKind::ClassObj(data) => data.static_fields_size,
        };
        let base = instance.class_obj.and_then(|c| self.class_data(c)).map(|c| c.instance_size).unwrap_or(0);
        Size::new(base + extra, instance.registered_native_size)
    }

    /// Decodes a `java.lang.String` instance backed by a `char[]` or a
    /// compressed `byte[]`. The result is cut to `max_chars` characters when
    /// given.
    pub fn as_string(&self, inst: InstanceRef, max_chars: Option<usize>) -> Option<String> {
        if !self.is_instance_of_class(inst, "java.lang.String") {
            return None;
        }

        let chars = self.field(inst, "value")?.as_instance()?;
        let InstanceKind::Array(array) = &self.instance(chars).kind else {
            return None;
        };

        let count = self.field(inst, "count").and_then(|v| v.as_int()).unwrap_or(array.len() as i32);
        let offset = self.field(inst, "offset").and_then(|v| v.as_int()).unwrap_or(0);
        let (Ok(offset), Ok(mut count)) = (usize::try_from(offset), usize::try_from(count)) else {
            return None;
        };
        if offset.checked_add(count)? > array.len() {
            return None;
        }
        if let Some(max) = max_chars {
            count = count.min(max);
        }

        let values = &array.values[offset..offset + count];
        match array.element_type {
            Type::Char => {
                let units = values.iter().map(|v| v.and_then(|v| v.as_char()).unwrap_or(0));
                Some(char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)).collect())
            }
            Type::Byte => Some(values.iter().map(|v| v.and_then(|v| v.as_byte()).unwrap_or(0) as u8 as char).collect()),
            _ => None,
        }
    }

    pub(crate) fn add_registered_native_size(&mut self, inst: InstanceRef, size: u64) {
        let instance = &mut self.instances[inst.index()];
        instance.registered_native_size = instance.registered_native_size.saturating_add(size);
    }
}
