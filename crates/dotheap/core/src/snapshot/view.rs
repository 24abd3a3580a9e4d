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

//! Read-only views of analysed instances

use crate::heapdump::{ClassObjData, Heap, HeapRef, InstanceId, InstanceKind, InstanceRef, Reachability, Reference, RootTypes, Site, Size, Value};
use crate::snapshot::Snapshot;
use std::fmt;

/// An instance of a [`Snapshot`], with access to everything computed about
/// it.
#[derive(Clone, Copy)]
pub struct InstanceView<'a> {
    snapshot: &'a Snapshot,
    inst: InstanceRef,
}

/// One step of a path from a GC root: an instance and the field leading
/// from it to the next element. The last element is the instance the path
/// was requested for, with an empty field.
#[derive(Debug, Clone)]
pub struct PathElement<'a> {
    pub instance: InstanceView<'a>,
    pub field: String,
    /// The instance dominates the last element of the path.
    pub is_dominator: bool,
}

impl<'a> InstanceView<'a> {
    pub(crate) fn new(snapshot: &'a Snapshot, inst: InstanceRef) -> Self {
        Self { snapshot, inst }
    }

    fn view(&self, inst: InstanceRef) -> InstanceView<'a> {
        InstanceView::new(self.snapshot, inst)
    }

    pub fn index(&self) -> InstanceRef {
        self.inst
    }

    pub fn id(&self) -> InstanceId {
        self.snapshot.graph.instance(self.inst).id()
    }

    pub fn kind(&self) -> &'a InstanceKind {
        self.snapshot.graph.instance(self.inst).kind()
    }

    pub fn is_super_root(&self) -> bool {
        self.inst == InstanceRef::SUPER_ROOT
    }

    pub fn is_class_instance(&self) -> bool {
        matches!(self.kind(), InstanceKind::ClassInstance { .. })
    }

    pub fn is_array_instance(&self) -> bool {
        matches!(self.kind(), InstanceKind::Array(_))
    }

    pub fn is_class_obj(&self) -> bool {
        matches!(self.kind(), InstanceKind::ClassObj(_))
    }

    /// Class data if this instance is a class object.
    pub fn as_class_obj(&self) -> Option<&'a ClassObjData> {
        self.snapshot.graph.class_data(self.inst)
    }

    /// Element values if this instance is an array.
    pub fn array_values(&self) -> Option<&'a [Option<Value>]> {
        match self.kind() {
            InstanceKind::Array(array) => Some(&array.values[..]),
            _ => None,
        }
    }

    /// The heap the instance lives on, `None` only for the super root.
    pub fn heap(&self) -> Option<&'a Heap> {
        let heap = self.snapshot.graph.instance(self.inst).heap()?;
        self.snapshot.graph.heaps().get(heap.index())
    }

    pub fn site(&self) -> &'a Site {
        self.snapshot.graph.site(self.snapshot.graph.instance(self.inst).site())
    }

    pub fn class_obj(&self) -> Option<InstanceView<'a>> {
        self.snapshot.graph.instance(self.inst).class_obj().map(|c| self.view(c))
    }

    /// Name of the instance's class, `"???"` when unknown.
    pub fn class_name(&self) -> &'a str {
        self.snapshot.graph.class_name(self.inst)
    }

    pub fn is_instance_of_class(&self, class_name: &str) -> bool {
        self.snapshot.graph.is_instance_of_class(self.inst, class_name)
    }

    pub fn is_root(&self) -> bool {
        !self.root_types().is_empty()
    }

    pub fn root_types(&self) -> RootTypes {
        self.snapshot.graph.instance(self.inst).root_types()
    }

    /// Shallow size, registered native bytes included.
    pub fn size(&self) -> Size {
        self.snapshot.graph.shallow_size(self.inst)
    }

    pub fn retained_size(&self, heap: HeapRef) -> Size {
        self.snapshot.retained.size(self.inst, heap)
    }

    pub fn total_retained_size(&self) -> Size {
        self.snapshot.retained.total(self.inst)
    }

    pub fn reachability(&self) -> Reachability {
        self.snapshot.reachability(self.inst)
    }

    pub fn is_strongly_reachable(&self) -> bool {
        self.reachability() == Reachability::Strong
    }

    /// Reachable, but only through some `java.lang.ref` referent.
    pub fn is_weakly_reachable(&self) -> bool {
        !matches!(self.reachability(), Reachability::Strong | Reachability::Unreachable)
    }

    pub fn is_unreachable(&self) -> bool {
        self.reachability() == Reachability::Unreachable
    }

    pub fn immediate_dominator(&self) -> Option<InstanceView<'a>> {
        self.snapshot.dominators.immediate_dominator(self.inst.index()).map(|d| self.view(InstanceRef::new(d)))
    }

    /// Instances this one immediately dominates, in index order.
    pub fn dominated(self) -> impl Iterator<Item = InstanceView<'a>> + 'a {
        let snapshot = self.snapshot;
        snapshot.dominators.dominated(self.inst.index()).map(move |d| InstanceView::new(snapshot, InstanceRef::new(d)))
    }

    pub fn hard_reverse_references(self) -> impl Iterator<Item = InstanceView<'a>> + 'a {
        let snapshot = self.snapshot;
        snapshot.walk.hard_reverse_references(self.inst).iter().map(move |&r| InstanceView::new(snapshot, r))
    }

    pub fn soft_reverse_references(self) -> impl Iterator<Item = InstanceView<'a>> + 'a {
        let snapshot = self.snapshot;
        snapshot.walk.soft_reverse_references(self.inst).iter().map(move |&r| InstanceView::new(snapshot, r))
    }

    /// Outgoing references, in field order.
    pub fn references(&self) -> Vec<Reference> {
        self.snapshot.graph.references(self.inst)
    }

    pub fn next_instance_to_gc_root(&self) -> Option<InstanceView<'a>> {
        self.next_step_to_gc_root().map(|(next, _)| next)
    }

    /// The field of [`next_instance_to_gc_root`](Self::next_instance_to_gc_root)
    /// that refers to this instance, such as `.next` or `[3]`.
    pub fn next_field_to_gc_root(&self) -> Option<String> {
        self.next_step_to_gc_root().map(|(_, field)| field)
    }

    fn next_step_to_gc_root(&self) -> Option<(InstanceView<'a>, String)> {
        if self.is_root() {
            return None;
        }
        let link = self.snapshot.walk.path_link(self.inst)?;
        if link.next == InstanceRef::SUPER_ROOT {
            return None;
        }
        Some((self.view(link.next), self.snapshot.graph.edge_label(link.next, link.label)))
    }

    /// The path from a GC root to this instance, this instance last.
    /// Elements on this instance's dominator chain are flagged.
    pub fn path_from_gc_root(&self) -> Vec<PathElement<'a>> {
        let mut path = Vec::new();
        let mut dominator = Some(self.inst);
        let mut step = Some((*self, String::new()));
        while let Some((instance, field)) = step {
            let is_dominator = dominator == Some(instance.inst);
            if is_dominator {
                dominator = self.snapshot.dominators.immediate_dominator(instance.inst.index()).map(InstanceRef::new);
            }
            step = instance.next_step_to_gc_root();
            path.push(PathElement { instance, field, is_dominator });
        }
        path.reverse();
        path
    }

    /// Value of the first field named `name` along the class chain.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.snapshot.graph.field(self.inst, name)
    }

    /// The instance referred to by the field `name`, if non-null.
    pub fn ref_field(&self, name: &str) -> Option<InstanceView<'a>> {
        self.field(name)?.as_instance().map(|inst| self.view(inst))
    }

    /// Fields with their values, own class first.
    pub fn fields(self) -> impl Iterator<Item = (&'a str, Option<Value>)> + 'a {
        self.snapshot.graph.instance_fields(self.inst).map(|(field, value)| (field.name.as_str(), value))
    }

    /// The referent of a `java.lang.ref.Reference`.
    pub fn referent(&self) -> Option<InstanceView<'a>> {
        if self.is_instance_of_class("java.lang.ref.Reference") { self.ref_field("referent") } else { None }
    }

    /// Contents of a `java.lang.String`, cut to `max_chars` characters if
    /// given.
    pub fn as_string(&self, max_chars: Option<usize>) -> Option<String> {
        self.snapshot.graph.as_string(self.inst, max_chars)
    }
}

impl PartialEq for InstanceView<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.snapshot, other.snapshot) && self.inst == other.inst
    }
}

impl Eq for InstanceView<'_> {}

impl fmt::Debug for InstanceView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceView").field("index", &self.inst).field("id", &self.id()).finish()
    }
}

impl fmt::Display for InstanceView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id().0;
        match self.kind() {
            InstanceKind::SuperRoot => write!(f, "SUPER_ROOT"),
            InstanceKind::ClassObj(data) => write!(f, "class {}", data.name),
            InstanceKind::ClassInstance { .. } => write!(f, "{}@{id:08x}", self.class_name()),
            InstanceKind::Array(array) => {
                let name = self.class_name();
                let element = name.strip_suffix("[]").unwrap_or(name);
                write!(f, "{element}[{}]@{id:08x}", array.len())
            }
        }
    }
}

impl fmt::Display for PathElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.instance, self.field)
    }
}
