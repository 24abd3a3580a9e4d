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

//! Instances: the nodes of the object graph

use crate::heapdump::{Field, FieldValue, HeapRef, RootTypes, SiteRef, Type, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The id of an instance as recorded in the heap dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Index of an instance in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstanceRef(u32);

impl InstanceRef {
    /// The synthetic super root always occupies the first arena slot.
    pub const SUPER_ROOT: InstanceRef = InstanceRef(0);

    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// `None` if `index` does not fit an arena slot.
    pub fn try_new(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An arena record. All fields are fixed once the graph is built, except the
/// registered native size, which is folded in before analysis starts.
#[derive(Debug, Clone)]
pub struct Instance {
    pub(crate) id: InstanceId,
    /// `None` only for the super root.
    pub(crate) heap: Option<HeapRef>,
    pub(crate) site: SiteRef,
    pub(crate) class_obj: Option<InstanceRef>,
    pub(crate) root_types: RootTypes,
    pub(crate) registered_native_size: u64,
    pub(crate) kind: InstanceKind,
}

impl Instance {
    pub(crate) fn super_root(site: SiteRef) -> Self {
        Self {
            id: InstanceId(0),
            heap: None,
            site,
            class_obj: None,
            root_types: RootTypes::default(),
            registered_native_size: 0,
            kind: InstanceKind::SuperRoot,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn heap(&self) -> Option<HeapRef> {
        self.heap
    }

    pub fn site(&self) -> SiteRef {
        self.site
    }

    pub fn class_obj(&self) -> Option<InstanceRef> {
        self.class_obj
    }

    pub fn root_types(&self) -> RootTypes {
        self.root_types
    }

    pub fn kind(&self) -> &InstanceKind {
        &self.kind
    }
}

/// The variants of graph nodes.
#[derive(Debug, Clone)]
pub enum InstanceKind {
    /// Synthetic node whose outgoing edges are exactly the GC roots.
    SuperRoot,
    /// An ordinary object. Values follow the field layout of the class chain,
    /// the instance's own class first, then its superclass, and so on.
    ClassInstance { fields: Box<[Option<Value>]> },
    Array(ArrayData),
    ClassObj(Box<ClassObjData>),
}

#[derive(Debug, Clone)]
pub struct ArrayData {
    pub element_type: Type,
    pub values: Box<[Option<Value>]>,
}

impl ArrayData {
    pub fn new(element_type: Type, values: Vec<Option<Value>>) -> Self {
        Self { element_type, values: values.into_boxed_slice() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Class object payload: static state plus the layout of its instances.
#[derive(Debug, Clone, Default)]
pub struct ClassObjData {
    pub name: String,
    pub super_class: Option<InstanceRef>,
    pub class_loader: Option<InstanceRef>,
    /// Shallow size of instances of this class.
    pub instance_size: u64,
    /// Fields declared by this class, not including inherited ones.
    pub instance_fields: Vec<Field>,
    pub static_fields_size: u64,
    pub static_values: Vec<FieldValue>,
}

impl ClassObjData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_super_class(mut self, super_class: InstanceRef) -> Self {
        self.super_class = Some(super_class);
        self
    }

    pub fn with_class_loader(mut self, loader: InstanceRef) -> Self {
        self.class_loader = Some(loader);
        self
    }

    pub fn with_instance_size(mut self, size: u64) -> Self {
        self.instance_size = size;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.instance_fields.push(Field::new(name, ty));
        self
    }

    pub fn with_static_fields_size(mut self, size: u64) -> Self {
        self.static_fields_size = size;
        self
    }

    pub fn with_static(mut self, name: impl Into<String>, ty: Type, value: Option<Value>) -> Self {
        self.static_values.push(FieldValue::new(name, ty, value));
        self
    }
}
