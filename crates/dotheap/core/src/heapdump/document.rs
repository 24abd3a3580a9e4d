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

//! JSON description of a heap graph
//!
//! A [`GraphDocument`] carries the same information as the calls made on a
//! [`HeapGraphBuilder`], keyed by dump ids instead of arena indices:
//!
//! ```json
//! {
//!   "heaps": ["app"],
//!   "classes": [{ "id": 1, "heap": "app", "name": "Node", "instance_size": 16,
//!                 "fields": [{ "name": "next", "type": "object" }] }],
//!   "instances": [{ "id": 2, "heap": "app", "class_obj": 1, "fields": [{ "ref": 3 }] },
//!                 { "id": 3, "heap": "app", "class_obj": 1, "fields": [null] }],
//!   "roots": [{ "type": "jni_global", "id": 2 }]
//! }
//! ```

use crate::error::{GraphError, GraphResult};
use crate::heapdump::{ArrayData, ClassObjData, Field, FieldValue, HeapGraph, HeapGraphBuilder, HeapRef, InstanceId, RootType, SiteRef, StackFrame, Type, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default = "default_id_size")]
    pub id_size: u32,
    #[serde(default)]
    pub heaps: Vec<String>,
    /// Sites other than the root site (id 0). Parents must be listed before
    /// their children.
    #[serde(default)]
    pub sites: Vec<DocSite>,
    #[serde(default)]
    pub classes: Vec<DocClass>,
    #[serde(default)]
    pub instances: Vec<DocInstance>,
    #[serde(default)]
    pub arrays: Vec<DocArray>,
    #[serde(default)]
    pub roots: Vec<DocRoot>,
    #[serde(default)]
    pub native_allocations: Vec<DocNativeAllocation>,
}

fn default_id_size() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSite {
    pub id: u64,
    #[serde(default)]
    pub parent: u64,
    #[serde(flatten)]
    pub frame: StackFrame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocClass {
    pub id: InstanceId,
    pub heap: String,
    #[serde(default)]
    pub site: u64,
    #[serde(default)]
    pub class_obj: Option<InstanceId>,
    pub name: String,
    #[serde(default)]
    pub super_class: Option<InstanceId>,
    #[serde(default)]
    pub class_loader: Option<InstanceId>,
    #[serde(default)]
    pub instance_size: u64,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub static_fields_size: u64,
    #[serde(default)]
    pub statics: Vec<DocStatic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocStatic {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub value: Option<DocValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocInstance {
    pub id: InstanceId,
    pub heap: String,
    #[serde(default)]
    pub site: u64,
    pub class_obj: InstanceId,
    /// Values in class chain order, own class first.
    #[serde(default)]
    pub fields: Vec<Option<DocValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocArray {
    pub id: InstanceId,
    pub heap: String,
    #[serde(default)]
    pub site: u64,
    #[serde(default)]
    pub class_obj: Option<InstanceId>,
    pub element_type: Type,
    #[serde(default)]
    pub values: Vec<Option<DocValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRoot {
    #[serde(rename = "type")]
    pub root_type: RootType,
    pub id: InstanceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocNativeAllocation {
    pub owner: InstanceId,
    pub referent: InstanceId,
    pub size: u64,
}

/// A value keyed by dump id, written `{"ref": 16}`, `{"int": 3}` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocValue {
    Ref(InstanceId),
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl GraphDocument {
    pub fn from_json(json: &str) -> GraphResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> GraphResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn into_graph(self) -> GraphResult<HeapGraph> {
        let mut builder = HeapGraphBuilder::new().with_id_size(self.id_size);
        for heap in &self.heaps {
            builder.add_heap(heap.as_str());
        }

        let mut sites = HashMap::from([(0u64, builder.root_site())]);
        for site in self.sites {
            let parent = *sites.get(&site.parent).ok_or(GraphError::UnknownSite(site.parent as usize))?;
            let index = builder.add_site(parent, site.frame)?;
            sites.insert(site.id, index);
        }

        let heap = |builder: &HeapGraphBuilder, name: &str| builder.heap(name).ok_or_else(|| GraphError::UnknownHeap(name.to_string()));
        let site = |id: u64| sites.get(&id).copied().ok_or(GraphError::UnknownSite(id as usize));

        for class in self.classes {
            let heap_ref = heap(&builder, &class.heap)?;
            let site_ref = site(class.site)?;
            let mut data = ClassObjData::new(class.name).with_instance_size(class.instance_size).with_static_fields_size(class.static_fields_size);
            data.super_class = class.super_class.map(|id| builder.reference(id));
            data.class_loader = class.class_loader.map(|id| builder.reference(id));
            data.instance_fields = class.fields;
            for s in class.statics {
                let value = s.value.map(|v| resolve(&mut builder, v));
                data.static_values.push(FieldValue::new(s.name, s.ty, value));
            }
            let class_obj = class.class_obj.map(|id| builder.reference(id));
            builder.add_class_obj(class.id, heap_ref, site_ref, class_obj, data)?;
        }

        for inst in self.instances {
            let heap_ref = heap(&builder, &inst.heap)?;
            let site_ref = site(inst.site)?;
            let class_obj = builder.reference(inst.class_obj);
            let fields = resolve_all(&mut builder, inst.fields);
            builder.add_class_instance(inst.id, heap_ref, site_ref, class_obj, fields)?;
        }

        for array in self.arrays {
            let heap_ref: HeapRef = heap(&builder, &array.heap)?;
            let site_ref: SiteRef = site(array.site)?;
            let class_obj = array.class_obj.map(|id| builder.reference(id));
            let values = resolve_all(&mut builder, array.values);
            builder.add_array_instance(array.id, heap_ref, site_ref, class_obj, ArrayData::new(array.element_type, values))?;
        }

        for root in self.roots {
            builder.add_root(root.root_type, root.id);
        }

        for native in self.native_allocations {
            let owner = builder.reference(native.owner);
            let referent = builder.reference(native.referent);
            builder.register_native_allocation(owner, referent, native.size);
        }

        builder.build()
    }
}

fn resolve(builder: &mut HeapGraphBuilder, value: DocValue) -> Value {
    match value {
        DocValue::Ref(id) => Value::Instance(builder.reference(id)),
        DocValue::Boolean(v) => Value::Boolean(v),
        DocValue::Byte(v) => Value::Byte(v),
        DocValue::Char(v) => Value::Char(v),
        DocValue::Short(v) => Value::Short(v),
        DocValue::Int(v) => Value::Int(v),
        DocValue::Long(v) => Value::Long(v),
        DocValue::Float(v) => Value::Float(v),
        DocValue::Double(v) => Value::Double(v),
    }
}

fn resolve_all(builder: &mut HeapGraphBuilder, values: Vec<Option<DocValue>>) -> Vec<Option<Value>> {
    values.into_iter().map(|v| v.map(|v| resolve(builder, v))).collect()
}
