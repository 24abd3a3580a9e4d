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

//! Shared graph fixtures for integration tests

#![allow(dead_code)]

use dotheap_core::heapdump::{ClassObjData, HeapGraph, HeapGraphBuilder, HeapRef, InstanceId, InstanceRef, RootType, SiteRef, StackFrame, Type, Value};
use dotheap_core::{Snapshot, SnapshotConfig};
use std::collections::HashMap;

/// Number of reference fields of every fixture node.
pub const NODE_FIELDS: usize = 4;

/// Builds graphs of sized nodes with up to [`NODE_FIELDS`] outgoing
/// references each. Every node size gets its own class, so the shallow size
/// of a node is exactly the size it was declared with.
pub struct GraphFixture {
    pub builder: HeapGraphBuilder,
    pub heap: HeapRef,
    node_classes: HashMap<u64, InstanceRef>,
    reference_classes: HashMap<&'static str, InstanceRef>,
    next_class_id: u64,
}

impl GraphFixture {
    pub fn new() -> Self {
        let mut builder = HeapGraphBuilder::new();
        let heap = builder.add_heap("app");
        Self {
            builder,
            heap,
            node_classes: HashMap::new(),
            reference_classes: HashMap::new(),
            next_class_id: 1 << 40,
        }
    }

    fn next_class_id(&mut self) -> InstanceId {
        self.next_class_id += 1;
        InstanceId(self.next_class_id)
    }

    fn node_class(&mut self, size: u64) -> InstanceRef {
        if let Some(&class) = self.node_classes.get(&size) {
            return class;
        }
        let mut data = ClassObjData::new(format!("Node{size}")).with_instance_size(size);
        for i in 0..NODE_FIELDS {
            data = data.with_field(format!("f{i}"), Type::Object);
        }
        let id = self.next_class_id();
        let class = self.builder.add_class_obj(id, self.heap, SiteRef::ROOT, None, data).unwrap();
        self.node_classes.insert(size, class);
        class
    }

    fn reference_class(&mut self, name: &'static str) -> InstanceRef {
        if let Some(&class) = self.reference_classes.get(name) {
            return class;
        }
        let data = if name == "java.lang.ref.Reference" {
            ClassObjData::new(name).with_instance_size(16).with_field("referent", Type::Object)
        } else {
            let base = self.reference_class("java.lang.ref.Reference");
            ClassObjData::new(name).with_super_class(base).with_instance_size(16)
        };
        let id = self.next_class_id();
        let class = self.builder.add_class_obj(id, self.heap, SiteRef::ROOT, None, data).unwrap();
        self.reference_classes.insert(name, class);
        class
    }

    pub fn site(&mut self, parent: SiteRef, method: &str) -> SiteRef {
        self.builder.add_site(parent, StackFrame::new(method, "()V", "Test.java", 1)).unwrap()
    }

    pub fn node(&mut self, id: u64, size: u64, refs: &[u64]) -> InstanceRef {
        self.node_at(SiteRef::ROOT, id, size, refs)
    }

    pub fn node_at(&mut self, site: SiteRef, id: u64, size: u64, refs: &[u64]) -> InstanceRef {
        assert!(refs.len() <= NODE_FIELDS);
        let class = self.node_class(size);
        let mut fields: Vec<Option<Value>> = refs.iter().map(|&r| Some(Value::Instance(self.builder.reference(InstanceId(r))))).collect();
        fields.resize(NODE_FIELDS, None);
        self.builder.add_class_instance(InstanceId(id), self.heap, site, class, fields).unwrap()
    }

    /// An instance of `class_name` (one of the `java.lang.ref` reference
    /// classes) with the given referent. Its shallow size is 16.
    pub fn reference(&mut self, class_name: &'static str, id: u64, referent: u64) -> InstanceRef {
        let class = self.reference_class(class_name);
        let referent = self.builder.reference(InstanceId(referent));
        self.builder.add_class_instance(InstanceId(id), self.heap, SiteRef::ROOT, class, vec![Some(Value::Instance(referent))]).unwrap()
    }

    pub fn weak(&mut self, id: u64, referent: u64) -> InstanceRef {
        self.reference("java.lang.ref.WeakReference", id, referent)
    }

    pub fn soft(&mut self, id: u64, referent: u64) -> InstanceRef {
        self.reference("java.lang.ref.SoftReference", id, referent)
    }

    pub fn root(&mut self, id: u64) {
        self.builder.add_root(RootType::JniGlobal, InstanceId(id));
    }

    pub fn graph(self) -> HeapGraph {
        self.builder.build().unwrap()
    }

    pub fn snapshot(self) -> Snapshot {
        Snapshot::new(self.graph(), SnapshotConfig::default())
    }

    pub fn snapshot_with(self, config: SnapshotConfig) -> Snapshot {
        Snapshot::new(self.graph(), config)
    }
}

pub fn dominator_id(snapshot: &Snapshot, id: u64) -> Option<u64> {
    snapshot.find_instance(InstanceId(id)).unwrap().immediate_dominator().map(|d| d.id().0)
}

pub fn retained(snapshot: &Snapshot, id: u64) -> u64 {
    snapshot.find_instance(InstanceId(id)).unwrap().total_retained_size().total()
}
