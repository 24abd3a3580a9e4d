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

//! Allocation sites

use crate::heapdump::{HeapRef, InstanceRef, Reachability, Size};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a site in the site table. The root site is index 0, and a
/// site's parent always has a smaller index than the site itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SiteRef(u32);

impl SiteRef {
    pub const ROOT: SiteRef = SiteRef(0);

    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// `None` if `index` does not fit the site table.
    pub fn try_new(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The stack frame a site corresponds to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub method: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub line: i32,
}

impl StackFrame {
    pub fn new(method: impl Into<String>, signature: impl Into<String>, filename: impl Into<String>, line: i32) -> Self {
        Self {
            method: method.into(),
            signature: signature.into(),
            filename: filename.into(),
            line,
        }
    }
}

/// Summary of the instances of one class on one heap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectsInfo {
    pub heap: HeapRef,
    pub class_obj: Option<InstanceRef>,
    pub num_instances: u64,
    pub num_bytes: Size,
}

/// A node of the allocation site tree.
#[derive(Debug, Clone)]
pub struct Site {
    index: SiteRef,
    parent: Option<SiteRef>,
    frame: StackFrame,
    children: Vec<SiteRef>,
    /// Instances allocated exactly at this site.
    instances: Vec<InstanceRef>,
    /// Per-heap size of retained instances allocated at this site or below.
    sizes_by_heap: Vec<Size>,
    objects_infos: BTreeMap<(HeapRef, Option<InstanceRef>), ObjectsInfo>,
}

impl Site {
    pub(crate) fn root() -> Self {
        Self::new(SiteRef::ROOT, None, StackFrame::new("ROOT", "", "", 0))
    }

    pub(crate) fn new(index: SiteRef, parent: Option<SiteRef>, frame: StackFrame) -> Self {
        Self {
            index,
            parent,
            frame,
            children: Vec::new(),
            instances: Vec::new(),
            sizes_by_heap: Vec::new(),
            objects_infos: BTreeMap::new(),
        }
    }

    /// The site id. Ids are the site's position in the site table, the root
    /// site being 0.
    pub fn id(&self) -> u64 {
        self.index.0 as u64
    }

    pub fn index(&self) -> SiteRef {
        self.index
    }

    pub fn parent(&self) -> Option<SiteRef> {
        self.parent
    }

    pub fn frame(&self) -> &StackFrame {
        &self.frame
    }

    pub fn method_name(&self) -> &str {
        &self.frame.method
    }

    pub fn signature(&self) -> &str {
        &self.frame.signature
    }

    pub fn filename(&self) -> &str {
        &self.frame.filename
    }

    pub fn line_number(&self) -> i32 {
        self.frame.line
    }

    pub fn children(&self) -> &[SiteRef] {
        &self.children
    }

    /// Instances allocated directly at this site, excluding child sites.
    pub fn instances(&self) -> &[InstanceRef] {
        &self.instances
    }

    /// Size of the retained instances on `heap` allocated at this site or
    /// any of its descendants.
    pub fn size(&self, heap: HeapRef) -> Size {
        self.sizes_by_heap.get(heap.index()).copied().unwrap_or(Size::ZERO)
    }

    pub fn total_size(&self) -> Size {
        self.sizes_by_heap.iter().copied().sum()
    }

    /// Per (heap, class) statistics for retained instances allocated at this
    /// site or any of its descendants, ordered by heap then class.
    pub fn objects_infos(&self) -> impl Iterator<Item = &ObjectsInfo> {
        self.objects_infos.values()
    }

    pub(crate) fn add_child(&mut self, child: SiteRef) {
        self.children.push(child);
    }

    pub(crate) fn add_instance(&mut self, inst: InstanceRef) {
        self.instances.push(inst);
    }

    fn record(&mut self, heap: HeapRef, class_obj: Option<InstanceRef>, num_instances: u64, num_bytes: Size) {
        self.sizes_by_heap[heap.index()] += num_bytes;
        let info = self.objects_infos.entry((heap, class_obj)).or_insert(ObjectsInfo {
            heap,
            class_obj,
            num_instances: 0,
            num_bytes: Size::ZERO,
        });
        info.num_instances += num_instances;
        info.num_bytes += num_bytes;
    }
}

/// What the site statistics need to know about an instance.
pub(crate) struct SiteSample {
    pub heap: HeapRef,
    pub class_obj: Option<InstanceRef>,
    pub size: Size,
    pub reachability: Reachability,
}

/// Computes sizes and objects infos for every site of the tree, counting
/// only instances whose reachability is not weaker than `retained`.
/// Instances `sample` returns `None` for are skipped.
///
/// Parents precede their children in `sites`, so a reverse sweep visits
/// every child before its parent.
pub(crate) fn compute_site_statistics(sites: &mut [Site], num_heaps: usize, retained: Reachability, sample: impl Fn(InstanceRef) -> Option<SiteSample>) {
    for index in (0..sites.len()).rev() {
        let (head, tail) = sites.split_at_mut(index + 1);
        let site = &mut head[index];
        site.sizes_by_heap = vec![Size::ZERO; num_heaps];
        site.objects_infos.clear();

        for i in 0..site.instances.len() {
            if let Some(s) = sample(site.instances[i]).filter(|s| s.reachability.not_weaker_than(retained)) {
                site.record(s.heap, s.class_obj, 1, s.size);
            }
        }

        for c in 0..site.children.len() {
            let child = &tail[site.children[c].index() - index - 1];
            for info in child.objects_infos.values() {
                site.record(info.heap, info.class_obj, info.num_instances, info.num_bytes);
            }
        }
    }
}
