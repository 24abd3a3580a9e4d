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

//! Analysed heap snapshots

mod view;

pub use view::{InstanceView, PathElement};

use crate::analysis::{DominatorTree, ReachabilityWalk, RetainedSizes, StrongReferences};
use crate::config::SnapshotConfig;
use crate::heapdump::site::{SiteSample, compute_site_statistics};
use crate::heapdump::{Heap, HeapGraph, InstanceId, InstanceKind, InstanceRef, Reachability, Site, SiteRef, native};
use crate::progress::{NullProgress, Progress, TracingProgress};
use crate::sort;
use metrics::{counter, gauge, histogram};
use std::time::Instant;
use tracing::{info, instrument};

/// A heap graph together with everything derived from it: reachability,
/// paths to GC roots, dominators, retained sizes and site statistics.
///
/// All analysis happens in [`Snapshot::new`]; afterwards the snapshot is
/// immutable and every query is a lookup.
#[derive(Debug, Clone)]
pub struct Snapshot {
    graph: HeapGraph,
    config: SnapshotConfig,
    walk: ReachabilityWalk,
    dominators: DominatorTree,
    retained: RetainedSizes,
}

impl Snapshot {
    pub fn new(graph: HeapGraph, config: SnapshotConfig) -> Self {
        if config.log_progress {
            Self::with_progress(graph, config, &mut TracingProgress::new())
        } else {
            Self::with_progress(graph, config, &mut NullProgress)
        }
    }

    #[instrument(skip_all, fields(instances = graph.len() - 1))]
    pub fn with_progress(mut graph: HeapGraph, config: SnapshotConfig, progress: &mut dyn Progress) -> Self {
        let started = Instant::now();
        let native_allocations = native::apply_registered_native_sizes(&mut graph);

        let pass = Instant::now();
        let walk = ReachabilityWalk::run(&graph, progress);
        histogram!("dotheap_pass_duration_seconds", pass.elapsed().as_secs_f64(), "pass" => "reachability");

        let pass = Instant::now();
        let dominators = DominatorTree::compute(&StrongReferences::new(&graph), InstanceRef::SUPER_ROOT.index());
        histogram!("dotheap_pass_duration_seconds", pass.elapsed().as_secs_f64(), "pass" => "dominators");

        let pass = Instant::now();
        let retained = RetainedSizes::compute(&graph, &dominators, progress);
        histogram!("dotheap_pass_duration_seconds", pass.elapsed().as_secs_f64(), "pass" => "retained");

        for heap in &mut graph.heaps {
            heap.add_to_size(retained.size(InstanceRef::SUPER_ROOT, heap.index()));
            gauge!("dotheap_heap_size_bytes", heap.size().total() as f64, "heap" => heap.name().to_string());
        }

        let mut sites = std::mem::take(&mut graph.sites);
        compute_site_statistics(&mut sites, graph.heaps.len(), config.retained, |inst| {
            let instance = graph.instance(inst);
            Some(SiteSample {
                heap: instance.heap()?,
                class_obj: instance.class_obj(),
                size: graph.shallow_size(inst),
                reachability: walk.reachability(inst),
            })
        });
        graph.sites = sites;

        let instances = graph.len() - 1;
        counter!("dotheap_instances_analysed", instances as u64);
        info!(
            instances,
            reachable = walk.reached_count(),
            strongly_reachable = dominators.reachable_count() - 1,
            native_allocations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Snapshot analysed"
        );

        Self {
            graph,
            config,
            walk,
            dominators,
            retained,
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn graph(&self) -> &HeapGraph {
        &self.graph
    }

    pub fn instance(&self, inst: InstanceRef) -> InstanceView<'_> {
        InstanceView::new(self, inst)
    }

    pub fn find_instance(&self, id: InstanceId) -> Option<InstanceView<'_>> {
        self.graph.find(id).map(|inst| self.instance(inst))
    }

    /// The first class object named `name`.
    pub fn find_class_obj(&self, name: &str) -> Option<InstanceView<'_>> {
        self.instances().find(|inst| matches!(inst.kind(), InstanceKind::ClassObj(data) if data.name == name))
    }

    pub fn super_root(&self) -> InstanceView<'_> {
        self.instance(InstanceRef::SUPER_ROOT)
    }

    /// Every instance of the graph, the super root excluded.
    pub fn instances(&self) -> impl Iterator<Item = InstanceView<'_>> + '_ {
        (1..self.graph.len()).map(|i| self.instance(InstanceRef::new(i)))
    }

    /// Instances immediately dominated by the super root.
    pub fn rooted(&self) -> impl Iterator<Item = InstanceView<'_>> + '_ {
        self.dominators.dominated(InstanceRef::SUPER_ROOT.index()).map(|i| self.instance(InstanceRef::new(i)))
    }

    /// [`rooted`](Snapshot::rooted), largest total retained size first.
    pub fn rooted_by_retained_size(&self) -> Vec<InstanceView<'_>> {
        let mut rooted: Vec<_> = self.rooted().collect();
        rooted.sort_by(sort::by_total_retained_size);
        rooted
    }

    pub fn heaps(&self) -> &[Heap] {
        self.graph.heaps()
    }

    pub fn heap(&self, name: &str) -> Option<&Heap> {
        self.graph.heaps().iter().find(|h| h.name() == name)
    }

    pub fn root_site(&self) -> &Site {
        self.graph.site(SiteRef::ROOT)
    }

    pub fn site(&self, id: u64) -> Option<&Site> {
        self.graph.sites().get(usize::try_from(id).ok()?)
    }

    /// The site with the given id, or the root site if there is none.
    pub fn site_or_root(&self, id: u64) -> &Site {
        self.site(id).unwrap_or_else(|| self.root_site())
    }

    /// Instances allocated at `site` or any of its descendants that match
    /// `predicate`, in site order.
    pub fn objects(&self, site: SiteRef, predicate: impl Fn(&InstanceView<'_>) -> bool) -> Vec<InstanceView<'_>> {
        let mut objects = Vec::new();
        let mut stack = vec![site];
        while let Some(site) = stack.pop() {
            let site = self.graph.site(site);
            objects.extend(site.instances().iter().map(|&inst| self.instance(inst)).filter(|inst| predicate(inst)));
            stack.extend(site.children().iter().rev());
        }
        objects
    }

    /// Retained instances below `site`, optionally restricted to a class
    /// (and, with `subclass`, its subclasses) and to a heap.
    pub fn objects_of_class(&self, site: SiteRef, class_name: Option<&str>, subclass: bool, heap_name: Option<&str>) -> Vec<InstanceView<'_>> {
        self.objects(site, |inst| {
            let in_heap = heap_name.is_none_or(|name| inst.heap().is_some_and(|h| h.name() == name));
            let of_class = class_name.is_none_or(|name| if subclass { inst.is_instance_of_class(name) } else { inst.class_name() == name });
            in_heap && of_class && inst.reachability().not_weaker_than(self.config.retained)
        })
    }

    pub(crate) fn reachability(&self, inst: InstanceRef) -> Reachability {
        self.walk.reachability(inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heapdump::{ArrayData, ClassObjData, HeapGraphBuilder, RootType, Size, Type, Value};
    use crate::progress::MockProgress;
    use mockall::Sequence;

    fn graph() -> HeapGraph {
        let mut builder = HeapGraphBuilder::new();
        let heap = builder.add_heap("app");
        let site = builder.root_site();
        let string = builder
            .add_class_obj(
                InstanceId(1),
                heap,
                site,
                None,
                ClassObjData::new("java.lang.String").with_instance_size(16).with_field("value", Type::Object).with_field("count", Type::Int),
            )
            .unwrap();
        let chars_class = builder.add_class_obj(InstanceId(2), heap, site, None, ClassObjData::new("char[]").with_instance_size(12)).unwrap();
        let chars: Vec<Option<Value>> = "dotheap".encode_utf16().map(|c| Some(Value::Char(c))).collect();
        let array = builder.add_array_instance(InstanceId(0x20), heap, site, Some(chars_class), ArrayData::new(Type::Char, chars)).unwrap();
        builder.add_class_instance(InstanceId(0x10), heap, site, string, vec![Some(Value::Instance(array)), Some(Value::Int(3))]).unwrap();
        builder.add_root(RootType::InternedString, InstanceId(0x10));
        builder.build().unwrap()
    }

    #[test]
    fn test_progress_phases_in_order() {
        let mut progress = MockProgress::new();
        let mut seq = Sequence::new();
        progress.expect_start().withf(|d, _| d == "Computing reachability").times(1).in_sequence(&mut seq).return_const(());
        progress.expect_advance().times(2).in_sequence(&mut seq).return_const(());
        progress.expect_done().times(1).in_sequence(&mut seq).return_const(());
        progress.expect_start().withf(|d, n| d == "Computing retained sizes" && *n == 3).times(1).in_sequence(&mut seq).return_const(());
        progress.expect_update().withf(|current| *current == 3).times(1).in_sequence(&mut seq).return_const(());
        progress.expect_done().times(1).in_sequence(&mut seq).return_const(());

        Snapshot::with_progress(graph(), SnapshotConfig::default(), &mut progress);
    }

    #[test]
    fn test_instance_views() {
        let snapshot = Snapshot::new(graph(), SnapshotConfig::default());
        let string = snapshot.find_instance(InstanceId(0x10)).unwrap();
        let array = string.ref_field("value").unwrap();

        assert_eq!(string.to_string(), "java.lang.String@00000010");
        assert_eq!(array.to_string(), "char[7]@00000020");
        assert_eq!(string.as_string(None).as_deref(), Some("dot"));
        assert_eq!(string.as_string(Some(2)).as_deref(), Some("do"));
        assert_eq!(string.field("count"), Some(Value::Int(3)));
        assert_eq!(string.fields().map(|(name, _)| name).collect::<Vec<_>>(), vec!["value", "count"]);
        assert!(string.referent().is_none());

        assert_eq!(array.array_values().map(|v| v.len()), Some(7));
        assert!(array.is_array_instance());
        assert_eq!(array.immediate_dominator(), Some(string));
        assert_eq!(string.dominated().collect::<Vec<_>>(), vec![array]);
        assert_eq!(string.total_retained_size(), Size::new(16 + 12 + 14, 0));
        assert_eq!(array.site().id(), 0);
        assert_eq!(array.heap().map(|h| h.name()), Some("app"));
        assert!(snapshot.super_root().heap().is_none());
    }
}
