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

//! Comparing two snapshots

use crate::heapdump::Size;
use crate::snapshot::Snapshot;
use crate::sort;
use serde::Serialize;
use std::collections::BTreeMap;

/// How an entry differs between the baseline and the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Added,
    Removed,
    Changed,
    Unchanged,
}

impl Change {
    fn of<T: PartialEq>(baseline: &Option<T>, current: &Option<T>) -> Self {
        match (baseline, current) {
            (None, _) => Change::Added,
            (_, None) => Change::Removed,
            (Some(b), Some(c)) if b == c => Change::Unchanged,
            _ => Change::Changed,
        }
    }
}

/// Total size of a heap, matched by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeapDiff {
    pub heap: String,
    pub baseline: Option<Size>,
    pub current: Option<Size>,
}

impl HeapDiff {
    pub fn change(&self) -> Change {
        Change::of(&self.baseline, &self.current)
    }

    /// Growth in bytes from baseline to current.
    pub fn delta(&self) -> i64 {
        delta(self.baseline.map(|s| s.total()), self.current.map(|s| s.total()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    pub num_instances: u64,
    pub num_bytes: Size,
}

/// Retained instances of one class on one heap, matched by heap and class
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDiff {
    pub heap: String,
    pub class_name: String,
    pub baseline: Option<ClassStats>,
    pub current: Option<ClassStats>,
}

impl ClassDiff {
    pub fn change(&self) -> Change {
        Change::of(&self.baseline, &self.current)
    }

    pub fn delta(&self) -> i64 {
        delta(self.baseline.map(|s| s.num_bytes.total()), self.current.map(|s| s.num_bytes.total()))
    }
}

fn delta(baseline: Option<u64>, current: Option<u64>) -> i64 {
    current.unwrap_or(0) as i64 - baseline.unwrap_or(0) as i64
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    /// Ordered by heap name.
    pub heaps: Vec<HeapDiff>,
    /// Ordered by heap name, then class name.
    pub classes: Vec<ClassDiff>,
}

impl SnapshotDiff {
    /// Classes that were added, removed or changed.
    pub fn changed_classes(&self) -> impl Iterator<Item = &ClassDiff> {
        self.classes.iter().filter(|c| c.change() != Change::Unchanged)
    }
}

/// Compares heap totals and the per-class statistics of the root sites.
pub fn diff_snapshots(baseline: &Snapshot, current: &Snapshot) -> SnapshotDiff {
    let mut heaps: BTreeMap<String, HeapDiff> = BTreeMap::new();
    for (snapshot, is_baseline) in [(baseline, true), (current, false)] {
        for heap in snapshot.heaps() {
            let entry = heaps.entry(heap.name().to_string()).or_insert_with(|| HeapDiff {
                heap: heap.name().to_string(),
                baseline: None,
                current: None,
            });
            let side = if is_baseline { &mut entry.baseline } else { &mut entry.current };
            *side = Some(heap.size());
        }
    }

    let mut classes: BTreeMap<(String, String), ClassDiff> = BTreeMap::new();
    for (snapshot, is_baseline) in [(baseline, true), (current, false)] {
        let graph = snapshot.graph();
        for info in snapshot.root_site().objects_infos() {
            let heap = graph.heaps()[info.heap.index()].name().to_string();
            let class_name = sort::class_name(graph, info).to_string();
            let entry = classes.entry((heap.clone(), class_name.clone())).or_insert_with(|| ClassDiff {
                heap,
                class_name,
                baseline: None,
                current: None,
            });
            let side = if is_baseline { &mut entry.baseline } else { &mut entry.current };
            let stats = side.get_or_insert_with(ClassStats::default);
            stats.num_instances += info.num_instances;
            stats.num_bytes += info.num_bytes;
        }
    }

    SnapshotDiff {
        heaps: heaps.into_values().collect(),
        classes: classes.into_values().collect(),
    }
}
