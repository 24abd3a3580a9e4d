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

//! Retained sizes over the dominator tree

use crate::analysis::DominatorTree;
use crate::heapdump::{HeapGraph, HeapRef, InstanceRef, Size};
use crate::progress::Progress;
use tracing::{debug, instrument};

/// Finished nodes between two progress updates.
const PROGRESS_BATCH: u64 = 4096;

/// Per-heap retained sizes of every instance, stored as one flat table of
/// `instances * heaps` entries.
#[derive(Debug, Clone)]
pub struct RetainedSizes {
    num_heaps: usize,
    sizes: Vec<Size>,
}

impl RetainedSizes {
    /// An instance retains its own shallow size plus the retained sizes of
    /// the instances it immediately dominates. Instances outside the
    /// dominator tree retain only themselves and are counted nowhere else.
    ///
    /// Each node is visited twice from an explicit stack: once to schedule
    /// its children, once to fold their finished sizes into its own.
    #[instrument(skip_all)]
    pub fn compute(graph: &HeapGraph, tree: &DominatorTree, progress: &mut dyn Progress) -> Self {
        let num_heaps = graph.heaps().len();
        let mut sizes = vec![Size::ZERO; graph.len() * num_heaps];
        for i in 1..graph.len() {
            let inst = InstanceRef::new(i);
            if let Some(heap) = graph.instance(inst).heap() {
                sizes[i * num_heaps + heap.index()] = graph.shallow_size(inst);
            }
        }

        progress.start("Computing retained sizes", tree.reachable_count() as u64);
        let mut finished = 0u64;
        let mut stack = vec![(tree.root(), false)];
        while let Some((node, prepared)) = stack.pop() {
            if !prepared {
                stack.push((node, true));
                stack.extend(tree.dominated(node).map(|child| (child, false)));
                continue;
            }
            for child in tree.dominated(node) {
                for h in 0..num_heaps {
                    let size = sizes[child * num_heaps + h];
                    sizes[node * num_heaps + h] += size;
                }
            }
            finished += 1;
            if finished % PROGRESS_BATCH == 0 {
                progress.update(finished);
            }
        }
        progress.update(finished);
        progress.done();

        debug!(heaps = num_heaps, "Retained sizes computed");
        Self { num_heaps, sizes }
    }

    pub fn size(&self, inst: InstanceRef, heap: HeapRef) -> Size {
        self.sizes[inst.index() * self.num_heaps + heap.index()]
    }

    /// Retained sizes of `inst` indexed by heap.
    pub fn sizes(&self, inst: InstanceRef) -> &[Size] {
        let start = inst.index() * self.num_heaps;
        &self.sizes[start..start + self.num_heaps]
    }

    pub fn total(&self, inst: InstanceRef) -> Size {
        self.sizes(inst).iter().copied().sum()
    }
}
