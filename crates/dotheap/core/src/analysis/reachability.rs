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

//! Two-phase reachability walk from the super root

use crate::heapdump::{EdgeLabel, HeapGraph, InstanceRef, Reachability, Reference};
use crate::progress::Progress;
use std::collections::VecDeque;
use tracing::{debug, instrument};

/// The edge an instance was first reached through, pointing one step
/// closer to a GC root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLink {
    pub next: InstanceRef,
    pub label: EdgeLabel,
    pub reachability: Reachability,
}

/// Result of the reachability walk: one path link and reachability class
/// per reached instance, and the hard and soft reverse references of every
/// instance.
#[derive(Debug, Clone)]
pub struct ReachabilityWalk {
    links: Vec<Option<PathLink>>,
    /// Weakest reference kind on the path link chain back to the super root.
    reachability: Vec<Reachability>,
    hard_reverse: Vec<Vec<InstanceRef>>,
    soft_reverse: Vec<Vec<InstanceRef>>,
    reached: usize,
}

impl ReachabilityWalk {
    /// Walks every reference reachable from the super root.
    ///
    /// Strong references are followed first, so every instance reachable
    /// through strong references alone gets a strong path. The weak queue
    /// is drained afterwards; anything first reached from it is weakly
    /// reachable, and so is everything it references.
    #[instrument(skip_all)]
    pub fn run(graph: &HeapGraph, progress: &mut dyn Progress) -> Self {
        let n = graph.len();
        let mut walk = Self {
            links: vec![None; n],
            reachability: vec![Reachability::Unreachable; n],
            hard_reverse: vec![Vec::new(); n],
            soft_reverse: vec![Vec::new(); n],
            reached: 0,
        };
        let mut visited = vec![false; n];
        visited[InstanceRef::SUPER_ROOT.index()] = true;
        walk.reachability[InstanceRef::SUPER_ROOT.index()] = Reachability::Strong;

        progress.start("Computing reachability", n.saturating_sub(1) as u64);

        let mut strong = VecDeque::new();
        let mut weak = VecDeque::new();
        graph.for_each_reference(InstanceRef::SUPER_ROOT, |r| strong.push_back(r));

        while let Some(r) = strong.pop_front() {
            if r.src != InstanceRef::SUPER_ROOT {
                walk.hard_reverse[r.target.index()].push(r.src);
            }
            if walk.first_visit(&mut visited, &r) {
                progress.advance(1);
                graph.for_each_reference(r.target, |next| {
                    if next.is_strong() {
                        strong.push_back(next)
                    } else {
                        weak.push_back(next)
                    }
                });
            }
        }
        let strongly_reached = walk.reached;

        while let Some(r) = weak.pop_front() {
            if r.is_strong() {
                walk.hard_reverse[r.target.index()].push(r.src);
            } else {
                walk.soft_reverse[r.target.index()].push(r.src);
            }
            if walk.first_visit(&mut visited, &r) {
                progress.advance(1);
                graph.for_each_reference(r.target, |next| weak.push_back(next));
            }
        }

        progress.done();
        debug!(strongly_reached, weakly_reached = walk.reached - strongly_reached, unreachable = n - 1 - walk.reached, "Reachability walk complete");
        walk
    }

    fn first_visit(&mut self, visited: &mut [bool], r: &Reference) -> bool {
        let target = r.target.index();
        if visited[target] {
            return false;
        }
        visited[target] = true;
        self.reached += 1;
        // The source was visited first, so its class is already final.
        self.reachability[target] = r.reachability.weakest(self.reachability[r.src.index()]);
        self.links[target] = Some(PathLink {
            next: r.src,
            label: r.label,
            reachability: r.reachability,
        });
        true
    }

    /// The link toward a GC root, `None` for the super root and unreachable
    /// instances.
    pub fn path_link(&self, inst: InstanceRef) -> Option<&PathLink> {
        self.links[inst.index()].as_ref()
    }

    /// Instances referencing `inst` through strong references.
    pub fn hard_reverse_references(&self, inst: InstanceRef) -> &[InstanceRef] {
        &self.hard_reverse[inst.index()]
    }

    /// Instances referencing `inst` through the referent of a
    /// `java.lang.ref` reference.
    pub fn soft_reverse_references(&self, inst: InstanceRef) -> &[InstanceRef] {
        &self.soft_reverse[inst.index()]
    }

    /// Number of instances reached, the super root excluded.
    pub fn reached_count(&self) -> usize {
        self.reached
    }

    /// Reachability of `inst`: `Strong` if it is reachable through strong
    /// references alone, otherwise the weakest reference kind on its path to
    /// a GC root, or `Unreachable` without a path.
    ///
    /// Strong references are exhausted before any weak one is followed, so
    /// an instance first reached from the weak queue has no strong path.
    pub fn reachability(&self, inst: InstanceRef) -> Reachability {
        self.reachability[inst.index()]
    }
}
