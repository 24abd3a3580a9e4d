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

//! Subcommand implementations
//!
//! Every command renders to a writer so it can be exercised without a
//! terminal.

use crate::config::{OutputConfig, OutputFormat};
use anyhow::{Context, Result, bail};
use dotheap_core::diff::{Change, diff_snapshots};
use dotheap_core::heapdump::{GraphDocument, InstanceId, Value};
use dotheap_core::{InstanceView, Reachability, Size, Snapshot, SnapshotConfig, sort};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Parses `0x1f` style hex or plain decimal instance ids.
pub fn parse_instance_id(s: &str) -> Result<InstanceId, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map(InstanceId).map_err(|e| format!("invalid instance id '{s}': {e}"))
}

pub fn load_snapshot(path: &Path, config: SnapshotConfig) -> Result<Snapshot> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read graph document {}", path.display()))?;
    let document = GraphDocument::from_json(&json).with_context(|| format!("Failed to parse graph document {}", path.display()))?;
    let graph = document.into_graph().with_context(|| format!("Invalid heap graph in {}", path.display()))?;
    info!(path = %path.display(), instances = graph.len() - 1, "Graph loaded");
    Ok(Snapshot::new(graph, config))
}

#[derive(Serialize)]
struct InstanceRow {
    id: InstanceId,
    description: String,
    reachability: Reachability,
    shallow: Size,
    retained: Size,
}

impl InstanceRow {
    fn new(inst: &InstanceView<'_>) -> Self {
        Self {
            id: inst.id(),
            description: inst.to_string(),
            reachability: inst.reachability(),
            shallow: inst.size(),
            retained: inst.total_retained_size(),
        }
    }
}

#[derive(Serialize)]
struct HeapRow<'a> {
    name: &'a str,
    size: Size,
}

#[derive(Serialize)]
struct Summary<'a> {
    instances: usize,
    strongly_reachable: usize,
    weakly_reachable: usize,
    unreachable: usize,
    heaps: Vec<HeapRow<'a>>,
    total: Size,
}

fn json(out: &mut dyn Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn summary(snapshot: &Snapshot, output: &OutputConfig, out: &mut dyn Write) -> Result<()> {
    let mut summary = Summary {
        instances: 0,
        strongly_reachable: 0,
        weakly_reachable: 0,
        unreachable: 0,
        heaps: snapshot.heaps().iter().map(|h| HeapRow { name: h.name(), size: h.size() }).collect(),
        total: snapshot.super_root().total_retained_size(),
    };
    for inst in snapshot.instances() {
        summary.instances += 1;
        match inst.reachability() {
            Reachability::Strong => summary.strongly_reachable += 1,
            Reachability::Unreachable => summary.unreachable += 1,
            _ => summary.weakly_reachable += 1,
        }
    }

    if output.format == OutputFormat::Json {
        return json(out, &summary);
    }
    writeln!(
        out,
        "Instances: {} ({} strongly reachable, {} weakly reachable, {} unreachable)",
        summary.instances, summary.strongly_reachable, summary.weakly_reachable, summary.unreachable
    )?;
    writeln!(out, "{:<16} Retained", "Heap")?;
    for heap in &summary.heaps {
        writeln!(out, "{:<16} {}", heap.name, heap.size)?;
    }
    writeln!(out, "{:<16} {}", "Total", summary.total)?;
    Ok(())
}

pub fn rooted(snapshot: &Snapshot, output: &OutputConfig, out: &mut dyn Write) -> Result<()> {
    let rows: Vec<InstanceRow> = snapshot.rooted_by_retained_size().iter().take(output.limit).map(InstanceRow::new).collect();
    if output.format == OutputFormat::Json {
        return json(out, &rows);
    }
    writeln!(out, "{:>12} {:>12}  Instance", "Retained", "Shallow")?;
    for row in rows {
        writeln!(out, "{:>12} {:>12}  {}", row.retained.total(), row.shallow.total(), row.description)?;
    }
    Ok(())
}

fn find<'a>(snapshot: &'a Snapshot, id: InstanceId) -> Result<InstanceView<'a>> {
    match snapshot.find_instance(id) {
        Some(inst) => Ok(inst),
        None => bail!("No instance with id {id}"),
    }
}

fn describe_value(snapshot: &Snapshot, value: Option<Value>) -> String {
    match value {
        None => "null".to_string(),
        Some(Value::Instance(inst)) => snapshot.instance(inst).to_string(),
        Some(value) => value.to_string(),
    }
}

pub fn instance(snapshot: &Snapshot, id: InstanceId, output: &OutputConfig, out: &mut dyn Write) -> Result<()> {
    let inst = find(snapshot, id)?;
    if output.format == OutputFormat::Json {
        return json(out, &InstanceRow::new(&inst));
    }

    writeln!(out, "{inst}")?;
    writeln!(out, "  Class:        {}", inst.class_name())?;
    if let Some(heap) = inst.heap() {
        writeln!(out, "  Heap:         {}", heap.name())?;
    }
    let site = inst.site();
    writeln!(out, "  Site:         {} ({}:{})", site.method_name(), site.filename(), site.line_number())?;
    writeln!(out, "  Reachability: {}", inst.reachability())?;
    writeln!(out, "  Shallow size: {}", inst.size())?;
    writeln!(out, "  Retained:     {}", inst.total_retained_size())?;
    if let Some(dominator) = inst.immediate_dominator() {
        writeln!(out, "  Dominator:    {dominator}")?;
    }
    if inst.is_root() {
        let types: Vec<&str> = inst.root_types().iter().map(|t| t.name()).collect();
        writeln!(out, "  Root types:   {}", types.join(", "))?;
    }
    if let Some(s) = inst.as_string(Some(output.max_string_chars)) {
        writeln!(out, "  String:       {s:?}")?;
    }
    writeln!(
        out,
        "  Referrers:    {} hard, {} soft",
        inst.hard_reverse_references().count(),
        inst.soft_reverse_references().count()
    )?;

    let fields: Vec<_> = inst.fields().collect();
    if !fields.is_empty() {
        writeln!(out, "Fields:")?;
        for (name, value) in fields {
            writeln!(out, "  .{name} = {}", describe_value(snapshot, value))?;
        }
    }
    if let Some(values) = inst.array_values() {
        writeln!(out, "Elements:")?;
        for (i, value) in values.iter().take(output.limit).enumerate() {
            writeln!(out, "  [{i}] = {}", describe_value(snapshot, *value))?;
        }
    }

    let mut dominated: Vec<_> = inst.dominated().collect();
    if !dominated.is_empty() {
        dominated.sort_by(sort::by_total_retained_size);
        writeln!(out, "Dominated ({}):", dominated.len())?;
        for d in dominated.iter().take(output.limit) {
            writeln!(out, "  {:>12}  {d}", d.total_retained_size().total())?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PathRow {
    id: InstanceId,
    description: String,
    field: String,
    is_dominator: bool,
}

pub fn path(snapshot: &Snapshot, id: InstanceId, output: &OutputConfig, out: &mut dyn Write) -> Result<()> {
    let inst = find(snapshot, id)?;
    let path = inst.path_from_gc_root();
    if output.format == OutputFormat::Json {
        let rows: Vec<PathRow> = path
            .iter()
            .map(|e| PathRow {
                id: e.instance.id(),
                description: e.instance.to_string(),
                field: e.field.clone(),
                is_dominator: e.is_dominator,
            })
            .collect();
        return json(out, &rows);
    }

    if inst.is_unreachable() {
        writeln!(out, "{inst} is unreachable")?;
        return Ok(());
    }
    for element in path {
        let marker = if element.is_dominator { "*" } else { " " };
        writeln!(out, "{marker} {element}")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct ObjectsRow<'a> {
    heap: &'a str,
    class_name: &'a str,
    num_instances: u64,
    num_bytes: Size,
}

pub fn sites(snapshot: &Snapshot, id: u64, output: &OutputConfig, out: &mut dyn Write) -> Result<()> {
    let site = snapshot.site_or_root(id);
    let graph = snapshot.graph();
    let mut infos: Vec<_> = site.objects_infos().collect();
    infos.sort_by(sort::by_objects_info_size(graph));

    let rows: Vec<ObjectsRow> = infos
        .iter()
        .take(output.limit)
        .map(|info| ObjectsRow {
            heap: graph.heaps()[info.heap.index()].name(),
            class_name: info.class_obj.and_then(|c| graph.class_data(c)).map(|c| c.name.as_str()).unwrap_or("???"),
            num_instances: info.num_instances,
            num_bytes: info.num_bytes,
        })
        .collect();
    if output.format == OutputFormat::Json {
        return json(out, &rows);
    }

    writeln!(out, "Site {}: {} {} ({}:{})", site.id(), site.method_name(), site.signature(), site.filename(), site.line_number())?;
    writeln!(out, "  Total: {}", site.total_size())?;
    writeln!(out, "{:>12} {:>10}  {:<12} Class", "Bytes", "Count", "Heap")?;
    for row in rows {
        writeln!(out, "{:>12} {:>10}  {:<12} {}", row.num_bytes.total(), row.num_instances, row.heap, row.class_name)?;
    }

    let mut children: Vec<_> = site.children().iter().map(|&c| graph.site(c)).collect();
    children.sort_by(|a, b| sort::by_site_size(a, b));
    if !children.is_empty() {
        writeln!(out, "Called sites:")?;
        for child in children.iter().take(output.limit) {
            writeln!(out, "  {:>12}  #{} {}", child.total_size().total(), child.id(), child.method_name())?;
        }
    }
    Ok(())
}

pub fn diff(baseline: &Snapshot, current: &Snapshot, output: &OutputConfig, out: &mut dyn Write) -> Result<()> {
    let diff = diff_snapshots(baseline, current);
    if output.format == OutputFormat::Json {
        return json(out, &diff);
    }

    writeln!(out, "{:<16} {:>12}", "Heap", "Delta")?;
    for heap in &diff.heaps {
        writeln!(out, "{:<16} {:>+12}", heap.heap, heap.delta())?;
    }

    let mut changed: Vec<_> = diff.changed_classes().collect();
    changed.sort_by_key(|c| std::cmp::Reverse(c.delta().abs()));
    if !changed.is_empty() {
        writeln!(out, "{:>12} {:<9} {:<12} Class", "Delta", "Change", "Heap")?;
        for class in changed.iter().take(output.limit) {
            let change = match class.change() {
                Change::Added => "added",
                Change::Removed => "removed",
                Change::Changed => "changed",
                Change::Unchanged => "unchanged",
            };
            writeln!(out, "{:>+12} {:<9} {:<12} {}", class.delta(), change, class.heap, class.class_name)?;
        }
    }
    Ok(())
}
