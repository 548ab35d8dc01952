//! Spatial layout of the visible subgraph.
//!
//! Nodes are placed in breadth-first depth bands from the rooted node: one
//! node per row, bands in increasing depth, each band indented by its depth.
//! Only dependencies are walked; a node's dependents are counted in the
//! status bar instead of being laid out.
use std::collections::{BTreeSet, VecDeque};

use super::grid::{Point, ScreenSize};
use super::state::{RenderState, SpatialState, ViewMode};
use crate::graph::{ModuleGraph, ModuleId};

/// Columns of indentation per depth level.
pub const INDENT: usize = 2;

/// Visible nodes in row order with their depth.
#[must_use]
pub fn visible_nodes(graph: &ModuleGraph, state: &RenderState) -> Vec<(ModuleId, usize)> {
    let mut out = Vec::new();
    let mut seen: BTreeSet<&ModuleId> = BTreeSet::new();
    let Some(root) = graph.node(&state.root_id).map(|n| &n.id) else {
        return out;
    };
    let expand_all = state.view == ViewMode::Overview;

    bfs(graph, state, root, &mut out, &mut seen);
    if expand_all {
        // unreachable nodes get their own passes, in id order
        for node in graph.nodes() {
            if !seen.contains(&node.id) {
                bfs(graph, state, &node.id, &mut out, &mut seen);
            }
        }
    }
    out
}

fn bfs<'g>(
    graph: &'g ModuleGraph,
    state: &RenderState,
    start: &'g ModuleId,
    out: &mut Vec<(ModuleId, usize)>,
    seen: &mut BTreeSet<&'g ModuleId>,
) {
    let expand_all = state.view == ViewMode::Overview;
    let mut queue: VecDeque<(&ModuleId, usize)> = VecDeque::new();
    if seen.insert(start) {
        queue.push_back((start, 0));
    }
    while let Some((id, depth)) = queue.pop_front() {
        out.push((id.clone(), depth));
        let open = expand_all || depth == 0 || state.expanded.contains(id);
        if !open {
            continue;
        }
        for dep in graph.dependencies(id) {
            if seen.insert(dep) {
                queue.push_back((dep, depth + 1));
            }
        }
    }
}

/// Recompute positions and depths for the current render state.
#[must_use]
pub fn compute(graph: &ModuleGraph, state: &RenderState, screen_size: ScreenSize) -> SpatialState {
    let rows = visible_nodes(graph, state);
    let mut spatial = SpatialState { screen_size, ..SpatialState::default() };
    for (row, (id, depth)) in rows.into_iter().enumerate() {
        spatial.computed_positions.insert(id.clone(), Point { x: depth * INDENT, y: row });
        spatial.layout_depth.insert(id.clone(), depth);
        spatial.order.push(id);
    }
    spatial
}

/// Rows available for the tree: the last row is the status bar when there
/// are at least two rows.
#[must_use]
pub fn body_rows(size: ScreenSize) -> usize {
    let rows = usize::from(size.rows);
    if rows >= 2 {
        rows - 1
    } else {
        rows
    }
}

/// Clamp `offset` so `selected` stays inside the viewport, scrolling by whole
/// rows and never past the end of the content.
#[must_use]
pub fn clamp_viewport(offset: Point, selected: Point, label_width: usize, total_rows: usize, size: ScreenSize) -> Point {
    let body = body_rows(size);
    let y = if body == 0 {
        0
    } else {
        let lo = (selected.y + 1).saturating_sub(body);
        let hi = selected.y.min(total_rows.saturating_sub(body)).max(lo);
        offset.y.clamp(lo, hi)
    };
    let cols = usize::from(size.columns);
    let x = if cols == 0 {
        0
    } else {
        // keep the start of the label visible, and as much of its end as fits
        let right = selected.x + label_width.max(1);
        let lo = right.saturating_sub(cols).min(selected.x);
        offset.x.clamp(lo, selected.x)
    };
    Point { x, y }
}
