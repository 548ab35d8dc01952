//! Interactive explorer state machine.
//!
//! `Browsing` is the initial mode; selecting a node re-roots the view at it
//! (`NodeSelected`) and deselecting returns to the entry. Each input event is
//! applied in full and the spatial layout recomputed before the next paint.
use std::collections::{BTreeMap, BTreeSet};

use super::grid::{Grid, Point, ScreenSize};
use super::layout;
use super::render;
use crate::graph::{ModuleGraph, ModuleId};
use crate::query::{CycleDetectionQuery, EntropyQuery, EntropyWeighting, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Browsing,
    NodeSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Rooted node, its dependencies, and dependencies of expanded nodes.
    #[default]
    Focus,
    /// Every node in the graph.
    Overview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    MoveUp,
    MoveDown,
    Select,
    Deselect,
    ToggleExpand,
    ToggleErrors,
    ToggleOverview,
    ScrollUp,
    ScrollDown,
    Resize { columns: u16, rows: u16 },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Default)]
pub struct RenderState {
    pub mode: Mode,
    pub view: ViewMode,
    pub root_id: ModuleId,
    pub selected_id: ModuleId,
    pub viewport_offset: Point,
    pub errors_by_id: BTreeMap<ModuleId, Vec<String>>,
    pub expanded: BTreeSet<ModuleId>,
    pub show_errors: bool,
}

impl RenderState {
    #[must_use]
    pub fn new(root: ModuleId, view: ViewMode) -> Self {
        Self { root_id: root.clone(), selected_id: root, view, ..Self::default() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpatialState {
    pub screen_size: ScreenSize,
    pub computed_positions: BTreeMap<ModuleId, Point>,
    pub layout_depth: BTreeMap<ModuleId, usize>,
    /// Visible nodes in row order.
    pub order: Vec<ModuleId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeMetrics {
    pub entropy: f64,
    pub in_cycle: bool,
}

pub struct Explorer<'g> {
    graph: &'g ModuleGraph,
    entry: ModuleId,
    render: RenderState,
    spatial: SpatialState,
    metrics: BTreeMap<ModuleId, NodeMetrics>,
}

impl<'g> Explorer<'g> {
    #[must_use]
    pub fn new(graph: &'g ModuleGraph, selected: ModuleId, screen: ScreenSize) -> Self {
        let mut render = RenderState::new(selected.clone(), ViewMode::Focus);
        render.errors_by_id = graph
            .errors()
            .map(|(id, errs)| (id.clone(), errs.iter().map(|e| e.message.clone()).collect()))
            .collect();
        let mut explorer = Self {
            graph,
            entry: selected,
            render,
            spatial: SpatialState { screen_size: screen, ..SpatialState::default() },
            metrics: BTreeMap::new(),
        };
        explorer.compute_metrics(EntropyWeighting::default());
        explorer.relayout();
        explorer
    }

    #[must_use]
    pub fn with_view(mut self, view: ViewMode) -> Self {
        self.render.view = view;
        self.relayout();
        self
    }

    #[must_use]
    pub fn with_weighting(mut self, weighting: EntropyWeighting) -> Self {
        self.compute_metrics(weighting);
        self
    }

    fn compute_metrics(&mut self, weighting: EntropyWeighting) {
        let entropy = EntropyQuery::new(weighting).run(self.graph);
        let in_cycle: BTreeSet<ModuleId> = CycleDetectionQuery::new().run(self.graph).into_iter().flatten().collect();
        self.metrics = entropy
            .per_node
            .into_iter()
            .map(|(id, h)| {
                let m = NodeMetrics { entropy: h, in_cycle: in_cycle.contains(&id) };
                (id, m)
            })
            .collect();
    }

    #[must_use]
    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    #[must_use]
    pub fn spatial_state(&self) -> &SpatialState {
        &self.spatial
    }

    #[must_use]
    pub fn graph(&self) -> &ModuleGraph {
        self.graph
    }

    #[must_use]
    pub fn metrics(&self, id: &ModuleId) -> NodeMetrics {
        self.metrics.get(id).copied().unwrap_or_default()
    }

    /// Apply one input event, then recompute the layout.
    pub fn handle(&mut self, event: InputEvent) -> Transition {
        match event {
            InputEvent::Quit => return Transition::Quit,
            InputEvent::MoveUp => self.move_selection(-1),
            InputEvent::MoveDown => self.move_selection(1),
            InputEvent::Select => {
                self.render.mode = Mode::NodeSelected;
                self.render.root_id = self.render.selected_id.clone();
                self.render.viewport_offset = Point::default();
            }
            InputEvent::Deselect => {
                if self.render.show_errors {
                    self.render.show_errors = false;
                } else {
                    self.render.mode = Mode::Browsing;
                    self.render.root_id = self.entry.clone();
                }
            }
            InputEvent::ToggleExpand => {
                let id = self.render.selected_id.clone();
                if !self.render.expanded.remove(&id) {
                    self.render.expanded.insert(id);
                }
            }
            InputEvent::ToggleErrors => {
                self.render.show_errors =
                    !self.render.show_errors && self.render.errors_by_id.contains_key(&self.render.selected_id);
            }
            InputEvent::ToggleOverview => {
                self.render.view = match self.render.view {
                    ViewMode::Focus => ViewMode::Overview,
                    ViewMode::Overview => ViewMode::Focus,
                };
            }
            InputEvent::ScrollUp => self.scroll(-1),
            InputEvent::ScrollDown => self.scroll(1),
            InputEvent::Resize { columns, rows } => {
                self.spatial.screen_size = ScreenSize::new(columns, rows);
            }
        }
        self.relayout();
        Transition::Continue
    }

    fn move_selection(&mut self, delta: isize) {
        let order = &self.spatial.order;
        let Some(pos) = order.iter().position(|id| *id == self.render.selected_id) else { return };
        let next = pos.saturating_add_signed(delta).min(order.len().saturating_sub(1));
        self.render.selected_id = order[next].clone();
    }

    // Move the viewport one row and pull the selection along when it would leave the screen.
    fn scroll(&mut self, delta: isize) {
        let body = layout::body_rows(self.spatial.screen_size);
        let total = self.spatial.order.len();
        let max = total.saturating_sub(body);
        let y = self.render.viewport_offset.y.saturating_add_signed(delta).min(max);
        self.render.viewport_offset.y = y;
        let sel_row = self.spatial.computed_positions.get(&self.render.selected_id).map_or(0, |p| p.y);
        let clamped = sel_row.clamp(y, (y + body).saturating_sub(1).max(y));
        if clamped != sel_row {
            if let Some(id) = self.spatial.order.get(clamped) {
                self.render.selected_id = id.clone();
            }
        }
    }

    fn relayout(&mut self) {
        let size = self.spatial.screen_size;
        self.spatial = layout::compute(self.graph, &self.render, size);
        if !self.spatial.computed_positions.contains_key(&self.render.selected_id) {
            self.render.selected_id = self.render.root_id.clone();
        }
        let selected = self.spatial.computed_positions.get(&self.render.selected_id).copied().unwrap_or_default();
        let label = render::label_width(self, &self.render.selected_id);
        self.render.viewport_offset = layout::clamp_viewport(
            self.render.viewport_offset,
            selected,
            label,
            self.spatial.order.len(),
            size,
        );
    }

    /// Paint the current state into `grid`, resizing it to the screen first.
    pub fn paint(&self, grid: &mut Grid) {
        render::paint(self, grid);
    }
}
