//! Paint step: tree rows, status bar and the error overlay.
use crossterm::style::Color;

use super::grid::{Grid, Style};
use super::layout;
use super::state::{Explorer, Mode, RenderState, SpatialState, ViewMode};
use crate::graph::ModuleId;

const ELLIPSIS: &str = "...";

/// Greedy word wrap to `width` columns.
///
/// Explicit newlines start a new line. Words are never split when a wrap
/// point exists; a single word wider than `width` is hard-split.
#[must_use]
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0usize;
        let mut produced = false;
        for word in paragraph.split_whitespace() {
            let len = word.chars().count();
            if len > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    produced = true;
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(width).peekable();
                while let Some(chunk) = chunks.next() {
                    if chunks.peek().is_some() {
                        lines.push(chunk.iter().collect());
                        produced = true;
                    } else {
                        current = chunk.iter().collect();
                        current_len = chunk.len();
                    }
                }
                continue;
            }
            if current_len == 0 {
                current.push_str(word);
                current_len = len;
            } else if current_len + 1 + len <= width {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + len;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
                produced = true;
                current_len = len;
            }
        }
        if current_len > 0 || !produced {
            lines.push(current);
        }
    }
    lines
}

fn prepare(grid: &mut Grid, spatial: &SpatialState) {
    if grid.size() == spatial.screen_size {
        grid.clear();
    } else {
        grid.resize(spatial.screen_size);
    }
}

/// Paint the selected node's errors from row 0, one wrapped line per row.
///
/// Remaining rows stay blank. When the text does not fit, the last row is cut
/// short and ends with `...`.
pub fn render_error(state: &RenderState, spatial: &SpatialState, grid: &mut Grid) {
    prepare(grid, spatial);
    let columns = usize::from(spatial.screen_size.columns);
    let rows = usize::from(spatial.screen_size.rows);
    let text = state.errors_by_id.get(&state.selected_id).map(|errs| errs.join("\n")).unwrap_or_default();
    let lines = wrap_words(&text, columns);
    for (y, line) in lines.iter().take(rows).enumerate() {
        grid.put_str(0, y, line, Style::default());
    }
    if lines.len() > rows && rows > 0 {
        let last = rows - 1;
        let keep = columns.saturating_sub(ELLIPSIS.len());
        let mut cut: String = lines[last].chars().take(keep).collect();
        cut.push_str(&ELLIPSIS[..ELLIPSIS.len().min(columns)]);
        grid.fill_row(last, Style::default());
        grid.put_str(0, last, &cut, Style::default());
    }
}

fn toggle_marker(explorer: &Explorer<'_>, id: &ModuleId) -> char {
    let graph = explorer.graph();
    if graph.dependencies(id).is_empty() {
        return ' ';
    }
    let state = explorer.render_state();
    let open = state.view == ViewMode::Overview || *id == state.root_id || state.expanded.contains(id);
    if open {
        '-'
    } else {
        '+'
    }
}

pub(crate) fn label(explorer: &Explorer<'_>, id: &ModuleId) -> String {
    let mut s = String::new();
    s.push(toggle_marker(explorer, id));
    s.push(' ');
    s.push_str(&explorer.graph().display_name(id));
    if explorer.render_state().errors_by_id.contains_key(id) {
        s.push_str(" !");
    }
    s
}

pub(crate) fn label_width(explorer: &Explorer<'_>, id: &ModuleId) -> usize {
    label(explorer, id).chars().count()
}

fn node_style(explorer: &Explorer<'_>, id: &ModuleId) -> Style {
    if *id == explorer.render_state().selected_id {
        return Style::inverted();
    }
    if explorer.metrics(id).in_cycle {
        return Style::fg(Color::Red);
    }
    if explorer.render_state().errors_by_id.contains_key(id) {
        return Style::fg(Color::Yellow);
    }
    Style::default()
}

fn status_line(explorer: &Explorer<'_>) -> String {
    let state = explorer.render_state();
    let graph = explorer.graph();
    let id = &state.selected_id;
    let metrics = explorer.metrics(id);
    let mode = match (state.mode, state.view) {
        (_, ViewMode::Overview) => "overview",
        (Mode::NodeSelected, ViewMode::Focus) => "selected",
        (Mode::Browsing, ViewMode::Focus) => "browse",
    };
    let mut s = format!(
        " {} | deps {} | dependents {} | entropy {:.2}",
        graph.display_name(id),
        graph.dependencies(id).len(),
        graph.dependents(id).len(),
        metrics.entropy
    );
    if metrics.in_cycle {
        s.push_str(" | cycle");
    }
    if let Some(errs) = state.errors_by_id.get(id) {
        s.push_str(&format!(" | {} error(s), e to show", errs.len()));
    }
    s.push_str(&format!(" | {mode} | q quit"));
    s
}

/// Paint the whole screen for the explorer's current state.
pub fn paint(explorer: &Explorer<'_>, grid: &mut Grid) {
    let state = explorer.render_state();
    let spatial = explorer.spatial_state();
    if state.show_errors && state.errors_by_id.contains_key(&state.selected_id) {
        render_error(state, spatial, grid);
        return;
    }
    prepare(grid, spatial);

    let body = layout::body_rows(spatial.screen_size);
    let offset = state.viewport_offset;
    for (row, id) in spatial.order.iter().skip(offset.y).take(body).enumerate() {
        let Some(pos) = spatial.computed_positions.get(id) else { continue };
        let x = isize::try_from(pos.x).unwrap_or(isize::MAX) - isize::try_from(offset.x).unwrap_or(0);
        grid.put_str(x, row, &label(explorer, id), node_style(explorer, id));
    }

    let rows = usize::from(spatial.screen_size.rows);
    if rows >= 2 {
        let bar = rows - 1;
        grid.fill_row(bar, Style::inverted());
        grid.put_str(0, bar, &status_line(explorer), Style::inverted());
    }
}
