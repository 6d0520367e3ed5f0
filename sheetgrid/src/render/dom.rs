//! FILENAME: sheetgrid/src/render/dom.rs
//! PURPOSE: Retained-mode DOM renderer building a node tree.
//! CONTEXT: Produces the same logical output as the canvas renderer for
//! identical inputs, as a retained tree the host diffs into real DOM.
//! Cells carry data attributes and class markers the host styles; variable
//! row heights come from an off-DOM measurement cache keyed by
//! (row, column, version, width, text) and trimmed at end of frame.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use engine::{boolean_commit_state, CellValue, ColumnType, DiagnosticLevel, RowId};
use view_engine::{ActiveCell, SelectionState, DEFAULT_ROW_HEIGHT};

use super::text::{wrap_lines, ApproxMeasurer, TextMeasurer};
use super::{
    ActionHit, GridLayout, HitTarget, Rect, RenderContext, Renderer, Viewport, LINE_HEIGHT,
};

/// Bound the measurement cache is trimmed to at end of frame.
const MEASURE_CACHE_CAP: usize = 512;

/// A retained element node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub classes: BTreeSet<String>,
    pub text: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Node {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    pub fn class_if(self, condition: bool, class: impl Into<String>) -> Self {
        if condition {
            self.class(class)
        } else {
            self
        }
    }

    pub fn text_content(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    /// Depth-first search for the first node matching a predicate.
    pub fn find<'a>(&'a self, predicate: &dyn Fn(&Node) -> bool) -> Option<&'a Node> {
        if predicate(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(predicate))
    }

    /// All nodes matching a predicate, depth-first.
    pub fn find_all<'a>(&'a self, predicate: &dyn Fn(&Node) -> bool) -> Vec<&'a Node> {
        let mut found = Vec::new();
        self.collect_into(predicate, &mut found);
        found
    }

    fn collect_into<'a>(&'a self, predicate: &dyn Fn(&Node) -> bool, out: &mut Vec<&'a Node>) {
        if predicate(self) {
            out.push(self);
        }
        for child in &self.children {
            child.collect_into(predicate, out);
        }
    }
}

/// Off-DOM text measurement results, trimmed LRU-style at end of frame.
#[derive(Debug, Default)]
struct FrameMeasureCache {
    entries: HashMap<(RowId, String, u64, u32), f32>,
    order: VecDeque<(RowId, String, u64, u32)>,
}

impl FrameMeasureCache {
    fn get(&self, key: &(RowId, String, u64, u32)) -> Option<f32> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: (RowId, String, u64, u32), height: f32) {
        if self.entries.insert(key.clone(), height).is_none() {
            self.order.push_back(key);
        }
    }

    /// End-of-frame trim: evict oldest entries beyond the cap.
    fn end_frame(&mut self) {
        while self.entries.len() > MEASURE_CACHE_CAP {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// The retained-mode back-end.
pub struct DomRenderer {
    root: Node,
    layout: GridLayout,
    measure_cache: FrameMeasureCache,
    measurer: Box<dyn TextMeasurer>,
    active: Option<ActiveCell>,
    selection: SelectionState,
    action_regions: Vec<(Rect, ActionHit)>,
    mounted: bool,
}

impl Default for DomRenderer {
    fn default() -> Self {
        DomRenderer::new()
    }
}

impl DomRenderer {
    pub fn new() -> Self {
        DomRenderer {
            root: Node::new("table"),
            layout: GridLayout::default(),
            measure_cache: FrameMeasureCache::default(),
            measurer: Box::new(ApproxMeasurer::default()),
            active: None,
            selection: SelectionState::new(),
            action_regions: Vec::new(),
            mounted: false,
        }
    }

    /// The retained tree built by the last render.
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Measured wrap height for one cell, via the hidden measuring element.
    fn measured_height(
        &mut self,
        row_id: RowId,
        col_key: &str,
        version: u64,
        width: f32,
        text: &str,
    ) -> f32 {
        let key = (row_id, col_key.to_string(), version, width.to_bits());
        if let Some(height) = self.measure_cache.get(&key) {
            return height;
        }
        let lines = wrap_lines(text, (width - 12.0).max(8.0), "13px", self.measurer.as_ref());
        let height = (lines.len() as f32 * LINE_HEIGHT + 6.0).max(DEFAULT_ROW_HEIGHT);
        self.measure_cache.insert(key, height);
        height
    }

    fn row_height(&mut self, ctx: &mut RenderContext<'_>, row_index: usize) -> f32 {
        let row_id = match ctx.visible.order.get(row_index) {
            Some(&id) => id,
            None => return DEFAULT_ROW_HEIGHT,
        };
        if let Some(&override_height) = ctx.view.row_heights.get(&row_id) {
            return override_height;
        }
        if !ctx.view.any_wrap_enabled(ctx.schema) {
            return DEFAULT_ROW_HEIGHT;
        }

        let version = ctx.model.get_row_version(row_id).unwrap_or(0);
        let mut height = DEFAULT_ROW_HEIGHT;
        let wrap_columns: Vec<(String, f32)> = ctx
            .schema
            .columns()
            .iter()
            .filter(|c| !ctx.view.is_column_hidden(&c.key))
            .filter(|c| ctx.view.wrap_enabled(ctx.schema, &c.key))
            .map(|c| (c.key.clone(), ctx.view.column_width(ctx.schema, &c.key)))
            .collect();

        for (col_key, width) in wrap_columns {
            let resolved = ctx.resolver.resolve_cell(
                ctx.model,
                ctx.schema,
                ctx.schema_version,
                ctx.view.version,
                row_id,
                &col_key,
            );
            height = height.max(self.measured_height(row_id, &col_key, version, width, &resolved.text));
        }
        height
    }

    fn build_header(&self, ctx: &RenderContext<'_>) -> Node {
        let mut row = Node::new("tr").child(
            Node::new("th").class("corner").attr("role", "columnheader"),
        );

        for col_key in &self.layout.col_keys {
            let column = ctx.schema.column(col_key);
            let label = column
                .map(|c| c.header_label().to_string())
                .unwrap_or_else(|| col_key.clone());

            let mut th = Node::new("th")
                .attr("data-col-key", col_key.clone())
                .attr("role", "columnheader")
                .text_content(label);

            if let Some(sort) = ctx.view.sort_for(col_key) {
                th = th.class(match sort.direction {
                    view_engine::SortDirection::Ascending => "sorted-asc",
                    view_engine::SortDirection::Descending => "sorted-desc",
                });
            }
            if ctx.view.has_filter(col_key) {
                th = th.class("filtered");
            }
            row = row.child(th);
        }

        Node::new("thead").child(row)
    }

    fn build_cell(
        &mut self,
        ctx: &mut RenderContext<'_>,
        row_id: RowId,
        row_index: usize,
        col_index: usize,
    ) -> Node {
        let col_key = self.layout.col_keys[col_index].clone();
        let column = ctx.schema.column(&col_key);
        let resolved = ctx.resolver.resolve_cell(
            ctx.model,
            ctx.schema,
            ctx.schema_version,
            ctx.view.version,
            row_id,
            &col_key,
        );

        let raw = ctx
            .model
            .get_raw_cell(row_id, &col_key)
            .cloned()
            .unwrap_or(CellValue::Null);
        let row_readonly = ctx.model.is_row_readonly(row_id);
        let col_readonly = column.map(|c| c.is_readonly()).unwrap_or(false);
        let readonly = row_readonly || col_readonly;
        let is_pending = ctx.model.pending_cell(row_id, &col_key).is_some();
        let is_formula = column.map(|c| c.formula.is_some()).unwrap_or(false);
        let selected = self.selection.contains(row_index, col_index);
        let is_active = matches!(
            &self.active,
            Some(ActiveCell::Cell { row_id: ar, col_key: ac }) if *ar == row_id && *ac == col_key
        );

        let mut td = Node::new("td")
            .attr("data-col-key", col_key.clone())
            .attr("data-raw", raw.display_label())
            .attr("role", "gridcell")
            .class_if(readonly, "readonly")
            .class_if(!readonly, "editable")
            .class_if(is_formula, "muted")
            .class_if(row_readonly, "disabled")
            .class_if(is_pending, "pending")
            .class_if(selected, "selected")
            .class_if(is_active, "active-cell");

        if let Some(diagnostic) = &resolved.diagnostic {
            td = td
                .class(match diagnostic.level {
                    DiagnosticLevel::Warning => "diag-warning",
                    DiagnosticLevel::Error => "diag-error",
                })
                .attr("title", diagnostic.message.clone());
        }

        let is_unique_boolean = column
            .map(|c| c.column_type == ColumnType::Boolean && c.unique)
            .unwrap_or(false);

        // Content: chips for tags, action element for button/link, radio
        // indicator for unique booleans, plain text otherwise.
        match &resolved.value {
            CellValue::Tags(tags) => {
                for (tag_index, tag) in tags.iter().enumerate() {
                    let chip = Node::new("span")
                        .class("chip")
                        .text_content(tag.clone())
                        .child(
                            Node::new("button")
                                .class("chip-remove")
                                .attr("data-index", tag_index.to_string()),
                        );
                    td = td.child(chip);
                }
                let rect = self.layout.cell_rect(row_index, col_index);
                for tag_index in 0..tags.len() {
                    self.action_regions.push((
                        rect,
                        ActionHit::TagRemove {
                            row_index,
                            col_index,
                            tag_index,
                        },
                    ));
                }
            }
            CellValue::Button(button) => {
                let action = Node::new("action")
                    .attr("kind", "button")
                    .text_content(button.label.clone());
                td = td.child(action);
                self.action_regions.push((
                    self.layout.cell_rect(row_index, col_index),
                    ActionHit::Button {
                        row_index,
                        col_index,
                        command: button.command.clone(),
                    },
                ));
            }
            CellValue::Link(link) => {
                let action = Node::new("action")
                    .attr("kind", "link")
                    .attr("href", link.href.clone())
                    .text_content(link.label.clone());
                td = td.child(action);
                self.action_regions.push((
                    self.layout.cell_rect(row_index, col_index),
                    ActionHit::Link {
                        row_index,
                        col_index,
                        href: link.href.clone(),
                    },
                ));
            }
            value if is_unique_boolean => {
                let commit = boolean_commit_state(ctx.model, &col_key);
                let state_class = if commit.current_row_id == Some(row_id) {
                    "radio-current"
                } else if commit.previous_row_id == Some(row_id) {
                    "radio-previous"
                } else {
                    "radio-default"
                };
                let radio = Node::new("span")
                    .class("radio")
                    .class(state_class)
                    .class_if(value.as_bool().unwrap_or(false), "radio-on");
                td = td.child(radio);
            }
            _ => {
                td = td.text_content(resolved.text.clone());
            }
        }

        td
    }

    fn build_body(&mut self, ctx: &mut RenderContext<'_>) -> Node {
        let mut tbody = Node::new("tbody");
        let range = self.layout.visible_range;

        for row_index in range.start..range.end {
            let row_id = match ctx.visible.order.get(row_index) {
                Some(&id) => id,
                None => continue,
            };
            let display_index = ctx
                .model
                .row(row_id)
                .map(|r| r.display_index)
                .unwrap_or_default();

            let mut tr = Node::new("tr")
                .attr("data-row-id", row_id.0.to_string())
                .attr("role", "row")
                .class_if(ctx.model.has_pending(row_id), "row-pending")
                .child(
                    Node::new("th")
                        .class("row-header")
                        .text_content(display_index.to_string()),
                );

            for col_index in 0..self.layout.col_keys.len() {
                let td = self.build_cell(ctx, row_id, row_index, col_index);
                tr = tr.child(td);
            }
            tbody = tbody.child(tr);
        }

        tbody
    }
}

impl Renderer for DomRenderer {
    fn mount(&mut self) {
        self.mounted = true;
    }

    fn set_active_cell(&mut self, active: Option<ActiveCell>) {
        self.active = active;
    }

    fn set_selection(&mut self, selection: SelectionState) {
        self.selection = selection;
    }

    fn render(&mut self, ctx: &mut RenderContext<'_>, viewport: Viewport) {
        self.action_regions.clear();

        // Heights first (off-DOM measurement), then layout, then the tree.
        let heights: Vec<f32> = (0..ctx.visible.len())
            .map(|i| self.row_height(ctx, i))
            .collect();
        self.layout = GridLayout::build(ctx, viewport, |i| {
            heights.get(i).copied().unwrap_or(DEFAULT_ROW_HEIGHT)
        });

        let header = self.build_header(ctx);
        let body = self.build_body(ctx);

        self.root = Node::new("table")
            .attr("role", "grid")
            .child(header)
            .child(body);

        self.measure_cache.end_frame();
    }

    fn hit_test(&self, x: f32, y: f32) -> HitTarget {
        self.layout.hit_test(x, y)
    }

    fn hit_test_action(&self, x: f32, y: f32) -> Option<ActionHit> {
        self.action_regions
            .iter()
            .find(|(rect, _)| rect.contains(x, y))
            .map(|(_, hit)| hit.clone())
    }

    fn destroy(&mut self) {
        self.mounted = false;
        self.root = Node::new("table");
        self.action_regions.clear();
        self.measure_cache.clear();
    }
}
