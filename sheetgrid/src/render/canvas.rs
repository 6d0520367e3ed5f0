//! FILENAME: sheetgrid/src/render/canvas.rs
//! PURPOSE: Immediate-mode canvas renderer emitting a display list.
//! CONTEXT: Every render produces a fresh list of draw operations the host
//! replays onto its 2D context: row-header column, sticky header row, body
//! rows (clipped to the body rectangle), selection overlay, diagnostics,
//! active-cell outline and fill handle. Hit-testing reuses the layout
//! computed at render time. Wrap-height measurement runs incrementally
//! through the measure pump while any column has wrap enabled.

use std::collections::HashMap;

use engine::{
    boolean_commit_state, CellValue, Color, ColumnType, LruCache, RowId,
};
use view_engine::{
    ActiveCell, SelectionState, WrapMeasureCache, DEFAULT_ROW_HEIGHT,
};

use crate::scheduler::{Clock, MeasurePump};

use super::text::{wrap_lines, ApproxMeasurer, TextMeasurer};
use super::{
    cursor_for, ActionHit, CursorKind, GridLayout, HitTarget, LogicalEvent, Rect, RenderContext,
    Renderer, Viewport, FILL_HANDLE_SIZE, HEADER_HEIGHT, LINE_HEIGHT, ROW_HEADER_WIDTH,
};

/// Bound on the text-measurement cache.
const TEXT_MEASURE_CACHE_CAP: usize = 2000;

/// Cell text inset.
const CELL_PADDING: f32 = 6.0;

// Palette
const HEADER_BG: Color = Color::new(245, 246, 248);
const GRID_LINE: Color = Color::new(224, 226, 230);
const SELECTION_FILL: Color = Color::with_alpha(38, 110, 228, 36);
const ACTIVE_OUTLINE: Color = Color::new(38, 110, 228);
const ACTION_BG: Color = Color::new(240, 243, 248);
const LINK_COLOR: Color = Color::new(28, 100, 210);
const MUTED_TEXT: Color = Color::new(130, 134, 140);

/// Horizontal text anchoring inside a draw op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Left,
    Center,
    Right,
}

/// Icons the painter can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    SortAscending,
    SortDescending,
    Funnel,
    DiagnosticWarning,
    DiagnosticError,
    Checkbox(bool),
    Radio(RadioState),
}

/// Radio dot state for unique-boolean cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// The pending false→true row.
    Current,
    /// The pending true→false row.
    Previous,
    /// Committed value, no pending transition.
    Default(bool),
}

/// One drawing operation for the host's 2D context.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Rect {
        rect: Rect,
        color: Color,
        filled: bool,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        color: Color,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        font: String,
        color: Color,
        anchor: TextAnchor,
        underline: bool,
        strike: bool,
    },
    Icon {
        rect: Rect,
        kind: IconKind,
        color: Color,
    },
    ClipPush(Rect),
    ClipPop,
}

/// The immediate-mode back-end.
pub struct CanvasRenderer {
    display_list: Vec<DrawOp>,
    layout: GridLayout,
    font_cache: HashMap<(bool, bool), String>,
    /// Wrapped-line cache keyed by (font, width bits, text).
    text_cache: LruCache<(String, u32, String), Vec<String>>,
    measurer: Box<dyn TextMeasurer>,
    wrap_cache: WrapMeasureCache,
    pump: MeasurePump,
    active: Option<ActiveCell>,
    selection: SelectionState,
    hover: Option<(f32, f32)>,
    fill_handle: Option<Rect>,
    action_regions: Vec<(Rect, ActionHit)>,
    /// Row identity of the last height-index build.
    row_order: Vec<RowId>,
    mounted: bool,
}

impl Default for CanvasRenderer {
    fn default() -> Self {
        CanvasRenderer::new()
    }
}

impl CanvasRenderer {
    pub fn new() -> Self {
        CanvasRenderer::with_measurer(Box::new(ApproxMeasurer::default()))
    }

    pub fn with_measurer(measurer: Box<dyn TextMeasurer>) -> Self {
        CanvasRenderer {
            display_list: Vec::new(),
            layout: GridLayout::default(),
            font_cache: HashMap::new(),
            text_cache: LruCache::new(TEXT_MEASURE_CACHE_CAP),
            measurer,
            wrap_cache: WrapMeasureCache::new(),
            pump: MeasurePump::default(),
            active: None,
            selection: SelectionState::new(),
            hover: None,
            fill_handle: None,
            action_regions: Vec::new(),
            row_order: Vec::new(),
            mounted: false,
        }
    }

    /// The display list produced by the last render.
    pub fn display_list(&self) -> &[DrawOp] {
        &self.display_list
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Pointer position for header-icon hover affordances.
    pub fn set_hover(&mut self, position: Option<(f32, f32)>) {
        self.hover = position;
    }

    /// Font string for a style, cached by its (italic, bold) pair.
    fn font_for(&mut self, italic: bool, bold: bool) -> String {
        self.font_cache
            .entry((italic, bold))
            .or_insert_with(|| {
                let mut font = String::new();
                if italic {
                    font.push_str("italic ");
                }
                if bold {
                    font.push_str("bold ");
                }
                font.push_str("13px sans-serif");
                font
            })
            .clone()
    }

    /// Wrapped lines for a cell, memoized.
    fn wrapped_lines(&mut self, text: &str, width: f32, font: &str) -> Vec<String> {
        let key = (font.to_string(), width.to_bits(), text.to_string());
        if let Some(lines) = self.text_cache.get(&key) {
            return lines.clone();
        }
        let lines = wrap_lines(text, (width - 2.0 * CELL_PADDING).max(8.0), font, self.measurer.as_ref());
        self.text_cache.insert(key, lines.clone());
        lines
    }

    /// The logical event for an activated hit target, if any.
    pub fn logical_event_for(&self, hit: &HitTarget) -> Option<LogicalEvent> {
        match hit {
            HitTarget::HeaderIcon { col_index } => {
                self.layout.col_keys.get(*col_index).map(|key| {
                    LogicalEvent::FilterSortOpen {
                        col_key: key.clone(),
                    }
                })
            }
            _ => None,
        }
    }

    /// Cursor for a pointer position, honoring the readonly-mode override.
    pub fn cursor_at(
        &self,
        x: f32,
        y: f32,
        ctx: &RenderContext<'_>,
        readonly_mode: bool,
    ) -> CursorKind {
        let hit = self.hit_test(x, y);
        let over_fill = matches!(hit, HitTarget::FillHandle);
        let over_action = self.hit_test_action(x, y).is_some();

        let (editable, boolean, in_selection_not_active) = match &hit {
            HitTarget::Cell {
                row_index,
                col_index,
            } => {
                let column = self
                    .layout
                    .col_keys
                    .get(*col_index)
                    .and_then(|key| ctx.schema.column(key));
                let row_id = ctx.visible.order.get(*row_index).copied();
                let editable = match (column, row_id) {
                    (Some(c), Some(id)) => !c.is_readonly() && !ctx.model.is_row_readonly(id),
                    _ => false,
                };
                let boolean = column
                    .map(|c| c.column_type == ColumnType::Boolean)
                    .unwrap_or(false);
                let selected = self.selection.contains(*row_index, *col_index);
                let is_active = match (&self.active, row_id, column) {
                    (Some(ActiveCell::Cell { row_id: ar, col_key: ac }), Some(id), Some(c)) => {
                        *ar == id && *ac == c.key
                    }
                    _ => false,
                };
                (editable, boolean, selected && !is_active && editable)
            }
            _ => (false, false, false),
        };

        cursor_for(
            &hit,
            over_fill,
            over_action,
            editable,
            boolean,
            in_selection_not_active,
            readonly_mode,
        )
    }

    // ========================================================================
    // WRAP MEASUREMENT
    // ========================================================================

    fn wrap_columns(&self, ctx: &RenderContext<'_>) -> Vec<(String, f32)> {
        ctx.schema
            .columns()
            .iter()
            .filter(|c| !ctx.view.is_column_hidden(&c.key))
            .filter(|c| ctx.view.wrap_enabled(ctx.schema, &c.key))
            .map(|c| (c.key.clone(), ctx.view.column_width(ctx.schema, &c.key)))
            .collect()
    }

    fn wrap_cache_key(&self, ctx: &RenderContext<'_>) -> String {
        WrapMeasureCache::cache_key(
            ctx.schema
                .columns()
                .iter()
                .filter(|c| !ctx.view.is_column_hidden(&c.key))
                .map(|c| {
                    (
                        c.key.as_str(),
                        ctx.view.wrap_enabled(ctx.schema, &c.key),
                        ctx.view.column_width(ctx.schema, &c.key),
                    )
                }),
        )
    }

    /// One measurement tick under the chunk/time budget. Returns true when
    /// more rows remain and the scheduler should re-arm on the next frame.
    pub fn measure_tick(&mut self, ctx: &mut RenderContext<'_>, clock: &dyn Clock) -> bool {
        if !ctx.view.any_wrap_enabled(ctx.schema) {
            return false;
        }

        let key = self.wrap_cache_key(ctx);
        self.wrap_cache.ensure_key(&key);

        let wrap_columns = self.wrap_columns(ctx);
        let order = ctx.visible.order.clone();

        // Collect measurements first; the cache and height index update
        // afterwards so the borrow of `self` stays simple.
        let mut measured: Vec<(usize, RowId, f32, u64)> = Vec::new();
        let pump = &mut self.pump;
        let mut text_jobs: Vec<(usize, RowId, u64, Vec<(String, f32, String)>)> = Vec::new();

        pump.tick(clock, |index| {
            let row_id = match order.get(index) {
                Some(&id) => id,
                None => return,
            };
            let version = ctx.model.get_row_version(row_id).unwrap_or(0);
            let mut cells = Vec::new();
            for (col_key, width) in &wrap_columns {
                let resolved = ctx.resolver.resolve_cell(
                    ctx.model,
                    ctx.schema,
                    ctx.schema_version,
                    ctx.view.version,
                    row_id,
                    col_key,
                );
                cells.push((col_key.clone(), *width, resolved.text));
            }
            text_jobs.push((index, row_id, version, cells));
        });

        for (index, row_id, version, cells) in text_jobs {
            let mut height = DEFAULT_ROW_HEIGHT;
            for (_, width, text) in &cells {
                let font = self.font_for(false, false);
                let lines = self.wrapped_lines(text, *width, &font);
                let needed = lines.len() as f32 * LINE_HEIGHT + 2.0 * (DEFAULT_ROW_HEIGHT - LINE_HEIGHT) / 2.0;
                height = height.max(needed);
            }
            measured.push((index, row_id, height, version));
        }

        for (index, row_id, height, version) in measured {
            let current = ctx.model.get_row_version(row_id).unwrap_or(0);
            if self.wrap_cache.store(row_id, height, version, current) {
                self.layout.heights.set(index, height);
            }
        }

        let more = !self.pump.is_done();
        if !more {
            log::debug!("wrap measurement drained ({} rows)", order.len());
        }
        more
    }

    // ========================================================================
    // PAINTING
    // ========================================================================

    fn effective_row_height(&self, ctx: &RenderContext<'_>, index: usize) -> f32 {
        let row_id = match ctx.visible.order.get(index) {
            Some(&id) => id,
            None => return DEFAULT_ROW_HEIGHT,
        };
        if let Some(&override_height) = ctx.view.row_heights.get(&row_id) {
            return override_height;
        }
        if ctx.view.any_wrap_enabled(ctx.schema) {
            let version = ctx.model.get_row_version(row_id).unwrap_or(0);
            if let Some(measured) = self.wrap_cache.get(row_id, version) {
                return measured;
            }
        }
        DEFAULT_ROW_HEIGHT
    }

    fn paint(&mut self, ctx: &mut RenderContext<'_>, viewport: Viewport) {
        let (width, height) = viewport.clamped_size();
        let body = Rect::new(
            ROW_HEADER_WIDTH,
            HEADER_HEIGHT,
            width - ROW_HEADER_WIDTH,
            height - HEADER_HEIGHT,
        );

        self.display_list.clear();
        self.fill_handle = None;
        self.action_regions.clear();

        self.display_list.push(DrawOp::Rect {
            rect: Rect::new(0.0, 0.0, width, height),
            color: Color::white(),
            filled: true,
        });

        // Body content never paints outside the clipped body rectangle.
        self.display_list.push(DrawOp::ClipPush(body));
        let range = self.layout.visible_range;
        for row_index in range.start..range.end {
            self.paint_body_row(ctx, row_index);
        }
        self.paint_selection_overlay();
        self.display_list.push(DrawOp::ClipPop);

        self.paint_row_headers(ctx);
        self.paint_header_row(ctx);
        self.paint_corner();
        self.paint_active_cell(ctx);
    }

    fn paint_body_row(&mut self, ctx: &mut RenderContext<'_>, row_index: usize) {
        let row_id = match ctx.visible.order.get(row_index) {
            Some(&id) => id,
            None => return,
        };

        let col_keys = self.layout.col_keys.clone();
        for (col_index, col_key) in col_keys.iter().enumerate() {
            let rect = self.layout.cell_rect(row_index, col_index);
            let resolved = ctx.resolver.resolve_cell(
                ctx.model,
                ctx.schema,
                ctx.schema_version,
                ctx.view.version,
                row_id,
                col_key,
            );
            let column = ctx.schema.column(col_key);

            if let Some(background) = resolved.style.background {
                self.display_list.push(DrawOp::Rect {
                    rect,
                    color: background,
                    filled: true,
                });
            }

            // Action cells get their affordance background and a stored
            // hit region.
            match &resolved.value {
                CellValue::Button(button) => {
                    let region = Rect::new(
                        rect.x + CELL_PADDING / 2.0,
                        rect.y + 3.0,
                        rect.w - CELL_PADDING,
                        rect.h - 6.0,
                    );
                    self.display_list.push(DrawOp::Rect {
                        rect: region,
                        color: ACTION_BG,
                        filled: true,
                    });
                    self.action_regions.push((
                        region,
                        ActionHit::Button {
                            row_index,
                            col_index,
                            command: button.command.clone(),
                        },
                    ));
                }
                CellValue::Link(link) => {
                    let region = Rect::new(rect.x, rect.y, rect.w, rect.h);
                    self.action_regions.push((
                        region,
                        ActionHit::Link {
                            row_index,
                            col_index,
                            href: link.href.clone(),
                        },
                    ));
                }
                _ => {}
            }

            // Unique-boolean cells paint a radio dot instead of text.
            let is_unique_boolean = column
                .map(|c| c.column_type == ColumnType::Boolean && c.unique)
                .unwrap_or(false);
            if is_unique_boolean {
                let commit = boolean_commit_state(ctx.model, col_key);
                let value = resolved.value.as_bool().unwrap_or(false);
                let state = if commit.current_row_id == Some(row_id) {
                    RadioState::Current
                } else if commit.previous_row_id == Some(row_id) {
                    RadioState::Previous
                } else {
                    RadioState::Default(value)
                };
                let size = 12.0;
                self.display_list.push(DrawOp::Icon {
                    rect: Rect::new(
                        rect.x + (rect.w - size) / 2.0,
                        rect.y + (rect.h - size) / 2.0,
                        size,
                        size,
                    ),
                    kind: IconKind::Radio(state),
                    color: ACTIVE_OUTLINE,
                });
            } else {
                self.paint_cell_text(ctx, &rect, row_id, col_key, &resolved, row_index);
            }

            // Diagnostic corner marker: warning amber, error red.
            if let Some(diagnostic) = &resolved.diagnostic {
                let (kind, color) = match diagnostic.level {
                    engine::DiagnosticLevel::Warning => {
                        (IconKind::DiagnosticWarning, Color::amber())
                    }
                    engine::DiagnosticLevel::Error => (IconKind::DiagnosticError, Color::red()),
                };
                self.display_list.push(DrawOp::Icon {
                    rect: Rect::new(rect.right() - 7.0, rect.y + 1.0, 6.0, 6.0),
                    kind,
                    color,
                });
            }

            // Cell borders.
            self.display_list.push(DrawOp::Line {
                x1: rect.x,
                y1: rect.bottom(),
                x2: rect.right(),
                y2: rect.bottom(),
                color: GRID_LINE,
            });
            self.display_list.push(DrawOp::Line {
                x1: rect.right(),
                y1: rect.y,
                x2: rect.right(),
                y2: rect.bottom(),
                color: GRID_LINE,
            });
        }
    }

    fn paint_cell_text(
        &mut self,
        ctx: &mut RenderContext<'_>,
        rect: &Rect,
        row_id: RowId,
        col_key: &str,
        resolved: &engine::ResolvedCell,
        _row_index: usize,
    ) {
        if resolved.text.is_empty() {
            return;
        }

        let column = ctx.schema.column(col_key);
        let font = self.font_for(resolved.style.is_italic(), resolved.style.is_bold());

        let is_pending = ctx.model.pending_cell(row_id, col_key).is_some();
        let is_link = matches!(resolved.value, CellValue::Link(_));
        let color = if is_link {
            LINK_COLOR
        } else if is_pending {
            // Pending cells render muted until committed or with their
            // explicit color.
            resolved.style.text_color.unwrap_or(MUTED_TEXT)
        } else {
            resolved.style.text_color.unwrap_or(Color::black())
        };

        let anchor = match resolved.style.align {
            Some(engine::TextAlign::Left) => TextAnchor::Left,
            Some(engine::TextAlign::Center) => TextAnchor::Center,
            Some(engine::TextAlign::Right) => TextAnchor::Right,
            // General: numbers right, everything else left.
            _ => match column.map(|c| c.column_type) {
                Some(ColumnType::Number) | Some(ColumnType::Int) | Some(ColumnType::Uint) => {
                    TextAnchor::Right
                }
                _ => TextAnchor::Left,
            },
        };

        let x = match anchor {
            TextAnchor::Left => rect.x + CELL_PADDING,
            TextAnchor::Center => rect.x + rect.w / 2.0,
            TextAnchor::Right => rect.right() - CELL_PADDING,
        };

        let wrap = ctx.view.wrap_enabled(ctx.schema, col_key);
        let underline = resolved.style.underline.unwrap_or(false) || is_link;
        let strike = resolved.style.strike.unwrap_or(false);

        if wrap {
            let lines = self.wrapped_lines(&resolved.text, rect.w, &font);
            for (i, line) in lines.iter().enumerate() {
                let y = rect.y + LINE_HEIGHT * (i as f32 + 0.75);
                if y > rect.bottom() {
                    break;
                }
                self.display_list.push(DrawOp::Text {
                    x,
                    y,
                    text: line.clone(),
                    font: font.clone(),
                    color,
                    anchor,
                    underline,
                    strike,
                });
            }
        } else {
            self.display_list.push(DrawOp::Text {
                x,
                y: rect.y + rect.h / 2.0 + 4.0,
                text: resolved.text.clone(),
                font,
                color,
                anchor,
                underline,
                strike,
            });
        }
    }

    fn paint_selection_overlay(&mut self) {
        let range = self.layout.visible_range;
        for row_index in range.start..range.end {
            for col_index in 0..self.layout.col_keys.len() {
                if self.selection.contains(row_index, col_index) {
                    let rect = self.layout.cell_rect(row_index, col_index);
                    self.display_list.push(DrawOp::Rect {
                        rect,
                        color: SELECTION_FILL,
                        filled: true,
                    });
                }
            }
        }
    }

    fn paint_row_headers(&mut self, ctx: &mut RenderContext<'_>) {
        let range = self.layout.visible_range;
        let active_row = match &self.active {
            Some(ActiveCell::Cell { row_id, .. }) => ctx.visible.position(*row_id),
            _ => None,
        };

        for row_index in range.start..range.end {
            let y = HEADER_HEIGHT + self.layout.heights.offset_of(row_index)
                - self.layout.viewport.scroll_top;
            let h = self.layout.heights.height(row_index);
            let rect = Rect::new(0.0, y, ROW_HEADER_WIDTH, h);

            let highlighted = active_row == Some(row_index);
            self.display_list.push(DrawOp::Rect {
                rect,
                color: if highlighted { SELECTION_FILL } else { HEADER_BG },
                filled: true,
            });

            if let Some(&row_id) = ctx.visible.order.get(row_index) {
                if let Some(row) = ctx.model.row(row_id) {
                    let font = self.font_for(false, false);
                    self.display_list.push(DrawOp::Text {
                        x: ROW_HEADER_WIDTH / 2.0,
                        y: y + h / 2.0 + 4.0,
                        text: row.display_index.to_string(),
                        font,
                        color: MUTED_TEXT,
                        anchor: TextAnchor::Center,
                        underline: false,
                        strike: false,
                    });
                }
            }

            self.display_list.push(DrawOp::Line {
                x1: 0.0,
                y1: rect.bottom(),
                x2: ROW_HEADER_WIDTH,
                y2: rect.bottom(),
                color: GRID_LINE,
            });
        }
    }

    fn paint_header_row(&mut self, ctx: &mut RenderContext<'_>) {
        let col_keys = self.layout.col_keys.clone();
        for (col_index, col_key) in col_keys.iter().enumerate() {
            let rect = self.layout.header_rect(col_index);
            self.display_list.push(DrawOp::Rect {
                rect,
                color: HEADER_BG,
                filled: true,
            });

            let label = ctx
                .schema
                .column(col_key)
                .map(|c| c.header_label().to_string())
                .unwrap_or_else(|| col_key.clone());
            let font = self.font_for(false, true);
            self.display_list.push(DrawOp::Text {
                x: rect.x + CELL_PADDING,
                y: HEADER_HEIGHT / 2.0 + 4.0,
                text: label,
                font,
                color: Color::black(),
                anchor: TextAnchor::Left,
                underline: false,
                strike: false,
            });

            // Sort arrow / filter funnel: shown while active, or on hover.
            let sorted = ctx.view.sort_for(col_key);
            let filtered = ctx.view.has_filter(col_key);
            let hovered = self
                .hover
                .map(|(hx, hy)| rect.contains(hx, hy))
                .unwrap_or(false);

            if sorted.is_some() || filtered || hovered {
                let icon_rect = self.layout.header_icon_rect(col_index);
                let kind = match sorted.map(|s| s.direction) {
                    Some(view_engine::SortDirection::Ascending) => IconKind::SortAscending,
                    Some(view_engine::SortDirection::Descending) => IconKind::SortDescending,
                    None => IconKind::Funnel,
                };
                self.display_list.push(DrawOp::Icon {
                    rect: icon_rect,
                    kind,
                    color: if sorted.is_some() || filtered {
                        ACTIVE_OUTLINE
                    } else {
                        MUTED_TEXT
                    },
                });
            }

            self.display_list.push(DrawOp::Line {
                x1: rect.right(),
                y1: 0.0,
                x2: rect.right(),
                y2: HEADER_HEIGHT,
                color: GRID_LINE,
            });
        }

        self.display_list.push(DrawOp::Line {
            x1: 0.0,
            y1: HEADER_HEIGHT,
            x2: self.layout.viewport.width,
            y2: HEADER_HEIGHT,
            color: GRID_LINE,
        });
    }

    fn paint_corner(&mut self) {
        self.display_list.push(DrawOp::Rect {
            rect: Rect::new(0.0, 0.0, ROW_HEADER_WIDTH, HEADER_HEIGHT),
            color: HEADER_BG,
            filled: true,
        });
    }

    fn paint_active_cell(&mut self, ctx: &mut RenderContext<'_>) {
        let (row_id, col_key) = match &self.active {
            Some(ActiveCell::Cell { row_id, col_key }) => (*row_id, col_key.clone()),
            _ => return,
        };
        let row_index = match ctx.visible.position(row_id) {
            Some(index) => index,
            None => return,
        };
        let col_index = match self.layout.col_keys.iter().position(|k| *k == col_key) {
            Some(index) => index,
            None => return,
        };

        let rect = self.layout.cell_rect(row_index, col_index);
        self.display_list.push(DrawOp::Rect {
            rect,
            color: ACTIVE_OUTLINE,
            filled: false,
        });

        // Fill handle: single-cell selection on an editable non-formula
        // column only.
        if self.selection.fill_handle_visible(ctx.schema.column(&col_key)) {
            let handle = Rect::new(
                rect.right() - FILL_HANDLE_SIZE / 2.0,
                rect.bottom() - FILL_HANDLE_SIZE / 2.0,
                FILL_HANDLE_SIZE,
                FILL_HANDLE_SIZE,
            );
            self.display_list.push(DrawOp::Rect {
                rect: handle,
                color: ACTIVE_OUTLINE,
                filled: true,
            });
            self.fill_handle = Some(handle);
        }
    }
}

impl Renderer for CanvasRenderer {
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
        let (width, height) = viewport.clamped_size();
        let viewport = Viewport {
            width,
            height,
            ..viewport
        };

        // Rebuild measurement state when the row identity or the wrap
        // cache key changed.
        if ctx.view.any_wrap_enabled(ctx.schema) {
            let key = self.wrap_cache_key(ctx);
            self.wrap_cache.ensure_key(&key);
            // A row with no valid measurement (never measured, or edited
            // since) re-arms the pump.
            let missing = ctx.visible.order.iter().any(|&row_id| {
                let version = ctx.model.get_row_version(row_id).unwrap_or(0);
                self.wrap_cache.get(row_id, version).is_none()
            });
            if self.row_order != ctx.visible.order || (missing && self.pump.is_done()) {
                self.pump.reset(ctx.visible.len());
            }
        }
        if self.row_order != ctx.visible.order {
            self.row_order = ctx.visible.order.clone();
        }

        let heights: Vec<f32> = (0..ctx.visible.len())
            .map(|i| self.effective_row_height(ctx, i))
            .collect();
        self.layout = GridLayout::build(ctx, viewport, |i| {
            heights.get(i).copied().unwrap_or(DEFAULT_ROW_HEIGHT)
        });

        self.paint(ctx, viewport);
    }

    fn hit_test(&self, x: f32, y: f32) -> HitTarget {
        if let Some(handle) = &self.fill_handle {
            if handle.contains(x, y) {
                return HitTarget::FillHandle;
            }
        }

        let base = self.layout.hit_test(x, y);
        if let HitTarget::ColumnHeader { col_index } = base {
            if self.layout.header_icon_rect(col_index).contains(x, y) {
                return HitTarget::HeaderIcon { col_index };
            }
        }
        base
    }

    fn hit_test_action(&self, x: f32, y: f32) -> Option<ActionHit> {
        self.action_regions
            .iter()
            .find(|(rect, _)| rect.contains(x, y))
            .map(|(_, hit)| hit.clone())
    }

    fn destroy(&mut self) {
        self.mounted = false;
        self.display_list.clear();
        self.action_regions.clear();
        self.fill_handle = None;
        self.text_cache.clear();
        self.wrap_cache.clear();
    }

    fn set_hover(&mut self, position: Option<(f32, f32)>) {
        CanvasRenderer::set_hover(self, position);
    }

    fn measure_tick(&mut self, ctx: &mut RenderContext<'_>, clock: &dyn Clock) -> bool {
        CanvasRenderer::measure_tick(self, ctx, clock)
    }

    fn cursor_at(
        &self,
        x: f32,
        y: f32,
        ctx: &RenderContext<'_>,
        readonly_mode: bool,
    ) -> CursorKind {
        CanvasRenderer::cursor_at(self, x, y, ctx, readonly_mode)
    }
}
