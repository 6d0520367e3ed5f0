//! FILENAME: core/view-engine/src/height_index.rs
//! PURPOSE: Prefix-sum (Fenwick) tree over per-row heights.
//! CONTEXT: Viewport queries need "height of the first k rows" and "which
//! row sits at y" in O(log N). The tree owns a plain copy of the heights so
//! point updates can be expressed as deltas. The wrap-measurement cache
//! stores per-row measured heights guarded by the row version observed at
//! measurement time.

use std::collections::HashMap;

use engine::RowId;

/// Fenwick tree over f32 row heights.
#[derive(Debug, Clone, Default)]
pub struct HeightIndex {
    /// One-indexed Fenwick array.
    tree: Vec<f32>,
    heights: Vec<f32>,
}

impl HeightIndex {
    /// O(N) build from a height slice.
    pub fn from(heights: &[f32]) -> Self {
        let n = heights.len();
        let mut tree = vec![0.0; n + 1];
        // Linear construction: each node pushes its partial sum to its parent.
        for i in 1..=n {
            tree[i] += heights[i - 1];
            let parent = i + (i & i.wrapping_neg());
            if parent <= n {
                let value = tree[i];
                tree[parent] += value;
            }
        }
        HeightIndex {
            tree,
            heights: heights.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Prefix sum of the first `count` heights.
    pub fn sum(&self, count: usize) -> f32 {
        let mut idx = count.min(self.heights.len());
        let mut total = 0.0;
        while idx > 0 {
            total += self.tree[idx];
            idx &= idx - 1;
        }
        total
    }

    /// Total height of all rows.
    pub fn total(&self) -> f32 {
        self.sum(self.heights.len())
    }

    /// Add `delta` to the height at `index`. O(log N).
    pub fn add(&mut self, index: usize, delta: f32) {
        if index >= self.heights.len() {
            return;
        }
        self.heights[index] += delta;
        let n = self.heights.len();
        let mut idx = index + 1;
        while idx <= n {
            self.tree[idx] += delta;
            idx += idx & idx.wrapping_neg();
        }
    }

    /// Set the height at `index` to an absolute value.
    pub fn set(&mut self, index: usize, height: f32) {
        if let Some(&current) = self.heights.get(index) {
            self.add(index, height - current);
        }
    }

    pub fn height(&self, index: usize) -> f32 {
        self.heights.get(index).copied().unwrap_or(0.0)
    }

    /// First index whose prefix sum reaches `target` (i.e. the row that
    /// contains the y offset `target - 1`). Returns `len()` when the
    /// target exceeds the total. O(log N).
    pub fn lower_bound(&self, target: f32) -> usize {
        let n = self.heights.len();
        if n == 0 {
            return 0;
        }

        let mut pos = 0usize;
        let mut remaining = target;
        // Largest power of two <= n
        let mut step = 1usize;
        while step << 1 <= n {
            step <<= 1;
        }

        while step > 0 {
            let next = pos + step;
            if next <= n && self.tree[next] < remaining {
                pos = next;
                remaining -= self.tree[next];
            }
            step >>= 1;
        }

        pos
    }
}

/// The rows a viewport shows, with a two-row overscan on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleRange {
    /// First visible row index (inclusive).
    pub start: usize,
    /// One past the last visible row index.
    pub end: usize,
}

/// Rows overscanned beyond the viewport on each side.
pub const OVERSCAN_ROWS: usize = 2;

impl HeightIndex {
    /// Select the rows covering [scroll_top, scroll_top + viewport_height)
    /// plus overscan.
    pub fn visible_range(&self, scroll_top: f32, viewport_height: f32) -> VisibleRange {
        let n = self.len();
        if n == 0 || viewport_height <= 0.0 {
            return VisibleRange::default();
        }

        let first = self.lower_bound(scroll_top + 1.0).min(n - 1);
        let bottom = scroll_top + viewport_height;

        let mut end = first;
        while end < n && self.sum(end) < bottom {
            end += 1;
        }

        VisibleRange {
            start: first.saturating_sub(OVERSCAN_ROWS),
            end: (end + OVERSCAN_ROWS).min(n),
        }
    }

    /// Y offset of the top edge of a row.
    pub fn offset_of(&self, index: usize) -> f32 {
        self.sum(index)
    }

    /// The row containing the given y offset, if any.
    pub fn row_at(&self, y: f32) -> Option<usize> {
        if y < 0.0 || y >= self.total() {
            return None;
        }
        Some(self.lower_bound(y + 1.0).min(self.len().saturating_sub(1)))
    }
}

// ============================================================================
// WRAP MEASUREMENT CACHE
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct MeasuredHeight {
    height: f32,
    /// Row version observed when the measurement was taken.
    version: u64,
}

/// Measured wrap heights, invalidated wholesale when the cache key (wrap
/// mask + joined column widths) changes and per-row when versions drift.
#[derive(Debug, Default)]
pub struct WrapMeasureCache {
    key: String,
    measured: HashMap<RowId, MeasuredHeight>,
}

impl WrapMeasureCache {
    pub fn new() -> Self {
        WrapMeasureCache::default()
    }

    /// Build the cache key from per-column (wrap-enabled, width) pairs.
    pub fn cache_key<'a, I>(columns: I) -> String
    where
        I: IntoIterator<Item = (&'a str, bool, f32)>,
    {
        let mut key = String::new();
        for (col_key, wrap, width) in columns {
            key.push_str(col_key);
            key.push(if wrap { 'w' } else { '-' });
            key.push_str(&format!("{:.1}|", width));
        }
        key
    }

    /// Adopt a key, dropping every measurement if it changed.
    pub fn ensure_key(&mut self, key: &str) {
        if self.key != key {
            self.key = key.to_string();
            self.measured.clear();
        }
    }

    /// Store a measurement, but only if the row's version has not moved
    /// since the measurement was taken.
    pub fn store(
        &mut self,
        row_id: RowId,
        height: f32,
        observed_version: u64,
        current_version: u64,
    ) -> bool {
        if observed_version != current_version {
            return false;
        }
        self.measured.insert(
            row_id,
            MeasuredHeight {
                height,
                version: observed_version,
            },
        );
        true
    }

    /// A measured height, if it is still valid for the row's version.
    pub fn get(&self, row_id: RowId, current_version: u64) -> Option<f32> {
        self.measured
            .get(&row_id)
            .filter(|m| m.version == current_version)
            .map(|m| m.height)
    }

    pub fn len(&self) -> usize {
        self.measured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measured.is_empty()
    }

    pub fn clear(&mut self) {
        self.measured.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_matches_sum_after_arbitrary_adds() {
        let heights = vec![24.0, 24.0, 48.0, 24.0, 100.0, 24.0];
        let mut index = HeightIndex::from(&heights);
        let mut mirror = heights.clone();

        let updates = [(0usize, 6.0f32), (4, -50.0), (2, 12.0), (5, 0.5)];
        for (i, delta) in updates {
            index.add(i, delta);
            mirror[i] += delta;
        }

        let expected: f32 = mirror.iter().sum();
        assert!((index.total() - expected).abs() < 1e-3);

        for k in 0..=mirror.len() {
            let expected_prefix: f32 = mirror[..k].iter().sum();
            assert!((index.sum(k) - expected_prefix).abs() < 1e-3, "prefix {}", k);
        }
    }

    #[test]
    fn test_lower_bound_inverts_prefix_sum() {
        let heights = vec![10.0, 20.0, 30.0, 5.0, 25.0];
        let index = HeightIndex::from(&heights);

        for k in 0..heights.len() {
            assert_eq!(index.lower_bound(index.sum(k) + 1.0), k, "k = {}", k);
        }
        // Past the end
        assert_eq!(index.lower_bound(index.total() + 1.0), heights.len());
    }

    #[test]
    fn test_row_at_offsets() {
        let index = HeightIndex::from(&[10.0, 20.0, 30.0]);
        assert_eq!(index.row_at(0.0), Some(0));
        assert_eq!(index.row_at(9.9), Some(0));
        assert_eq!(index.row_at(10.0), Some(1));
        assert_eq!(index.row_at(29.9), Some(1));
        assert_eq!(index.row_at(30.0), Some(2));
        assert_eq!(index.row_at(60.0), None);
        assert_eq!(index.row_at(-1.0), None);
    }

    #[test]
    fn test_visible_range_covers_viewport_plus_overscan() {
        let heights = vec![24.0; 100];
        let index = HeightIndex::from(&heights);

        // Scrolled to y=240 (row 10), 120px viewport shows rows 10..15.
        let range = index.visible_range(240.0, 120.0);
        assert_eq!(range.start, 10 - OVERSCAN_ROWS);
        assert_eq!(range.end, 15 + OVERSCAN_ROWS);
    }

    #[test]
    fn test_visible_range_clamps_at_edges() {
        let index = HeightIndex::from(&[24.0; 5]);
        let range = index.visible_range(0.0, 1000.0);
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 5);
    }

    #[test]
    fn test_measure_cache_version_guard() {
        let mut cache = WrapMeasureCache::new();
        cache.ensure_key("a-120.0|");

        let row = RowId(1);
        // Row moved between measurement and store: discarded.
        assert!(!cache.store(row, 48.0, 3, 4));
        assert_eq!(cache.get(row, 4), None);

        assert!(cache.store(row, 48.0, 4, 4));
        assert_eq!(cache.get(row, 4), Some(48.0));
        // A later edit invalidates the read side too.
        assert_eq!(cache.get(row, 5), None);
    }

    #[test]
    fn test_measure_cache_key_change_drops_everything() {
        let mut cache = WrapMeasureCache::new();
        cache.ensure_key("aw120.0|");
        cache.store(RowId(1), 48.0, 0, 0);
        assert_eq!(cache.len(), 1);

        // Same key: kept.
        cache.ensure_key("aw120.0|");
        assert_eq!(cache.len(), 1);

        // Width changed: dropped.
        cache.ensure_key("aw140.0|");
        assert!(cache.is_empty());
    }
}
