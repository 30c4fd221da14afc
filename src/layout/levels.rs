use std::collections::BTreeMap;

/// Tallest desired height seen at each tree depth during one measure pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelHeightTable {
    heights: BTreeMap<usize, f32>,
}

impl LevelHeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.heights.clear();
    }

    /// Keeps the larger of the stored height and `height` for `level`.
    pub fn record(&mut self, level: usize, height: f32) {
        let entry = self.heights.entry(level).or_insert(0.0);
        *entry = entry.max(height);
    }

    pub fn get(&self, level: usize) -> Option<f32> {
        self.heights.get(&level).copied()
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Levels in ascending order with their row height.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.heights.iter().map(|(level, height)| (*level, *height))
    }

    /// Sum of all row heights with `spacing` between consecutive rows.
    pub fn total_height(&self, spacing: f32) -> f32 {
        let stacked: f32 = self.heights.values().map(|height| height + spacing).sum();
        (stacked - spacing).max(0.0)
    }
}
