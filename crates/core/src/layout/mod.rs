//! Grid layout solver.
//!
//! Pure and deterministic: given a clip count and a target canvas, picks the
//! column/row split whose shape deviates least from the canvas aspect ratio,
//! then derives per-cell dimensions and row-major placements. No I/O.

use serde::{Deserialize, Serialize};

/// A solved grid arrangement for one merge job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    /// `(x, y)` pixel offsets, one per clip index, row-major.
    pub placements: Vec<(u32, u32)>,
}

impl GridLayout {
    /// Total cells in the grid, filled or not.
    pub fn capacity(&self) -> u32 {
        self.columns * self.rows
    }
}

/// Computes the grid for `clip_count` clips on a `target_width` x
/// `target_height` canvas.
///
/// Candidate shapes are `columns` in `1..=clip_count` with
/// `rows = ceil(clip_count / columns)`; shapes where a narrower grid with
/// the same row count would still fit are skipped (they only add a dead
/// column). Among candidates the one minimizing
/// `|columns/rows - target aspect|` wins, ties going to the wider grid.
/// Cell dimensions use integer division; the remainder is absorbed by
/// letterbox padding inside each cell.
pub fn solve(clip_count: usize, target_width: u32, target_height: u32) -> GridLayout {
    let n = clip_count.max(1) as u32;
    let target_aspect = f64::from(target_width) / f64::from(target_height);

    let mut columns = 1u32;
    let mut rows = n;
    let mut best_deviation = f64::INFINITY;

    for cols in 1..=n {
        let rws = n.div_ceil(cols);
        if cols > 1 && (cols - 1) * rws >= n {
            continue; // a narrower grid with these rows already fits
        }
        let deviation = (f64::from(cols) / f64::from(rws) - target_aspect).abs();
        // `<=` so equal deviations resolve to the larger column count.
        if deviation <= best_deviation {
            best_deviation = deviation;
            columns = cols;
            rows = rws;
        }
    }

    let cell_width = target_width / columns;
    let cell_height = target_height / rows;
    let placements = (0..clip_count as u32)
        .map(|i| ((i % columns) * cell_width, (i / columns) * cell_height))
        .collect();

    GridLayout {
        columns,
        rows,
        cell_width,
        cell_height,
        placements,
    }
}
