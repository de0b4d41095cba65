// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Log-odds occupancy grid and Bresenham ray traversal.
//!
//! Cells are stored row-major with cell (0, 0) at the minimum x/y corner.
//! Each cell holds a log-odds accumulator clamped to `[l_min, l_max]`.
//! Classification compares the accumulator directly against
//! `logit(occupied_thresh)` and `logit(free_thresh)`.

use super::config::{logit, MapConfig};
use crate::msgs::Pose2D;

/// Signed cell index; may lie outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Ternary cell classification used for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Unknown,
    Free,
    Occupied,
}

/// Occupancy grid with per-cell log-odds.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    resolution: f64,
    /// World pose of cell (0, 0)'s corner
    origin: Pose2D,
    cells: Vec<f32>,
    l_min: f32,
    l_max: f32,
    hit: f64,
    miss: f64,
    occupied_threshold: f32,
    free_threshold: f32,
}

impl OccupancyGrid {
    /// Create a grid with every cell at `config.l0`.
    ///
    /// `config` must have passed [`MapConfig::validate`].
    pub fn new(config: &MapConfig, origin: Pose2D) -> Self {
        Self {
            width: config.width,
            height: config.height,
            resolution: config.resolution,
            origin,
            cells: vec![config.l0 as f32; config.width * config.height],
            l_min: config.l_min as f32,
            l_max: config.l_max as f32,
            hit: config.hit_update(),
            miss: config.miss_update(),
            occupied_threshold: logit(config.occupied_thresh) as f32,
            free_threshold: logit(config.free_thresh) as f32,
        }
    }

    /// Cells along x.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Cells along y.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Meters per cell.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// World pose of cell (0, 0).
    pub fn origin(&self) -> Pose2D {
        self.origin
    }

    /// Raw log-odds, row-major.
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    /// World center of the grid.
    pub fn center(&self) -> (f64, f64) {
        (
            self.origin.x + self.width as f64 * self.resolution / 2.0,
            self.origin.y + self.height as f64 * self.resolution / 2.0,
        )
    }

    /// Cell containing a world point: `floor((p - origin) / resolution)`.
    #[inline]
    pub fn world_to_cell(&self, x: f64, y: f64) -> GridCoord {
        GridCoord::new(
            ((x - self.origin.x) / self.resolution).floor() as i32,
            ((y - self.origin.y) / self.resolution).floor() as i32,
        )
    }

    /// World coordinates of a cell's center.
    #[inline]
    pub fn cell_to_world(&self, coord: GridCoord) -> (f64, f64) {
        (
            self.origin.x + (f64::from(coord.x) + 0.5) * self.resolution,
            self.origin.y + (f64::from(coord.y) + 0.5) * self.resolution,
        )
    }

    /// Clip the world segment `from -> to` to the grid rectangle.
    ///
    /// Returns the in-bounds cells of the clipped ends, or `None` when the
    /// segment misses the grid. Uses Liang-Barsky parametric clipping.
    pub fn clip_segment(
        &self,
        from: (f64, f64),
        to: (f64, f64),
    ) -> Option<(GridCoord, GridCoord)> {
        if ![from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let min_x = self.origin.x;
        let min_y = self.origin.y;
        let max_x = min_x + self.width as f64 * self.resolution;
        let max_y = min_y + self.height as f64 * self.resolution;

        let (mut t0, mut t1) = (0.0f64, 1.0f64);
        for (p, q) in [
            (-dx, from.0 - min_x),
            (dx, max_x - from.0),
            (-dy, from.1 - min_y),
            (dy, max_y - from.1),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }

        let point = |t: f64| {
            if t == 0.0 {
                from
            } else if t == 1.0 {
                to
            } else {
                (from.0 + t * dx, from.1 + t * dy)
            }
        };
        Some((self.clamp_cell(point(t0)), self.clamp_cell(point(t1))))
    }

    /// Cell of a point on or inside the grid edge.
    fn clamp_cell(&self, (x, y): (f64, f64)) -> GridCoord {
        let cell = self.world_to_cell(x, y);
        GridCoord::new(
            cell.x.clamp(0, self.width as i32 - 1),
            cell.y.clamp(0, self.height as i32 - 1),
        )
    }

    #[inline]
    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
    }

    #[inline]
    fn index(&self, coord: GridCoord) -> Option<usize> {
        self.in_bounds(coord)
            .then(|| coord.y as usize * self.width + coord.x as usize)
    }

    /// Log-odds of a cell; `None` outside the grid.
    pub fn log_odds(&self, coord: GridCoord) -> Option<f32> {
        self.index(coord).map(|i| self.cells[i])
    }

    /// Occupancy probability of a cell; `None` outside the grid.
    pub fn probability(&self, coord: GridCoord) -> Option<f64> {
        self.log_odds(coord)
            .map(|l| 1.0 / (1.0 + (-f64::from(l)).exp()))
    }

    fn add(&mut self, coord: GridCoord, delta: f64) -> bool {
        match self.index(coord) {
            Some(i) => {
                let updated = (f64::from(self.cells[i]) + delta) as f32;
                self.cells[i] = updated.clamp(self.l_min, self.l_max);
                true
            }
            None => false,
        }
    }

    /// Add `logit(p_hit)`. Returns false outside the grid.
    pub fn apply_hit(&mut self, coord: GridCoord) -> bool {
        self.add(coord, self.hit)
    }

    /// Add `logit(p_miss)`. Returns false outside the grid.
    pub fn apply_miss(&mut self, coord: GridCoord) -> bool {
        self.add(coord, self.miss)
    }

    /// Saturate a cell to `l_max`. Returns false outside the grid.
    pub fn mark_occupied(&mut self, coord: GridCoord) -> bool {
        match self.index(coord) {
            Some(i) => {
                self.cells[i] = self.l_max;
                true
            }
            None => false,
        }
    }

    #[inline]
    fn classify(&self, l: f32) -> CellState {
        if l >= self.occupied_threshold {
            CellState::Occupied
        } else if l <= self.free_threshold {
            CellState::Free
        } else {
            CellState::Unknown
        }
    }

    /// Ternary state of a cell; `None` outside the grid.
    pub fn state(&self, coord: GridCoord) -> Option<CellState> {
        self.log_odds(coord).map(|l| self.classify(l))
    }

    /// Ternary states, row-major from cell (0, 0).
    pub fn states(&self) -> impl Iterator<Item = CellState> + '_ {
        self.cells.iter().map(|&l| self.classify(l))
    }

    /// Count cells as `(free, unknown, occupied)`.
    pub fn count_cells(&self) -> (usize, usize, usize) {
        self.states()
            .fold((0, 0, 0), |(free, unknown, occupied), state| match state {
                CellState::Free => (free + 1, unknown, occupied),
                CellState::Unknown => (free, unknown + 1, occupied),
                CellState::Occupied => (free, unknown, occupied + 1),
            })
    }

    /// Coordinates of every occupied cell, row-major.
    pub fn occupied_cells(&self) -> Vec<GridCoord> {
        self.states()
            .enumerate()
            .filter(|(_, s)| *s == CellState::Occupied)
            .map(|(i, _)| GridCoord::new((i % self.width) as i32, (i / self.width) as i32))
            .collect()
    }

    /// Bytes held by the cell storage.
    pub fn memory_usage(&self) -> usize {
        self.cells.len() * std::mem::size_of::<f32>()
    }
}

/// Bresenham's line algorithm iterator.
///
/// Yields every cell from `start` to `end`, both included. Steps are
/// computed in `i64` so any pair of coordinates is safe.
pub struct BresenhamLine {
    x: i64,
    y: i64,
    dx: i64,
    dy: i64,
    x_inc: i64,
    y_inc: i64,
    error: i64,
    steep: bool,
    end_x: i64,
    end_y: i64,
    done: bool,
}

impl BresenhamLine {
    pub fn new(start: GridCoord, end: GridCoord) -> Self {
        let (sx, sy) = (i64::from(start.x), i64::from(start.y));
        let (ex, ey) = (i64::from(end.x), i64::from(end.y));
        let dx = (ex - sx).abs();
        let dy = (ey - sy).abs();
        let steep = dy > dx;

        let (x, y, end_x, end_y, dx, dy) = if steep {
            (sy, sx, ey, ex, dy, dx)
        } else {
            (sx, sy, ex, ey, dx, dy)
        };

        Self {
            x,
            y,
            dx,
            dy,
            x_inc: if end_x > x { 1 } else { -1 },
            y_inc: if end_y > y { 1 } else { -1 },
            error: dx / 2,
            steep,
            end_x,
            end_y,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = GridCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Every visited coordinate lies between two i32 endpoints.
        let current = if self.steep {
            GridCoord::new(self.y as i32, self.x as i32)
        } else {
            GridCoord::new(self.x as i32, self.y as i32)
        };

        if self.x == self.end_x && self.y == self.end_y {
            self.done = true;
            return Some(current);
        }

        self.error -= self.dy;
        if self.error < 0 {
            self.y += self.y_inc;
            self.error += self.dx;
        }
        self.x += self.x_inc;

        Some(current)
    }
}
