// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! map_server compatible export: a binary PGM raster plus a YAML sidecar.
//!
//! Raster values: occupied 0, free 254, unknown 205. Rows are written
//! top-down, i.e. the highest y row first.

use std::path::{Path, PathBuf};

use tracing::info;

use super::grid::{CellState, OccupancyGrid};
use crate::Result;

pub const OCCUPIED_PIXEL: u8 = 0;
pub const FREE_PIXEL: u8 = 254;
pub const UNKNOWN_PIXEL: u8 = 205;

#[inline]
fn pixel(state: CellState) -> u8 {
    match state {
        CellState::Occupied => OCCUPIED_PIXEL,
        CellState::Free => FREE_PIXEL,
        CellState::Unknown => UNKNOWN_PIXEL,
    }
}

/// Ternary grayscale raster, top row first.
pub fn ternary_raster(grid: &OccupancyGrid) -> Vec<u8> {
    let width = grid.width();
    let states: Vec<CellState> = grid.states().collect();
    let mut raster = Vec::with_capacity(states.len());
    for row in states.chunks_exact(width).rev() {
        raster.extend(row.iter().map(|&s| pixel(s)));
    }
    raster
}

/// Binary PGM (`P5`) image of the ternary raster.
pub fn to_pgm(grid: &OccupancyGrid) -> Vec<u8> {
    let header = format!("P5\n{} {}\n255\n", grid.width(), grid.height());
    let mut out = Vec::with_capacity(header.len() + grid.width() * grid.height());
    out.extend_from_slice(header.as_bytes());
    out.extend(ternary_raster(grid));
    out
}

/// YAML sidecar describing `image`.
pub fn yaml_sidecar(
    grid: &OccupancyGrid,
    image: &str,
    occupied_thresh: f64,
    free_thresh: f64,
) -> String {
    let origin = grid.origin();
    format!(
        "image: {image}\n\
         resolution: {}\n\
         origin: [{}, {}, {}]\n\
         negate: 0\n\
         occupied_thresh: {occupied_thresh}\n\
         free_thresh: {free_thresh}\n",
        grid.resolution(),
        origin.x,
        origin.y,
        origin.yaw,
    )
}

/// An exported map: image bytes plus sidecar text.
#[derive(Debug, Clone, PartialEq)]
pub struct MapExport {
    pub width: usize,
    pub height: usize,
    /// Raster file name referenced by the sidecar
    pub image: String,
    /// PGM file contents
    pub pgm: Vec<u8>,
    /// YAML sidecar contents
    pub yaml: String,
}

impl MapExport {
    /// Render `grid`; the sidecar names `image` as its raster file.
    pub fn new(grid: &OccupancyGrid, image: &str, occupied_thresh: f64, free_thresh: f64) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            image: image.to_string(),
            pgm: to_pgm(grid),
            yaml: yaml_sidecar(grid, image, occupied_thresh, free_thresh),
        }
    }

    /// Point the sidecar at a different raster file name.
    pub fn with_image(mut self, image: &str) -> Self {
        self.yaml = self.yaml.replacen(
            &format!("image: {}\n", self.image),
            &format!("image: {image}\n"),
            1,
        );
        self.image = image.to_string();
        self
    }

    /// Write `<stem>.pgm` and `<stem>.yaml`. Returns both paths.
    pub fn write_files<P: AsRef<Path>>(&self, stem: P) -> Result<(PathBuf, PathBuf)> {
        let stem = stem.as_ref();
        let pgm_path = stem.with_extension("pgm");
        let yaml_path = stem.with_extension("yaml");
        std::fs::write(&pgm_path, &self.pgm)?;
        std::fs::write(&yaml_path, &self.yaml)?;
        info!(
            pgm = %pgm_path.display(),
            yaml = %yaml_path.display(),
            width = self.width,
            height = self.height,
            "Map exported"
        );
        Ok((pgm_path, yaml_path))
    }
}

/// Sidecar `image:` value for files written under `stem`.
pub fn image_name(stem: &Path) -> String {
    stem.with_extension("pgm")
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map.pgm".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::config::MapConfig;
    use crate::mapping::grid::GridCoord;
    use crate::msgs::Pose2D;

    fn grid() -> OccupancyGrid {
        let config = MapConfig {
            resolution: 0.5,
            width: 3,
            height: 2,
            ..Default::default()
        };
        let mut grid = OccupancyGrid::new(&config, Pose2D::new(-1.0, -0.5, 0.0));
        grid.mark_occupied(GridCoord::new(0, 0));
        for _ in 0..3 {
            grid.apply_miss(GridCoord::new(2, 1));
        }
        grid
    }

    #[test]
    fn test_raster_is_top_down() {
        // Row y=1 first: unknown, unknown, free; then y=0: occupied, unknown, unknown.
        assert_eq!(
            ternary_raster(&grid()),
            vec![205, 205, 254, 0, 205, 205]
        );
    }

    #[test]
    fn test_pgm_header() {
        let pgm = to_pgm(&grid());
        assert!(pgm.starts_with(b"P5\n3 2\n255\n"));
        assert_eq!(pgm.len(), b"P5\n3 2\n255\n".len() + 6);
    }

    #[test]
    fn test_yaml_sidecar() {
        let yaml = yaml_sidecar(&grid(), "map.pgm", 0.65, 0.196);
        assert_eq!(
            yaml,
            "image: map.pgm\nresolution: 0.5\norigin: [-1, -0.5, 0]\nnegate: 0\noccupied_thresh: 0.65\nfree_thresh: 0.196\n"
        );
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("office");
        let export = MapExport::new(&grid(), &image_name(&stem), 0.65, 0.196);
        let (pgm, yaml) = export.write_files(&stem).unwrap();
        assert_eq!(std::fs::read(pgm).unwrap(), export.pgm);
        let text = std::fs::read_to_string(yaml).unwrap();
        assert!(text.starts_with("image: office.pgm\n"));
    }

    #[test]
    fn test_with_image_renames_sidecar_reference() {
        let export = MapExport::new(&grid(), "map.pgm", 0.65, 0.196).with_image("lab.pgm");
        assert_eq!(export.image, "lab.pgm");
        assert!(export.yaml.starts_with("image: lab.pgm\nresolution: 0.5\n"));
    }
}
