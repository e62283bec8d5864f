// THEORY:
// The `BlobDetector` is the engine of the vehicle-counting layer. It turns the road
// portion of a frame into a coarse boolean "occupancy grid" and counts the coherent
// regions on it that are shaped like vehicles.
//
// Key architectural principles & algorithm steps:
// 1.  **Downsampling**: the lower two-thirds of the frame is divided into square cells
//     of `downscale` pixels. Each cell is represented by the pixel at its top-left
//     corner, so the grid is built with one read per cell.
// 2.  **Road Reference**: the road brightness is estimated as the integer mean of a
//     sparse lattice of cells. Vehicle candidates are judged relative to this value,
//     which is what lets the same rules work on dark and bright asphalt.
// 3.  **Denoising**: a marked cell survives only if enough of its 8 neighbours are
//     marked too. Border cells have no full neighbourhood and are always cleared.
// 4.  **Region Growing**: 4-connected components are collected with an explicit,
//     index-based work stack over a flat `visited` array. Memory is bounded by the
//     grid size and there is no recursion.
// 5.  **Shape Filtering**: components outside the size band or with implausible
//     bounding boxes are discarded, and the final count is capped.
// 6.  **Stateless Utility**: `find_vehicle_blobs` allocates only call-local buffers and
//     keeps no memory between frames, so it can run on many threads at once.

use crate::config::{AnalyzerConfig, BlobConfig};
use crate::core_modules::blob::{Blob, Cell};
use crate::core_modules::color_classifier::is_vehicle_candidate;
use crate::core_modules::frame::FrameView;
use crate::core_modules::pixel::pixel::Brightness;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod blob_detector {
    use super::*; // Make the parent module's imports available.

    /// A flat, row-major boolean mask over the downsampled road region.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct OccupancyGrid {
        width: u32,
        height: u32,
        cells: Vec<bool>,
    }

    impl OccupancyGrid {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                cells: vec![false; width as usize * height as usize],
            }
        }

        pub fn width(&self) -> u32 {
            self.width
        }

        pub fn height(&self) -> u32 {
            self.height
        }

        #[inline]
        fn index(&self, x: u32, y: u32) -> usize {
            y as usize * self.width as usize + x as usize
        }

        #[inline]
        pub fn get(&self, x: u32, y: u32) -> bool {
            self.cells[self.index(x, y)]
        }

        #[inline]
        pub fn set(&mut self, x: u32, y: u32, marked: bool) {
            let index = self.index(x, y);
            self.cells[index] = marked;
        }

        pub fn marked_count(&self) -> usize {
            self.cells.iter().filter(|marked| **marked).count()
        }

        fn marked_neighbors(&self, x: u32, y: u32) -> u32 {
            let mut count = 0;
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    if (nx, ny) != (x, y) && self.get(nx, ny) {
                        count += 1;
                    }
                }
            }
            count
        }

        /// Keeps an interior cell only if at least `min_neighbors` of its 8
        /// neighbours are marked in the input mask. Border cells are cleared.
        pub fn denoise(&self, min_neighbors: u32) -> OccupancyGrid {
            let mut clean = OccupancyGrid::new(self.width, self.height);
            if self.width < 3 || self.height < 3 {
                return clean;
            }
            for y in 1..self.height - 1 {
                for x in 1..self.width - 1 {
                    if self.get(x, y) && self.marked_neighbors(x, y) >= min_neighbors {
                        clean.set(x, y, true);
                    }
                }
            }
            clean
        }
    }

    /// Everything the blob pass learned about one frame.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BlobReport {
        /// Accepted blobs in scan order, at most `max_blobs` of them.
        pub blobs: Vec<Blob>,
        /// Connected components found before shape filtering.
        pub raw_components: usize,
        /// Road brightness the vehicle rule was evaluated against.
        pub road_brightness: Brightness,
        pub grid_width: u32,
        pub grid_height: u32,
        /// First image row of the road region.
        pub road_start_y: u32,
        /// Pixels per grid cell along each axis.
        pub downscale: u32,
    }

    impl BlobReport {
        fn empty(cfg: &BlobConfig, road_start_y: u32) -> Self {
            Self {
                blobs: Vec::new(),
                raw_components: 0,
                road_brightness: cfg.fallback_road_brightness,
                grid_width: 0,
                grid_height: 0,
                road_start_y,
                downscale: cfg.downscale,
            }
        }

        /// The capped vehicle blob count, always within `[0, max_blobs]`.
        pub fn blob_count(&self) -> u32 {
            self.blobs.len() as u32
        }
    }

    /// Size and shape test applied to every connected component.
    pub fn is_valid_vehicle_blob(blob: &Blob, cfg: &BlobConfig) -> bool {
        let sized = (cfg.min_blob_cells..=cfg.max_blob_cells).contains(&blob.pixel_count);
        let aspect = blob.aspect_ratio();
        sized
            && aspect >= cfg.min_aspect
            && aspect <= cfg.max_aspect
            && blob.width() >= cfg.min_blob_side
            && blob.height() >= cfg.min_blob_side
    }

    /// Counts vehicle-shaped regions in the road portion of the frame.
    pub fn find_vehicle_blobs(frame: &FrameView, config: &AnalyzerConfig) -> BlobReport {
        let cfg = &config.blobs;
        let width = frame.width();
        let height = frame.height();
        let road_start_y = height / 3;

        // --- 1. Size Gate ---
        if width < cfg.min_image_side || height < cfg.min_image_side {
            return BlobReport::empty(cfg, road_start_y);
        }
        let scale = cfg.downscale.max(1);
        let grid_width = width / scale;
        let grid_height = (height - road_start_y) / scale;
        if grid_width < cfg.min_grid_cells || grid_height < cfg.min_grid_cells {
            return BlobReport::empty(cfg, road_start_y);
        }

        let cell_pixel = |sx: u32, sy: u32| frame.rgb_at(sx * scale, road_start_y + sy * scale);

        // --- 2. Road Reference ---
        let step = cfg.road_sample_step.max(1) as usize;
        let mut brightness_sum: i64 = 0;
        let mut samples: i64 = 0;
        for sy in (0..grid_height).step_by(step) {
            for sx in (0..grid_width).step_by(step) {
                brightness_sum += cell_pixel(sx, sy).brightness() as i64;
                samples += 1;
            }
        }
        let road_brightness = if samples > 0 {
            (brightness_sum / samples) as Brightness
        } else {
            cfg.fallback_road_brightness
        };

        // --- 3. Occupancy Mask ---
        let mut mask = OccupancyGrid::new(grid_width, grid_height);
        for sy in 0..grid_height {
            for sx in 0..grid_width {
                if is_vehicle_candidate(cell_pixel(sx, sy), road_brightness, &config.vehicle_colors) {
                    mask.set(sx, sy, true);
                }
            }
        }

        // --- 4. Denoise ---
        let clean = mask.denoise(cfg.min_neighbors);

        // --- 5. Region Growing & Filtering ---
        let components = connected_components(&clean);
        let raw_components = components.len();
        let mut blobs: Vec<Blob> = components
            .into_iter()
            .filter(|blob| is_valid_vehicle_blob(blob, cfg))
            .collect();
        let accepted = blobs.len();
        blobs.truncate(cfg.max_blobs);

        debug!(
            grid_width,
            grid_height,
            road_brightness,
            marked = mask.marked_count(),
            denoised = clean.marked_count(),
            raw_components,
            accepted,
            reported = blobs.len(),
            "vehicle blobs found"
        );

        BlobReport {
            blobs,
            raw_components,
            road_brightness,
            grid_width,
            grid_height,
            road_start_y,
            downscale: scale,
        }
    }

    /// All 4-connected components of the mask, in scan order of their first cell.
    pub fn connected_components(mask: &OccupancyGrid) -> Vec<Blob> {
        let width = mask.width as usize;
        let mut visited = vec![false; mask.cells.len()];
        let mut stack: Vec<usize> = Vec::with_capacity(mask.cells.len());
        let mut blobs = Vec::new();

        for start in 0..mask.cells.len() {
            if !mask.cells[start] || visited[start] {
                continue;
            }
            visited[start] = true;
            stack.push(start);
            let mut blob: Option<Blob> = None;

            while let Some(index) = stack.pop() {
                let cell = Cell {
                    x: (index % width) as u32,
                    y: (index / width) as u32,
                };
                match blob.as_mut() {
                    Some(blob) => blob.absorb(cell),
                    None => blob = Some(Blob::from_seed(cell)),
                }

                // Check all 4 direct neighbours (not diagonals).
                let mut neighbors = [None; 4];
                if cell.x > 0 {
                    neighbors[0] = Some(index - 1);
                }
                if cell.x + 1 < mask.width {
                    neighbors[1] = Some(index + 1);
                }
                if cell.y > 0 {
                    neighbors[2] = Some(index - width);
                }
                if cell.y + 1 < mask.height {
                    neighbors[3] = Some(index + width);
                }
                for next in neighbors.into_iter().flatten() {
                    if mask.cells[next] && !visited[next] {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }

            blobs.extend(blob);
        }
        blobs
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use image::{Rgb as ImageRgb, RgbImage};

        fn road_with_patches(width: u32, height: u32, patches: &[(u32, u32, u32, u32)]) -> RgbImage {
            RgbImage::from_fn(width, height, |x, y| {
                let inside = patches
                    .iter()
                    .any(|&(px, py, pw, ph)| (px..px + pw).contains(&x) && (py..py + ph).contains(&y));
                if inside { ImageRgb([255, 255, 255]) } else { ImageRgb([70, 70, 70]) }
            })
        }

        fn grid_from(rows: &[&str]) -> OccupancyGrid {
            let mut grid = OccupancyGrid::new(rows[0].len() as u32, rows.len() as u32);
            for (y, row) in rows.iter().enumerate() {
                for (x, c) in row.chars().enumerate() {
                    grid.set(x as u32, y as u32, c == '#');
                }
            }
            grid
        }

        #[test]
        fn flat_road_has_no_blobs() {
            let image = road_with_patches(320, 240, &[]);
            let report = find_vehicle_blobs(&FrameView::from_rgb_image(&image), &AnalyzerConfig::default());
            assert_eq!(report.blob_count(), 0);
            assert_eq!(report.road_brightness, 70);
            assert_eq!(report.raw_components, 0);
        }

        #[test]
        fn single_white_patch_is_one_blob() {
            let image = road_with_patches(200, 200, &[(60, 120, 30, 24)]);
            let report = find_vehicle_blobs(&FrameView::from_rgb_image(&image), &AnalyzerConfig::default());
            assert_eq!((report.grid_width, report.grid_height), (33, 22));
            assert_eq!(report.blob_count(), 1);
            let blob = report.blobs[0];
            assert_eq!((blob.width(), blob.height(), blob.pixel_count), (5, 4, 20));
        }

        #[test]
        fn small_frames_are_rejected() {
            let image = road_with_patches(99, 400, &[(10, 200, 40, 40)]);
            let report = find_vehicle_blobs(&FrameView::from_rgb_image(&image), &AnalyzerConfig::default());
            assert_eq!(report.blob_count(), 0);
            assert_eq!(report.grid_width, 0);

            // 100 rows leave a 67-row road region: 11 cells at downscale 6, 8 at downscale 8.
            let image = road_with_patches(100, 100, &[]);
            let mut config = AnalyzerConfig::default();
            assert_eq!(find_vehicle_blobs(&FrameView::from_rgb_image(&image), &config).grid_height, 11);
            config.blobs.downscale = 8;
            assert_eq!(find_vehicle_blobs(&FrameView::from_rgb_image(&image), &config).grid_height, 0);
        }

        #[test]
        fn denoise_drops_isolated_cells_and_borders() {
            let grid = grid_from(&[
                "#....", //
                "..#..",
                ".....",
                ".###.",
                ".....",
            ]);
            let clean = grid.denoise(2);
            assert!(!clean.get(0, 0));
            assert!(!clean.get(2, 1));
            assert!(clean.get(2, 3));
            assert!(!clean.get(1, 3) && !clean.get(3, 3));
            assert_eq!(clean.marked_count(), 1);
        }

        #[test]
        fn components_are_four_connected() {
            let grid = grid_from(&[
                "##..#", //
                "##...",
                "..#..",
                "....#",
            ]);
            let blobs = connected_components(&grid);
            assert_eq!(blobs.len(), 4);
            assert_eq!(blobs[0].pixel_count, 4);
            assert_eq!((blobs[0].width(), blobs[0].height()), (2, 2));
        }

        #[test]
        fn flood_fill_handles_a_full_grid() {
            let mut grid = OccupancyGrid::new(200, 200);
            for y in 0..200 {
                for x in 0..200 {
                    grid.set(x, y, true);
                }
            }
            let blobs = connected_components(&grid);
            assert_eq!(blobs.len(), 1);
            assert_eq!(blobs[0].pixel_count, 40_000);
        }

        #[test]
        fn shape_filter_bounds() {
            let cfg = BlobConfig::default();
            let blob = |w: u32, h: u32, count: usize| Blob {
                min_x: 0,
                min_y: 0,
                max_x: w - 1,
                max_y: h - 1,
                pixel_count: count,
            };
            assert!(is_valid_vehicle_blob(&blob(4, 3, 12), &cfg));
            assert!(!is_valid_vehicle_blob(&blob(4, 1, 4), &cfg));
            assert!(!is_valid_vehicle_blob(&blob(2, 2, 4), &cfg));
            assert!(!is_valid_vehicle_blob(&blob(12, 2, 24), &cfg));
            assert!(!is_valid_vehicle_blob(&blob(10, 10, 100), &cfg));
            assert!(is_valid_vehicle_blob(&blob(10, 2, 20), &cfg));
        }

        #[test]
        fn count_is_capped() {
            // A lattice of 40 separate 4x3-cell patches.
            let mut patches = Vec::new();
            for row in 0..5 {
                for col in 0..8 {
                    patches.push((12 + col * 48, 180 + row * 42, 24, 18));
                }
            }
            let image = road_with_patches(420, 420, &patches);
            let report = find_vehicle_blobs(&FrameView::from_rgb_image(&image), &AnalyzerConfig::default());
            assert!(report.raw_components > 25);
            assert_eq!(report.blob_count(), 25);
        }
    }
}
