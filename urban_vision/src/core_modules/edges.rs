// Gradient edge densities. A sampled interior pixel is an edge when the magnitude of
// its central-difference brightness gradient, `sqrt(dx² + dy²)`, exceeds a threshold.
// Densities are edges over pixels actually sampled, so they always lie in [0, 1].

use crate::core_modules::frame::FrameView;
use crate::core_modules::utils::stats::ratio;
use std::ops::Range;

#[inline]
fn gradient_magnitude(frame: &FrameView, x: u32, y: u32) -> f64 {
    let dx = frame.brightness_at(x + 1, y) - frame.brightness_at(x - 1, y);
    let dy = frame.brightness_at(x, y + 1) - frame.brightness_at(x, y - 1);
    ((dx * dx + dy * dy) as f64).sqrt()
}

/// Edge density over the given rows, restricted to pixels that have all four
/// neighbours inside the frame.
pub fn edge_density(frame: &FrameView, rows: Range<u32>, stride: u32, threshold: f64) -> f64 {
    let width = frame.width();
    let height = frame.height();
    if width < 3 || height < 3 {
        return 0.0;
    }
    let rows = rows.start.max(1)..rows.end.min(height - 1);

    let mut samples = 0;
    let mut edges = 0;
    for sample in frame.sample_region(1..width - 1, rows, stride, stride) {
        samples += 1;
        if gradient_magnitude(frame, sample.x, sample.y) > threshold {
            edges += 1;
        }
    }
    ratio(edges, samples)
}

/// Edge density below the horizon, where pedestrians and vehicles stand.
pub fn road_edge_density(frame: &FrameView, stride: u32, threshold: f64) -> f64 {
    let road_start = frame.height() / 3;
    edge_density(frame, road_start + 1..frame.height(), stride, threshold)
}

/// Edge density over the whole frame.
pub fn scene_edge_density(frame: &FrameView, stride: u32, threshold: f64) -> f64 {
    edge_density(frame, 1..frame.height(), stride, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb as ImageRgb, RgbImage};

    #[test]
    fn flat_frame_has_no_edges() {
        let image = RgbImage::from_pixel(60, 60, ImageRgb([90, 90, 90]));
        let frame = FrameView::from_rgb_image(&image);
        assert_eq!(scene_edge_density(&frame, 1, 25.0), 0.0);
        assert_eq!(road_edge_density(&frame, 3, 30.0), 0.0);
    }

    #[test]
    fn checkerboard_is_all_edges() {
        let image = RgbImage::from_fn(40, 40, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 { ImageRgb([0, 0, 0]) } else { ImageRgb([255, 255, 255]) }
        });
        let frame = FrameView::from_rgb_image(&image);
        // Every pixel sits next to a 2-pixel cell boundary along at least one axis.
        assert_eq!(scene_edge_density(&frame, 1, 25.0), 1.0);
    }

    #[test]
    fn road_density_ignores_the_top_third() {
        let image = RgbImage::from_fn(90, 90, |x, y| {
            if y < 30 && x % 2 == 0 { ImageRgb([255, 255, 255]) } else { ImageRgb([50, 50, 50]) }
        });
        let frame = FrameView::from_rgb_image(&image);
        assert!(scene_edge_density(&frame, 1, 30.0) > 0.0);
        assert_eq!(road_edge_density(&frame, 1, 30.0), 0.0);
    }

    #[test]
    fn degenerate_frames_are_zero() {
        let image = RgbImage::from_pixel(2, 50, ImageRgb([255, 255, 255]));
        assert_eq!(scene_edge_density(&FrameView::from_rgb_image(&image), 1, 25.0), 0.0);
        let image = RgbImage::new(0, 0);
        assert_eq!(road_edge_density(&FrameView::from_rgb_image(&image), 3, 30.0), 0.0);
    }
}
