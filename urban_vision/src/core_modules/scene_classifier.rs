// THEORY:
// The `SceneClassifier` is the gate in front of every other analyzer. Vehicle and
// traffic figures only mean something on a road, so before anything is counted the
// frame is classified from a handful of sampled colour ratios:
//
// 1.  **Sky pass**: the top third is sampled for blue or overcast sky.
// 2.  **Ground pass**: the lower two-thirds are sampled for asphalt, brown floors,
//     vegetation and colour variety.
// 3.  **Rule evaluation**: `SceneAnalysis::from_ratios` turns the ratios into the
//     outdoor/indoor/traffic flags, a `SceneType` picked in fixed priority order and a
//     confidence that later discounts vehicle and people counts.
//
// Ratios are normalised by the sample count of their own region, so a frame that is
// entirely sky reports `sky_ratio = 1` and `road_ratio = 0` regardless of brightness.

use crate::config::SceneConfig;
use crate::core_modules::color_classifier::{is_brown_floor, is_road, is_sky, is_vegetation};
use crate::core_modules::frame::FrameView;
use crate::core_modules::levels::SceneType;
use crate::core_modules::pixel::pixel::COLOR_BIN_COUNT;
use crate::core_modules::utils::stats::{clamp_unit, ratio};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Raw sampled measurements the scene rules are evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneRatios {
    pub sky_ratio: f64,
    pub road_ratio: f64,
    pub brown_ratio: f64,
    pub green_ratio: f64,
    /// Mean integer brightness over every sampled pixel, 0..255.
    pub avg_brightness: f64,
    /// Distinct colour bins in the ground region divided by 100.
    pub color_variety: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAnalysis {
    pub scene_type: SceneType,
    pub is_traffic_scene: bool,
    pub is_outdoor: bool,
    pub is_indoor: bool,
    pub confidence: f64,
    pub sky_ratio: f64,
    pub road_ratio: f64,
    pub brown_ratio: f64,
    pub green_ratio: f64,
    pub avg_brightness: f64,
    pub color_variety: f64,
    pub horizontal_lines: u32,
}

impl SceneAnalysis {
    /// Pure rule evaluation over already-sampled ratios.
    pub fn from_ratios(ratios: SceneRatios, cfg: &SceneConfig) -> Self {
        let sky_ratio = clamp_unit(ratios.sky_ratio);
        let road_ratio = clamp_unit(ratios.road_ratio);
        let brown_ratio = clamp_unit(ratios.brown_ratio);
        let green_ratio = clamp_unit(ratios.green_ratio);
        let avg_brightness = ratios.avg_brightness;

        let is_outdoor = sky_ratio > cfg.outdoor_sky_ratio
            || (avg_brightness > cfg.outdoor_brightness && road_ratio > cfg.outdoor_road_ratio);
        let is_indoor = !is_outdoor
            && (brown_ratio > cfg.indoor_brown_ratio || ratios.color_variety < cfg.indoor_max_color_variety);
        let is_traffic_scene = (sky_ratio > cfg.traffic_sky_ratio || avg_brightness > cfg.traffic_brightness)
            && road_ratio > cfg.traffic_road_ratio
            && brown_ratio < cfg.traffic_max_brown_ratio
            && green_ratio < cfg.traffic_max_green_ratio;

        let scene_type = if is_traffic_scene {
            SceneType::Traffic
        } else if green_ratio > cfg.nature_green_ratio {
            SceneType::Nature
        } else if is_indoor && brown_ratio > cfg.indoor_brown_ratio {
            SceneType::IndoorHistoric
        } else if is_indoor {
            SceneType::Indoor
        } else if is_outdoor {
            SceneType::Outdoor
        } else {
            SceneType::Unknown
        };

        let confidence = if is_traffic_scene && sky_ratio > cfg.high_confidence_sky_ratio && road_ratio > cfg.high_confidence_road_ratio {
            cfg.confidence_high
        } else if is_traffic_scene && road_ratio > cfg.medium_confidence_road_ratio {
            cfg.confidence_medium
        } else if is_traffic_scene {
            cfg.confidence_low
        } else {
            cfg.confidence_non_traffic
        };

        Self {
            scene_type,
            is_traffic_scene,
            is_outdoor,
            is_indoor,
            confidence: clamp_unit(confidence),
            sky_ratio,
            road_ratio,
            brown_ratio,
            green_ratio,
            avg_brightness,
            color_variety: ratios.color_variety,
            horizontal_lines: 0,
        }
    }
}

/// Samples the sky and ground regions and collects the scene ratios.
pub fn sample_scene(frame: &FrameView, cfg: &SceneConfig) -> SceneRatios {
    let height = frame.height();
    let horizon = height / 3;
    let stride = cfg.sample_stride;

    let mut brightness_sum = 0u64;
    let mut sky_samples = 0usize;
    let mut sky_pixels = 0usize;
    for sample in frame.sample(0..horizon, stride) {
        brightness_sum += sample.pixel.brightness() as u64;
        sky_samples += 1;
        if is_sky(sample.pixel) {
            sky_pixels += 1;
        }
    }

    let mut ground_samples = 0usize;
    let mut road_pixels = 0usize;
    let mut brown_pixels = 0usize;
    let mut green_pixels = 0usize;
    let mut seen_bins = [false; COLOR_BIN_COUNT];
    for sample in frame.sample(horizon..height, stride) {
        let pixel = sample.pixel;
        brightness_sum += pixel.brightness() as u64;
        ground_samples += 1;
        seen_bins[pixel.color_bin()] = true;
        if is_road(pixel) {
            road_pixels += 1;
        }
        if is_brown_floor(pixel) {
            brown_pixels += 1;
        }
        if is_vegetation(pixel) {
            green_pixels += 1;
        }
    }

    let total_samples = sky_samples + ground_samples;
    let avg_brightness = if total_samples == 0 {
        0.0
    } else {
        brightness_sum as f64 / total_samples as f64
    };
    let distinct_colors = seen_bins.iter().filter(|seen| **seen).count();

    SceneRatios {
        sky_ratio: ratio(sky_pixels, sky_samples),
        road_ratio: ratio(road_pixels, ground_samples),
        brown_ratio: ratio(brown_pixels, ground_samples),
        green_ratio: ratio(green_pixels, ground_samples),
        avg_brightness,
        color_variety: distinct_colors as f64 / 100.0,
    }
}

/// Counts bright horizontal bands (lane markings, horizon glare) in the middle half.
pub fn count_horizontal_lines(frame: &FrameView, cfg: &SceneConfig) -> u32 {
    let width = frame.width();
    let height = frame.height();
    let min_pixels = width as f64 * cfg.horizontal_line_coverage;
    let mut lines = 0;

    let mut y = height / 4;
    while y < height * 3 / 4 {
        let bright = frame
            .sample_region(10..width.saturating_sub(10), y..y + 1, 1, 1)
            .filter(|sample| sample.pixel.brightness() > cfg.horizontal_line_brightness)
            .count();
        if bright as f64 > min_pixels {
            lines += 1;
        }
        y += cfg.horizontal_line_row_step.max(1);
    }
    lines
}

pub fn classify_scene(frame: &FrameView, cfg: &SceneConfig) -> SceneAnalysis {
    let ratios = sample_scene(frame, cfg);
    let mut analysis = SceneAnalysis::from_ratios(ratios, cfg);
    analysis.horizontal_lines = count_horizontal_lines(frame, cfg);

    debug!(
        scene = ?analysis.scene_type,
        traffic = analysis.is_traffic_scene,
        sky = analysis.sky_ratio,
        road = analysis.road_ratio,
        brightness = analysis.avg_brightness,
        confidence = analysis.confidence,
        "scene classified"
    );
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb as ImageRgb, RgbImage};

    fn split_frame(width: u32, height: u32, top: [u8; 3], bottom: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(width, height, |_, y| if y < height / 3 { ImageRgb(top) } else { ImageRgb(bottom) })
    }

    #[test]
    fn sky_over_road_is_a_confident_traffic_scene() {
        let image = split_frame(320, 240, [135, 180, 220], [70, 70, 70]);
        let scene = classify_scene(&FrameView::from_rgb_image(&image), &SceneConfig::default());
        assert_eq!(scene.scene_type, SceneType::Traffic);
        assert!(scene.is_traffic_scene && scene.is_outdoor && !scene.is_indoor);
        assert_eq!(scene.confidence, 0.9);
        assert_eq!(scene.sky_ratio, 1.0);
        assert_eq!(scene.road_ratio, 1.0);
    }

    #[test]
    fn all_sky_frame_is_not_traffic() {
        let image = RgbImage::from_pixel(200, 150, ImageRgb([135, 180, 220]));
        let scene = classify_scene(&FrameView::from_rgb_image(&image), &SceneConfig::default());
        assert!(!scene.is_traffic_scene);
        assert_eq!(scene.road_ratio, 0.0);
        assert_eq!(scene.scene_type, SceneType::Outdoor);
        assert_eq!(scene.confidence, 0.3);
    }

    #[test]
    fn black_frame_is_indoor_with_zero_brightness() {
        let image = RgbImage::new(120, 90);
        let scene = classify_scene(&FrameView::from_rgb_image(&image), &SceneConfig::default());
        assert_eq!(scene.avg_brightness, 0.0);
        assert_eq!(scene.scene_type, SceneType::Indoor);
    }

    #[test]
    fn priority_order_of_scene_types() {
        let cfg = SceneConfig::default();
        let nature = SceneAnalysis::from_ratios(
            SceneRatios { green_ratio: 0.5, avg_brightness: 90.0, color_variety: 4.0, ..Default::default() },
            &cfg,
        );
        assert_eq!(nature.scene_type, SceneType::Nature);

        let historic = SceneAnalysis::from_ratios(
            SceneRatios { brown_ratio: 0.4, avg_brightness: 90.0, color_variety: 4.0, ..Default::default() },
            &cfg,
        );
        assert_eq!(historic.scene_type, SceneType::IndoorHistoric);

        let unknown = SceneAnalysis::from_ratios(
            SceneRatios { avg_brightness: 90.0, color_variety: 4.0, ..Default::default() },
            &cfg,
        );
        assert_eq!(unknown.scene_type, SceneType::Unknown);
    }

    #[test]
    fn confidence_tiers_for_traffic_scenes() {
        let cfg = SceneConfig::default();
        let medium = SceneAnalysis::from_ratios(
            SceneRatios { sky_ratio: 0.12, road_ratio: 0.12, avg_brightness: 110.0, color_variety: 4.0, ..Default::default() },
            &cfg,
        );
        assert!(medium.is_traffic_scene);
        assert_eq!(medium.confidence, 0.7);

        let low = SceneAnalysis::from_ratios(
            SceneRatios { road_ratio: 0.09, avg_brightness: 130.0, color_variety: 4.0, ..Default::default() },
            &cfg,
        );
        assert!(low.is_traffic_scene);
        assert_eq!(low.confidence, 0.5);
    }

    #[test]
    fn ratios_are_clamped() {
        let scene = SceneAnalysis::from_ratios(
            SceneRatios { sky_ratio: 3.0, road_ratio: -1.0, ..Default::default() },
            &SceneConfig::default(),
        );
        assert_eq!(scene.sky_ratio, 1.0);
        assert_eq!(scene.road_ratio, 0.0);
    }

    #[test]
    fn detects_bright_lane_bands() {
        let image = RgbImage::from_fn(200, 200, |_, y| if y == 100 { ImageRgb([240, 240, 240]) } else { ImageRgb([70, 70, 70]) });
        let lines = count_horizontal_lines(&FrameView::from_rgb_image(&image), &SceneConfig::default());
        assert_eq!(lines, 1);
    }

    #[test]
    fn tiny_frames_do_not_divide_by_zero() {
        let image = RgbImage::from_pixel(2, 2, ImageRgb([255, 0, 0]));
        let scene = classify_scene(&FrameView::from_rgb_image(&image), &SceneConfig::default());
        assert!(scene.sky_ratio.is_finite() && scene.road_ratio.is_finite());
        assert_eq!(scene.sky_ratio, 0.0);
    }
}
