// THEORY:
// Air quality is inferred from how washed-out the sky looks. Only the top third of
// the frame is inspected for colour, since that is where the sky sits on a street
// camera; the global luma spread stands in for visibility, because haze flattens
// contrast across the whole scene.
//
// Key architectural principles:
// 1.  **Three ratios, one spread**: blue, gray and hazy pixel ratios over the sky,
//     plus the standard deviation of sampled luma normalised by 128.
// 2.  **Derived scores**: haze and visibility are fixed linear blends of those four
//     numbers, clamped to [0, 1]. The AQI bucket is picked by walking descending
//     visibility/haze thresholds.
// 3.  **Totality**: every ratio falls back to zero and the contrast to 0.5 when a
//     region has no samples, so tiny or black frames still produce finite scores.

use crate::config::AirQualityConfig;
use crate::core_modules::color_classifier::{is_blue_sky_tint, is_gray_haze, is_hazy};
use crate::core_modules::frame::FrameView;
use crate::core_modules::levels::AqiCategory;
use crate::core_modules::utils::stats::{RunningStats, clamp_unit, ratio};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PollutionIndicators {
    pub smog: bool,
    pub dust: bool,
    pub fog: bool,
    pub clear_sky: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityResult {
    pub haze_level: f64,
    pub visibility_score: f64,
    pub aqi_category: AqiCategory,
    /// Representative index value of `aqi_category`.
    pub aqi_value: u32,
    pub indicators: PollutionIndicators,
    pub confidence: f64,
    pub blue_ratio: f64,
    pub gray_ratio: f64,
    pub hazy_ratio: f64,
    pub contrast: f64,
    /// Mean sky-region luma, 0..255.
    pub sky_brightness: f64,
}

/// Luma standard deviation over the whole frame, normalised to [0, 1].
pub fn image_contrast(frame: &FrameView, stride: u32) -> f64 {
    let mut stats = RunningStats::default();
    for sample in frame.sample(0..frame.height(), stride) {
        stats.push(sample.pixel.luminance());
    }
    if stats.count() == 0 {
        return 0.5;
    }
    clamp_unit(stats.std_dev() / 128.0)
}

pub fn aqi_category(visibility: f64, haze: f64, clear_sky: bool) -> AqiCategory {
    if clear_sky && visibility > 0.8 {
        AqiCategory::Good
    } else if visibility > 0.6 && haze < 0.3 {
        AqiCategory::Moderate
    } else if visibility > 0.4 && haze < 0.5 {
        AqiCategory::UnhealthyForSensitive
    } else if visibility > 0.2 && haze < 0.7 {
        AqiCategory::Unhealthy
    } else if haze < 0.85 {
        AqiCategory::VeryUnhealthy
    } else {
        AqiCategory::Hazardous
    }
}

pub fn estimate_air_quality(frame: &FrameView, cfg: &AirQualityConfig) -> AirQualityResult {
    let mut sky = RunningStats::default();
    let mut blue = 0;
    let mut gray = 0;
    let mut hazy = 0;
    for sample in frame.sample(0..frame.height() / 3, cfg.sky_stride) {
        let pixel = sample.pixel;
        sky.push(pixel.luminance());
        if is_blue_sky_tint(pixel, cfg) {
            blue += 1;
        }
        if is_gray_haze(pixel, cfg) {
            gray += 1;
            if is_hazy(pixel, cfg) {
                hazy += 1;
            }
        }
    }

    let samples = sky.count();
    let blue_ratio = ratio(blue, samples);
    let gray_ratio = ratio(gray, samples);
    let hazy_ratio = ratio(hazy, samples);
    let sky_brightness = sky.mean();
    let contrast = image_contrast(frame, cfg.contrast_stride);

    let haze_level = clamp_unit(gray_ratio * 0.5 + hazy_ratio * 0.3 + (1.0 - contrast) * 0.2);
    let visibility_score = clamp_unit(contrast * 0.6 + blue_ratio * 0.2 + (1.0 - haze_level) * 0.2);

    let indicators = PollutionIndicators {
        smog: haze_level > 0.4 && sky_brightness < 200.0,
        dust: gray_ratio > 0.3 && sky_brightness > 150.0,
        fog: haze_level > 0.5 && sky_brightness > 200.0,
        clear_sky: blue_ratio > 0.3 && haze_level < 0.2,
    };
    let aqi_category = aqi_category(visibility_score, haze_level, indicators.clear_sky);
    let confidence = (0.5 + blue_ratio * 0.3 + (1.0 - haze_level) * 0.2).clamp(0.4, 0.9);

    debug!(haze_level, visibility_score, contrast, blue_ratio, gray_ratio, aqi = ?aqi_category, "air quality estimated");

    AirQualityResult {
        haze_level,
        visibility_score,
        aqi_category,
        aqi_value: aqi_category.index_value(),
        indicators,
        confidence,
        blue_ratio,
        gray_ratio,
        hazy_ratio,
        contrast,
        sky_brightness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb as ImageRgb, RgbImage};

    fn estimate(image: &RgbImage) -> AirQualityResult {
        estimate_air_quality(&FrameView::from_rgb_image(image), &AirQualityConfig::default())
    }

    #[test]
    fn black_frame_is_finite() {
        let result = estimate(&RgbImage::new(64, 64));
        assert_eq!(result.contrast, 0.0);
        assert!((result.haze_level - 0.2).abs() < 1e-12);
        assert!((result.visibility_score - 0.16).abs() < 1e-12);
        assert_eq!(result.aqi_category, AqiCategory::VeryUnhealthy);
        assert_eq!(result.aqi_value, 250);
        assert!(!result.indicators.clear_sky);
    }

    #[test]
    fn white_fog_is_detected() {
        let result = estimate(&RgbImage::from_pixel(60, 60, ImageRgb([230, 230, 230])));
        assert_eq!(result.gray_ratio, 1.0);
        assert_eq!(result.hazy_ratio, 1.0);
        assert!((result.haze_level - 1.0).abs() < 1e-12);
        assert!(result.indicators.fog && result.indicators.dust && !result.indicators.smog);
        assert_eq!(result.aqi_category, AqiCategory::Hazardous);
        assert!((result.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn contrasty_blue_sky_is_good() {
        // Blue sky over an alternating black and white ground for a large luma spread.
        let image = RgbImage::from_fn(120, 120, |x, y| {
            if y < 40 {
                ImageRgb([40, 90, 230])
            } else if (x / 4) % 2 == 0 {
                ImageRgb([0, 0, 0])
            } else {
                ImageRgb([255, 255, 255])
            }
        });
        let result = estimate(&image);
        assert_eq!(result.blue_ratio, 1.0);
        assert!(result.contrast > 0.8);
        assert!(result.indicators.clear_sky);
        assert_eq!(result.aqi_category, AqiCategory::Good);
    }

    #[test]
    fn frames_without_a_sky_region_still_score() {
        let result = estimate(&RgbImage::from_pixel(10, 2, ImageRgb([128, 128, 128])));
        assert_eq!(result.blue_ratio, 0.0);
        assert_eq!(result.sky_brightness, 0.0);
        assert!(result.haze_level.is_finite() && result.visibility_score.is_finite());
    }

    #[test]
    fn aqi_walks_descending_thresholds() {
        assert_eq!(aqi_category(0.9, 0.1, true), AqiCategory::Good);
        assert_eq!(aqi_category(0.9, 0.1, false), AqiCategory::Moderate);
        assert_eq!(aqi_category(0.5, 0.4, false), AqiCategory::UnhealthyForSensitive);
        assert_eq!(aqi_category(0.3, 0.6, false), AqiCategory::Unhealthy);
        assert_eq!(aqi_category(0.1, 0.8, false), AqiCategory::VeryUnhealthy);
        assert_eq!(aqi_category(0.1, 0.9, false), AqiCategory::Hazardous);
    }
}
