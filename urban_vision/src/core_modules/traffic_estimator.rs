// THEORY:
// The traffic estimator grades a traffic scene twice. The headline `TrafficLevel` is
// a bucket over the confidence-adjusted vehicle count. The `CongestionReport` adds a
// second, independent reading from road occupancy: the share of low-spread road
// pixels below the horizon that are too bright or too tinted to be bare asphalt.
//
// Neither reading exists for non-traffic scenes; `TrafficAnalysisResult::not_applicable`
// is the sentinel the aggregator reports instead.

use crate::config::TrafficConfig;
use crate::core_modules::frame::FrameView;
use crate::core_modules::levels::{CongestionLevel, EstimatedSpeed, TrafficLevel, VehicleDensity};
use crate::core_modules::utils::stats::{clamp_unit, ratio};
use crate::core_modules::vehicle_detector::VehicleDetectionResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionReport {
    pub level: CongestionLevel,
    /// 0..100.
    pub percentage: f64,
    pub estimated_speed: EstimatedSpeed,
    pub road_occupancy: f64,
    pub incident_detected: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficAnalysisResult {
    pub traffic_level: TrafficLevel,
    /// Confidence-adjusted vehicle count the level was derived from.
    pub vehicle_count: u32,
    pub road_edge_density: f64,
    /// `None` on non-traffic scenes.
    pub congestion: Option<CongestionReport>,
}

impl TrafficAnalysisResult {
    pub fn not_applicable() -> Self {
        Self {
            traffic_level: TrafficLevel::NotApplicable,
            vehicle_count: 0,
            road_edge_density: 0.0,
            congestion: None,
        }
    }
}

/// Occupied share of the road pixels below the horizon, or `None` if there are none.
pub fn road_occupancy(frame: &FrameView, cfg: &TrafficConfig) -> Option<f64> {
    let mut road = 0;
    let mut occupied = 0;
    for sample in frame.sample(frame.height() / 3..frame.height(), cfg.occupancy_stride) {
        let pixel = sample.pixel;
        let chroma = pixel.chroma();
        if chroma < cfg.road_max_chroma {
            road += 1;
            if pixel.luminance() > cfg.occupied_min_luma || chroma > cfg.occupied_min_chroma {
                occupied += 1;
            }
        }
    }
    (road > 0).then(|| ratio(occupied, road))
}

pub fn congestion_level(vehicles: u32, occupancy: f64) -> CongestionLevel {
    if vehicles == 0 && occupancy < 0.1 {
        CongestionLevel::FreeFlow
    } else if vehicles < 5 || occupancy < 0.2 {
        CongestionLevel::Light
    } else if vehicles < 15 || occupancy < 0.4 {
        CongestionLevel::Moderate
    } else if vehicles < 25 || occupancy < 0.7 {
        CongestionLevel::Heavy
    } else {
        CongestionLevel::Standstill
    }
}

pub fn congestion_percentage(level: CongestionLevel, occupancy: f64) -> f64 {
    let percentage = match level {
        CongestionLevel::FreeFlow => occupancy * 100.0 * 0.2,
        CongestionLevel::Light => 10.0 + occupancy * 100.0 * 0.3,
        CongestionLevel::Moderate => 30.0 + occupancy * 100.0 * 0.3,
        CongestionLevel::Heavy => 60.0 + occupancy * 100.0 * 0.3,
        CongestionLevel::Standstill => 90.0 + occupancy * 10.0,
    };
    percentage.clamp(0.0, 100.0)
}

fn congestion_report(frame: &FrameView, vehicles: &VehicleDetectionResult, cfg: &TrafficConfig) -> CongestionReport {
    let road_occupancy = road_occupancy(frame, cfg)
        .unwrap_or_else(|| clamp_unit(vehicles.total_vehicles as f64 / 30.0));
    let level = congestion_level(vehicles.total_vehicles, road_occupancy);
    CongestionReport {
        level,
        percentage: congestion_percentage(level, road_occupancy),
        estimated_speed: EstimatedSpeed::from(level),
        road_occupancy,
        incident_detected: vehicles.density == VehicleDensity::VeryHigh && road_occupancy > 0.8,
        confidence: (vehicles.confidence * 0.6 + 0.4).min(0.9),
    }
}

/// Traffic level and congestion for a traffic scene.
pub fn estimate_traffic(
    frame: &FrameView,
    vehicles: &VehicleDetectionResult,
    road_edge_density: f64,
    cfg: &TrafficConfig,
) -> TrafficAnalysisResult {
    let traffic_level = TrafficLevel::from_vehicle_count(vehicles.total_vehicles, &cfg.level_thresholds);
    let congestion = congestion_report(frame, vehicles, cfg);
    debug!(
        level = ?traffic_level,
        vehicles = vehicles.total_vehicles,
        occupancy = congestion.road_occupancy,
        congestion = ?congestion.level,
        "traffic estimated"
    );
    TrafficAnalysisResult {
        traffic_level,
        vehicle_count: vehicles.total_vehicles,
        road_edge_density,
        congestion: Some(congestion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::vehicle_detector::{VehicleBreakdown, vehicle_confidence};
    use image::{Rgb as ImageRgb, RgbImage};

    fn vehicles(total: u32) -> VehicleDetectionResult {
        VehicleDetectionResult {
            total_vehicles: total,
            detected_blobs: total,
            breakdown: VehicleBreakdown::default(),
            density: VehicleDensity::from_count(total),
            confidence: vehicle_confidence(total),
        }
    }

    #[test]
    fn empty_dark_road_is_free_flow() {
        let image = RgbImage::from_pixel(90, 90, ImageRgb([60, 60, 60]));
        let frame = FrameView::from_rgb_image(&image);
        let result = estimate_traffic(&frame, &vehicles(0), 0.0, &TrafficConfig::default());
        assert_eq!(result.traffic_level, TrafficLevel::Empty);
        let congestion = result.congestion.unwrap();
        assert_eq!(congestion.road_occupancy, 0.0);
        assert_eq!(congestion.level, CongestionLevel::FreeFlow);
        assert_eq!(congestion.estimated_speed, EstimatedSpeed::Fast);
        assert_eq!(congestion.percentage, 0.0);
        assert!((congestion.confidence - 0.58).abs() < 1e-12);
    }

    #[test]
    fn colourful_road_falls_back_to_vehicle_count() {
        let image = RgbImage::from_pixel(90, 90, ImageRgb([200, 30, 30]));
        let frame = FrameView::from_rgb_image(&image);
        assert_eq!(road_occupancy(&frame, &TrafficConfig::default()), None);

        let result = estimate_traffic(&frame, &vehicles(15), 0.0, &TrafficConfig::default());
        assert_eq!(result.traffic_level, TrafficLevel::VeryHigh);
        let congestion = result.congestion.unwrap();
        assert_eq!(congestion.road_occupancy, 0.5);
        assert_eq!(congestion.level, CongestionLevel::Heavy);
        assert!((congestion.percentage - 75.0).abs() < 1e-9);
    }

    #[test]
    fn congestion_levels_and_percentages() {
        assert_eq!(congestion_level(0, 0.05), CongestionLevel::FreeFlow);
        assert_eq!(congestion_level(0, 0.5), CongestionLevel::Light);
        assert_eq!(congestion_level(10, 0.5), CongestionLevel::Moderate);
        assert_eq!(congestion_level(30, 0.5), CongestionLevel::Heavy);
        assert_eq!(congestion_level(30, 0.9), CongestionLevel::Standstill);
        assert_eq!(congestion_percentage(CongestionLevel::Standstill, 1.0), 100.0);
        assert_eq!(congestion_percentage(CongestionLevel::Light, 0.0), 10.0);
    }

    #[test]
    fn incident_needs_dense_traffic_and_full_road() {
        let image = RgbImage::from_pixel(90, 90, ImageRgb([150, 150, 150]));
        let frame = FrameView::from_rgb_image(&image);
        let result = estimate_traffic(&frame, &vehicles(30), 0.3, &TrafficConfig::default());
        let congestion = result.congestion.unwrap();
        assert_eq!(congestion.road_occupancy, 1.0);
        assert_eq!(congestion.level, CongestionLevel::Standstill);
        assert!(congestion.incident_detected);
        assert_eq!(congestion.confidence, 0.9);
    }

    #[test]
    fn sentinel_has_no_congestion() {
        let result = TrafficAnalysisResult::not_applicable();
        assert_eq!(result.traffic_level, TrafficLevel::NotApplicable);
        assert!(result.congestion.is_none());
    }
}
