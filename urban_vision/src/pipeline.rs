// THEORY:
// The `pipeline` module is the top-level API of the analysis engine. `SceneAnalyzer`
// chains the leaf analyzers into a single synchronous call and enforces the one
// behavioural rule that spans all of them: vehicle and traffic figures exist only for
// frames classified as traffic scenes.
//
// Key architectural principles:
// 1.  **Scene first**: every call starts with the scene classifier. Its verdict picks
//     the `AnalysisPath`, and its confidence discounts vehicle and people counts.
// 2.  **Two paths**: the traffic path runs the blob detector, the traffic estimator
//     and the road crowd estimator. The non-traffic path forces zero vehicles, the
//     `NotApplicable` traffic sentinel and the whole-frame crowd estimator.
// 3.  **Absent, not zeroed**: sub-results whose flag is off are `None`. The summary is
//     always filled, so a caller that disabled everything still gets the headline.
// 4.  **Pure and shareable**: `analyze` takes `&self`, borrows the frame, and touches no
//     shared mutable state. One analyzer can serve many threads at once.

use crate::config::AnalyzerConfig;
use crate::core_modules::air_quality::{AirQualityResult, estimate_air_quality};
use crate::core_modules::blob_detector::blob_detector;
use crate::core_modules::conditions::{ConditionsResult, estimate_conditions};
use crate::core_modules::crowd_estimator::{CrowdAnalysisResult, estimate_road_crowd, estimate_scene_crowd};
use crate::core_modules::edges::road_edge_density;
use crate::core_modules::frame::FrameView;
use crate::core_modules::image_stats::{BasicImageStats, compute_image_stats};
use crate::core_modules::levels::{CrowdLevel, TrafficLevel};
use crate::core_modules::scene_classifier::{SceneAnalysis, classify_scene};
use crate::core_modules::traffic_estimator::{TrafficAnalysisResult, estimate_traffic};
use crate::core_modules::vehicle_detector::{VehicleDetectionResult, detect_vehicles};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Selects which sub-analyses are reported.
///
/// The summary always needs a vehicle count, a people count and a traffic level, so
/// scene classification, blob detection and the crowd estimate run even when their
/// flags are off. Only the air-quality, congestion and conditions passes are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub vehicle: bool,
    pub crowd: bool,
    pub air_quality: bool,
    pub traffic: bool,
    pub conditions: bool,
    /// Local hour (0..23) the frame was captured at, if known. Only the conditions
    /// estimate uses it.
    pub hour_of_day: Option<u8>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            vehicle: true,
            crowd: true,
            air_quality: true,
            traffic: true,
            conditions: true,
            hour_of_day: None,
        }
    }
}

impl AnalysisOptions {
    pub fn none() -> Self {
        Self {
            vehicle: false,
            crowd: false,
            air_quality: false,
            traffic: false,
            conditions: false,
            hour_of_day: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPath {
    Traffic,
    NonTraffic,
}

/// The headline figures, present regardless of the enabled flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub vehicle_count: u32,
    pub people_count: u32,
    pub traffic_level: TrafficLevel,
    pub crowd_level: CrowdLevel,
}

/// The structured result of one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisComponents {
    /// Version of the threshold set that produced this result.
    pub threshold_set: String,
    pub path: AnalysisPath,
    pub scene: SceneAnalysis,
    pub image_stats: BasicImageStats,
    pub summary: AnalysisSummary,
    pub vehicles: Option<VehicleDetectionResult>,
    pub crowd: Option<CrowdAnalysisResult>,
    pub air_quality: Option<AirQualityResult>,
    pub traffic: Option<TrafficAnalysisResult>,
    pub conditions: Option<ConditionsResult>,
}

impl AnalysisComponents {
    pub fn is_traffic_scene(&self) -> bool {
        self.path == AnalysisPath::Traffic
    }
}

/// The main, top-level struct for the analysis engine.
#[derive(Debug, Clone, Default)]
pub struct SceneAnalyzer {
    config: AnalyzerConfig,
}

impl SceneAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, frame: &FrameView, options: &AnalysisOptions) -> AnalysisComponents {
        let config = &self.config;

        // Stage 1: Scene Classification
        let scene = classify_scene(frame, &config.scene);
        let image_stats = compute_image_stats(frame);

        // Stage 2: Path Selection
        let (path, vehicles, crowd, traffic_level, traffic) = if scene.is_traffic_scene {
            let report = blob_detector::find_vehicle_blobs(frame, config);
            let vehicles = detect_vehicles(frame, &report, scene.confidence);
            let road_edges = road_edge_density(frame, config.traffic.edge_stride, config.traffic.edge_threshold);
            let crowd = estimate_road_crowd(frame, road_edges, scene.confidence, &config.crowd);
            let traffic_level =
                TrafficLevel::from_vehicle_count(vehicles.total_vehicles, &config.traffic.level_thresholds);
            // The congestion pass is a full scan of the road region; skip it when unreported.
            let traffic = options
                .traffic
                .then(|| estimate_traffic(frame, &vehicles, road_edges, &config.traffic));
            (AnalysisPath::Traffic, vehicles, crowd, traffic_level, traffic)
        } else {
            let crowd = estimate_scene_crowd(frame, &config.crowd);
            (
                AnalysisPath::NonTraffic,
                VehicleDetectionResult::not_applicable(),
                crowd,
                TrafficLevel::NotApplicable,
                options.traffic.then(TrafficAnalysisResult::not_applicable),
            )
        };

        // Stage 3: Aggregation
        let summary = AnalysisSummary {
            vehicle_count: vehicles.total_vehicles,
            people_count: crowd.estimated_people,
            traffic_level,
            crowd_level: crowd.crowd_level,
        };
        let air_quality = options.air_quality.then(|| estimate_air_quality(frame, &config.air_quality));
        let conditions = options
            .conditions
            .then(|| estimate_conditions(frame, &config.conditions, options.hour_of_day));

        debug!(
            ?path,
            scene = ?scene.scene_type,
            vehicles = summary.vehicle_count,
            people = summary.people_count,
            "frame analyzed"
        );

        AnalysisComponents {
            threshold_set: config.version.clone(),
            path,
            scene,
            image_stats,
            summary,
            vehicles: options.vehicle.then_some(vehicles),
            crowd: options.crowd.then_some(crowd),
            air_quality,
            traffic,
            conditions,
        }
    }
}
