// THEORY:
// The crowd estimator turns two cheap signals into a people count: how much of the
// frame looks like exposed skin, and how busy the frame is in terms of gradient
// edges. Neither signal measures people directly, so the count is a bucketed
// heuristic and is only ever reported together with its ordered `CrowdLevel`.
//
// There are two weightings:
// 1.  **Road variant** (traffic scenes): skin is sampled below the horizon, where
//     pedestrians stand. Both the skin reading and the road edge reading are
//     discounted by the scene confidence, and the larger of the two wins.
// 2.  **Scene variant** (every other scene): the whole frame matters indoors, so skin
//     and edges are sampled everywhere and blended through a piecewise formula.

use crate::config::CrowdConfig;
use crate::core_modules::color_classifier::is_skin_tone;
use crate::core_modules::edges::scene_edge_density;
use crate::core_modules::frame::FrameView;
use crate::core_modules::levels::{CrowdDistribution, CrowdLevel};
use crate::core_modules::utils::stats::ratio;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdAnalysisResult {
    pub estimated_people: u32,
    pub crowd_level: CrowdLevel,
    /// Share of sampled pixels that look like skin.
    pub skin_ratio: f64,
    pub edge_density: f64,
    /// `skin_ratio · 1000`, clamped to 0..100.
    pub density_percentage: f64,
    pub distribution: CrowdDistribution,
    pub confidence: f64,
}

impl CrowdAnalysisResult {
    fn new(estimated_people: u32, skin_ratio: f64, edge_density: f64, cfg: &CrowdConfig) -> Self {
        Self {
            estimated_people,
            crowd_level: CrowdLevel::from_count(estimated_people, &cfg.level_thresholds),
            skin_ratio,
            edge_density,
            density_percentage: (skin_ratio * 1000.0).clamp(0.0, 100.0),
            distribution: CrowdDistribution::from_edge_density(edge_density),
            confidence: (0.4 + skin_ratio * 5.0).clamp(0.3, 0.85),
        }
    }
}

fn skin_ratio(frame: &FrameView, rows: Range<u32>, stride: u32) -> f64 {
    let mut samples = 0;
    let mut skin = 0;
    for sample in frame.sample(rows, stride) {
        samples += 1;
        if is_skin_tone(sample.pixel) {
            skin += 1;
        }
    }
    ratio(skin, samples)
}

/// Piecewise people estimate from a below-horizon skin ratio.
pub fn people_from_skin_ratio(skin_ratio: f64) -> u32 {
    if skin_ratio < 0.001 {
        0
    } else if skin_ratio < 0.005 {
        ((skin_ratio * 1000.0) as u32).clamp(1, 5)
    } else if skin_ratio < 0.02 {
        ((skin_ratio * 500.0) as u32).clamp(5, 20)
    } else if skin_ratio < 0.05 {
        ((skin_ratio * 400.0) as u32).clamp(20, 50)
    } else {
        ((skin_ratio * 300.0) as u32).clamp(50, 200)
    }
}

/// Piecewise people estimate from whole-frame skin and edge ratios.
pub fn people_from_scene_ratios(skin_ratio: f64, edge_density: f64) -> f64 {
    if skin_ratio > 0.15 {
        skin_ratio * 100.0 + edge_density * 20.0
    } else if skin_ratio > 0.08 {
        skin_ratio * 80.0 + edge_density * 15.0
    } else if skin_ratio > 0.03 {
        skin_ratio * 60.0 + edge_density * 10.0
    } else if edge_density > 0.3 {
        edge_density * 30.0
    } else {
        skin_ratio * 40.0 + edge_density * 8.0
    }
}

/// Crowd estimate for a traffic scene.
pub fn estimate_road_crowd(
    frame: &FrameView,
    road_edge_density: f64,
    scene_confidence: f64,
    cfg: &CrowdConfig,
) -> CrowdAnalysisResult {
    let skin = skin_ratio(frame, frame.height() / 3..frame.height(), cfg.road_skin_stride);
    let confidence = scene_confidence.clamp(0.0, 1.0);
    let from_skin = (people_from_skin_ratio(skin) as f64 * confidence).round() as u32;
    let from_edges = (road_edge_density * cfg.road_edge_people_factor * confidence).max(0.0) as u32;
    let people = from_skin.max(from_edges).min(cfg.max_people);

    debug!(skin, road_edge_density, from_skin, from_edges, people, "road crowd estimated");
    CrowdAnalysisResult::new(people, skin, road_edge_density, cfg)
}

/// Crowd estimate for any scene that is not a traffic scene.
pub fn estimate_scene_crowd(frame: &FrameView, cfg: &CrowdConfig) -> CrowdAnalysisResult {
    let skin = skin_ratio(frame, 0..frame.height(), cfg.skin_stride);
    let edges = scene_edge_density(frame, cfg.edge_stride, cfg.edge_threshold);
    let people = (people_from_scene_ratios(skin, edges).max(0.0) as u32).min(cfg.max_people);

    debug!(skin, edges, people, "scene crowd estimated");
    CrowdAnalysisResult::new(people, skin, edges, cfg)
}
