// THEORY:
// Every heuristic in the engine is driven by hand-tuned literals, and earlier
// iterations of these rules drifted apart (blob floor 8 vs 10, downscale 6 vs 8,
// road tolerance 25 vs 30). This module pins one consistent set in a single,
// versioned structure so results can be reproduced and compared.
//
// `AnalyzerConfig::default()` is the canonical "shared-1" set. A JSON file may override
// any subset of fields; everything it omits keeps its default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Identifier of the default threshold set.
pub const THRESHOLD_SET_VERSION: &str = "shared-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All tunable thresholds of the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub version: String,
    pub scene: SceneConfig,
    pub vehicle_colors: VehicleColorRules,
    pub blobs: BlobConfig,
    pub crowd: CrowdConfig,
    pub air_quality: AirQualityConfig,
    pub traffic: TrafficConfig,
    pub conditions: ConditionsConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            version: THRESHOLD_SET_VERSION.to_string(),
            scene: SceneConfig::default(),
            vehicle_colors: VehicleColorRules::default(),
            blobs: BlobConfig::default(),
            crowd: CrowdConfig::default(),
            air_quality: AirQualityConfig::default(),
            traffic: TrafficConfig::default(),
            conditions: ConditionsConfig::default(),
        }
    }
}

/// Scene classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Sampling stride, in pixels, for both the sky and the ground pass.
    pub sample_stride: u32,
    pub outdoor_sky_ratio: f64,
    pub outdoor_brightness: f64,
    pub outdoor_road_ratio: f64,
    pub indoor_brown_ratio: f64,
    /// Colour variety is the number of distinct colour bins divided by 100.
    pub indoor_max_color_variety: f64,
    pub traffic_sky_ratio: f64,
    pub traffic_brightness: f64,
    pub traffic_road_ratio: f64,
    pub traffic_max_brown_ratio: f64,
    pub traffic_max_green_ratio: f64,
    pub nature_green_ratio: f64,
    pub high_confidence_sky_ratio: f64,
    pub high_confidence_road_ratio: f64,
    pub medium_confidence_road_ratio: f64,
    pub confidence_high: f64,
    pub confidence_medium: f64,
    pub confidence_low: f64,
    pub confidence_non_traffic: f64,
    pub horizontal_line_row_step: u32,
    pub horizontal_line_brightness: i32,
    pub horizontal_line_coverage: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            sample_stride: 4,
            outdoor_sky_ratio: 0.15,
            outdoor_brightness: 100.0,
            outdoor_road_ratio: 0.1,
            indoor_brown_ratio: 0.2,
            indoor_max_color_variety: 3.0,
            traffic_sky_ratio: 0.1,
            traffic_brightness: 120.0,
            traffic_road_ratio: 0.08,
            traffic_max_brown_ratio: 0.25,
            traffic_max_green_ratio: 0.4,
            nature_green_ratio: 0.3,
            high_confidence_sky_ratio: 0.2,
            high_confidence_road_ratio: 0.15,
            medium_confidence_road_ratio: 0.1,
            confidence_high: 0.9,
            confidence_medium: 0.7,
            confidence_low: 0.5,
            confidence_non_traffic: 0.3,
            horizontal_line_row_step: 10,
            horizontal_line_brightness: 180,
            horizontal_line_coverage: 0.3,
        }
    }
}

/// Literals of the vehicle-candidate colour rule. Brightness and chroma are the
/// integer forms from `Rgb::brightness` and `Rgb::chroma`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleColorRules {
    /// Cells closer than this to the road brightness are never vehicles.
    pub road_tolerance: i32,
    pub white_min_brightness: i32,
    pub white_max_chroma: i32,
    pub white_min_road_diff: i32,
    pub dark_max_brightness: i32,
    pub dark_max_chroma: i32,
    pub dark_min_road_diff: i32,
    pub red_min: i32,
    pub red_margin_green: i32,
    pub red_margin_blue: i32,
    pub blue_min: i32,
    pub blue_margin_red: i32,
    pub blue_margin_green: i32,
    pub silver_min_brightness: i32,
    pub silver_max_brightness: i32,
    pub silver_max_chroma: i32,
    pub silver_min_road_diff: i32,
    pub yellow_min_red: i32,
    pub yellow_min_green: i32,
    pub yellow_max_blue: i32,
    pub yellow_min_chroma: i32,
}

impl Default for VehicleColorRules {
    fn default() -> Self {
        Self {
            road_tolerance: 25,
            white_min_brightness: 200,
            white_max_chroma: 30,
            white_min_road_diff: 40,
            dark_max_brightness: 45,
            dark_max_chroma: 20,
            dark_min_road_diff: 30,
            red_min: 140,
            red_margin_green: 50,
            red_margin_blue: 50,
            blue_min: 120,
            blue_margin_red: 40,
            blue_margin_green: 20,
            silver_min_brightness: 150,
            silver_max_brightness: 200,
            silver_max_chroma: 25,
            silver_min_road_diff: 35,
            yellow_min_red: 180,
            yellow_min_green: 120,
            yellow_max_blue: 100,
            yellow_min_chroma: 60,
        }
    }
}

/// Occupancy grid and connected-component parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Frames narrower or shorter than this yield no blobs.
    pub min_image_side: u32,
    /// Pixels per grid cell along each axis.
    pub downscale: u32,
    /// The grid must have at least this many cells along both axes.
    pub min_grid_cells: u32,
    /// Cell step for the sparse road-brightness estimate.
    pub road_sample_step: u32,
    pub fallback_road_brightness: i32,
    /// Marked 8-neighbours a cell needs to survive denoising.
    pub min_neighbors: u32,
    pub min_blob_cells: usize,
    pub max_blob_cells: usize,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_blob_side: u32,
    pub max_blobs: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            min_image_side: 100,
            downscale: 6,
            min_grid_cells: 11,
            road_sample_step: 2,
            fallback_road_brightness: 80,
            min_neighbors: 2,
            min_blob_cells: 8,
            max_blob_cells: 80,
            min_aspect: 0.3,
            max_aspect: 5.0,
            min_blob_side: 2,
            max_blobs: 25,
        }
    }
}

/// Crowd estimation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdConfig {
    /// Stride of the whole-frame skin pass used off the road.
    pub skin_stride: u32,
    /// Stride of the below-horizon skin pass used on traffic scenes.
    pub road_skin_stride: u32,
    pub edge_stride: u32,
    pub edge_threshold: f64,
    /// People per unit of road edge density on the traffic path.
    pub road_edge_people_factor: f64,
    pub max_people: u32,
    /// Minimum people counts for very_high, high, medium, low and very_low.
    pub level_thresholds: [u32; 5],
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            skin_stride: 3,
            road_skin_stride: 1,
            edge_stride: 4,
            edge_threshold: 25.0,
            road_edge_people_factor: 50.0,
            max_people: 100,
            level_thresholds: [30, 15, 8, 3, 1],
        }
    }
}

/// Sky-region haze analysis thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirQualityConfig {
    pub sky_stride: u32,
    pub contrast_stride: u32,
    pub blue_min: i32,
    pub gray_max_chroma: i32,
    pub gray_min_luma: f64,
    pub hazy_min_luma: f64,
}

impl Default for AirQualityConfig {
    fn default() -> Self {
        Self {
            sky_stride: 2,
            contrast_stride: 4,
            blue_min: 100,
            gray_max_chroma: 30,
            gray_min_luma: 150.0,
            hazy_min_luma: 180.0,
        }
    }
}

/// Traffic level and road occupancy thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub edge_stride: u32,
    pub edge_threshold: f64,
    /// Minimum adjusted vehicle counts for very_high, high, medium and low.
    pub level_thresholds: [u32; 4],
    pub occupancy_stride: u32,
    pub road_max_chroma: i32,
    pub occupied_min_luma: f64,
    pub occupied_min_chroma: i32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            edge_stride: 3,
            edge_threshold: 30.0,
            level_thresholds: [12, 6, 3, 1],
            occupancy_stride: 2,
            road_max_chroma: 40,
            occupied_min_luma: 80.0,
            occupied_min_chroma: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionsConfig {
    pub sample_stride: u32,
}

impl Default for ConditionsConfig {
    fn default() -> Self {
        Self { sample_stride: 2 }
    }
}

fn is_descending(values: &[u32]) -> bool {
    values.windows(2).all(|pair| pair[0] >= pair[1])
}

impl AnalyzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AnalyzerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Rejects values that would make a stage meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let strides = [
            ("scene.sample_stride", self.scene.sample_stride),
            ("scene.horizontal_line_row_step", self.scene.horizontal_line_row_step),
            ("blobs.downscale", self.blobs.downscale),
            ("blobs.road_sample_step", self.blobs.road_sample_step),
            ("crowd.skin_stride", self.crowd.skin_stride),
            ("crowd.road_skin_stride", self.crowd.road_skin_stride),
            ("crowd.edge_stride", self.crowd.edge_stride),
            ("air_quality.sky_stride", self.air_quality.sky_stride),
            ("air_quality.contrast_stride", self.air_quality.contrast_stride),
            ("traffic.edge_stride", self.traffic.edge_stride),
            ("traffic.occupancy_stride", self.traffic.occupancy_stride),
            ("conditions.sample_stride", self.conditions.sample_stride),
        ];
        if let Some((name, _)) = strides.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
        }
        if self.blobs.min_blob_cells == 0 || self.blobs.min_blob_cells > self.blobs.max_blob_cells {
            return Err(ConfigError::Invalid(format!(
                "blob size range [{}, {}] is empty",
                self.blobs.min_blob_cells, self.blobs.max_blob_cells
            )));
        }
        if !(self.blobs.min_aspect > 0.0 && self.blobs.min_aspect <= self.blobs.max_aspect) {
            return Err(ConfigError::Invalid(format!(
                "aspect range [{}, {}] is empty",
                self.blobs.min_aspect, self.blobs.max_aspect
            )));
        }
        if !is_descending(&self.crowd.level_thresholds) || !is_descending(&self.traffic.level_thresholds) {
            return Err(ConfigError::Invalid("level thresholds must be in descending order".to_string()));
        }
        Ok(())
    }
}
