// THEORY:
// Discrete outputs of the engine. Each enum is an ordered, finite set with a fixed
// rank and a short human-readable label. Only the variant and its rank are part of
// the contract; presentation layers are free to render labels however they like.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneType {
    Traffic,
    Nature,
    IndoorHistoric,
    Indoor,
    Outdoor,
    Unknown,
}

impl SceneType {
    /// Position in the classification priority order.
    pub const fn rank(self) -> u8 {
        match self {
            SceneType::Traffic => 0,
            SceneType::Nature => 1,
            SceneType::IndoorHistoric => 2,
            SceneType::Indoor => 3,
            SceneType::Outdoor => 4,
            SceneType::Unknown => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SceneType::Traffic => "Traffic/Road Scene",
            SceneType::Nature => "Nature/Park",
            SceneType::IndoorHistoric => "Indoor (Historic Building)",
            SceneType::Indoor => "Indoor",
            SceneType::Outdoor => "Outdoor (No Traffic)",
            SceneType::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Empty,
    Low,
    Medium,
    High,
    VeryHigh,
    /// The scene is not a traffic scene, so no traffic figure exists.
    NotApplicable,
}

impl TrafficLevel {
    /// Buckets an adjusted vehicle count using thresholds for
    /// very_high, high, medium and low, in that order.
    pub fn from_vehicle_count(count: u32, thresholds: &[u32; 4]) -> Self {
        let [very_high, high, medium, low] = *thresholds;
        if count >= very_high {
            TrafficLevel::VeryHigh
        } else if count >= high {
            TrafficLevel::High
        } else if count >= medium {
            TrafficLevel::Medium
        } else if count >= low {
            TrafficLevel::Low
        } else {
            TrafficLevel::Empty
        }
    }

    /// `None` for the non-traffic sentinel.
    pub const fn rank(self) -> Option<u8> {
        match self {
            TrafficLevel::Empty => Some(0),
            TrafficLevel::Low => Some(1),
            TrafficLevel::Medium => Some(2),
            TrafficLevel::High => Some(3),
            TrafficLevel::VeryHigh => Some(4),
            TrafficLevel::NotApplicable => None,
        }
    }

    pub const fn is_applicable(self) -> bool {
        !matches!(self, TrafficLevel::NotApplicable)
    }

    pub const fn label(self) -> &'static str {
        match self {
            TrafficLevel::Empty => "No vehicles detected",
            TrafficLevel::Low => "Light traffic",
            TrafficLevel::Medium => "Moderate traffic",
            TrafficLevel::High => "Heavy traffic",
            TrafficLevel::VeryHigh => "Severe congestion",
            TrafficLevel::NotApplicable => "Not a traffic scene",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrowdLevel {
    Empty,
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl CrowdLevel {
    /// Buckets a people estimate using thresholds for
    /// very_high, high, medium, low and very_low, in that order.
    pub fn from_count(count: u32, thresholds: &[u32; 5]) -> Self {
        let [very_high, high, medium, low, very_low] = *thresholds;
        if count >= very_high {
            CrowdLevel::VeryHigh
        } else if count >= high {
            CrowdLevel::High
        } else if count >= medium {
            CrowdLevel::Medium
        } else if count >= low {
            CrowdLevel::Low
        } else if count >= very_low {
            CrowdLevel::VeryLow
        } else {
            CrowdLevel::Empty
        }
    }

    pub const fn rank(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            CrowdLevel::Empty => "No people detected",
            CrowdLevel::VeryLow => "Very few people",
            CrowdLevel::Low => "Light crowd",
            CrowdLevel::Medium => "Moderate crowd",
            CrowdLevel::High => "Dense crowd",
            CrowdLevel::VeryHigh => "Very dense crowd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrowdDistribution {
    Sparse,
    Uniform,
    Clustered,
}

impl CrowdDistribution {
    pub fn from_edge_density(edge_density: f64) -> Self {
        if edge_density < 0.1 {
            CrowdDistribution::Sparse
        } else if edge_density > 0.3 {
            CrowdDistribution::Clustered
        } else {
            CrowdDistribution::Uniform
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleDensity {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl VehicleDensity {
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => VehicleDensity::None,
            1..=4 => VehicleDensity::Low,
            5..=14 => VehicleDensity::Medium,
            15..=29 => VehicleDensity::High,
            _ => VehicleDensity::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLevel {
    FreeFlow,
    Light,
    Moderate,
    Heavy,
    Standstill,
}

impl CongestionLevel {
    pub const fn rank(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatedSpeed {
    Fast,
    Normal,
    Slow,
    VerySlow,
    Stopped,
}

impl From<CongestionLevel> for EstimatedSpeed {
    fn from(level: CongestionLevel) -> Self {
        match level {
            CongestionLevel::FreeFlow => EstimatedSpeed::Fast,
            CongestionLevel::Light => EstimatedSpeed::Normal,
            CongestionLevel::Moderate => EstimatedSpeed::Slow,
            CongestionLevel::Heavy => EstimatedSpeed::VerySlow,
            CongestionLevel::Standstill => EstimatedSpeed::Stopped,
        }
    }
}

/// Air quality buckets, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// Representative index value for the bucket.
    pub const fn index_value(self) -> u32 {
        match self {
            AqiCategory::Good => 25,
            AqiCategory::Moderate => 75,
            AqiCategory::UnhealthyForSensitive => 125,
            AqiCategory::Unhealthy => 175,
            AqiCategory::VeryUnhealthy => 250,
            AqiCategory::Hazardous => 350,
        }
    }

    pub const fn rank(self) -> u8 {
        self as u8
    }
}
