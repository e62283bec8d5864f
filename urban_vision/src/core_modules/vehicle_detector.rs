// THEORY:
// The vehicle detector interprets a `BlobReport`. It discounts the raw blob count by
// the scene confidence, grades the result into a density bucket, and types every
// accepted blob by its pixel footprint relative to the frame.
//
// Typing rules, first match wins:
// - bus: footprint above 1% of the frame and wider than twice its height.
// - truck: footprint above 0.8% with a roughly square to 2:1 box.
// - small: footprint under 0.3% with a compact box; a bicycle under 0.1%, otherwise a
//   motorcycle.
// - car: everything else.

use crate::core_modules::blob::Blob;
use crate::core_modules::blob_detector::blob_detector::BlobReport;
use crate::core_modules::frame::FrameView;
use crate::core_modules::levels::VehicleDensity;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Car,
    Bus,
    Truck,
    Motorcycle,
    Bicycle,
}

impl VehicleClass {
    /// Types a blob by its pixel footprint.
    pub fn from_footprint(width_px: f64, height_px: f64, frame_area: f64) -> Self {
        if frame_area <= 0.0 || height_px <= 0.0 {
            return VehicleClass::Car;
        }
        let relative = width_px * height_px / frame_area;
        let aspect = width_px / height_px;
        if relative > 0.01 && aspect > 2.0 {
            VehicleClass::Bus
        } else if relative > 0.008 && (1.0..=2.0).contains(&aspect) {
            VehicleClass::Truck
        } else if relative < 0.003 && aspect < 1.5 {
            if relative < 0.001 {
                VehicleClass::Bicycle
            } else {
                VehicleClass::Motorcycle
            }
        } else {
            VehicleClass::Car
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehicleBreakdown {
    pub cars: u32,
    pub buses: u32,
    pub trucks: u32,
    pub motorcycles: u32,
    pub bicycles: u32,
}

impl VehicleBreakdown {
    pub fn record(&mut self, class: VehicleClass) {
        match class {
            VehicleClass::Car => self.cars += 1,
            VehicleClass::Bus => self.buses += 1,
            VehicleClass::Truck => self.trucks += 1,
            VehicleClass::Motorcycle => self.motorcycles += 1,
            VehicleClass::Bicycle => self.bicycles += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.cars + self.buses + self.trucks + self.motorcycles + self.bicycles
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDetectionResult {
    /// Blob count discounted by the scene confidence.
    pub total_vehicles: u32,
    /// Blobs accepted by the detector before the discount.
    pub detected_blobs: u32,
    /// Typing of every detected blob.
    pub breakdown: VehicleBreakdown,
    pub density: VehicleDensity,
    pub confidence: f64,
}

impl VehicleDetectionResult {
    /// The result reported for scenes that are not traffic scenes.
    pub fn not_applicable() -> Self {
        Self {
            total_vehicles: 0,
            detected_blobs: 0,
            breakdown: VehicleBreakdown::default(),
            density: VehicleDensity::None,
            confidence: vehicle_confidence(0),
        }
    }
}

/// `round(blobs · confidence)`, the reliability-discounted vehicle count.
pub fn adjusted_vehicle_count(blob_count: u32, scene_confidence: f64) -> u32 {
    (blob_count as f64 * scene_confidence.clamp(0.0, 1.0)).round() as u32
}

pub fn vehicle_confidence(blob_count: u32) -> f64 {
    (0.3 + blob_count.min(20) as f64 * 0.035).min(0.95)
}

fn classify_blob(blob: &Blob, downscale: u32, frame_area: f64) -> VehicleClass {
    let width_px = (blob.width() * downscale) as f64;
    let height_px = (blob.height() * downscale) as f64;
    VehicleClass::from_footprint(width_px, height_px, frame_area)
}

pub fn detect_vehicles(frame: &FrameView, report: &BlobReport, scene_confidence: f64) -> VehicleDetectionResult {
    let frame_area = frame.width() as f64 * frame.height() as f64;
    let mut breakdown = VehicleBreakdown::default();
    for blob in &report.blobs {
        breakdown.record(classify_blob(blob, report.downscale, frame_area));
    }

    let detected_blobs = report.blob_count();
    let total_vehicles = adjusted_vehicle_count(detected_blobs, scene_confidence);
    let result = VehicleDetectionResult {
        total_vehicles,
        detected_blobs,
        breakdown,
        density: VehicleDensity::from_count(total_vehicles),
        confidence: vehicle_confidence(detected_blobs),
    };
    debug!(detected_blobs, total_vehicles, ?breakdown, "vehicles detected");
    result
}
