pub mod air_quality;
pub mod blob;
pub mod blob_detector;
pub mod color_classifier;
pub mod conditions;
pub mod crowd_estimator;
pub mod edges;
pub mod frame;
pub mod image_stats;
pub mod levels;
pub mod pixel;
pub mod scene_classifier;
pub mod traffic_estimator;
pub mod utils;
pub mod vehicle_detector;
