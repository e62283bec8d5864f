// THEORY:
// This file is the main entry point for the `urban_vision` library crate. It exposes
// `SceneAnalyzer` and its result records as the high-level interface of a
// deterministic, model-free scene analysis engine for still street-camera frames.
//
// Everything the engine knows is derived from pixel statistics: colour thresholds,
// gradient edges and connected components on a coarse occupancy grid. There is no
// trained model and no hidden state, so identical pixels always produce identical
// results.
//
// Layout:
// - `core_modules`: the leaf analyzers (sampling, colour rules, scene classification,
//   blob detection, density estimators).
// - `pipeline`: the synchronous, scene-gated aggregation of those analyzers.
// - `parallel_pipeline`: a worker pool for analysing many frames at once.
// - `poller`: a periodic snapshot -> analyse -> persist loop.
// - `config`: the versioned threshold set every stage reads from.

pub mod config;
pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod poller;

// Re-export key data structures for the public API.
pub use crate::config::{AnalyzerConfig, ConfigError, THRESHOLD_SET_VERSION};
pub use crate::core_modules::frame::{FrameError, FrameView, OwnedFrame, PixelLayout};
pub use crate::core_modules::levels::{
    AqiCategory, CongestionLevel, CrowdDistribution, CrowdLevel, EstimatedSpeed, SceneType, TrafficLevel,
    VehicleDensity,
};
pub use crate::parallel_pipeline::{BatchAnalyzer, BatchError};
pub use crate::pipeline::{AnalysisComponents, AnalysisOptions, AnalysisPath, AnalysisSummary, SceneAnalyzer};
pub use crate::poller::{
    AnalysisRecord, AnalysisSink, CameraPoller, MemorySink, PollerConfig, PollerStatus, SinkError, Snapshot,
    SnapshotSource, SourceError,
};
