//! # textspot
//!
//! Scene-text detection built on the EAST algorithm, in pure Rust with ONNX
//! Runtime inference.
//!
//! The crate turns the network's two raw output tensors (a per-cell score
//! map and a per-cell oriented-box geometry map) into oriented text regions
//! in original-image coordinates, then renders them into one of four
//! artifact kinds: box overlays, per-detection crops, masked images, or
//! inverse-masked images.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use textspot::{SourceImage, SpotterConfig, TextSpotter};
//!
//! let cfg = SpotterConfig::new("models/east.onnx".into());
//! let spotter = TextSpotter::new(cfg)?;
//!
//! let pixels = image::open("photo.jpg")?.to_rgb8();
//! let artifacts = spotter.process(&SourceImage::new("photo", pixels))?;
//!
//! for artifact in &artifacts {
//!     println!("{}", artifact.description());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
mod det;
mod engine;
mod geometry;
mod nms;
mod postprocess;
mod preprocess;
mod render;
mod spotter;
mod types;

// Public API exports
pub use crate::det::{TextDetOutput, TextDetector};
pub use crate::engine::{Backend, EngineError, OrtSession};
pub use crate::geometry::{BoundingRect, Point2f, RotatedRect, ScalingRatio, Size2f};
pub use crate::nms::{rotated_iou, suppress};
pub use crate::postprocess::{EastPostProcess, GeometryMap, ScoreMap};
pub use crate::preprocess::EastPreProcess;
pub use crate::render::{render, OutputArtifact, RegionProperties};
pub use crate::spotter::{BatchFailure, BatchOutput, SourceImage, TextSpotter};
pub use crate::types::{EngineConfig, OutputMode, SpotterConfig, FEATURE_STRIDE};
