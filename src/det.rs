use std::time::Instant;

use image::RgbImage;
use tracing::debug;

use crate::engine::{Backend, EngineError, OrtSession};
use crate::geometry::{RotatedRect, ScalingRatio};
use crate::postprocess::{EastPostProcess, GeometryMap, ScoreMap};
use crate::preprocess::EastPreProcess;
use crate::types::SpotterConfig;

/// Detection result for one image: boxes in network-input coordinates plus
/// the ratio that maps them back to the original image.
pub struct TextDetOutput {
    pub rects: Vec<RotatedRect>,
    pub scores: Vec<f32>,
    pub ratio: ScalingRatio,
    /// Seconds spent per stage, and in total.
    pub elapse_preprocess: f64,
    pub elapse_infer: f64,
    pub elapse_decode: f64,
    pub elapse: f64,
}

pub struct TextDetector {
    pub cfg: SpotterConfig,
    backend: Box<dyn Backend>,
    preprocess: EastPreProcess,
    postprocess: EastPostProcess,
}

impl TextDetector {
    /// Load the detection model from `cfg.model_path`. Model-load failure is
    /// fatal; nothing runs without a model.
    pub fn new(cfg: SpotterConfig) -> Result<Self, EngineError> {
        cfg.validate()?;
        let backend = Box::new(OrtSession::from_file(&cfg.model_path, &cfg.engine_cfg)?);
        Ok(Self::from_parts(cfg, backend))
    }

    /// Run against an already-constructed backend instead of loading a model
    /// from disk.
    pub fn with_backend(cfg: SpotterConfig, backend: Box<dyn Backend>) -> Result<Self, EngineError> {
        cfg.validate()?;
        Ok(Self::from_parts(cfg, backend))
    }

    fn from_parts(cfg: SpotterConfig, backend: Box<dyn Backend>) -> Self {
        let preprocess = EastPreProcess::new(cfg.input_size);
        let postprocess = EastPostProcess::new(cfg.score_threshold, cfg.nms_threshold);
        Self {
            cfg,
            backend,
            preprocess,
            postprocess,
        }
    }

    pub fn run(&self, img: &RgbImage) -> Result<TextDetOutput, EngineError> {
        let start = Instant::now();

        let (input, ratio) = self.preprocess.run(img)?;
        let elapse_preprocess = start.elapsed().as_secs_f64();

        let infer_start = Instant::now();
        let outputs = self.backend.forward(input.into_dyn())?;
        let elapse_infer = infer_start.elapsed().as_secs_f64();

        let decode_start = Instant::now();
        let mut outputs = outputs.into_iter();
        let scores_raw = outputs.next().ok_or_else(|| {
            EngineError::InvalidOutputShape("model produced no score tensor".to_string())
        })?;
        let geometry_raw = outputs.next().ok_or_else(|| {
            EngineError::InvalidOutputShape("model produced no geometry tensor".to_string())
        })?;

        let scores = ScoreMap::from_pred(&scores_raw)?;
        let geometry = GeometryMap::from_pred(&geometry_raw)?;

        let (rects, kept_scores) = self.postprocess.process(&scores, &geometry)?;
        let elapse_decode = decode_start.elapsed().as_secs_f64();

        let elapse = start.elapsed().as_secs_f64();
        debug!("detection kept {} boxes in {:.3}s", rects.len(), elapse);

        Ok(TextDetOutput {
            rects,
            scores: kept_scores,
            ratio,
            elapse_preprocess,
            elapse_infer,
            elapse_decode,
            elapse,
        })
    }
}
