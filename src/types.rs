use std::fmt;
use std::path::PathBuf;

use crate::engine::EngineError;

/// Spatial downsampling factor between the network input and its output grids.
pub const FEATURE_STRIDE: u32 = 4;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub intra_op_num_threads: i32,
    pub inter_op_num_threads: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        // Auto-detect optimal thread count (use all available CPUs)
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get() as i32)
            .unwrap_or(4);

        Self {
            intra_op_num_threads: num_threads,
            inter_op_num_threads: 1, // Keep inter-op at 1 for better cache locality
        }
    }
}

/// How detections are rendered into output artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
pub enum OutputMode {
    /// Draw boxes around identified text
    Box,
    /// Extract text areas individually into new images
    Extract,
    /// Keep original pixels inside detected regions, black everywhere else
    Mask,
    /// Keep original pixels outside detected regions, black inside them
    InverseMask,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputMode::Box => "BOX",
            OutputMode::Extract => "EXTRACT",
            OutputMode::Mask => "MASK",
            OutputMode::InverseMask => "INVERSE_MASK",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub struct SpotterConfig {
    pub model_path: PathBuf,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Side length the input image is scaled to before inference.
    /// Must be a positive multiple of [`FEATURE_STRIDE`].
    pub input_size: u32,
    pub output_mode: OutputMode,
    /// Extra pixels added on each side of every detection, applied after
    /// rescaling to original-image coordinates.
    pub padding: i32,
    pub discard_original: bool,
    pub engine_cfg: EngineConfig,
}

impl SpotterConfig {
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            score_threshold: 0.5,
            nms_threshold: 0.4,
            input_size: 512,
            output_mode: OutputMode::Mask,
            padding: 0,
            discard_original: false,
            engine_cfg: EngineConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.input_size == 0 || self.input_size % FEATURE_STRIDE != 0 {
            return Err(EngineError::Config(format!(
                "input_size must be a positive multiple of {}, got {}",
                FEATURE_STRIDE, self.input_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = SpotterConfig::new(PathBuf::from("east.onnx"));
        assert_eq!(cfg.input_size, 512);
        assert_eq!(cfg.output_mode, OutputMode::Mask);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn input_size_must_be_multiple_of_stride() {
        let mut cfg = SpotterConfig::new(PathBuf::from("east.onnx"));
        cfg.input_size = 510;
        assert!(cfg.validate().is_err());

        cfg.input_size = 0;
        assert!(cfg.validate().is_err());
    }
}
