use image::RgbImage;
use std::path::Path;
use tracing::debug;

use crate::det::TextDetector;
use crate::engine::{Backend, EngineError};
use crate::geometry::RotatedRect;
use crate::render::{self, OutputArtifact};
use crate::types::SpotterConfig;

/// An input image with the identifier its artifacts are tagged with.
pub struct SourceImage {
    pub id: String,
    pub pixels: RgbImage,
}

impl SourceImage {
    pub fn new(id: impl Into<String>, pixels: RgbImage) -> Self {
        Self {
            id: id.into(),
            pixels,
        }
    }
}

#[derive(Debug)]
pub struct BatchFailure {
    pub source_id: String,
    pub error: EngineError,
}

/// Aggregated result of a batch run. One image failing never aborts the
/// others; callers must not treat partial failure as total failure.
#[derive(Default)]
pub struct BatchOutput {
    pub artifacts: Vec<OutputArtifact>,
    /// Ids of successfully processed images the caller should drop, when
    /// `discard_original` is set. Failed images are never listed here.
    pub discard: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutput {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The full post-processing pipeline: preprocess, network, decode, rotated
/// NMS, rescale, render. Holds the model handle for its whole lifetime.
pub struct TextSpotter {
    det: TextDetector,
}

impl TextSpotter {
    pub fn new(cfg: SpotterConfig) -> Result<Self, EngineError> {
        Ok(Self {
            det: TextDetector::new(cfg)?,
        })
    }

    pub fn with_backend(cfg: SpotterConfig, backend: Box<dyn Backend>) -> Result<Self, EngineError> {
        Ok(Self {
            det: TextDetector::with_backend(cfg, backend)?,
        })
    }

    pub fn config(&self) -> &SpotterConfig {
        &self.det.cfg
    }

    /// Process one image into zero or more artifacts. Zero detections is a
    /// normal outcome, not an error.
    pub fn process(&self, image: &SourceImage) -> Result<Vec<OutputArtifact>, EngineError> {
        debug!("processing image {}", image.id);
        let det = self.det.run(&image.pixels)?;

        if det.rects.is_empty() {
            debug!("no text found in image {}", image.id);
            return Ok(Vec::new());
        }

        let cfg = &self.det.cfg;
        // Rescale into original-image coordinates first; padding units are
        // post-scaling pixels.
        let detections: Vec<RotatedRect> = det
            .rects
            .iter()
            .map(|r| r.scale(&det.ratio).pad(cfg.padding))
            .collect();

        debug!(
            "{} text segments found in image {}",
            detections.len(),
            image.id
        );

        Ok(render::render(
            cfg.output_mode,
            &image.pixels,
            &detections,
            &image.id,
        ))
    }

    /// Convenience wrapper: read an image file and process it, using the file
    /// stem as the source id.
    pub fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<OutputArtifact>, EngineError> {
        let path = path.as_ref();
        let pixels = image::open(path)?.to_rgb8();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.process(&SourceImage::new(id, pixels))
    }

    /// Process a batch sequentially, aggregating per-image failures instead
    /// of aborting.
    pub fn process_batch(&self, images: &[SourceImage]) -> BatchOutput {
        let mut out = BatchOutput::default();

        for image in images {
            match self.process(image) {
                Ok(mut artifacts) => {
                    out.artifacts.append(&mut artifacts);
                    if self.det.cfg.discard_original {
                        debug!("discarding image {}", image.id);
                        out.discard.push(image.id.clone());
                    }
                }
                Err(error) => {
                    debug!("failed to process image {}: {}", image.id, error);
                    out.failures.push(BatchFailure {
                        source_id: image.id.clone(),
                        error,
                    });
                }
            }
        }

        out
    }
}
