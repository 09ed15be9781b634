use ndarray::{Array2, Array3, ArrayD};

use crate::engine::EngineError;
use crate::geometry::{Point2f, RotatedRect, Size2f};
use crate::nms;
use crate::types::FEATURE_STRIDE;

/// Per-cell text confidence at network output resolution, built from the raw
/// `(1, 1, h, w)` score tensor.
pub struct ScoreMap {
    data: Array2<f32>,
}

impl ScoreMap {
    pub fn from_pred(pred: &ArrayD<f32>) -> Result<Self, EngineError> {
        let shape = pred.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 1 {
            return Err(EngineError::InvalidOutputShape(format!(
                "expected a (1, 1, h, w) score tensor, got {:?}",
                shape
            )));
        }

        let (h, w) = (shape[2], shape[3]);
        let data = pred
            .to_shape((h, w))
            .map_err(|e| EngineError::InvalidOutputShape(e.to_string()))?
            .to_owned();
        Ok(Self { data })
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }
}

/// Five co-indexed grids at score-map resolution: distances from each cell's
/// anchor to the top, right, bottom and left box edges, plus a rotation angle
/// in radians. Built from the raw `(1, 5, h, w)` geometry tensor.
pub struct GeometryMap {
    data: Array3<f32>,
}

const GEO_TOP: usize = 0;
const GEO_RIGHT: usize = 1;
const GEO_BOTTOM: usize = 2;
const GEO_LEFT: usize = 3;
const GEO_ANGLE: usize = 4;

impl GeometryMap {
    pub fn from_pred(pred: &ArrayD<f32>) -> Result<Self, EngineError> {
        let shape = pred.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 5 {
            return Err(EngineError::InvalidOutputShape(format!(
                "expected a (1, 5, h, w) geometry tensor, got {:?}",
                shape
            )));
        }

        let (h, w) = (shape[2], shape[3]);
        let data = pred
            .to_shape((5, h, w))
            .map_err(|e| EngineError::InvalidOutputShape(e.to_string()))?
            .to_owned();
        Ok(Self { data })
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }
}

/// Decodes the EAST output tensors into oriented rectangles and suppresses
/// redundant overlapping detections.
pub struct EastPostProcess {
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl EastPostProcess {
    pub fn new(score_threshold: f32, nms_threshold: f32) -> Self {
        Self {
            score_threshold,
            nms_threshold,
        }
    }

    /// Reconstruct one candidate box per cell whose confidence reaches the
    /// score threshold. Boxes are in network-input pixel coordinates; an
    /// empty result means no text and is not an error.
    pub fn decode(
        &self,
        scores: &ScoreMap,
        geometry: &GeometryMap,
    ) -> Result<(Vec<RotatedRect>, Vec<f32>), EngineError> {
        if scores.height() != geometry.height() || scores.width() != geometry.width() {
            return Err(EngineError::InvalidOutputShape(format!(
                "score map is {}x{} but geometry map is {}x{}",
                scores.height(),
                scores.width(),
                geometry.height(),
                geometry.width()
            )));
        }

        let mut rects = Vec::new();
        let mut confidences = Vec::new();

        for y in 0..scores.height() {
            for x in 0..scores.width() {
                let score = scores.data[[y, x]];
                if score < self.score_threshold {
                    continue;
                }

                let offset_x = (x as u32 * FEATURE_STRIDE) as f32;
                let offset_y = (y as u32 * FEATURE_STRIDE) as f32;

                let angle = geometry.data[[GEO_ANGLE, y, x]];
                let (sin_a, cos_a) = angle.sin_cos();

                let top = geometry.data[[GEO_TOP, y, x]];
                let right = geometry.data[[GEO_RIGHT, y, x]];
                let bottom = geometry.data[[GEO_BOTTOM, y, x]];
                let left = geometry.data[[GEO_LEFT, y, x]];

                let box_h = top + bottom;
                let box_w = right + left;

                let anchor_x = offset_x + cos_a * right + sin_a * bottom;
                let anchor_y = offset_y - sin_a * right + cos_a * bottom;

                let p1 = (-sin_a * box_h + anchor_x, -cos_a * box_h + anchor_y);
                let p3 = (-cos_a * box_w + anchor_x, sin_a * box_w + anchor_y);

                rects.push(RotatedRect::new(
                    Point2f::new(0.5 * (p1.0 + p3.0), 0.5 * (p1.1 + p3.1)),
                    Size2f::new(box_w, box_h),
                    -angle.to_degrees(),
                ));
                confidences.push(score);
            }
        }

        Ok((rects, confidences))
    }

    /// Decode and suppress. Returns the surviving boxes with their scores.
    pub fn process(
        &self,
        scores: &ScoreMap,
        geometry: &GeometryMap,
    ) -> Result<(Vec<RotatedRect>, Vec<f32>), EngineError> {
        let (candidates, confidences) = self.decode(scores, geometry)?;
        if candidates.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let keep = nms::suppress(
            &candidates,
            &confidences,
            self.score_threshold,
            self.nms_threshold,
        );

        let rects = keep.iter().map(|&i| candidates[i]).collect();
        let kept_scores = keep.iter().map(|&i| confidences[i]).collect();
        Ok((rects, kept_scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, ArrayD};

    fn score_tensor(h: usize, w: usize, hot: &[(usize, usize, f32)]) -> ArrayD<f32> {
        let mut scores = Array4::<f32>::zeros((1, 1, h, w));
        for &(y, x, v) in hot {
            scores[[0, 0, y, x]] = v;
        }
        scores.into_dyn()
    }

    fn geometry_tensor(h: usize, w: usize, dist: f32, angle: f32) -> ArrayD<f32> {
        let mut geo = Array4::<f32>::zeros((1, 5, h, w));
        for c in GEO_TOP..=GEO_LEFT {
            geo.slice_mut(ndarray::s![0, c, .., ..]).fill(dist);
        }
        geo.slice_mut(ndarray::s![0, GEO_ANGLE, .., ..]).fill(angle);
        geo.into_dyn()
    }

    #[test]
    fn all_cells_below_threshold_decode_to_nothing() {
        let scores = ScoreMap::from_pred(&score_tensor(8, 8, &[(2, 2, 0.49)])).unwrap();
        let geometry = GeometryMap::from_pred(&geometry_tensor(8, 8, 4.0, 0.0)).unwrap();

        let post = EastPostProcess::new(0.5, 0.4);
        let (rects, confs) = post.decode(&scores, &geometry).unwrap();
        assert!(rects.is_empty());
        assert!(confs.is_empty());
    }

    #[test]
    fn single_hot_cell_decodes_to_one_box() {
        let scores = ScoreMap::from_pred(&score_tensor(8, 8, &[(3, 3, 0.9)])).unwrap();
        let geometry = GeometryMap::from_pred(&geometry_tensor(8, 8, 4.0, 0.0)).unwrap();

        let post = EastPostProcess::new(0.5, 0.4);
        let (rects, confs) = post.decode(&scores, &geometry).unwrap();
        assert_eq!(rects.len(), 1);
        assert_eq!(confs, vec![0.9]);

        let r = rects[0];
        assert!((r.center.x - 12.0).abs() < 1e-4);
        assert!((r.center.y - 12.0).abs() < 1e-4);
        assert!((r.size.width - 8.0).abs() < 1e-4);
        assert!((r.size.height - 8.0).abs() < 1e-4);
        assert!(r.angle.abs() < 1e-4);
    }

    #[test]
    fn rotated_cell_flips_angle_sign_in_degrees() {
        let angle_rad = 0.3f32;
        let scores = ScoreMap::from_pred(&score_tensor(8, 8, &[(1, 1, 0.8)])).unwrap();
        let geometry = GeometryMap::from_pred(&geometry_tensor(8, 8, 2.0, angle_rad)).unwrap();

        let post = EastPostProcess::new(0.5, 0.4);
        let (rects, _) = post.decode(&scores, &geometry).unwrap();
        assert_eq!(rects.len(), 1);
        assert!((rects[0].angle + angle_rad.to_degrees()).abs() < 1e-3);
    }

    #[test]
    fn mismatched_map_dimensions_are_rejected() {
        let scores = ScoreMap::from_pred(&score_tensor(8, 8, &[])).unwrap();
        let geometry = GeometryMap::from_pred(&geometry_tensor(4, 4, 1.0, 0.0)).unwrap();

        let post = EastPostProcess::new(0.5, 0.4);
        assert!(matches!(
            post.decode(&scores, &geometry),
            Err(EngineError::InvalidOutputShape(_))
        ));
    }

    #[test]
    fn malformed_tensors_are_rejected() {
        let bad_scores = Array4::<f32>::zeros((1, 2, 8, 8)).into_dyn();
        assert!(ScoreMap::from_pred(&bad_scores).is_err());

        let bad_geometry = Array4::<f32>::zeros((1, 4, 8, 8)).into_dyn();
        assert!(GeometryMap::from_pred(&bad_geometry).is_err());
    }

    #[test]
    fn process_suppresses_duplicate_neighbours() {
        // Two adjacent hot cells reconstruct nearly identical boxes; only the
        // higher-confidence one survives suppression.
        let scores = ScoreMap::from_pred(&score_tensor(8, 8, &[(3, 3, 0.9), (3, 4, 0.7)])).unwrap();
        let geometry = GeometryMap::from_pred(&geometry_tensor(8, 8, 16.0, 0.0)).unwrap();

        let post = EastPostProcess::new(0.5, 0.4);
        let (rects, confs) = post.process(&scores, &geometry).unwrap();
        assert_eq!(rects.len(), 1);
        assert_eq!(confs, vec![0.9]);
    }
}
