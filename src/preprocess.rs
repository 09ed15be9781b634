use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

use crate::engine::EngineError;
use crate::geometry::ScalingRatio;

/// Normalizes a source image into the fixed-size tensor the EAST network
/// expects: square resize, per-image mean subtraction, NCHW layout.
pub struct EastPreProcess {
    pub input_size: u32,
}

impl EastPreProcess {
    pub fn new(input_size: u32) -> Self {
        Self { input_size }
    }

    pub fn run(&self, img: &RgbImage) -> Result<(Array4<f32>, ScalingRatio), EngineError> {
        let (ori_w, ori_h) = img.dimensions();
        if ori_w == 0 || ori_h == 0 {
            return Err(EngineError::Preprocess("empty input image".to_string()));
        }

        let s = self.input_size;
        let ratio = ScalingRatio::new(ori_w as f32 / s as f32, ori_h as f32 / s as f32)
            .ok_or_else(|| EngineError::Preprocess("degenerate scaling ratio".to_string()))?;

        let resized = imageops::resize(img, s, s, FilterType::Triangle);
        Ok((self.normalize_and_permute(&resized), ratio))
    }

    fn normalize_and_permute(&self, img: &RgbImage) -> Array4<f32> {
        let (w, h) = img.dimensions();
        let pixel_count = (w as f64 * h as f64).max(1.0);

        // The model was trained on mean-centred input; the mean comes from
        // the image itself, one value per channel.
        let mut sum = [0.0f64; 3];
        for pix in img.pixels() {
            sum[0] += pix[0] as f64;
            sum[1] += pix[1] as f64;
            sum[2] += pix[2] as f64;
        }
        let mean_r = (sum[0] / pixel_count) as f32;
        let mean_g = (sum[1] / pixel_count) as f32;
        let mean_b = (sum[2] / pixel_count) as f32;

        let mut out = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
        for (x, y, pix) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            // Store in BGR order to match the model's channel convention
            out[[0, 0, y, x]] = pix[2] as f32 - mean_b;
            out[[0, 1, y, x]] = pix[1] as f32 - mean_g;
            out[[0, 2, y, x]] = pix[0] as f32 - mean_r;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn uniform_image_centres_to_zero() {
        let img = RgbImage::from_pixel(32, 32, Rgb([90, 120, 200]));
        let pre = EastPreProcess::new(32);
        let (blob, ratio) = pre.run(&img).unwrap();

        assert_eq!(blob.dim(), (1, 3, 32, 32));
        assert_eq!(ratio, ScalingRatio::identity());
        for v in blob.iter() {
            assert!(v.abs() < 1e-3);
        }
    }

    #[test]
    fn ratio_reflects_source_dimensions() {
        let img = RgbImage::from_pixel(64, 16, Rgb([0, 0, 0]));
        let pre = EastPreProcess::new(32);
        let (blob, ratio) = pre.run(&img).unwrap();

        assert_eq!(blob.dim(), (1, 3, 32, 32));
        assert!((ratio.x - 2.0).abs() < 1e-6);
        assert!((ratio.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_image_is_an_error() {
        let img = RgbImage::new(0, 0);
        let pre = EastPreProcess::new(32);
        assert!(matches!(
            pre.run(&img),
            Err(EngineError::Preprocess(_))
        ));
    }
}
