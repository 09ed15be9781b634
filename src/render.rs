use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::geometry::RotatedRect;
use crate::types::OutputMode;

const LINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Bounding box and rotation of an extracted region, in original-image
/// pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionProperties {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub angle: f32,
}

/// A rendered output image, tagged with the source image it came from.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub image: RgbImage,
    pub source_id: String,
    pub mode: OutputMode,
    /// Present for EXTRACT artifacts only.
    pub region: Option<RegionProperties>,
}

impl OutputArtifact {
    pub fn description(&self) -> String {
        format!("EAST output ({}) from {}", self.mode, self.source_id)
    }
}

/// Render the final detections into output artifacts. Detections must
/// already be in original-image coordinates. Zero detections produce zero
/// artifacts in every mode.
pub fn render(
    mode: OutputMode,
    image: &RgbImage,
    detections: &[RotatedRect],
    source_id: &str,
) -> Vec<OutputArtifact> {
    if detections.is_empty() {
        return Vec::new();
    }

    match mode {
        OutputMode::Box => vec![draw_boxes(image, detections, source_id)],
        OutputMode::Extract => detections
            .iter()
            .filter_map(|rect| extract_region(image, rect, source_id))
            .collect(),
        OutputMode::Mask => vec![mask_image(image, detections, source_id, OutputMode::Mask)],
        OutputMode::InverseMask => {
            vec![mask_image(image, detections, source_id, OutputMode::InverseMask)]
        }
    }
}

/// Draw the edges of every detection on a copy of the original.
fn draw_boxes(image: &RgbImage, detections: &[RotatedRect], source_id: &str) -> OutputArtifact {
    let mut frame = image.clone();

    for rect in detections {
        let v = rect.vertices();
        for j in 0..4 {
            let a = v[j];
            let b = v[(j + 1) % 4];
            draw_line_segment_mut(&mut frame, (a.x, a.y), (b.x, b.y), LINE_COLOR);
        }
    }

    OutputArtifact {
        image: frame,
        source_id: source_id.to_string(),
        mode: OutputMode::Box,
        region: None,
    }
}

/// Cut one detection out of the original: crop its axis-aligned bounds,
/// undo its rotation, then trim the rotation canvas back to the detection's
/// own width and height.
fn extract_region(image: &RgbImage, rect: &RotatedRect, source_id: &str) -> Option<OutputArtifact> {
    let (bx, by, bw, bh) = rect
        .bounding_rect()
        .clamp_to(image.width(), image.height())?;
    let bounded = imageops::crop_imm(image, bx, by, bw, bh).to_image();

    let rotated = rotate_expand(&bounded, -rect.angle);

    let target_w = rect.size.width.max(0.0) as u32;
    let target_h = rect.size.height.max(0.0) as u32;
    if target_w == 0 || target_h == 0 {
        return None;
    }

    let left = (rotated.width() as f32 / 2.0 - target_w as f32 / 2.0).floor().max(0.0) as u32;
    let top = (rotated.height() as f32 / 2.0 - target_h as f32 / 2.0).floor().max(0.0) as u32;
    let trim_w = target_w.min(rotated.width().saturating_sub(left));
    let trim_h = target_h.min(rotated.height().saturating_sub(top));
    if trim_w == 0 || trim_h == 0 {
        return None;
    }

    let trimmed = imageops::crop_imm(&rotated, left, top, trim_w, trim_h).to_image();

    Some(OutputArtifact {
        image: trimmed,
        source_id: source_id.to_string(),
        mode: OutputMode::Extract,
        region: Some(RegionProperties {
            x: bx as i32,
            y: by as i32,
            width: bw,
            height: bh,
            angle: rect.angle,
        }),
    })
}

/// Composite the original against a detection mask.
///
/// MASK starts from a white mask and fills detection polygons black;
/// INVERSE_MASK starts black and fills white. Either way, every pixel where
/// the mask ended up white is replaced by black in the output, so MASK keeps
/// original pixels only inside detections and INVERSE_MASK only outside.
fn mask_image(
    image: &RgbImage,
    detections: &[RotatedRect],
    source_id: &str,
    mode: OutputMode,
) -> OutputArtifact {
    let (w, h) = image.dimensions();
    let (base, fill) = match mode {
        OutputMode::InverseMask => (0u8, 255u8),
        _ => (255u8, 0u8),
    };

    let mut mask = GrayImage::from_pixel(w, h, Luma([base]));
    for rect in detections {
        fill_rect_polygon(&mut mask, rect, Luma([fill]));
    }

    let mut frame = image.clone();
    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] != 0 {
            *pixel = BLACK;
        }
    }

    OutputArtifact {
        image: frame,
        source_id: source_id.to_string(),
        mode,
        region: None,
    }
}

fn fill_rect_polygon(mask: &mut GrayImage, rect: &RotatedRect, color: Luma<u8>) {
    let mut poly: Vec<Point<i32>> = rect
        .vertices()
        .iter()
        .map(|p| Point::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    poly.dedup();

    // Degenerate rectangles collapse below a fillable polygon
    if poly.len() >= 3 && poly.first() != poly.last() {
        draw_polygon_mut(mask, &poly, color);
    }
}

/// Rotate by `degrees` (clockwise-positive in image coordinates) onto an
/// expanded canvas large enough to hold the whole source frame. Uncovered
/// canvas is black.
fn rotate_expand(src: &RgbImage, degrees: f32) -> RgbImage {
    let rads = (degrees as f64).to_radians();
    let (sin_a, cos_a) = rads.sin_cos();
    let w = src.width() as f64;
    let h = src.height() as f64;

    let new_w = (w * cos_a.abs() + h * sin_a.abs()).floor().max(1.0) as u32;
    let new_h = (h * cos_a.abs() + w * sin_a.abs()).floor().max(1.0) as u32;

    // Reverse mapping: for each destination pixel, sample the source with
    // bilinear interpolation, falling back to nearest neighbour at edges.
    let inverse = Rotation2::new(-rads);
    let src_centre = Vector2::new(w / 2.0, h / 2.0);
    let dst_centre = Vector2::new(new_w as f64 / 2.0, new_h as f64 / 2.0);

    let src_cols = src.width() as i64;
    let src_rows = src.height() as i64;
    let mut out = RgbImage::new(new_w, new_h);

    for y in 0..new_h {
        for x in 0..new_w {
            let p = inverse * (Vector2::new(x as f64, y as f64) - dst_centre) + src_centre;

            let x0 = p.x.floor() as i64;
            let y0 = p.y.floor() as i64;
            let x1 = x0 + 1;
            let y1 = y0 + 1;

            if x0 >= 0 && x1 < src_cols && y0 >= 0 && y1 < src_rows {
                let fx = p.x - x0 as f64;
                let fy = p.y - y0 as f64;

                let p00 = src.get_pixel(x0 as u32, y0 as u32);
                let p10 = src.get_pixel(x1 as u32, y0 as u32);
                let p01 = src.get_pixel(x0 as u32, y1 as u32);
                let p11 = src.get_pixel(x1 as u32, y1 as u32);

                let mut rgb = [0u8; 3];
                for (c, v) in rgb.iter_mut().enumerate() {
                    *v = ((1.0 - fx) * (1.0 - fy) * p00[c] as f64
                        + fx * (1.0 - fy) * p10[c] as f64
                        + (1.0 - fx) * fy * p01[c] as f64
                        + fx * fy * p11[c] as f64) as u8;
                }
                out.put_pixel(x, y, Rgb(rgb));
            } else if x0 >= 0 && x0 < src_cols && y0 >= 0 && y0 < src_rows {
                out.put_pixel(x, y, *src.get_pixel(x0 as u32, y0 as u32));
            }
        }
    }

    out
}
