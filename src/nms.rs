use std::cmp::Ordering;

use geo_clipper::Clipper;
use geo_types::{Coord, LineString, Polygon};

use crate::geometry::RotatedRect;

// Clipper operates on scaled integer coordinates; two decimal places is
// plenty for boxes in network-input pixel space.
const CLIP_FACTOR: f64 = 100.0;

/// Greedy non-maximum suppression over rotated rectangles.
///
/// Candidates scoring below `score_threshold` are dropped up front. The rest
/// are visited in order of descending confidence (ties break by ascending
/// input index); each kept box discards every remaining box whose overlap
/// ratio with it exceeds `iou_threshold`. Returns the kept indices into the
/// input slice.
pub fn suppress(
    rects: &[RotatedRect],
    confidences: &[f32],
    score_threshold: f32,
    iou_threshold: f32,
) -> Vec<usize> {
    let n = rects.len().min(confidences.len());
    let mut order: Vec<usize> = (0..n).filter(|&i| confidences[i] >= score_threshold).collect();
    order.sort_by(|&a, &b| {
        confidences[b]
            .partial_cmp(&confidences[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; n];

    for (pos, &idx) in order.iter().enumerate() {
        if suppressed[idx] {
            continue;
        }
        keep.push(idx);

        for &other in &order[pos + 1..] {
            if suppressed[other] {
                continue;
            }
            if rotated_iou(&rects[idx], &rects[other]) > iou_threshold {
                suppressed[other] = true;
            }
        }
    }

    keep
}

/// Intersection area over union area of two rotated rectangles.
pub fn rotated_iou(a: &RotatedRect, b: &RotatedRect) -> f32 {
    let pa = to_polygon(a);
    let pb = to_polygon(b);

    let intersection = pa.intersection(&pb, CLIP_FACTOR);
    let inter_area: f64 = intersection.0.iter().map(|p| ring_area(p.exterior())).sum();
    if inter_area <= 0.0 {
        return 0.0;
    }

    let union = a.area() as f64 + b.area() as f64 - inter_area;
    if union <= 0.0 {
        return 0.0;
    }

    (inter_area / union) as f32
}

fn to_polygon(rect: &RotatedRect) -> Polygon<f64> {
    let mut ring: Vec<Coord<f64>> = rect
        .vertices()
        .iter()
        .map(|p| Coord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect();
    // Closed ring: first point repeated at the end
    ring.push(ring[0]);
    Polygon::new(LineString::from(ring), vec![])
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    let pts = &ring.0;
    let n = pts.len();
    if n < 3 {
        return 0.0;
    }

    // Shoelace formula
    let mut area = 0.0;
    for i in 0..n {
        let p = pts[i];
        let q = pts[(i + 1) % n];
        area += p.x * q.y - q.x * p.y;
    }
    (area * 0.5).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point2f, Size2f};

    fn rect(cx: f32, cy: f32, w: f32, h: f32, angle: f32) -> RotatedRect {
        RotatedRect::new(Point2f::new(cx, cy), Size2f::new(w, h), angle)
    }

    #[test]
    fn identical_boxes_have_full_overlap() {
        let a = rect(10.0, 10.0, 8.0, 4.0, 20.0);
        assert!(rotated_iou(&a, &a) > 0.99);
    }

    #[test]
    fn disjoint_boxes_have_zero_overlap() {
        let a = rect(10.0, 10.0, 8.0, 4.0, 0.0);
        let b = rect(100.0, 100.0, 8.0, 4.0, 45.0);
        assert_eq!(rotated_iou(&a, &b), 0.0);
    }

    #[test]
    fn half_shifted_boxes_overlap_about_a_third() {
        // Two 10x10 squares offset by half a side: intersection 50, union 150
        let a = rect(5.0, 5.0, 10.0, 10.0, 0.0);
        let b = rect(10.0, 5.0, 10.0, 10.0, 0.0);
        let iou = rotated_iou(&a, &b);
        assert!((iou - 1.0 / 3.0).abs() < 0.02, "iou = {iou}");
    }

    #[test]
    fn keeps_higher_confidence_of_overlapping_pair() {
        let rects = vec![
            rect(5.0, 5.0, 10.0, 10.0, 0.0),
            rect(6.0, 5.0, 10.0, 10.0, 0.0),
            rect(50.0, 50.0, 10.0, 10.0, 0.0),
        ];
        let confs = vec![0.6, 0.9, 0.7];

        let keep = suppress(&rects, &confs, 0.0, 0.4);
        assert_eq!(keep, vec![1, 2]);
    }

    #[test]
    fn ties_break_by_input_order() {
        let rects = vec![
            rect(5.0, 5.0, 10.0, 10.0, 0.0),
            rect(5.0, 5.0, 10.0, 10.0, 0.0),
        ];
        let confs = vec![0.8, 0.8];

        let keep = suppress(&rects, &confs, 0.0, 0.4);
        assert_eq!(keep, vec![0]);
    }

    #[test]
    fn never_grows_and_yields_unique_valid_indices() {
        let rects: Vec<RotatedRect> = (0..20)
            .map(|i| rect(i as f32 * 3.0, 10.0, 8.0, 8.0, (i * 7) as f32))
            .collect();
        let confs: Vec<f32> = (0..20).map(|i| (i as f32 * 0.047) % 1.0).collect();

        let keep = suppress(&rects, &confs, 0.0, 0.3);
        assert!(keep.len() <= rects.len());

        let mut seen = std::collections::HashSet::new();
        for &i in &keep {
            assert!(i < rects.len());
            assert!(seen.insert(i), "index {i} returned twice");
        }
    }

    #[test]
    fn score_threshold_filters_candidates() {
        let rects = vec![
            rect(5.0, 5.0, 10.0, 10.0, 0.0),
            rect(50.0, 50.0, 10.0, 10.0, 0.0),
        ];
        let confs = vec![0.9, 0.3];

        let keep = suppress(&rects, &confs, 0.5, 0.4);
        assert_eq!(keep, vec![0]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(suppress(&[], &[], 0.5, 0.4).is_empty());
    }
}
