//! Detection box expansion.

use crate::scene::BBox;

/// Fraction of the box width/height added on each side.
pub const EXPANSION_PER_SIDE: f64 = 0.05;

/// Grow `bbox` by 5% of its size per side, then clamp to `[0, width] x [0, height]`.
///
/// The result always contains the clamped input box.
pub fn expand_bbox(bbox: BBox, width: u32, height: u32) -> BBox {
    let [x1, y1, x2, y2] = bbox;
    let (w, h) = (width as f64, height as f64);
    let dx = (x2 - x1).max(0.0) * EXPANSION_PER_SIDE;
    let dy = (y2 - y1).max(0.0) * EXPANSION_PER_SIDE;
    [
        (x1 - dx).clamp(0.0, w),
        (y1 - dy).clamp(0.0, h),
        (x2 + dx).clamp(0.0, w),
        (y2 + dy).clamp(0.0, h),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_ten_percent_overall() {
        assert_eq!(
            expand_bbox([100.0, 100.0, 200.0, 300.0], 1000, 1000),
            [95.0, 90.0, 205.0, 310.0]
        );
    }

    #[test]
    fn clamps_to_image_bounds() {
        assert_eq!(expand_bbox([0.0, 2.0, 64.0, 60.0], 64, 62), [0.0, 0.0, 64.0, 62.0]);
    }

    #[test]
    fn expansion_only_grows_and_stays_in_bounds() {
        let (w, h) = (640u32, 480u32);
        let boxes = [
            [0.0, 0.0, 640.0, 480.0],
            [10.5, 20.25, 11.0, 400.0],
            [300.0, 200.0, 300.0, 200.0],
            [600.0, 1.0, 639.0, 479.5],
            [5.0, 5.0, 6.0, 6.0],
        ];
        for bbox in boxes {
            let [x1, y1, x2, y2] = bbox;
            let [ex1, ey1, ex2, ey2] = expand_bbox(bbox, w, h);
            assert!(0.0 <= ex1 && ex1 <= x1 && x1 <= x2 && x2 <= ex2 && ex2 <= w as f64, "{:?}", bbox);
            assert!(0.0 <= ey1 && ey1 <= y1 && y1 <= y2 && y2 <= ey2 && ey2 <= h as f64, "{:?}", bbox);
        }
    }
}
