//! Binary mask operations: thresholding, dilation and region extraction.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{self, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::contour_area;
use imageproc::morphology;

use crate::detect::result::MotionRegion;

const FOREGROUND: u8 = 255;

/// Largest dilation radius; distances are `u8` and 255 marks unreached pixels.
pub const MAX_DILATE_ITERATIONS: u32 = 254;

/// Pixels strictly above `thresh` become foreground (255), all others 0.
pub fn threshold(delta: &GrayImage, thresh: u8) -> GrayImage {
    contrast::threshold(delta, thresh, ThresholdType::Binary)
}

/// Grow foreground with a 3x3 square structuring element, `iterations` times.
///
/// Pixels outside the image never contribute, so dilation does not bleed in
/// from the borders.
pub fn dilate(mask: &GrayImage, iterations: u32) -> GrayImage {
    // The distance transform caps distances at `width + height`, which a large
    // radius would otherwise reach on a mask with no foreground.
    if iterations == 0 || mask.pixels().all(|p| p.0[0] == 0) {
        return mask.clone();
    }
    // k passes of a 3x3 square reach exactly the pixels within chessboard distance k.
    let radius = iterations
        .min(MAX_DILATE_ITERATIONS)
        .min(mask.width() + mask.height() - 1) as u8;
    morphology::dilate(mask, Norm::LInf, radius)
}

/// Outer borders of the 8-connected foreground components of a binary mask.
///
/// Components enclosed by a hole of another component are not reported.
/// Bounds come from the border pixels and area is the polygon area enclosed
/// by the border, so a single pixel or a one-pixel-wide line has area 0.
pub fn extract_regions(mask: &GrayImage) -> Vec<MotionRegion> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }
    // Border tracing only starts an outer border after a background pixel on
    // the same row, so components touching column 0 need a margin.
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut padded, mask, 1, 1);

    find_contours::<i32>(&padded)
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(region_of)
        .collect()
}

fn region_of(contour: &Contour<i32>) -> Option<MotionRegion> {
    let xs = contour.points.iter().map(|p| p.x);
    let ys = contour.points.iter().map(|p| p.y);
    let (min_x, max_x) = (xs.clone().min()?, xs.max()?);
    let (min_y, max_y) = (ys.clone().min()?, ys.max()?);
    Some(MotionRegion {
        // Undo the one-pixel margin.
        x: (min_x - 1).max(0) as u32,
        y: (min_y - 1).max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
        area: contour_area(&contour.points).round() as u32,
    })
}
