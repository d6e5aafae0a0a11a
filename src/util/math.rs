//! Scalar box-geometry helpers shared by the kernels.

/// Area of an axis-aligned box under the coordinate-offset convention.
///
/// With `offset == 1` a box covering a single pixel (`x0 == x1`) has area 1;
/// with `offset == 0` coordinates are treated as continuous.
#[inline]
pub(crate) fn box_area(x0: f32, y0: f32, x1: f32, y1: f32, offset: f32) -> f32 {
    (x1 - x0 + offset) * (y1 - y0 + offset)
}

/// Intersection-over-union of two boxes under the coordinate-offset convention.
///
/// Degenerate pairs where the union area is zero divide to NaN; callers
/// compare the result against a threshold, and `NaN > t` is false, so such
/// pairs never suppress each other.
#[inline]
pub(crate) fn iou(a: [f32; 4], b: [f32; 4], offset: f32) -> f32 {
    let xx0 = a[0].max(b[0]);
    let yy0 = a[1].max(b[1]);
    let xx1 = a[2].min(b[2]);
    let yy1 = a[3].min(b[3]);

    let w = (xx1 - xx0 + offset).max(0.0);
    let h = (yy1 - yy0 + offset).max(0.0);
    let inter = w * h;

    let area_a = box_area(a[0], a[1], a[2], a[3], offset);
    let area_b = box_area(b[0], b[1], b[2], b[3], offset);
    inter / (area_a + area_b - inter)
}
