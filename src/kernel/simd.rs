//! SIMD kernel using the `wide` crate.
//!
//! Decoding vectorizes across the spatial `w` axis, where the delta and
//! score channels are contiguous; anchor corners are gathered through the
//! strided layout. The NMS inner pass vectorizes across the candidate tail,
//! which is why the top-K stage unpacks into planar columns. Both loops
//! fall back to the scalar path for the remainder lanes.

use crate::candidate::topk::{Proposal, TopkBoxes};
use crate::kernel::scalar::refine_one;
use crate::kernel::{Kernel, RefineParams};
use crate::tensor::{AnchorGrid, DeltaMap, ScoreMap};
use crate::util::math;
use wide::{f32x8, CmpGt};

const LANES: usize = 8;

/// Load 8 f32 values into f32x8.
#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Lane-wise `exp(min(v, clamp))`.
///
/// The exponential itself runs per lane; the surrounding arithmetic stays
/// vectorized, matching the scalar path bit-for-bit on the clamp.
#[inline]
fn exp_clamped(v: f32x8, clamp: f32) -> f32x8 {
    let mut lanes = v.min(f32x8::splat(clamp)).to_array();
    for value in &mut lanes {
        *value = value.exp();
    }
    f32x8::from(lanes)
}

/// 8-lane kernel for anchor refinement and NMS suppression.
pub struct SimdKernel;

impl Kernel for SimdKernel {
    fn refine_row(
        anchors: &AnchorGrid<'_>,
        deltas: &DeltaMap<'_>,
        scores: &ScoreMap<'_>,
        params: &RefineParams,
        h: usize,
        out: &mut [Proposal],
    ) {
        let width = anchors.width();
        let num_anchors = anchors.anchors();
        debug_assert_eq!(out.len(), width * num_anchors);

        let offset = f32x8::splat(params.coordinates_offset);
        let half = f32x8::splat(0.5);
        let zero = f32x8::splat(0.0);
        let x_bound = f32x8::splat(params.img_w - params.coordinates_offset);
        let y_bound = f32x8::splat(params.img_h - params.coordinates_offset);

        let simd_end = width / LANES * LANES;

        for a in 0..num_anchors {
            let dx_row = deltas.channel_row(a, 0, h);
            let dy_row = deltas.channel_row(a, 1, h);
            let dlw_row = deltas.channel_row(a, 2, h);
            let dlh_row = deltas.channel_row(a, 3, h);
            let score_row = scores.row(a, h);

            let mut w = 0;
            while w < simd_end {
                // gather strided anchor corners for 8 consecutive positions
                let mut ax0 = [0.0f32; LANES];
                let mut ay0 = [0.0f32; LANES];
                let mut ax1 = [0.0f32; LANES];
                let mut ay1 = [0.0f32; LANES];
                for lane in 0..LANES {
                    let corners = anchors.corners(h, w + lane, a);
                    ax0[lane] = corners[0];
                    ay0[lane] = corners[1];
                    ax1[lane] = corners[2];
                    ay1[lane] = corners[3];
                }
                let x0 = f32x8::from(ax0);
                let y0 = f32x8::from(ay0);
                let x1 = f32x8::from(ax1);
                let y1 = f32x8::from(ay1);

                let ww = x1 - x0 + offset;
                let hh = y1 - y0 + offset;
                let ctr_x = x0 + half * ww;
                let ctr_y = y0 + half * hh;

                let dx = load_f32x8(&dx_row[w..]);
                let dy = load_f32x8(&dy_row[w..]);
                let d_log_w = load_f32x8(&dlw_row[w..]);
                let d_log_h = load_f32x8(&dlh_row[w..]);

                let pred_ctr_x = dx * ww + ctr_x;
                let pred_ctr_y = dy * hh + ctr_y;
                let pred_w = exp_clamped(d_log_w, params.max_delta_log_wh) * ww;
                let pred_h = exp_clamped(d_log_h, params.max_delta_log_wh) * hh;

                let nx0 = (pred_ctr_x - half * pred_w).min(x_bound).max(zero);
                let ny0 = (pred_ctr_y - half * pred_h).min(y_bound).max(zero);
                let nx1 = (pred_ctr_x + half * pred_w - offset).min(x_bound).max(zero);
                let ny1 = (pred_ctr_y + half * pred_h - offset).min(y_bound).max(zero);

                let box_w = (nx1 - nx0 + offset).to_array();
                let box_h = (ny1 - ny0 + offset).to_array();
                let rx0 = nx0.to_array();
                let ry0 = ny0.to_array();
                let rx1 = nx1.to_array();
                let ry1 = ny1.to_array();

                for lane in 0..LANES {
                    let pos = w + lane;
                    out[pos * num_anchors + a] = Proposal {
                        x0: rx0[lane],
                        y0: ry0[lane],
                        x1: rx1[lane],
                        y1: ry1[lane],
                        score: score_row[pos],
                        anchor: (h * width + pos) * num_anchors + a,
                        valid: box_w[lane] >= params.min_box_w && box_h[lane] >= params.min_box_h,
                    };
                }
                w += LANES;
            }

            // scalar remainder
            while w < width {
                out[w * num_anchors + a] = refine_one(
                    anchors.corners(h, w, a),
                    deltas.at(a, h, w),
                    score_row[w],
                    params,
                    (h * width + w) * num_anchors + a,
                );
                w += 1;
            }
        }
    }

    fn suppress_tail(
        boxes: &TopkBoxes,
        keep: usize,
        dead: &mut [bool],
        nms_threshold: f32,
        offset: f32,
    ) {
        let len = boxes.len();
        let tail = keep + 1;
        if tail >= len {
            return;
        }

        let kept_box = boxes.corners(keep);
        let area_keep =
            math::box_area(kept_box[0], kept_box[1], kept_box[2], kept_box[3], offset);

        let kx0 = f32x8::splat(kept_box[0]);
        let ky0 = f32x8::splat(kept_box[1]);
        let kx1 = f32x8::splat(kept_box[2]);
        let ky1 = f32x8::splat(kept_box[3]);
        let area_k = f32x8::splat(area_keep);
        let off = f32x8::splat(offset);
        let zero = f32x8::splat(0.0);
        let threshold = f32x8::splat(nms_threshold);

        let simd_end = tail + (len - tail) / LANES * LANES;

        // Re-marking an already-dead lane is idempotent, so the vector pass
        // skips the per-lane liveness check the scalar loop performs.
        let mut j = tail;
        while j < simd_end {
            let bx0 = load_f32x8(&boxes.x0[j..]);
            let by0 = load_f32x8(&boxes.y0[j..]);
            let bx1 = load_f32x8(&boxes.x1[j..]);
            let by1 = load_f32x8(&boxes.y1[j..]);

            let xx0 = bx0.max(kx0);
            let yy0 = by0.max(ky0);
            let xx1 = bx1.min(kx1);
            let yy1 = by1.min(ky1);

            let w = (xx1 - xx0 + off).max(zero);
            let h = (yy1 - yy0 + off).max(zero);
            let inter = w * h;
            let area_b = (bx1 - bx0 + off) * (by1 - by0 + off);
            let iou = inter / (area_k + area_b - inter);

            let mask = iou.simd_gt(threshold).to_array();
            for (lane, &hit) in mask.iter().enumerate() {
                if hit.to_bits() != 0 {
                    dead[j + lane] = true;
                }
            }
            j += LANES;
        }

        // scalar remainder
        while j < len {
            if !dead[j] && math::iou(kept_box, boxes.corners(j), offset) > nms_threshold {
                dead[j] = true;
            }
            j += 1;
        }
    }
}
