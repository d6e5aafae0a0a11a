//! Portable scalar kernel; the reference semantics for every other tier.

use crate::candidate::topk::{Proposal, TopkBoxes};
use crate::kernel::{Kernel, RefineParams};
use crate::tensor::{AnchorGrid, DeltaMap, ScoreMap};
use crate::util::math;

/// Loop-based kernel with no instruction-level parallelism requirements.
pub struct ScalarKernel;

/// Decodes a single anchor into a clipped, validity-flagged proposal.
#[inline]
pub(crate) fn refine_one(
    corners: [f32; 4],
    deltas: [f32; 4],
    score: f32,
    params: &RefineParams,
    anchor: usize,
) -> Proposal {
    let [mut x0, mut y0, mut x1, mut y1] = corners;
    let [dx, dy, d_log_w, d_log_h] = deltas;
    let offset = params.coordinates_offset;

    // input box extent and center
    let ww = x1 - x0 + offset;
    let hh = y1 - y0 + offset;
    let ctr_x = x0 + 0.5 * ww;
    let ctr_y = y0 + 0.5 * hh;

    // shifted center, rescaled extent; the clamp keeps exp finite
    let pred_ctr_x = dx * ww + ctr_x;
    let pred_ctr_y = dy * hh + ctr_y;
    let pred_w = d_log_w.min(params.max_delta_log_wh).exp() * ww;
    let pred_h = d_log_h.min(params.max_delta_log_wh).exp() * hh;

    x0 = pred_ctr_x - 0.5 * pred_w;
    y0 = pred_ctr_y - 0.5 * pred_h;
    x1 = pred_ctr_x + 0.5 * pred_w - offset;
    y1 = pred_ctr_y + 0.5 * pred_h - offset;

    // clip to the image bounds
    x0 = x0.min(params.img_w - offset).max(0.0);
    y0 = y0.min(params.img_h - offset).max(0.0);
    x1 = x1.min(params.img_w - offset).max(0.0);
    y1 = y1.min(params.img_h - offset).max(0.0);

    let box_w = x1 - x0 + offset;
    let box_h = y1 - y0 + offset;

    Proposal {
        x0,
        y0,
        x1,
        y1,
        score,
        anchor,
        valid: box_w >= params.min_box_w && box_h >= params.min_box_h,
    }
}

impl Kernel for ScalarKernel {
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

        for w in 0..width {
            for a in 0..num_anchors {
                let anchor_index = (h * width + w) * num_anchors + a;
                out[w * num_anchors + a] = refine_one(
                    anchors.corners(h, w, a),
                    deltas.at(a, h, w),
                    scores.at(a, h, w),
                    params,
                    anchor_index,
                );
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
        let kept_box = boxes.corners(keep);
        for j in keep + 1..boxes.len() {
            if dead[j] {
                continue;
            }
            if math::iou(kept_box, boxes.corners(j), offset) > nms_threshold {
                dead[j] = true;
            }
        }
    }
}
