//! Greedy non-maximum suppression over planar candidate columns.

use crate::candidate::topk::TopkBoxes;
use crate::kernel::Kernel;

/// Runs greedy IoU suppression over score-ordered candidates.
///
/// Candidates are visited in order; each accepted survivor marks every later
/// candidate overlapping it beyond `nms_threshold` as dead through the
/// kernel's inner pass. Candidates flagged invalid by the decoder start out
/// dead and can never survive. The scan stops once `post_nms_topn` survivors
/// are found.
///
/// Returns the survivor indices into `boxes`, in acceptance (descending
/// score) order.
pub fn greedy_nms<K: Kernel>(
    boxes: &TopkBoxes,
    post_nms_topn: usize,
    nms_threshold: f32,
    offset: f32,
) -> Vec<usize> {
    if post_nms_topn == 0 || boxes.is_empty() {
        return Vec::new();
    }

    let mut dead: Vec<bool> = boxes.valid.iter().map(|&v| !v).collect();
    let mut kept = Vec::with_capacity(post_nms_topn.min(boxes.len()));

    // The outer loop is inherently sequential: whether candidate i survives
    // depends on the survivors before it. Only the inner mark pass vectorizes.
    for i in 0..boxes.len() {
        if dead[i] {
            continue;
        }
        kept.push(i);
        if kept.len() == post_nms_topn {
            break;
        }
        K::suppress_tail(boxes, i, &mut dead, nms_threshold, offset);
    }

    kept
}
