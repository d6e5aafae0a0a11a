//! Rayon-parallel refinement driver (feature-gated).
//!
//! Spatial rows decode independently, so the per-image proposal buffer is
//! split into disjoint row chunks and each worker runs the configured
//! kernel on its own rows. The NMS outer loop stays sequential by design;
//! only decode parallelizes here.

use crate::candidate::topk::Proposal;
use crate::kernel::{Kernel, RefineParams};
use crate::tensor::{AnchorGrid, DeltaMap, ScoreMap};
use rayon::prelude::*;

/// Row-parallel anchor refinement for one image.
///
/// Produces exactly the output of [`refine_image`](crate::kernel::refine_image):
/// each `(h, w, anchor)` slot is written by exactly one worker.
pub fn refine_image_par<K: Kernel>(
    anchors: &AnchorGrid<'_>,
    deltas: &DeltaMap<'_>,
    scores: &ScoreMap<'_>,
    params: &RefineParams,
    out: &mut [Proposal],
) {
    let row_len = anchors.width() * anchors.anchors();
    out.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(h, row)| K::refine_row(anchors, deltas, scores, params, h, row));
}
