//! Execution kernels for anchor refinement and suppression.
//!
//! The two performance-critical inner loops of the pipeline sit behind the
//! [`Kernel`] trait: decoding one spatial row of anchors, and the
//! mark-overlaps-dead pass of greedy NMS. The portable scalar kernel is the
//! reference; the `simd` feature adds an 8-lane implementation with
//! identical semantics, selected at build time the same way throughout the
//! crate.

use crate::candidate::topk::{Proposal, TopkBoxes};
use crate::tensor::{AnchorGrid, DeltaMap, ScoreMap};

/// Clamp applied to predicted log-size deltas, `ln(1000 / 16)`.
///
/// Prevents `exp` overflow from unbounded size regressions.
pub const MAX_DELTA_LOG_WH: f32 = 4.135_166_6;

/// Per-image refinement parameters derived from the config and image info.
#[derive(Clone, Copy, Debug)]
pub struct RefineParams {
    /// Image height in pixels; clip bound for y coordinates.
    pub img_h: f32,
    /// Image width in pixels; clip bound for x coordinates.
    pub img_w: f32,
    /// Minimum post-clip box height, already multiplied by `scale_h`.
    pub min_box_h: f32,
    /// Minimum post-clip box width, already multiplied by `scale_w`.
    pub min_box_w: f32,
    /// Clamp for the log-size deltas, normally [`MAX_DELTA_LOG_WH`].
    pub max_delta_log_wh: f32,
    /// 0.0 for normalized coordinates, 1.0 for pixel coordinates.
    pub coordinates_offset: f32,
}

/// Interchangeable implementation of the two pipeline inner loops.
///
/// Every implementation must produce the same survivor sets; scores may
/// differ only by floating-point reassociation within test tolerance.
pub trait Kernel {
    /// Decodes every anchor at spatial row `h` into `out`.
    ///
    /// `out` covers the row's `W * A` proposals in `(w, anchor)` order and
    /// each proposal records its flattened `(h, w, anchor)` index.
    fn refine_row(
        anchors: &AnchorGrid<'_>,
        deltas: &DeltaMap<'_>,
        scores: &ScoreMap<'_>,
        params: &RefineParams,
        h: usize,
        out: &mut [Proposal],
    );

    /// Marks as dead every candidate after `keep` whose IoU with `keep`
    /// exceeds `nms_threshold`.
    fn suppress_tail(
        boxes: &TopkBoxes,
        keep: usize,
        dead: &mut [bool],
        nms_threshold: f32,
        offset: f32,
    );
}

/// Sequential anchor refinement for one image.
///
/// `out` must hold `H * W * A` proposals; each row chunk is decoded in turn.
pub fn refine_image<K: Kernel>(
    anchors: &AnchorGrid<'_>,
    deltas: &DeltaMap<'_>,
    scores: &ScoreMap<'_>,
    params: &RefineParams,
    out: &mut [Proposal],
) {
    let row_len = anchors.width() * anchors.anchors();
    for (h, row) in out.chunks_mut(row_len).enumerate() {
        K::refine_row(anchors, deltas, scores, params, h, row);
    }
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
pub mod rayon;

#[cfg(test)]
mod tests {
    use super::MAX_DELTA_LOG_WH;

    #[test]
    fn log_wh_clamp_matches_its_closed_form() {
        assert!((MAX_DELTA_LOG_WH - (1000.0f32 / 16.0).ln()).abs() < 1e-6);
    }
}
