//! The proposal-generation pipeline.
//!
//! [`GenerateProposals`] ties the stages together per image — refine anchors,
//! select the top-K by score, run greedy NMS, gather survivors — and
//! assembles the batch outputs once every image's survivor count is known.
//! Images are independent and run in parallel when the `rayon` feature is
//! enabled and [`ProposalConfig::parallel`] is set.

use crate::candidate::nms::greedy_nms;
use crate::candidate::topk::{select_topk, Proposal, TopkBoxes};
use crate::kernel::{refine_image, RefineParams, MAX_DELTA_LOG_WH};
use crate::tensor::{AnchorGrid, DeltaMap, ImageInfo, ScoreMap};
use crate::trace::{trace_event, trace_span};
use crate::util::{ProposalError, ProposalResult};

#[cfg(feature = "rayon")]
use crate::kernel::rayon::refine_image_par;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

// Default kernel tier - SIMD when compiled in, scalar otherwise.
#[cfg(not(feature = "simd"))]
use crate::kernel::scalar::ScalarKernel as DefaultKernel;
#[cfg(feature = "simd")]
use crate::kernel::simd::SimdKernel as DefaultKernel;

/// Integer width of the per-image survivor counts output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoiCountType {
    /// 32-bit counts.
    I32,
    /// 64-bit counts.
    #[default]
    I64,
}

/// Pipeline configuration, fixed at construction.
#[derive(Clone, Debug)]
pub struct ProposalConfig {
    /// Minimum box side length; multiplied by the per-image scale factors.
    pub min_box_size: f32,
    /// IoU cutoff above which a lower-scored box is suppressed.
    pub nms_threshold: f32,
    /// Number of candidates kept per image before suppression.
    pub pre_nms_topn: usize,
    /// Maximum number of survivors per image.
    pub post_nms_topn: usize,
    /// Normalized coordinates use offset 0, pixel coordinates offset 1.
    pub normalized_coordinates: bool,
    /// Width of the survivor-count output values.
    pub roi_count_type: RoiCountType,
    /// Run images of a batch on worker threads. Only effective when the
    /// `rayon` feature is enabled.
    pub parallel: bool,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            min_box_size: 0.0,
            nms_threshold: 0.7,
            pre_nms_topn: 6000,
            post_nms_topn: 300,
            normalized_coordinates: false,
            roi_count_type: RoiCountType::default(),
            parallel: true,
        }
    }
}

/// Borrowed input tensors for one inference call.
pub struct ProposalInputs<'a> {
    /// Static anchor grid shared by every image.
    pub anchors: AnchorGrid<'a>,
    /// Flattened `[batch, A*4, H, W]` regression deltas.
    pub deltas: &'a [f32],
    /// Flattened `[batch, A, H, W]` foreground scores.
    pub scores: &'a [f32],
    /// Flattened `[batch, 3]` or `[batch, 4]` image size/scale records.
    pub image_info: &'a [f32],
    /// Number of images in the batch.
    pub batch: usize,
}

/// Per-image survivor counts in the configured integer width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoiCounts {
    /// 32-bit counts, one per image.
    I32(Vec<i32>),
    /// 64-bit counts, one per image.
    I64(Vec<i64>),
}

impl RoiCounts {
    /// Number of images covered.
    pub fn len(&self) -> usize {
        match self {
            RoiCounts::I32(v) => v.len(),
            RoiCounts::I64(v) => v.len(),
        }
    }

    /// Returns true if the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Survivor count of one image, widened to i64.
    pub fn value(&self, image: usize) -> Option<i64> {
        match self {
            RoiCounts::I32(v) => v.get(image).map(|&c| i64::from(c)),
            RoiCounts::I64(v) => v.get(image).copied(),
        }
    }
}

/// Batch outputs: contiguous ROIs, scores, and per-image counts.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalOutput {
    /// Survivor boxes, flattened `[total, 4]` as `(x0, y0, x1, y1)`.
    pub rois: Vec<f32>,
    /// Survivor scores, `[total]`, non-increasing within each image.
    pub scores: Vec<f32>,
    /// Per-image survivor counts, `[batch]`.
    pub roi_counts: RoiCounts,
}

impl ProposalOutput {
    /// Total number of survivors across the batch.
    pub fn total_rois(&self) -> usize {
        self.scores.len()
    }
}

/// Per-image gather result, concatenated once all counts are known.
struct ImageProposals {
    rois: Vec<f32>,
    scores: Vec<f32>,
}

/// Region-proposal generator for a fixed configuration.
pub struct GenerateProposals {
    config: ProposalConfig,
}

impl GenerateProposals {
    /// Validates the configuration and builds a generator.
    pub fn new(config: ProposalConfig) -> ProposalResult<Self> {
        if !config.nms_threshold.is_finite() || config.nms_threshold < 0.0 {
            return Err(ProposalError::InvalidConfig(
                "nms_threshold must be finite and non-negative",
            ));
        }
        if !config.min_box_size.is_finite() || config.min_box_size < 0.0 {
            return Err(ProposalError::InvalidConfig(
                "min_box_size must be finite and non-negative",
            ));
        }
        Ok(Self { config })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ProposalConfig {
        &self.config
    }

    /// Runs the full pipeline over a batch.
    ///
    /// Tensor sizes are validated eagerly; any mismatch aborts the whole
    /// call before any image is processed. NaN or infinite deltas and scores
    /// are not detected, they flow through IEEE-754 arithmetic and typically
    /// end up as invalid candidates.
    pub fn execute(&self, inputs: &ProposalInputs<'_>) -> ProposalResult<ProposalOutput> {
        let _span = trace_span!("generate_proposals", batch = inputs.batch).entered();

        let batch = inputs.batch;
        if batch == 0 {
            return Ok(ProposalOutput {
                rois: Vec::new(),
                scores: Vec::new(),
                roi_counts: self.pack_counts(Vec::new()),
            });
        }

        let delta_item = inputs.anchors.flat_len();
        let score_item = inputs.anchors.len();
        if inputs.deltas.len() != batch * delta_item {
            return Err(ProposalError::AnchorsDeltasMismatch {
                expected: batch * delta_item,
                got: inputs.deltas.len(),
            });
        }
        if inputs.scores.len() != batch * score_item {
            return Err(ProposalError::DeltasScoresMismatch {
                expected: batch * score_item,
                got: inputs.scores.len(),
            });
        }
        let info_item = inputs.image_info.len() / batch;
        if info_item * batch != inputs.image_info.len() {
            return Err(ProposalError::RaggedImageInfo {
                len: inputs.image_info.len(),
                batch,
            });
        }
        if !(3..=4).contains(&info_item) {
            return Err(ProposalError::InvalidImageInfo(info_item));
        }

        let height = inputs.anchors.height();
        let width = inputs.anchors.width();
        let num_anchors = inputs.anchors.anchors();

        let run_one = |n: usize| -> ProposalResult<ImageProposals> {
            let deltas = DeltaMap::new(
                &inputs.deltas[n * delta_item..(n + 1) * delta_item],
                num_anchors,
                height,
                width,
            )?;
            let scores = ScoreMap::new(
                &inputs.scores[n * score_item..(n + 1) * score_item],
                num_anchors,
                height,
                width,
            )?;
            let info =
                ImageInfo::from_slice(&inputs.image_info[n * info_item..(n + 1) * info_item])?;
            Ok(self.run_image(&inputs.anchors, &deltas, &scores, info))
        };

        #[cfg(feature = "rayon")]
        let per_image: Vec<ImageProposals> = if self.config.parallel {
            (0..batch)
                .into_par_iter()
                .map(run_one)
                .collect::<ProposalResult<_>>()?
        } else {
            (0..batch).map(run_one).collect::<ProposalResult<_>>()?
        };
        #[cfg(not(feature = "rayon"))]
        let per_image: Vec<ImageProposals> =
            (0..batch).map(run_one).collect::<ProposalResult<_>>()?;

        // Output sizes are only known now; allocate once and copy.
        let total: usize = per_image.iter().map(|image| image.scores.len()).sum();
        let mut rois = Vec::with_capacity(total * 4);
        let mut scores = Vec::with_capacity(total);
        let mut counts = Vec::with_capacity(batch);
        for image in &per_image {
            rois.extend_from_slice(&image.rois);
            scores.extend_from_slice(&image.scores);
            counts.push(image.scores.len() as i64);
        }

        trace_event!("proposals_assembled", total = total);
        Ok(ProposalOutput {
            rois,
            scores,
            roi_counts: self.pack_counts(counts),
        })
    }

    fn pack_counts(&self, counts: Vec<i64>) -> RoiCounts {
        match self.config.roi_count_type {
            RoiCountType::I32 => RoiCounts::I32(counts.into_iter().map(|c| c as i32).collect()),
            RoiCountType::I64 => RoiCounts::I64(counts),
        }
    }

    fn run_image(
        &self,
        anchors: &AnchorGrid<'_>,
        deltas: &DeltaMap<'_>,
        scores: &ScoreMap<'_>,
        info: ImageInfo,
    ) -> ImageProposals {
        let coordinates_offset = if self.config.normalized_coordinates {
            0.0
        } else {
            1.0
        };
        let params = RefineParams {
            img_h: info.height,
            img_w: info.width,
            min_box_h: self.config.min_box_size * info.scale_h,
            min_box_w: self.config.min_box_size * info.scale_w,
            max_delta_log_wh: MAX_DELTA_LOG_WH,
            coordinates_offset,
        };

        let mut proposals = vec![Proposal::default(); anchors.len()];

        #[cfg(feature = "rayon")]
        if self.config.parallel {
            refine_image_par::<DefaultKernel>(anchors, deltas, scores, &params, &mut proposals);
        } else {
            refine_image::<DefaultKernel>(anchors, deltas, scores, &params, &mut proposals);
        }
        #[cfg(not(feature = "rayon"))]
        refine_image::<DefaultKernel>(anchors, deltas, scores, &params, &mut proposals);

        let k = proposals.len().min(self.config.pre_nms_topn);
        select_topk(&mut proposals, k);
        let boxes = TopkBoxes::from_proposals(&proposals[..k]);

        let kept = greedy_nms::<DefaultKernel>(
            &boxes,
            self.config.post_nms_topn,
            self.config.nms_threshold,
            coordinates_offset,
        );

        let mut rois = Vec::with_capacity(kept.len() * 4);
        let mut roi_scores = Vec::with_capacity(kept.len());
        for &i in &kept {
            rois.extend_from_slice(&boxes.corners(i));
            roi_scores.push(boxes.score[i]);
        }

        trace_event!("image_rois", count = kept.len());
        ImageProposals {
            rois,
            scores: roi_scores,
        }
    }
}
